//! A tiny little-endian byte cursor used to decode fixed-layout records.

use crate::model::{Number, PartyIdentity, Tsi};
use crate::wire::ids::DESCR_FIELD_LEN;

/// Reads fixed-width fields from a byte slice, advancing an internal
/// position. Every `read_*` method panics on short input; callers must have
/// already checked the slice is at least as long as the record's declared
/// length before constructing a cursor over it.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    pub fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    pub fn u32(&mut self) -> u32 {
        let bytes = [
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ];
        self.pos += 4;
        u32::from_le_bytes(bytes)
    }

    pub fn bytes(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    /// Reads a fixed-width NUL-padded ASCII description field.
    pub fn descr(&mut self) -> String {
        let raw = self.bytes(DESCR_FIELD_LEN);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    /// Reads a TSI (SSI 4B, MNC 2B, MCC 2B).
    pub fn tsi(&mut self) -> Tsi {
        let ssi = self.u32();
        let mnc = self.u16();
        let mcc = self.u16();
        Tsi { mcc, mnc, ssi }
    }

    /// Reads a Number field (1-byte length + 7 BCD bytes).
    pub fn number(&mut self) -> Option<Number> {
        let len = self.u8();
        let mut bcd = [0u8; 7];
        bcd.copy_from_slice(self.bytes(7));
        Number::decode(len, &bcd)
    }

    /// Reads a full party identity: TSI, Number, description.
    pub fn party(&mut self) -> PartyIdentity {
        let tsi = self.tsi();
        let number = self.number();
        let descr = self.descr();
        PartyIdentity { tsi, number, descr }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_primitives_in_order() {
        let data = [0x01, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
        let mut c = Cursor::new(&data);
        assert_eq!(c.u8(), 1);
        assert_eq!(c.u16(), 2);
        assert_eq!(c.u32(), 3);
    }

    #[test]
    fn descr_strips_at_first_nul() {
        let mut raw = vec![b'h', b'i', 0, 0];
        raw.resize(DESCR_FIELD_LEN, 0);
        let c_data = raw;
        let mut c = Cursor::new(&c_data);
        assert_eq!(c.descr(), "hi");
    }
}
