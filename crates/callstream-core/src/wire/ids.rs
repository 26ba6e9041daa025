//! Signaling message ids and their fixed record lengths.
//!
//! Ids are assigned in family bands (duplex `0x1_`, simplex `0x2_`, group
//! `0x3_`, SDS `0x4_`), with `KeepAlive` standing alone at `0x01`. Record
//! lengths are derived from each variant's field layout, not scanned.

use crate::protocol_constants::{NUMBER_FIELD_LEN, SIGNALING_HEADER_LEN};

/// Size in bytes of a TSI + Number party identity field as it appears on the
/// wire (8-byte TSI, 8-byte Number, plus a fixed 32-byte display
/// description).
pub const PARTY_FIELD_LEN: usize = 8 + NUMBER_FIELD_LEN + DESCR_FIELD_LEN;

/// Fixed width of the display description string carried with a party
/// identity.
pub const DESCR_FIELD_LEN: usize = 32;

/// Known signaling message ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    KeepAlive = 0x01,
    DuplexCallChange = 0x10,
    DuplexCallRelease = 0x11,
    SimplexCallStartChange = 0x20,
    SimplexCallPttChange = 0x21,
    SimplexCallRelease = 0x29,
    GroupCallStartChange = 0x30,
    GroupCallPttActive = 0x31,
    GroupCallPttIdle = 0x32,
    GroupCallRelease = 0x39,
    StatusSds = 0x40,
    TextSds = 0x41,
}

impl MessageId {
    #[must_use]
    pub fn from_wire(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::KeepAlive),
            0x10 => Some(Self::DuplexCallChange),
            0x11 => Some(Self::DuplexCallRelease),
            0x20 => Some(Self::SimplexCallStartChange),
            0x21 => Some(Self::SimplexCallPttChange),
            0x29 => Some(Self::SimplexCallRelease),
            0x30 => Some(Self::GroupCallStartChange),
            0x31 => Some(Self::GroupCallPttActive),
            0x32 => Some(Self::GroupCallPttIdle),
            0x39 => Some(Self::GroupCallRelease),
            0x40 => Some(Self::StatusSds),
            0x41 => Some(Self::TextSds),
            _ => None,
        }
    }

    /// Total record length in bytes, header included, for this message id.
    ///
    /// Every variant is `SIGNALING_HEADER_LEN` plus its own fixed fields;
    /// none are variable-length except the SDS text payload, which carries
    /// its own length prefix handled separately by the body decoder.
    #[must_use]
    pub fn fixed_body_len(self) -> Option<usize> {
        match self {
            Self::KeepAlive => Some(2 + 2 + 64 + 64), // server id, timeout, sw ver blob, descr blob
            Self::DuplexCallChange => Some(4 + 1 + 2 + PARTY_FIELD_LEN * 2 + 1), // call id, action, timeout, A, B, talking
            Self::DuplexCallRelease => Some(4 + 1), // call id, cause
            Self::SimplexCallStartChange => Some(4 + 1 + 2 + PARTY_FIELD_LEN * 2),
            Self::SimplexCallPttChange => Some(4 + 1), // call id, talking
            Self::SimplexCallRelease => Some(4 + 1),
            Self::GroupCallStartChange => Some(4 + 1 + 2 + PARTY_FIELD_LEN * 2),
            Self::GroupCallPttActive => Some(4 + PARTY_FIELD_LEN),
            Self::GroupCallPttIdle => Some(4),
            Self::GroupCallRelease => Some(4 + 1),
            Self::StatusSds => Some(PARTY_FIELD_LEN * 2 + 2),
            // Variable-length: 2-byte text length prefix, body decoded separately.
            Self::TextSds => None,
        }
    }

    /// Total on-wire record length (header + body), when fixed.
    #[must_use]
    pub fn fixed_record_len(self) -> Option<usize> {
        self.fixed_body_len()
            .map(|body| SIGNALING_HEADER_LEN + body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_known_ids() {
        let ids = [
            MessageId::KeepAlive,
            MessageId::DuplexCallChange,
            MessageId::DuplexCallRelease,
            MessageId::SimplexCallStartChange,
            MessageId::SimplexCallPttChange,
            MessageId::SimplexCallRelease,
            MessageId::GroupCallStartChange,
            MessageId::GroupCallPttActive,
            MessageId::GroupCallPttIdle,
            MessageId::GroupCallRelease,
            MessageId::StatusSds,
            MessageId::TextSds,
        ];
        for id in ids {
            assert_eq!(MessageId::from_wire(id as u8), Some(id));
        }
    }

    #[test]
    fn unknown_id_is_none() {
        assert_eq!(MessageId::from_wire(0xFF), None);
    }

    #[test]
    fn text_sds_has_no_fixed_length() {
        assert_eq!(MessageId::TextSds.fixed_record_len(), None);
    }

    #[test]
    fn keepalive_has_a_fixed_length() {
        assert!(MessageId::KeepAlive.fixed_record_len().is_some());
    }
}
