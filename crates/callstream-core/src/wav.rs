//! Builds the 46-byte A-law WAV header used when materializing a finalized
//! voice recording, generalizing the fixed-format PCM stream header to a
//! finite, compressed-format file.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol_constants::{
    ALAW_BITS_PER_SAMPLE, ALAW_SAMPLE_RATE, WAV_FORMAT_TAG_ALAW, WAV_HEADER_LEN,
};

/// Byte offset of the `block_align` field within the header, used by
/// callers that want to sanity-check a built header without re-parsing it.
const BLOCK_ALIGN_OFFSET: usize = 32;

/// Builds a 46-byte RIFF/WAVE/fmt/data header declaring `data_len` bytes of
/// 8-bit A-law audio at 8 kHz, mono (`channels = 1`) or interleaved stereo
/// (`channels = 2`, one duplex call).
///
/// A-law is a compressed format (format tag 6), so the `fmt` chunk is the
/// extended 18-byte form (a trailing 2-byte `cbSize` of 0) rather than the
/// 16-byte PCM form; that extra field is what brings the total to 46 bytes
/// instead of the 44-byte PCM header.
#[must_use]
pub fn build_alaw_header(data_len: u32, channels: u16) -> Bytes {
    let channels = if channels == 0 { 1 } else { channels };
    let bytes_per_sample = ALAW_BITS_PER_SAMPLE / 8;
    let block_align = channels * bytes_per_sample;
    let byte_rate = ALAW_SAMPLE_RATE * channels as u32 * bytes_per_sample as u32;

    let mut header = BytesMut::with_capacity(WAV_HEADER_LEN);

    // RIFF chunk: file size is everything after this field.
    header.put_slice(b"RIFF");
    header.put_u32_le(WAV_HEADER_LEN as u32 - 8 + data_len);
    header.put_slice(b"WAVE");

    // fmt chunk, extended form (required for a non-PCM format tag).
    header.put_slice(b"fmt ");
    header.put_u32_le(18);
    header.put_u16_le(WAV_FORMAT_TAG_ALAW);
    header.put_u16_le(channels);
    header.put_u32_le(ALAW_SAMPLE_RATE);
    header.put_u32_le(byte_rate);
    header.put_u16_le(block_align);
    header.put_u16_le(ALAW_BITS_PER_SAMPLE);
    header.put_u16_le(0); // cbSize

    // data chunk
    header.put_slice(b"data");
    header.put_u32_le(data_len);

    debug_assert_eq!(header.len(), WAV_HEADER_LEN);
    header.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_exactly_46_bytes() {
        let header = build_alaw_header(1000, 1);
        assert_eq!(header.len(), WAV_HEADER_LEN);
    }

    #[test]
    fn mono_and_stereo_declare_distinct_block_align() {
        let mono = build_alaw_header(480, 1);
        let stereo = build_alaw_header(960, 2);
        assert_eq!(mono[BLOCK_ALIGN_OFFSET], 1);
        assert_eq!(stereo[BLOCK_ALIGN_OFFSET], 2);
    }

    #[test]
    fn zero_channels_treated_as_mono() {
        let header = build_alaw_header(480, 0);
        assert_eq!(header[BLOCK_ALIGN_OFFSET], 1);
    }

    #[test]
    fn data_chunk_size_matches_input() {
        let header = build_alaw_header(123456, 1);
        let data_len = u32::from_le_bytes([
            header[WAV_HEADER_LEN - 4],
            header[WAV_HEADER_LEN - 3],
            header[WAV_HEADER_LEN - 2],
            header[WAV_HEADER_LEN - 1],
        ]);
        assert_eq!(data_len, 123456);
    }
}
