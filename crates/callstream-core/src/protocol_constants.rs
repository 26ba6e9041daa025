//! Fixed protocol constants defined by the log-server wire format.
//!
//! These values come from the ingress protocol itself; changing them would
//! break framing against the real log server.

// ─────────────────────────────────────────────────────────────────────────────
// Framing signatures
// ─────────────────────────────────────────────────────────────────────────────

/// 4-byte little-endian signature marking the start of a signaling record.
pub const SIGNALING_SIGNATURE: u32 = 0x3147_4F4C;

/// 4-byte little-endian signature marking the start of a voice record.
pub const VOICE_SIGNATURE: u32 = 0x3247_4F4C;

/// Size of the common signaling header (signature, sequence, api version,
/// message id).
pub const SIGNALING_HEADER_LEN: usize = 8;

/// Size of the fixed voice record prefix, before payload 1.
pub const VOICE_PREFIX_LEN: usize = 20;

/// The only voice payload-1 kind the system processes.
pub const PAYLOAD_KIND_G711_ALAW: u8 = 7;

/// Length in bytes of a G.711 A-law payload-1 frame.
pub const ALAW_PAYLOAD_LEN: usize = 480;

/// Recommended minimum capacity for the Ingestor's rolling byte buffer.
pub const MIN_ROLLING_BUFFER_CAPACITY: usize = 4096;

// ─────────────────────────────────────────────────────────────────────────────
// Voice payload kind → length table (spec.md §4.1)
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a voice payload kind to its on-wire length in bytes.
///
/// Only kind 7 (`PAYLOAD_KIND_G711_ALAW`) is ever decoded into a `VoiceFrame`
/// event; the others are recognized so their bytes can be skipped correctly
/// when present as payload 2.
#[must_use]
pub fn payload_kind_len(kind: u8) -> Option<usize> {
    match kind {
        0 => Some(0),
        1 => Some(16),
        2 => Some(18),
        3 => Some(27),
        4 => Some(18),
        5 => Some(9),
        7 => Some(480),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Number / BCD alphabet
// ─────────────────────────────────────────────────────────────────────────────

/// Extended BCD alphabet used to pack TETRA subscriber numbers.
pub const BCD_ALPHABET: &[u8; 16] = b"0123456789*#+DEF";

/// Number of raw bytes carried in a "Number" field (length + 7 BCD bytes).
pub const NUMBER_FIELD_LEN: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Timing defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default per-call inactivity timeout (seconds) before implicit
/// finalization/removal.
pub const DEFAULT_CALL_INACTIVITY_PERIOD_SECS: u64 = 300;

/// Default maintenance tick frequency (seconds).
pub const DEFAULT_MAINTENANCE_FREQUENCY_SECS: u64 = 60;

/// G.711 A-law sample rate (Hz).
pub const ALAW_SAMPLE_RATE: u32 = 8000;

/// Bits per A-law sample.
pub const ALAW_BITS_PER_SAMPLE: u16 = 8;

/// WAV format tag for A-law (ITU-T G.711).
pub const WAV_FORMAT_TAG_ALAW: u16 = 6;

/// Size in bytes of a materialized A-law WAV header (RIFF/WAVE/fmt/data,
/// extended 18-byte `fmt` chunk, no `fact` chunk).
pub const WAV_HEADER_LEN: usize = 46;

/// Size in bytes of the voice-recording playback filename digest (MD5 hex).
pub const VOICE_FILENAME_DIGEST_LEN: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_table_matches_spec() {
        assert_eq!(payload_kind_len(0), Some(0));
        assert_eq!(payload_kind_len(1), Some(16));
        assert_eq!(payload_kind_len(2), Some(18));
        assert_eq!(payload_kind_len(3), Some(27));
        assert_eq!(payload_kind_len(4), Some(18));
        assert_eq!(payload_kind_len(5), Some(9));
        assert_eq!(payload_kind_len(7), Some(480));
        assert_eq!(payload_kind_len(6), None);
    }
}
