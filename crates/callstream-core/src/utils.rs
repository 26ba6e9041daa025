//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current wall-clock Unix timestamp with 1-second granularity.
///
/// This is the timestamp recorded on every [`crate::model::Event`] at the
/// moment the Frame Parser matched the record header.
#[must_use]
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Renders a duration given in total bytes of 8-bit-per-sample audio as
/// `H:M:S.mmm`, as required for the `d_callstream_voiceindicall.duration`
/// column.
#[must_use]
pub fn format_duration_hms_millis(total_bytes: usize, sample_rate: u32, channels: u16) -> String {
    let denom = (sample_rate as u64) * (channels.max(1) as u64);
    let millis = if denom == 0 {
        0
    } else {
        (total_bytes as u64).saturating_mul(1000) / denom
    };

    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1_000) % 60;
    let ms = millis % 1_000;

    format!("{hours}:{minutes:02}:{seconds:02}.{ms:03}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Playback filename hashing (spec.md §8 testable property 7)
// ─────────────────────────────────────────────────────────────────────────────

/// Computes the deterministic 32-hex-character MD5 digest used as a playback
/// materialization filename stem, from `voice_<call_db_id>_<call_id>_<session>`.
#[must_use]
pub fn voice_playback_digest(call_db_id: i64, call_id: &str, session: &str) -> String {
    let seed = format!("voice_{call_db_id}_{call_id}_{session}");
    let mut hasher = Md5::new();
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formats_mono_call() {
        // 250 frames * 480 bytes at 8kHz mono = 120000 bytes = 15.0s
        let rendered = format_duration_hms_millis(250 * 480, 8000, 1);
        assert_eq!(rendered, "0:00:15.000");
    }

    #[test]
    fn duration_formats_stereo_call() {
        // 100 interleaved frame pairs * 960 bytes at 8kHz stereo = 96000 bytes = 6.0s
        let rendered = format_duration_hms_millis(100 * 960, 8000, 2);
        assert_eq!(rendered, "0:00:06.000");
    }

    #[test]
    fn digest_is_deterministic_and_32_hex_chars() {
        let a = voice_playback_digest(42, "100", "sess");
        let b = voice_playback_digest(42, "100", "sess");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_differs_for_different_inputs() {
        let a = voice_playback_digest(42, "100", "sess");
        let b = voice_playback_digest(43, "100", "sess");
        assert_ne!(a, b);
    }
}
