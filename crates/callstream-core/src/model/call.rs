//! Persister-side call state: the voice assembly buffers and bookkeeping
//! that track one call from setup to finalization.

use bytes::Bytes;

use super::event::StreamOriginator;
use super::party::PartyIdentity;

/// Which of the three call topologies this call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Duplex,
    Simplex,
    Group,
}

/// The Persister's live state for one call, from first signaling record to
/// finalization.
#[derive(Debug)]
pub struct Call {
    pub call_id: u32,
    pub kind: CallKind,
    pub party_a: Option<PartyIdentity>,
    pub party_b: Option<PartyIdentity>,
    pub db_id: Option<i64>,
    /// Timestamp of the setup record that created this call; unlike
    /// `last_activity_secs` this never changes, so finalization can still
    /// report the true call-begin time after activity has touched it.
    pub call_begin_secs: u64,
    pub last_activity_secs: u64,

    /// Accumulated A-side (or group) audio bytes, finalized to a single
    /// stream on call release.
    pub buffer_a: Vec<u8>,
    /// Accumulated B-side audio bytes. Unused for group calls.
    pub buffer_b: Vec<u8>,

    /// Pending half-frame for duplex interleaving: the last frame received
    /// for A or B while its counterpart has not yet arrived. Cleared as soon
    /// as both sides have produced one 480-byte frame each.
    pub pending_a: Option<[u8; 480]>,
    pub pending_b: Option<[u8; 480]>,
}

impl Call {
    #[must_use]
    pub fn new(call_id: u32, kind: CallKind, last_activity_secs: u64) -> Self {
        Self {
            call_id,
            kind,
            party_a: None,
            party_b: None,
            db_id: None,
            call_begin_secs: last_activity_secs,
            last_activity_secs,
            buffer_a: Vec::new(),
            buffer_b: Vec::new(),
            pending_a: None,
            pending_b: None,
        }
    }

    /// Appends a 480-byte voice frame, returning an interleaved stereo frame
    /// pair once both `A` and `B` have each produced one since the last
    /// emission. Group frames are appended straight to `buffer_a` and never
    /// interleaved.
    ///
    /// On a length mismatch the shorter side is truncated and the event is
    /// logged by the caller; this function only handles the exact 480-byte
    /// case since the wire format fixes `ALAW_PAYLOAD_LEN` at that size.
    pub fn ingest_voice(&mut self, originator: StreamOriginator, payload: &Bytes) {
        match (self.kind, originator) {
            (CallKind::Group, _) => {
                self.buffer_a.extend_from_slice(payload);
            }
            (CallKind::Simplex, _) => {
                self.buffer_a.extend_from_slice(payload);
            }
            (CallKind::Duplex, StreamOriginator::A) => {
                let mut frame = [0u8; 480];
                let n = payload.len().min(480);
                frame[..n].copy_from_slice(&payload[..n]);
                self.pending_a = Some(frame);
                self.try_emit_duplex_pair();
            }
            (CallKind::Duplex, StreamOriginator::B) => {
                let mut frame = [0u8; 480];
                let n = payload.len().min(480);
                frame[..n].copy_from_slice(&payload[..n]);
                self.pending_b = Some(frame);
                self.try_emit_duplex_pair();
            }
            (CallKind::Duplex, StreamOriginator::Group) => {
                // Not expected on the wire for a duplex call; ignore.
            }
        }
    }

    fn try_emit_duplex_pair(&mut self) {
        if let (Some(a), Some(b)) = (self.pending_a.take(), self.pending_b.take()) {
            self.buffer_a.extend_from_slice(&a);
            self.buffer_b.extend_from_slice(&b);
        }
    }

    /// True once the call has gone longer than `timeout_secs` without
    /// activity, for maintenance-tick implicit finalization.
    #[must_use]
    pub fn is_stale(&self, now_secs: u64, timeout_secs: u64) -> bool {
        now_secs.saturating_sub(self.last_activity_secs) >= timeout_secs
    }

    pub fn touch(&mut self, now_secs: u64) {
        self.last_activity_secs = now_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(byte: u8) -> Bytes {
        Bytes::from(vec![byte; 480])
    }

    #[test]
    fn duplex_pair_emits_only_once_both_sides_present() {
        let mut call = Call::new(1, CallKind::Duplex, 0);
        call.ingest_voice(StreamOriginator::A, &frame(0xAA));
        assert!(call.buffer_a.is_empty());
        call.ingest_voice(StreamOriginator::B, &frame(0xBB));
        assert_eq!(call.buffer_a.len(), 480);
        assert_eq!(call.buffer_b.len(), 480);
        assert!(call.pending_a.is_none());
        assert!(call.pending_b.is_none());
    }

    #[test]
    fn group_call_appends_without_interleave() {
        let mut call = Call::new(2, CallKind::Group, 0);
        call.ingest_voice(StreamOriginator::Group, &frame(1));
        call.ingest_voice(StreamOriginator::Group, &frame(2));
        assert_eq!(call.buffer_a.len(), 960);
        assert!(call.buffer_b.is_empty());
    }

    #[test]
    fn staleness_respects_timeout() {
        let mut call = Call::new(3, CallKind::Simplex, 100);
        assert!(!call.is_stale(200, 300));
        assert!(call.is_stale(500, 300));
        call.touch(500);
        assert!(!call.is_stale(500, 300));
    }
}
