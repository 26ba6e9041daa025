//! The domain event sum type: every signaling and voice record the Frame
//! Parser can produce, plus the enums that classify them.

use serde::Serialize;

use super::party::PartyIdentity;

/// Wall-clock arrival timestamp, Unix seconds, stamped by the Ingestor at
/// the moment the Frame Parser matched the record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReceivedAt(pub u64);

impl ReceivedAt {
    #[must_use]
    pub fn now() -> Self {
        Self(crate::utils::now_unix_secs())
    }
}

/// Why a duplex or simplex call changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallAction {
    KeepAliveOnly,
    NewCallSetup,
    CallThroughConnect,
    ChangeOfAOrBUser,
}

/// Why a call (of any kind) was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReleaseCause {
    Unknown,
    ARelease,
    BRelease,
}

/// Which duplex party currently holds the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TalkingParty {
    None,
    A,
    B,
}

/// Why a group call changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupCallAction {
    KeepAliveOnly,
    NewCallSetup,
}

/// Which side of a call a voice frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamOriginator {
    Group,
    A,
    B,
}

/// Voice payload-1 kind as carried on the wire; only `G711Alaw` is ever
/// assembled, the rest are recognized so their bytes can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadKind {
    Silence,
    Unknown1,
    Unknown2,
    Unknown3,
    Unknown4,
    Unknown5,
    G711Alaw,
}

impl PayloadKind {
    #[must_use]
    pub fn from_wire(kind: u8) -> Option<Self> {
        match kind {
            0 => Some(Self::Silence),
            1 => Some(Self::Unknown1),
            2 => Some(Self::Unknown2),
            3 => Some(Self::Unknown3),
            4 => Some(Self::Unknown4),
            5 => Some(Self::Unknown5),
            7 => Some(Self::G711Alaw),
            _ => None,
        }
    }
}

/// One decoded unit of traffic from the log server: a signaling record or a
/// voice record.
#[derive(Debug, Clone, Serialize)]
pub enum Event {
    /// A keep-alive with no call content; the connection is alive but idle.
    KeepAlive {
        received_at: ReceivedAt,
        log_server_no: u16,
        timeout: u16,
        sw_version: String,
        descr: String,
    },

    /// A duplex (point-to-point, full-duplex) call changed state.
    DuplexCallChange {
        received_at: ReceivedAt,
        call_id: u32,
        action: CallAction,
        party_a: PartyIdentity,
        party_b: PartyIdentity,
        talking: TalkingParty,
    },

    /// A duplex call ended.
    DuplexCallRelease {
        received_at: ReceivedAt,
        call_id: u32,
        cause: ReleaseCause,
    },

    /// A simplex (point-to-point, half-duplex PTT) call started or changed.
    SimplexCallStartChange {
        received_at: ReceivedAt,
        call_id: u32,
        action: CallAction,
        party_a: PartyIdentity,
        party_b: PartyIdentity,
    },

    /// PTT ownership on a simplex call changed.
    SimplexCallPttChange {
        received_at: ReceivedAt,
        call_id: u32,
        talking: TalkingParty,
    },

    /// A simplex call ended.
    SimplexCallRelease {
        received_at: ReceivedAt,
        call_id: u32,
        cause: ReleaseCause,
    },

    /// A group call started or changed.
    GroupCallStartChange {
        received_at: ReceivedAt,
        call_id: u32,
        action: GroupCallAction,
        group: PartyIdentity,
        originator: PartyIdentity,
    },

    /// A group call's floor became active for a new originator.
    GroupCallPttActive {
        received_at: ReceivedAt,
        call_id: u32,
        originator: PartyIdentity,
    },

    /// A group call's floor went idle.
    GroupCallPttIdle {
        received_at: ReceivedAt,
        call_id: u32,
    },

    /// A group call ended.
    GroupCallRelease {
        received_at: ReceivedAt,
        call_id: u32,
        cause: ReleaseCause,
    },

    /// A short data service status message.
    StatusSds {
        received_at: ReceivedAt,
        sender: PartyIdentity,
        recipient: PartyIdentity,
        status_code: u16,
    },

    /// A short data service text message.
    TextSds {
        received_at: ReceivedAt,
        sender: PartyIdentity,
        recipient: PartyIdentity,
        text: String,
    },

    /// One 480-byte A-law voice frame belonging to an in-progress call.
    VoiceFrame {
        received_at: ReceivedAt,
        call_id: u32,
        originator: StreamOriginator,
        kind: PayloadKind,
        payload: bytes::Bytes,
    },
}

impl Event {
    /// The call id this event concerns, if any (keep-alives and SDS have
    /// none).
    #[must_use]
    pub fn call_id(&self) -> Option<u32> {
        match self {
            Self::KeepAlive { .. } | Self::StatusSds { .. } | Self::TextSds { .. } => None,
            Self::DuplexCallChange { call_id, .. }
            | Self::DuplexCallRelease { call_id, .. }
            | Self::SimplexCallStartChange { call_id, .. }
            | Self::SimplexCallPttChange { call_id, .. }
            | Self::SimplexCallRelease { call_id, .. }
            | Self::GroupCallStartChange { call_id, .. }
            | Self::GroupCallPttActive { call_id, .. }
            | Self::GroupCallPttIdle { call_id, .. }
            | Self::GroupCallRelease { call_id, .. }
            | Self::VoiceFrame { call_id, .. } => Some(*call_id),
        }
    }

    /// True if this event carries voice payload rather than signaling.
    #[must_use]
    pub fn is_voice(&self) -> bool {
        matches!(self, Self::VoiceFrame { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_id_is_none_for_keepalive_and_sds() {
        let ka = Event::KeepAlive {
            received_at: ReceivedAt(0),
            log_server_no: 7,
            timeout: 30,
            sw_version: String::new(),
            descr: String::new(),
        };
        assert_eq!(ka.call_id(), None);
        assert!(!ka.is_voice());
    }

    #[test]
    fn call_id_is_present_for_voice_frame() {
        let ev = Event::VoiceFrame {
            received_at: ReceivedAt(0),
            call_id: 42,
            originator: StreamOriginator::A,
            kind: PayloadKind::G711Alaw,
            payload: bytes::Bytes::from_static(&[0u8; 480]),
        };
        assert_eq!(ev.call_id(), Some(42));
        assert!(ev.is_voice());
    }

    #[test]
    fn payload_kind_from_wire_round_trips_known_kinds() {
        assert_eq!(PayloadKind::from_wire(7), Some(PayloadKind::G711Alaw));
        assert_eq!(PayloadKind::from_wire(0), Some(PayloadKind::Silence));
        assert_eq!(PayloadKind::from_wire(6), None);
    }
}
