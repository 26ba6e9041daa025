//! The Frame Parser: scans a rolling byte buffer for signature-tagged
//! records and emits typed events, tolerating junk bytes and records split
//! across datagrams.

use bytes::{Buf, Bytes, BytesMut};

use crate::model::{
    CallAction, Event, GroupCallAction, PayloadKind, ReceivedAt, ReleaseCause, StreamOriginator,
    TalkingParty,
};
use crate::protocol_constants::{SIGNALING_HEADER_LEN, SIGNALING_SIGNATURE, VOICE_PREFIX_LEN, VOICE_SIGNATURE};

use super::cursor::Cursor;
use super::ids::{MessageId, PARTY_FIELD_LEN};

/// Minimum bytes needed in the text-SDS fixed prefix (two parties plus a
/// 2-byte text length) before the variable text itself.
const TEXT_SDS_FIXED_LEN: usize = PARTY_FIELD_LEN * 2 + 2;

/// Scans `buf` for as many complete records as it holds, removing consumed
/// bytes and returning the events they decoded to. Unconsumed trailing bytes
/// (a partial record, or junk awaiting more data) are left in `buf` for the
/// next call.
pub fn parse_frames(buf: &mut BytesMut) -> Vec<Event> {
    let mut events = Vec::new();

    loop {
        if buf.len() < 4 {
            break;
        }

        let signature = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);

        if signature == SIGNALING_SIGNATURE {
            match try_take_signaling(buf) {
                TakeResult::Taken(event) => {
                    if let Some(event) = event {
                        events.push(event);
                    }
                }
                TakeResult::NeedMoreData => break,
                TakeResult::Junk => {
                    buf.advance(1);
                }
            }
        } else if signature == VOICE_SIGNATURE {
            match try_take_voice(buf) {
                TakeResult::Taken(event) => {
                    if let Some(event) = event {
                        events.push(event);
                    }
                }
                TakeResult::NeedMoreData => break,
                TakeResult::Junk => {
                    buf.advance(1);
                }
            }
        } else {
            buf.advance(1);
        }
    }

    events
}

enum TakeResult {
    /// A full record was consumed; the inner option is `None` when the
    /// record decoded but carried nothing worth emitting (never happens for
    /// known ids today, kept for parity with the voice-kind-skip case).
    Taken(Option<Event>),
    /// Not enough bytes buffered yet; try again after the next receive.
    NeedMoreData,
    /// The signature matched but the header was otherwise unusable (unknown
    /// message id); resynchronize by one byte.
    Junk,
}

fn try_take_signaling(buf: &mut BytesMut) -> TakeResult {
    if buf.len() < SIGNALING_HEADER_LEN {
        return TakeResult::NeedMoreData;
    }

    let msg_id_byte = buf[7];
    let Some(msg_id) = MessageId::from_wire(msg_id_byte) else {
        return TakeResult::Junk;
    };

    let record_len = match msg_id {
        MessageId::TextSds => {
            if buf.len() < SIGNALING_HEADER_LEN + TEXT_SDS_FIXED_LEN {
                return TakeResult::NeedMoreData;
            }
            let text_len_offset = SIGNALING_HEADER_LEN + PARTY_FIELD_LEN * 2;
            let text_len =
                u16::from_le_bytes([buf[text_len_offset], buf[text_len_offset + 1]]) as usize;
            SIGNALING_HEADER_LEN + TEXT_SDS_FIXED_LEN + text_len
        }
        _ => match msg_id.fixed_record_len() {
            Some(len) => len,
            None => return TakeResult::Junk,
        },
    };

    if buf.len() < record_len {
        return TakeResult::NeedMoreData;
    }

    let received_at = ReceivedAt::now();
    let record = buf.split_to(record_len).freeze();
    let body = &record[SIGNALING_HEADER_LEN..];
    TakeResult::Taken(decode_signaling_body(msg_id, body, received_at))
}

fn try_take_voice(buf: &mut BytesMut) -> TakeResult {
    if buf.len() < VOICE_PREFIX_LEN {
        return TakeResult::NeedMoreData;
    }

    let payload1_kind = buf[VOICE_PREFIX_LEN - 2];
    let Some(payload1_len) = crate::protocol_constants::payload_kind_len(payload1_kind) else {
        return TakeResult::Junk;
    };

    let record_len = VOICE_PREFIX_LEN + payload1_len;
    if buf.len() < record_len {
        return TakeResult::NeedMoreData;
    }

    let received_at = ReceivedAt::now();
    let record = buf.split_to(record_len).freeze();
    TakeResult::Taken(decode_voice(&record, received_at))
}

fn decode_voice(record: &Bytes, received_at: ReceivedAt) -> Option<Event> {
    let mut c = Cursor::new(&record[4..VOICE_PREFIX_LEN]);
    let _version = c.u8();
    let originator_byte = c.u8();
    let _originating_node = c.u8();
    let call_id = c.u32();
    let _source_and_index = c.u8();
    let _stream_random_id = c.u16();
    let _packet_sequence = c.u16();
    let _spare = c.bytes(2);
    let payload1_kind = c.u8();
    let _payload2_kind = c.u8();

    let kind = PayloadKind::from_wire(payload1_kind)?;
    if kind != PayloadKind::G711Alaw {
        return None;
    }

    let originator = match originator_byte {
        1 => StreamOriginator::A,
        2 => StreamOriginator::B,
        _ => StreamOriginator::Group,
    };

    let payload = record.slice(VOICE_PREFIX_LEN..);

    Some(Event::VoiceFrame {
        received_at,
        call_id,
        originator,
        kind,
        payload,
    })
}

fn decode_signaling_body(msg_id: MessageId, body: &[u8], received_at: ReceivedAt) -> Option<Event> {
    let mut c = Cursor::new(body);

    Some(match msg_id {
        MessageId::KeepAlive => {
            let log_server_no = c.u16();
            let timeout = c.u16();
            let sw_version = nul_padded_string(c.bytes(64));
            let descr = nul_padded_string(c.bytes(64));
            Event::KeepAlive {
                received_at,
                log_server_no,
                timeout,
                sw_version,
                descr,
            }
        }
        MessageId::DuplexCallChange => {
            let call_id = c.u32();
            let action = decode_call_action(c.u8());
            let _timeout = c.u16();
            let party_a = c.party();
            let party_b = c.party();
            let talking = decode_talking_party(c.u8());
            Event::DuplexCallChange {
                received_at,
                call_id,
                action,
                party_a,
                party_b,
                talking,
            }
        }
        MessageId::DuplexCallRelease => {
            let call_id = c.u32();
            let cause = decode_release_cause(c.u8());
            Event::DuplexCallRelease {
                received_at,
                call_id,
                cause,
            }
        }
        MessageId::SimplexCallStartChange => {
            let call_id = c.u32();
            let action = decode_call_action(c.u8());
            let _timeout = c.u16();
            let party_a = c.party();
            let party_b = c.party();
            Event::SimplexCallStartChange {
                received_at,
                call_id,
                action,
                party_a,
                party_b,
            }
        }
        MessageId::SimplexCallPttChange => {
            let call_id = c.u32();
            let talking = decode_talking_party(c.u8());
            Event::SimplexCallPttChange {
                received_at,
                call_id,
                talking,
            }
        }
        MessageId::SimplexCallRelease => {
            let call_id = c.u32();
            let cause = decode_release_cause(c.u8());
            Event::SimplexCallRelease {
                received_at,
                call_id,
                cause,
            }
        }
        MessageId::GroupCallStartChange => {
            let call_id = c.u32();
            let action = decode_group_action(c.u8());
            let _timeout = c.u16();
            let group = c.party();
            let originator = c.party();
            Event::GroupCallStartChange {
                received_at,
                call_id,
                action,
                group,
                originator,
            }
        }
        MessageId::GroupCallPttActive => {
            let call_id = c.u32();
            let originator = c.party();
            Event::GroupCallPttActive {
                received_at,
                call_id,
                originator,
            }
        }
        MessageId::GroupCallPttIdle => {
            let call_id = c.u32();
            Event::GroupCallPttIdle { received_at, call_id }
        }
        MessageId::GroupCallRelease => {
            let call_id = c.u32();
            let cause = decode_release_cause(c.u8());
            Event::GroupCallRelease {
                received_at,
                call_id,
                cause,
            }
        }
        MessageId::StatusSds => {
            let sender = c.party();
            let recipient = c.party();
            let status_code = c.u16();
            Event::StatusSds {
                received_at,
                sender,
                recipient,
                status_code,
            }
        }
        MessageId::TextSds => {
            let sender = c.party();
            let recipient = c.party();
            let text_len = c.u16() as usize;
            let text_bytes = c.bytes(text_len);
            let text = String::from_utf8_lossy(text_bytes).into_owned();
            Event::TextSds {
                received_at,
                sender,
                recipient,
                text,
            }
        }
    })
}

/// Decodes a fixed-width NUL-padded ASCII blob, stopping at the first NUL.
fn nul_padded_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn decode_call_action(raw: u8) -> CallAction {
    match raw {
        0 => CallAction::KeepAliveOnly,
        1 => CallAction::NewCallSetup,
        2 => CallAction::CallThroughConnect,
        _ => CallAction::ChangeOfAOrBUser,
    }
}

fn decode_group_action(raw: u8) -> GroupCallAction {
    match raw {
        1 => GroupCallAction::NewCallSetup,
        _ => GroupCallAction::KeepAliveOnly,
    }
}

fn decode_talking_party(raw: u8) -> TalkingParty {
    match raw {
        1 => TalkingParty::A,
        2 => TalkingParty::B,
        _ => TalkingParty::None,
    }
}

fn decode_release_cause(raw: u8) -> ReleaseCause {
    match raw {
        1 => ReleaseCause::ARelease,
        2 => ReleaseCause::BRelease,
        _ => ReleaseCause::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ids::DESCR_FIELD_LEN;

    fn push_u16(buf: &mut BytesMut, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn push_u32(buf: &mut BytesMut, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_party(buf: &mut BytesMut, ssi: u32, mnc: u16, mcc: u16) {
        push_u32(buf, ssi);
        push_u16(buf, mnc);
        push_u16(buf, mcc);
        buf.extend_from_slice(&[0u8; 8]); // empty Number field
        buf.extend_from_slice(&[0u8; DESCR_FIELD_LEN]); // empty descr
    }

    fn push_header(buf: &mut BytesMut, msg_id: u8) {
        buf.extend_from_slice(&SIGNALING_SIGNATURE.to_le_bytes());
        push_u16(buf, 1); // sequence
        buf.push(1); // api version
        buf.push(msg_id);
    }

    #[test]
    fn parses_keepalive_record() {
        let mut buf = BytesMut::new();
        push_header(&mut buf, MessageId::KeepAlive as u8);
        push_u16(&mut buf, 7); // server id
        push_u16(&mut buf, 30); // timeout
        buf.extend_from_slice(&[0u8; 64]);
        buf.extend_from_slice(&[0u8; 64]);

        let events = parse_frames(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::KeepAlive { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn parses_simplex_release_then_voice_frame() {
        let mut buf = BytesMut::new();
        push_header(&mut buf, MessageId::SimplexCallRelease as u8);
        push_u32(&mut buf, 100); // call id
        buf.push(0); // cause

        buf.extend_from_slice(&VOICE_SIGNATURE.to_le_bytes());
        buf.push(1); // version
        buf.push(1); // originator A
        buf.push(0); // originating node
        push_u32(&mut buf, 100); // call id
        buf.push(0); // source and index
        push_u16(&mut buf, 0); // stream random id
        push_u16(&mut buf, 1); // packet sequence
        buf.extend_from_slice(&[0u8; 2]); // spare
        buf.push(7); // payload 1 kind = alaw
        buf.push(0); // payload 2 kind
        buf.extend_from_slice(&[0xAAu8; 480]);

        let events = parse_frames(&mut buf);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::SimplexCallRelease { call_id: 100, .. }));
        match &events[1] {
            Event::VoiceFrame { call_id, payload, .. } => {
                assert_eq!(*call_id, 100);
                assert_eq!(payload.len(), 480);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn junk_bytes_are_skipped_one_at_a_time() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        push_header(&mut buf, MessageId::GroupCallPttIdle as u8);
        push_u32(&mut buf, 55);

        let events = parse_frames(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::GroupCallPttIdle { call_id: 55, .. }));
    }

    #[test]
    fn partial_record_is_left_buffered() {
        let mut buf = BytesMut::new();
        push_header(&mut buf, MessageId::DuplexCallRelease as u8);
        // missing the 1-byte cause field

        let events = parse_frames(&mut buf);
        assert!(events.is_empty());
        assert_eq!(buf.len(), SIGNALING_HEADER_LEN);
    }

    #[test]
    fn fragment_across_two_calls_is_assembled() {
        let mut full = BytesMut::new();
        push_header(&mut full, MessageId::GroupCallPttIdle as u8);
        push_u32(&mut full, 9);

        let (first, second) = full.split_at(5);
        let mut buf = BytesMut::from(first);
        assert!(parse_frames(&mut buf).is_empty());

        buf.extend_from_slice(second);
        let events = parse_frames(&mut buf);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::GroupCallPttIdle { call_id: 9, .. }));
    }

    #[test]
    fn group_party_tsi_round_trips() {
        let mut buf = BytesMut::new();
        push_header(&mut buf, MessageId::GroupCallPttActive as u8);
        push_u32(&mut buf, 5);
        push_party(&mut buf, 777, 2, 901);

        let events = parse_frames(&mut buf);
        match &events[0] {
            Event::GroupCallPttActive { originator, .. } => {
                assert_eq!(originator.tsi.ssi, 777);
                assert_eq!(originator.tsi.mnc, 2);
                assert_eq!(originator.tsi.mcc, 901);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
