//! The Internal Bus: an in-process, topic-tagged publish/subscribe fan-out
//! built on [`tokio::sync::broadcast`].
//!
//! A single shared channel carries every publication; subscribers filter by
//! topic-prefix on the receiving side rather than through per-topic
//! channels, which keeps the publisher side lock-free and lets a subscriber
//! widen or narrow its interest without re-subscribing. Delivery is
//! at-most-once: a subscriber that falls behind the channel's capacity
//! misses messages, surfaced to it as [`tokio::sync::broadcast::error::RecvError::Lagged`].

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::model::Event;

/// Default channel capacity; large enough to absorb a burst of voice frames
/// between subscriber polls without lagging under normal load.
pub const DEFAULT_BUS_CAPACITY: usize = 4096;

/// Topic tag for all signaling, regardless of message id.
pub const TOPIC_SIGNALING: &str = "S";

/// Topic tag for all voice, regardless of call id.
pub const TOPIC_VOICE: &str = "V";

/// Builds the `S_<msg_id_hex>` topic tag for a specific signaling message id.
#[must_use]
pub fn signaling_topic(msg_id: u8) -> String {
    format!("S_{msg_id:02x}")
}

/// Builds the `V_<call_id_decimal>` topic tag for a specific call's voice.
#[must_use]
pub fn voice_topic(call_id: u32) -> String {
    format!("V_{call_id}")
}

/// One publication on the bus: a topic tag, the decoded event, and, for
/// voice, the raw payload bytes again (kept alongside the event rather than
/// re-extracted, since subscribers on the live-routing path only need the
/// bytes and not the full decode).
#[derive(Debug, Clone)]
pub struct Publication {
    pub topic: String,
    pub event: Event,
}

/// The bus itself: a thin wrapper around a broadcast sender, with
/// convenience methods for publishing typed events under their derived
/// topic tags.
#[derive(Clone)]
pub struct Bus {
    sender: broadcast::Sender<Publication>,
}

impl Bus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event under its natural topic (`S_<id>` for signaling,
    /// `V_<call_id>` for voice). Returns the number of subscribers that
    /// currently exist. A publication with zero subscribers is not an
    /// error; it is simply dropped.
    pub fn publish(&self, topic: String, event: Event) -> usize {
        match self.sender.send(Publication { topic, event }) {
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    /// Subscribes to the bus, returning a [`Subscription`] that filters
    /// incoming publications to those whose topic starts with `prefix`.
    #[must_use]
    pub fn subscribe(&self, prefix: impl Into<String>) -> Subscription {
        Subscription {
            prefix: prefix.into(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// A single subscriber's view of the bus: a broadcast receiver plus the
/// topic prefix it cares about.
pub struct Subscription {
    prefix: String,
    receiver: broadcast::Receiver<Publication>,
}

/// Outcome of polling a [`Subscription`] once.
pub enum RecvOutcome {
    /// A publication matching this subscription's prefix.
    Matched(Publication),
    /// A publication arrived but didn't match; the caller should poll again.
    Skipped,
    /// The subscriber fell behind and missed `count` publications.
    Lagged(u64),
    /// The bus itself has shut down (all senders dropped).
    Closed,
}

impl Subscription {
    /// Waits for the next publication matching this subscription's prefix,
    /// looping internally past skipped and lagged notifications.
    pub async fn recv(&mut self) -> RecvOutcome {
        loop {
            match self.receiver.recv().await {
                Ok(publication) => {
                    if publication.topic.starts_with(&self.prefix) {
                        return RecvOutcome::Matched(publication);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    return RecvOutcome::Lagged(count);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return RecvOutcome::Closed;
                }
            }
        }
    }
}

/// Derives the topic tag an [`Event`] should be published under.
#[must_use]
pub fn topic_for_event(event: &Event, msg_id: u8) -> String {
    if event.is_voice() {
        match event.call_id() {
            Some(call_id) => voice_topic(call_id),
            None => TOPIC_VOICE.to_string(),
        }
    } else {
        signaling_topic(msg_id)
    }
}

/// Extracts the raw A-law payload from a voice event, if it is one.
#[must_use]
pub fn voice_payload(event: &Event) -> Option<&Bytes> {
    match event {
        Event::VoiceFrame { payload, .. } => Some(payload),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReceivedAt;

    #[tokio::test]
    async fn subscriber_receives_only_matching_prefix() {
        let bus = Bus::new(16);
        let mut sig_sub = bus.subscribe(TOPIC_SIGNALING);
        let mut voice_sub = bus.subscribe(TOPIC_VOICE);

        bus.publish(
            signaling_topic(0x01),
            Event::KeepAlive {
                received_at: ReceivedAt(0),
                log_server_no: 0,
                timeout: 0,
                sw_version: String::new(),
                descr: String::new(),
            },
        );

        match sig_sub.recv().await {
            RecvOutcome::Matched(p) => assert_eq!(p.topic, "S_01"),
            _ => panic!("expected a match"),
        }

        // The voice subscriber should not see the signaling publication;
        // publish a voice frame and confirm it does see that one.
        bus.publish(
            voice_topic(9),
            Event::VoiceFrame {
                received_at: ReceivedAt(0),
                call_id: 9,
                originator: crate::model::StreamOriginator::A,
                kind: crate::model::PayloadKind::G711Alaw,
                payload: Bytes::from_static(&[0u8; 480]),
            },
        );
        match voice_sub.recv().await {
            RecvOutcome::Matched(p) => assert_eq!(p.topic, "V_9"),
            _ => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn per_call_voice_subscription_filters_by_call_id() {
        let bus = Bus::new(16);
        let mut sub = bus.subscribe(voice_topic(42));

        bus.publish(
            voice_topic(7),
            Event::VoiceFrame {
                received_at: ReceivedAt(0),
                call_id: 7,
                originator: crate::model::StreamOriginator::A,
                kind: crate::model::PayloadKind::G711Alaw,
                payload: Bytes::from_static(&[0u8; 480]),
            },
        );
        bus.publish(
            voice_topic(42),
            Event::VoiceFrame {
                received_at: ReceivedAt(0),
                call_id: 42,
                originator: crate::model::StreamOriginator::A,
                kind: crate::model::PayloadKind::G711Alaw,
                payload: Bytes::from_static(&[0u8; 480]),
            },
        );

        match sub.recv().await {
            RecvOutcome::Matched(p) => assert_eq!(p.topic, "V_42"),
            _ => panic!("expected the call-42 voice publication"),
        }
    }

    #[test]
    fn topic_builders_match_spec_grammar() {
        assert_eq!(signaling_topic(0x10), "S_10");
        assert_eq!(voice_topic(100), "V_100");
    }
}
