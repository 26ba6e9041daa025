//! The Tracer: subscribes to every signaling and voice publication and
//! renders each as a pipe-delimited line plus, for every Nth voice frame, a
//! JSON object — both sent to an external publish endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use crate::bus::{Bus, RecvOutcome, TOPIC_SIGNALING, TOPIC_VOICE};
use crate::model::Event;

#[async_trait]
pub trait TracePublisher: Send + Sync {
    async fn publish_line(&self, line: &str);
    async fn publish_json(&self, value: &serde_json::Value);
}

/// Sends both representations as UDP datagrams to a fixed endpoint, the same
/// headerless-egress idiom the Media Router uses for feeder frames.
pub struct UdpTracePublisher {
    socket: UdpSocket,
    endpoint: SocketAddr,
}

impl UdpTracePublisher {
    pub async fn bind(endpoint: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self { socket, endpoint })
    }
}

#[async_trait]
impl TracePublisher for UdpTracePublisher {
    async fn publish_line(&self, line: &str) {
        if let Err(err) = self.socket.send_to(line.as_bytes(), self.endpoint).await {
            log::warn!("tracer: failed to publish line: {err}");
        }
    }

    async fn publish_json(&self, value: &serde_json::Value) {
        let bytes = value.to_string();
        if let Err(err) = self.socket.send_to(bytes.as_bytes(), self.endpoint).await {
            log::warn!("tracer: failed to publish json: {err}");
        }
    }
}

/// Discards everything; used in tests.
#[derive(Default)]
pub struct NoopTracePublisher;

#[async_trait]
impl TracePublisher for NoopTracePublisher {
    async fn publish_line(&self, _line: &str) {}
    async fn publish_json(&self, _value: &serde_json::Value) {}
}

#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Emit a JSON object for every Nth voice frame; the delimited line is
    /// always emitted regardless.
    pub publish_one_json_voice_msg_every: u64,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self { publish_one_json_voice_msg_every: 100 }
    }
}

fn message_type(event: &Event) -> &'static str {
    match event {
        Event::KeepAlive { .. } => "KeepAlive",
        Event::DuplexCallChange { .. } => "DuplexCallChange",
        Event::DuplexCallRelease { .. } => "DuplexCallRelease",
        Event::SimplexCallStartChange { .. } => "SimplexCallStartChange",
        Event::SimplexCallPttChange { .. } => "SimplexCallPttChange",
        Event::SimplexCallRelease { .. } => "SimplexCallRelease",
        Event::GroupCallStartChange { .. } => "GroupCallStartChange",
        Event::GroupCallPttActive { .. } => "GroupCallPttActive",
        Event::GroupCallPttIdle { .. } => "GroupCallPttIdle",
        Event::GroupCallRelease { .. } => "GroupCallRelease",
        Event::StatusSds { .. } => "StatusSds",
        Event::TextSds { .. } => "TextSds",
        Event::VoiceFrame { .. } => "VoiceFrame",
    }
}

/// Renders the pipe-delimited flat line: `type|received_at|call_id|...`.
/// Voice frames render their payload length rather than the raw bytes.
fn render_line(event: &Event) -> String {
    let kind = message_type(event);
    let received_at = event_received_at(event);
    let call_id = event
        .call_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    let detail = match event {
        Event::VoiceFrame { originator, kind, payload, .. } => {
            format!("{originator:?}|{kind:?}|{}", payload.len())
        }
        Event::StatusSds { status_code, .. } => format!("status={status_code}"),
        Event::TextSds { text, .. } => format!("text_len={}", text.len()),
        _ => String::new(),
    };

    format!("{kind}|{received_at}|{call_id}|{detail}")
}

fn render_json(event: &Event) -> serde_json::Value {
    json!({
        "type": message_type(event),
        "received_at": event_received_at(event),
        "call_id": event.call_id(),
        "is_voice": event.is_voice(),
    })
}

fn event_received_at(event: &Event) -> u64 {
    match event {
        Event::KeepAlive { received_at, .. }
        | Event::DuplexCallChange { received_at, .. }
        | Event::DuplexCallRelease { received_at, .. }
        | Event::SimplexCallStartChange { received_at, .. }
        | Event::SimplexCallPttChange { received_at, .. }
        | Event::SimplexCallRelease { received_at, .. }
        | Event::GroupCallStartChange { received_at, .. }
        | Event::GroupCallPttActive { received_at, .. }
        | Event::GroupCallPttIdle { received_at, .. }
        | Event::GroupCallRelease { received_at, .. }
        | Event::StatusSds { received_at, .. }
        | Event::TextSds { received_at, .. }
        | Event::VoiceFrame { received_at, .. } => received_at.0,
    }
}

/// Runs the Tracer loop until `shutdown` fires.
pub async fn run(
    bus: Bus,
    publisher: Arc<dyn TracePublisher>,
    config: TracerConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut signaling = bus.subscribe(TOPIC_SIGNALING);
    let mut voice = bus.subscribe(TOPIC_VOICE);
    let mut voice_frame_count: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("tracer: shutdown received");
                return;
            }
            outcome = signaling.recv() => {
                if let RecvOutcome::Matched(publication) = outcome {
                    trace_event(&publisher, &publication.event, &mut voice_frame_count, &config).await;
                }
            }
            outcome = voice.recv() => {
                if let RecvOutcome::Matched(publication) = outcome {
                    trace_event(&publisher, &publication.event, &mut voice_frame_count, &config).await;
                }
            }
        }
    }
}

async fn trace_event(
    publisher: &Arc<dyn TracePublisher>,
    event: &Event,
    voice_frame_count: &mut u64,
    config: &TracerConfig,
) {
    publisher.publish_line(&render_line(event)).await;

    if !event.is_voice() {
        publisher.publish_json(&render_json(event)).await;
        return;
    }

    *voice_frame_count += 1;
    let every = config.publish_one_json_voice_msg_every.max(1);
    if *voice_frame_count % every == 0 {
        publisher.publish_json(&render_json(event)).await;
    }
}
