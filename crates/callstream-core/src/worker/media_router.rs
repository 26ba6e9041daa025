//! The Media Router: fixed feeder/player pools, a length-prefixed multi-part
//! TCP control protocol, and live voice forwarding for in-progress calls.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::process::Command;
use tokio::sync::{broadcast, Mutex};

use crate::bus::{Bus, RecvOutcome, TOPIC_SIGNALING, TOPIC_VOICE};
use crate::child::ChildSupervisor;
use crate::config::{FeederConfig, FeederType};
use crate::error::{AppError, AppResult};
use crate::model::{CallKind, Event, Feeder, GroupCallAction, LiveCall, Player, Pool, StreamOriginator};
use crate::storage::Storage;
use crate::utils::voice_playback_digest;

#[derive(Debug, Clone)]
pub struct MediaRouterConfig {
    pub listen_addr: SocketAddr,
    pub feeders: Vec<FeederConfig>,
    pub player_pool_size: usize,
    pub player_command: String,
    /// Base URL a feeder's stream URL is built from: `<endpoint>/<stream>.<format>`.
    pub media_server_endpoint: String,
    /// Directory `START_PLAY_CALL` materializes recordings into.
    pub voicerec_repo: PathBuf,
    /// URL prefix `START_PLAY_CALL` reports materialized recordings under.
    pub voicerec_url: String,
    /// v1 mode launches an external player process immediately;
    /// v2 (default) only materializes the file and lets the caller play it.
    pub use_v1_player: bool,
}

impl Default for MediaRouterConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7701".parse().unwrap(),
            feeders: Vec::new(),
            player_pool_size: 4,
            player_command: "play".to_string(),
            media_server_endpoint: String::new(),
            voicerec_repo: PathBuf::from("/tmp/callstream/voicerec"),
            voicerec_url: String::new(),
            use_v1_player: false,
        }
    }
}

/// Which stored table a play request should read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTable {
    Indi,
    Group,
}

impl CallTable {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "I" | "i" => Some(Self::Indi),
            "G" | "g" => Some(Self::Group),
            _ => None,
        }
    }

}

/// One parsed control-protocol request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetActiveCalls,
    StartCallInterception { call_id: u32, format: String },
    StopCallInterception { call_id: u32 },
    StartPlayCall { table: CallTable, db_id: i64, call_id: String, format: String, session: String },
    StopPlayCall { table: CallTable, db_id: i64, call_id: String, format: String, session: String },
}

/// One reply, always `OK` with zero or more parts or `NOK` with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(Vec<String>),
    Nok(String),
}

/// Reads one multi-part, `u32`-length-prefixed-UTF-8-string request.
pub async fn read_request(stream: &mut TcpStream) -> AppResult<Request> {
    let parts = read_parts(stream).await?;
    parse_request(&parts)
}

async fn read_parts(stream: &mut TcpStream) -> AppResult<Vec<String>> {
    let count = stream
        .read_u32()
        .await
        .map_err(|e| AppError::Protocol(format!("failed to read part count: {e}")))?;
    let mut parts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = stream
            .read_u32()
            .await
            .map_err(|e| AppError::Protocol(format!("failed to read part length: {e}")))?;
        let mut buf = vec![0u8; len as usize];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| AppError::Protocol(format!("failed to read part body: {e}")))?;
        parts.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(parts)
}

fn parse_request(parts: &[String]) -> AppResult<Request> {
    match parts.first().map(String::as_str) {
        Some("GET_ACTIVE_CALLS") => Ok(Request::GetActiveCalls),
        Some("START_CALL_INTERCEPTION") => {
            let call_id = parts
                .get(1)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| AppError::Protocol("missing call_id".into()))?;
            let format = parts
                .get(2)
                .cloned()
                .ok_or_else(|| AppError::Protocol("missing format".into()))?;
            Ok(Request::StartCallInterception { call_id, format })
        }
        Some("STOP_CALL_INTERCEPTION") => {
            let call_id = parts
                .get(1)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| AppError::Protocol("missing call_id".into()))?;
            Ok(Request::StopCallInterception { call_id })
        }
        Some("START_PLAY_CALL") => {
            let (db_id, call_id, table, format, session) = parse_play_call_args(parts)?;
            Ok(Request::StartPlayCall { table, db_id, call_id, format, session })
        }
        Some("STOP_PLAY_CALL") => {
            let (db_id, call_id, table, format, session) = parse_play_call_args(parts)?;
            Ok(Request::StopPlayCall { table, db_id, call_id, format, session })
        }
        Some(other) => Err(AppError::Protocol(format!("unknown command: {other}"))),
        None => Err(AppError::Protocol("empty request".into())),
    }
}

/// Shared arg layout for `START_PLAY_CALL`/`STOP_PLAY_CALL`:
/// `(call_db_id, call_id, type, format, session)`.
fn parse_play_call_args(
    parts: &[String],
) -> AppResult<(i64, String, CallTable, String, String)> {
    let db_id = parts
        .get(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::Protocol("missing call_db_id".into()))?;
    let call_id = parts.get(2).cloned().ok_or_else(|| AppError::Protocol("missing call_id".into()))?;
    let table = parts
        .get(3)
        .map(String::as_str)
        .and_then(CallTable::parse)
        .ok_or_else(|| AppError::Protocol("missing or invalid type".into()))?;
    let format = parts.get(4).cloned().ok_or_else(|| AppError::Protocol("missing format".into()))?;
    let session = parts.get(5).cloned().ok_or_else(|| AppError::Protocol("missing session".into()))?;
    Ok((db_id, call_id, table, format, session))
}

pub async fn write_reply(stream: &mut TcpStream, reply: &Reply) -> AppResult<()> {
    let parts: Vec<String> = match reply {
        Reply::Ok(rest) => std::iter::once("OK".to_string()).chain(rest.iter().cloned()).collect(),
        Reply::Nok(reason) => vec!["NOK".to_string(), reason.clone()],
    };
    stream
        .write_u32(parts.len() as u32)
        .await
        .map_err(|e| AppError::Protocol(format!("failed to write part count: {e}")))?;
    for part in parts {
        let bytes = part.into_bytes();
        stream
            .write_u32(bytes.len() as u32)
            .await
            .map_err(|e| AppError::Protocol(format!("failed to write part length: {e}")))?;
        stream
            .write_all(&bytes)
            .await
            .map_err(|e| AppError::Protocol(format!("failed to write part body: {e}")))?;
    }
    Ok(())
}

pub(crate) struct RouterState {
    live_calls: HashMap<u32, LiveCall>,
    feeders: Pool<Feeder>,
    players: Pool<Player>,
    player_supervisors: HashMap<u32, ChildSupervisor>,
    /// Pending half-frame for duplex interleaving while routing live,
    /// mirroring `Call::ingest_voice`'s two-slot cache.
    duplex_pending: HashMap<u32, (Option<[u8; 480]>, Option<[u8; 480]>)>,
}

impl RouterState {
    fn new(config: &MediaRouterConfig) -> Self {
        let feeders = Pool::new(
            config
                .feeders
                .iter()
                .enumerate()
                .map(|(i, f)| Feeder::new(i as u32, f.stream.clone(), SocketAddr::new(f.ip, f.port), f.kind))
                .collect(),
        );
        let players = Pool::new((0..config.player_pool_size as u32).map(Player::new).collect());
        Self {
            live_calls: HashMap::new(),
            feeders,
            players,
            player_supervisors: HashMap::new(),
            duplex_pending: HashMap::new(),
        }
    }
}

/// Handles the bus side: tracks live calls and forwards voice frames to
/// attached feeders verbatim (simplex/group) or interleaved (duplex).
async fn run_bus_listener(
    bus: Bus,
    state: Arc<Mutex<RouterState>>,
    forward_socket: Arc<UdpSocket>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut signaling = bus.subscribe(TOPIC_SIGNALING);
    let mut voice = bus.subscribe(TOPIC_VOICE);

    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            outcome = signaling.recv() => {
                if let RecvOutcome::Matched(publication) = outcome {
                    handle_signaling_for_routing(&state, publication.event).await;
                }
            }
            outcome = voice.recv() => {
                if let RecvOutcome::Matched(publication) = outcome {
                    handle_voice_for_routing(&state, &forward_socket, publication.event).await;
                }
            }
        }
    }
}

async fn handle_signaling_for_routing(state: &Arc<Mutex<RouterState>>, event: Event) {
    let mut state = state.lock().await;
    match event {
        Event::SimplexCallStartChange { received_at, call_id, .. } => {
            state.live_calls.insert(
                call_id,
                LiveCall { call_id, kind: CallKind::Simplex, started_at_secs: received_at.0 },
            );
        }
        Event::DuplexCallChange { received_at, call_id, .. } => {
            state
                .live_calls
                .entry(call_id)
                .or_insert(LiveCall { call_id, kind: CallKind::Duplex, started_at_secs: received_at.0 });
        }
        Event::GroupCallStartChange { received_at, call_id, action, .. } => {
            if action == GroupCallAction::NewCallSetup {
                state.live_calls.insert(
                    call_id,
                    LiveCall { call_id, kind: CallKind::Group, started_at_secs: received_at.0 },
                );
            }
        }
        Event::SimplexCallRelease { call_id, .. }
        | Event::DuplexCallRelease { call_id, .. }
        | Event::GroupCallRelease { call_id, .. } => {
            state.live_calls.remove(&call_id);
            state.duplex_pending.remove(&call_id);
            state.feeders.release_by_call(call_id);
        }
        _ => {}
    }
}

async fn handle_voice_for_routing(state: &Arc<Mutex<RouterState>>, socket: &UdpSocket, event: Event) {
    let Event::VoiceFrame { call_id, originator, payload, .. } = event else { return };
    let mut state = state.lock().await;

    let to_send: Option<Vec<u8>> = if is_duplex(&state, call_id) {
        match originator {
            StreamOriginator::A => stash_duplex_half(&mut state, call_id, true, &payload),
            StreamOriginator::B => stash_duplex_half(&mut state, call_id, false, &payload),
            StreamOriginator::Group => Some(payload.to_vec()),
        }
    } else {
        Some(payload.to_vec())
    };

    let Some(frame) = to_send else { return };

    let destinations: Vec<SocketAddr> =
        state.feeders.iter().filter(|f| f.attached_call == Some(call_id)).map(|f| f.destination).collect();

    for dest in destinations {
        if let Err(err) = socket.send_to(&frame, dest).await {
            log::warn!("media_router: failed to forward voice to {dest}: {err}");
        }
    }
}

fn is_duplex(state: &RouterState, call_id: u32) -> bool {
    state.live_calls.get(&call_id).map(|c| c.kind == CallKind::Duplex).unwrap_or(false)
}

fn stash_duplex_half(
    state: &mut RouterState,
    call_id: u32,
    is_a: bool,
    payload: &bytes::Bytes,
) -> Option<Vec<u8>> {
    let mut frame = [0u8; 480];
    let n = payload.len().min(480);
    frame[..n].copy_from_slice(&payload[..n]);

    let slot = state.duplex_pending.entry(call_id).or_insert((None, None));
    if is_a {
        slot.0 = Some(frame);
    } else {
        slot.1 = Some(frame);
    }

    if let (Some(a), Some(b)) = (slot.0.take(), slot.1.take()) {
        let mut interleaved = Vec::with_capacity(960);
        for i in 0..480 {
            interleaved.push(a[i]);
            interleaved.push(b[i]);
        }
        Some(interleaved)
    } else {
        None
    }
}

fn voicerec_file_path(config: &MediaRouterConfig, digest: &str, format: &str) -> PathBuf {
    config.voicerec_repo.join(format!("{digest}.{format}"))
}

fn voicerec_url(config: &MediaRouterConfig, digest: &str, format: &str) -> String {
    format!("/{}/{digest}.{format}", config.voicerec_url.trim_matches('/'))
}

/// Dispatches one parsed request against shared state, mutating pools and,
/// for play requests, reaching into storage and spawning a child process.
pub(crate) async fn dispatch(
    state: &Arc<Mutex<RouterState>>,
    storage: &Arc<dyn Storage>,
    config: &MediaRouterConfig,
    request: Request,
) -> Reply {
    match request {
        Request::GetActiveCalls => {
            let state = state.lock().await;
            let parts = state
                .live_calls
                .values()
                .map(|c| format!("{}|{:?}|{}", c.call_id, c.kind, c.started_at_secs))
                .collect();
            Reply::Ok(parts)
        }

        Request::StartCallInterception { call_id, format } => {
            let mut state = state.lock().await;
            let Some(live_call) = state.live_calls.get(&call_id) else {
                return Reply::Nok(format!("call {call_id} is not active"));
            };
            let required_kind = live_call.required_feeder_type();

            if let Some(feeder) = state.feeders.find_by_call(call_id) {
                return Reply::Ok(vec![format!("{}/{}.{format}", config.media_server_endpoint, feeder.stream)]);
            }

            match state.feeders.acquire(call_id, required_kind, None) {
                Some(feeder_id) => {
                    let stream = state.feeders.iter().find(|f| f.id == feeder_id).unwrap().stream.clone();
                    Reply::Ok(vec![format!("{}/{stream}.{format}", config.media_server_endpoint)])
                }
                None => Reply::Nok("Feeder not available".to_string()),
            }
        }

        Request::StopCallInterception { call_id } => {
            let mut state = state.lock().await;
            if state.feeders.release_by_call(call_id) {
                Reply::Ok(vec![])
            } else {
                Reply::Nok(format!("no feeder attached to call {call_id}"))
            }
        }

        Request::StartPlayCall { table, db_id, call_id, format, session } => {
            let blob = match table {
                CallTable::Indi => storage.fetch_voiceindicall(db_id).await,
                CallTable::Group => storage.fetch_voicegroupcall(db_id).await,
            };
            let blob = match blob {
                Ok(Some(blob)) => blob,
                Ok(None) => return Reply::Nok(format!("no recording for db_id {db_id}")),
                Err(err) => return Reply::Nok(format!("storage error: {err}")),
            };

            let digest = voice_playback_digest(db_id, &call_id, &session);
            let file_path = voicerec_file_path(config, &digest, &format);
            if let Err(err) = tokio::fs::write(&file_path, &blob).await {
                return Reply::Nok(format!("failed to materialize file: {err}"));
            }
            let url = voicerec_url(config, &digest, &format);

            if !config.use_v1_player {
                return Reply::Ok(vec![url]);
            }

            let mut state = state.lock().await;
            let Some(player_id) = state.players.acquire(file_path.display().to_string()) else {
                return Reply::Nok("no free player".to_string());
            };
            let mut command = Command::new(&config.player_command);
            command.arg(&file_path);
            match ChildSupervisor::spawn(command) {
                Ok(supervisor) => {
                    state.player_supervisors.insert(player_id, supervisor);
                    Reply::Ok(vec![url])
                }
                Err(err) => {
                    state.players.release(player_id);
                    Reply::Nok(format!("failed to launch player: {err}"))
                }
            }
        }

        Request::StopPlayCall { table: _, db_id, call_id, format, session } => {
            let digest = voice_playback_digest(db_id, &call_id, &session);
            let file_path = voicerec_file_path(config, &digest, &format);

            if config.use_v1_player {
                let mut state = state.lock().await;
                let path_str = file_path.display().to_string();
                let player_id =
                    state.players.iter().find(|p| p.playing_file.as_deref() == Some(path_str.as_str())).map(|p| p.id);
                if let Some(player_id) = player_id {
                    if let Some(mut supervisor) = state.player_supervisors.remove(&player_id) {
                        let _ = supervisor.stop().await;
                    }
                    state.players.release(player_id);
                }
            }

            match tokio::fs::remove_file(&file_path).await {
                Ok(()) => Reply::Ok(vec![]),
                Err(err) => Reply::Nok(format!("failed to remove {}: {err}", file_path.display())),
            }
        }
    }
}

/// Runs the Media Router: the bus-driven routing task plus the TCP control
/// listener, until `shutdown` fires.
pub async fn run(
    bus: Bus,
    storage: Arc<dyn Storage>,
    config: MediaRouterConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> AppResult<()> {
    tokio::fs::create_dir_all(&config.voicerec_repo)
        .await
        .map_err(|e| AppError::Fatal(format!("failed to create voicerec repo: {e}")))?;

    let state = Arc::new(Mutex::new(RouterState::new(&config)));
    let forward_socket = Arc::new(
        UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| AppError::Fatal(format!("failed to bind forwarding socket: {e}")))?,
    );

    tokio::spawn(run_bus_listener(bus, state.clone(), forward_socket, shutdown.resubscribe()));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| AppError::Fatal(format!("failed to bind control listener {}: {e}", config.listen_addr)))?;
    log::info!("media_router: control protocol listening on {}", config.listen_addr);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("media_router: shutdown received");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (mut stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        log::warn!("media_router: accept failed: {err}");
                        continue;
                    }
                };
                let state = state.clone();
                let storage = storage.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    match read_request(&mut stream).await {
                        Ok(request) => {
                            let reply = dispatch(&state, &storage, &config, request).await;
                            if let Err(err) = write_reply(&mut stream, &reply).await {
                                log::warn!("media_router: failed to reply to {peer}: {err}");
                            }
                        }
                        Err(err) => {
                            let _ = write_reply(&mut stream, &Reply::Nok(err.to_string())).await;
                        }
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use bytes::Bytes;

    fn feeder_config(stream: &str, kind: FeederType) -> FeederConfig {
        FeederConfig { stream: stream.to_string(), ip: "127.0.0.1".parse().unwrap(), port: 9000, kind }
    }

    fn config() -> MediaRouterConfig {
        MediaRouterConfig {
            feeders: vec![feeder_config("feed0", FeederType::Mono)],
            player_pool_size: 1,
            media_server_endpoint: "http://media.example".to_string(),
            voicerec_repo: std::env::temp_dir().join("callstream-media-router-tests"),
            voicerec_url: "voicerec".to_string(),
            ..MediaRouterConfig::default()
        }
    }

    #[test]
    fn parses_all_known_commands() {
        assert_eq!(
            parse_request(&["GET_ACTIVE_CALLS".to_string()]).unwrap(),
            Request::GetActiveCalls
        );
        assert_eq!(
            parse_request(&[
                "START_CALL_INTERCEPTION".to_string(),
                "42".to_string(),
                "wav".to_string()
            ])
            .unwrap(),
            Request::StartCallInterception { call_id: 42, format: "wav".to_string() }
        );
        assert_eq!(
            parse_request(&["STOP_CALL_INTERCEPTION".to_string(), "42".to_string()]).unwrap(),
            Request::StopCallInterception { call_id: 42 }
        );
        assert_eq!(
            parse_request(&[
                "START_PLAY_CALL".to_string(),
                "42".to_string(),
                "100".to_string(),
                "I".to_string(),
                "wav".to_string(),
                "sess".to_string(),
            ])
            .unwrap(),
            Request::StartPlayCall {
                table: CallTable::Indi,
                db_id: 42,
                call_id: "100".to_string(),
                format: "wav".to_string(),
                session: "sess".to_string(),
            }
        );
        assert!(parse_request(&["BOGUS".to_string()]).is_err());
        assert!(parse_request(&[]).is_err());
    }

    #[tokio::test]
    async fn interception_fails_for_inactive_call() {
        let state = Arc::new(Mutex::new(RouterState::new(&config())));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let reply = dispatch(
            &state,
            &storage,
            &config(),
            Request::StartCallInterception { call_id: 1, format: "wav".to_string() },
        )
        .await;
        assert!(matches!(reply, Reply::Nok(_)));
    }

    #[tokio::test]
    async fn interception_returns_stream_url_and_is_idempotent() {
        let cfg = config();
        let state = Arc::new(Mutex::new(RouterState::new(&cfg)));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        state
            .lock()
            .await
            .live_calls
            .insert(1, LiveCall { call_id: 1, kind: CallKind::Simplex, started_at_secs: 0 });

        let first = dispatch(
            &state,
            &storage,
            &cfg,
            Request::StartCallInterception { call_id: 1, format: "wav".to_string() },
        )
        .await;
        let Reply::Ok(parts) = first else { panic!("expected ok") };
        assert_eq!(parts, vec!["http://media.example/feed0.wav".to_string()]);

        // A second interception request for the same call must return the
        // same reservation, not grab a second feeder.
        let second = dispatch(
            &state,
            &storage,
            &cfg,
            Request::StartCallInterception { call_id: 1, format: "wav".to_string() },
        )
        .await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn third_simplex_interception_noks_when_only_a_stereo_feeder_is_free() {
        let cfg = MediaRouterConfig {
            feeders: vec![
                feeder_config("mono0", FeederType::Mono),
                feeder_config("mono1", FeederType::Mono),
                feeder_config("stereo0", FeederType::Stereo),
            ],
            media_server_endpoint: "http://media.example".to_string(),
            voicerec_repo: std::env::temp_dir().join("callstream-media-router-tests"),
            ..MediaRouterConfig::default()
        };
        let state = Arc::new(Mutex::new(RouterState::new(&cfg)));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        {
            let mut state = state.lock().await;
            for call_id in [1, 2, 3] {
                state
                    .live_calls
                    .insert(call_id, LiveCall { call_id, kind: CallKind::Simplex, started_at_secs: 0 });
            }
        }

        for call_id in [1, 2] {
            let reply = dispatch(
                &state,
                &storage,
                &cfg,
                Request::StartCallInterception { call_id, format: "wav".to_string() },
            )
            .await;
            assert!(matches!(reply, Reply::Ok(_)), "call {call_id} should have reserved a mono feeder");
        }

        let third = dispatch(
            &state,
            &storage,
            &cfg,
            Request::StartCallInterception { call_id: 3, format: "wav".to_string() },
        )
        .await;
        assert_eq!(third, Reply::Nok("Feeder not available".to_string()));
    }

    #[tokio::test]
    async fn stop_call_interception_frees_the_feeder() {
        let cfg = config();
        let state = Arc::new(Mutex::new(RouterState::new(&cfg)));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        state
            .lock()
            .await
            .live_calls
            .insert(1, LiveCall { call_id: 1, kind: CallKind::Simplex, started_at_secs: 0 });
        dispatch(&state, &storage, &cfg, Request::StartCallInterception { call_id: 1, format: "wav".to_string() })
            .await;

        let reply = dispatch(&state, &storage, &cfg, Request::StopCallInterception { call_id: 1 }).await;
        assert!(matches!(reply, Reply::Ok(_)));
        assert!(state.lock().await.feeders.find_by_call(1).is_none());
    }

    #[tokio::test]
    async fn play_call_materializes_file_under_voicerec_repo_and_returns_its_url() {
        let cfg = config();
        tokio::fs::create_dir_all(&cfg.voicerec_repo).await.unwrap();
        let storage = Arc::new(MemoryStorage::new());
        storage
            .insert_voiceindicall(crate::storage::VoiceRow {
                db_id: 42,
                call_begin: 0,
                call_end: 10,
                voice_data_len: 3,
                voice_data: vec![1, 2, 3],
                duration: "0:00:10.000".into(),
            })
            .await
            .unwrap();
        let storage: Arc<dyn Storage> = storage;
        let state = Arc::new(Mutex::new(RouterState::new(&cfg)));

        let reply = dispatch(
            &state,
            &storage,
            &cfg,
            Request::StartPlayCall {
                table: CallTable::Indi,
                db_id: 42,
                call_id: "100".to_string(),
                format: "wav".to_string(),
                session: "sess".to_string(),
            },
        )
        .await;
        let Reply::Ok(parts) = reply else { panic!("expected ok") };
        let digest = voice_playback_digest(42, "100", "sess");
        assert_eq!(parts, vec![format!("/voicerec/{digest}.wav")]);
        let file_path = cfg.voicerec_repo.join(format!("{digest}.wav"));
        assert!(file_path.exists());
        assert_eq!(tokio::fs::read(&file_path).await.unwrap(), vec![1, 2, 3]);

        let stop_reply = dispatch(
            &state,
            &storage,
            &cfg,
            Request::StopPlayCall {
                table: CallTable::Indi,
                db_id: 42,
                call_id: "100".to_string(),
                format: "wav".to_string(),
                session: "sess".to_string(),
            },
        )
        .await;
        assert!(matches!(stop_reply, Reply::Ok(_)));
        assert!(!file_path.exists());
    }

    #[test]
    fn duplex_interleave_emits_only_once_both_halves_present() {
        let mut state = RouterState::new(&config());
        let a = Bytes::from(vec![0xAAu8; 480]);
        let b = Bytes::from(vec![0xBBu8; 480]);
        assert!(stash_duplex_half(&mut state, 1, true, &a).is_none());
        let out = stash_duplex_half(&mut state, 1, false, &b).unwrap();
        assert_eq!(out.len(), 960);
        assert_eq!(out[0], 0xAA);
        assert_eq!(out[1], 0xBB);
    }
}
