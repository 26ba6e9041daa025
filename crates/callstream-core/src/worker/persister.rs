//! The Persister: assembles complete voice calls from signaling and voice
//! frames and writes them to the relational store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::broadcast;

use crate::alarm::AlarmRaiser;
use crate::bus::{Bus, RecvOutcome, TOPIC_SIGNALING, TOPIC_VOICE};
use crate::child::ChildSupervisor;
use crate::error::AppResult;
use crate::model::{Call, CallAction, CallKind, Event, GroupCallAction, ReleaseCause, StreamOriginator};
use crate::storage::{
    GroupCallRow, GroupCallStatusChangeRow, IndiCallRow, IndiCallStatusChangeRow, KeepAliveRow,
    PttRow, SdsDataRow, SdsStatusRow, Storage, VoiceRow,
};
use crate::utils::format_duration_hms_millis;
use crate::wav::build_alaw_header;

/// Configuration for one Persister instance, mirroring
/// `persistence_manager.*`.
#[derive(Debug, Clone)]
pub struct PersisterConfig {
    pub call_inactivity_period_secs: u64,
    pub maintenance_frequency_secs: u64,
    pub mp3_mode: bool,
    pub generate_wav_files: bool,
    /// Printf-style template with three `%s` slots: input WAV, output MP3,
    /// log label.
    pub mp3_converter_command_template: String,
    /// Scratch directory for MP3 encoder temp files and, when
    /// `generate_wav_files` is set, the per-call WAV files themselves.
    pub work_dir: PathBuf,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            call_inactivity_period_secs: crate::protocol_constants::DEFAULT_CALL_INACTIVITY_PERIOD_SECS,
            maintenance_frequency_secs: crate::protocol_constants::DEFAULT_MAINTENANCE_FREQUENCY_SECS,
            mp3_mode: false,
            generate_wav_files: false,
            mp3_converter_command_template: String::new(),
            work_dir: PathBuf::from("/tmp/callstream"),
        }
    }
}

fn release_cause_label(cause: ReleaseCause) -> &'static str {
    match cause {
        ReleaseCause::Unknown => "Unknown",
        ReleaseCause::ARelease => "ARelease",
        ReleaseCause::BRelease => "BRelease",
    }
}

/// Runs the Persister loop until `shutdown` fires.
pub async fn run(
    bus: Bus,
    storage: Arc<dyn Storage>,
    alarm: Arc<dyn AlarmRaiser>,
    config: PersisterConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut signaling = bus.subscribe(TOPIC_SIGNALING);
    let mut voice = bus.subscribe(TOPIC_VOICE);
    let mut calls: HashMap<u32, Call> = HashMap::new();
    let mut maintenance = tokio::time::interval(Duration::from_secs(config.maintenance_frequency_secs));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("persister: shutdown received");
                return;
            }
            outcome = signaling.recv() => {
                match outcome {
                    RecvOutcome::Matched(publication) => {
                        handle_signaling(&mut calls, publication.event, &storage, &alarm, &config).await;
                    }
                    RecvOutcome::Lagged(n) => log::warn!("persister: lagged {n} signaling publications"),
                    RecvOutcome::Closed | RecvOutcome::Skipped => {}
                }
            }
            outcome = voice.recv() => {
                match outcome {
                    RecvOutcome::Matched(publication) => {
                        handle_voice(&mut calls, publication.event);
                    }
                    RecvOutcome::Lagged(n) => log::warn!("persister: lagged {n} voice publications"),
                    RecvOutcome::Closed | RecvOutcome::Skipped => {}
                }
            }
            _ = maintenance.tick() => {
                run_maintenance(&mut calls, &storage, &alarm, &config).await;
            }
        }
    }
}

async fn handle_signaling(
    calls: &mut HashMap<u32, Call>,
    event: Event,
    storage: &Arc<dyn Storage>,
    alarm: &Arc<dyn AlarmRaiser>,
    config: &PersisterConfig,
) {
    match event {
        Event::KeepAlive {
            log_server_no,
            timeout,
            sw_version,
            descr,
            ..
        } => {
            // The wire carries the software version as a string blob only;
            // there is no separate numeric version field to populate.
            let row = KeepAliveRow {
                log_server_no,
                last_heartbeat: crate::utils::now_unix_secs(),
                timeout,
                sw_ver: 0,
                sw_ver_string: sw_version,
                log_server_descr: descr,
            };
            if let Err(err) = storage.upsert_keepalive(row).await {
                log::error!("persister: keepalive upsert failed: {err}");
                alarm.raise("persister", &err.to_string()).await;
            }
        }

        Event::SimplexCallStartChange {
            received_at,
            call_id,
            action,
            party_a,
            party_b,
        } => {
            if action == CallAction::NewCallSetup {
                let mut call = Call::new(call_id, CallKind::Simplex, received_at.0);
                let row = IndiCallRow {
                    call_id,
                    timeout: 0,
                    call_begin: received_at.0,
                    seq_no_begin: 0,
                    calling_ssi: party_a.tsi.ssi,
                    calling_mnc: party_a.tsi.mnc,
                    calling_mcc: party_a.tsi.mcc,
                    calling_esn: party_a.number.as_ref().map(|n| n.as_str().to_string()),
                    calling_descr: party_a.descr.clone(),
                    called_ssi: party_b.tsi.ssi,
                    called_mnc: party_b.tsi.mnc,
                    called_mcc: party_b.tsi.mcc,
                    called_esn: party_b.number.as_ref().map(|n| n.as_str().to_string()),
                    called_descr: party_b.descr.clone(),
                    simplex_duplex: 0,
                };
                match storage.insert_indicall(row).await {
                    Ok(db_id) => {
                        call.party_a = Some(party_a);
                        call.party_b = Some(party_b);
                        call.db_id = Some(db_id);
                        calls.insert(call_id, call);
                    }
                    Err(err) => {
                        log::error!("persister: insert_indicall failed: {err}");
                        alarm.raise("persister", &err.to_string()).await;
                    }
                }
            } else if let Some(call) = calls.get_mut(&call_id) {
                call.touch(received_at.0);
                let row = IndiCallStatusChangeRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    action_id: action as u8,
                    timeout: 0,
                };
                if let Err(err) = storage.insert_indicall_status_change(row).await {
                    log::error!("persister: status-change insert failed: {err}");
                    alarm.raise("persister", &err.to_string()).await;
                }
            }
        }

        Event::DuplexCallChange {
            received_at,
            call_id,
            action,
            party_a,
            party_b,
            talking,
        } => {
            if action == CallAction::NewCallSetup {
                let mut call = Call::new(call_id, CallKind::Duplex, received_at.0);
                let row = IndiCallRow {
                    call_id,
                    timeout: 0,
                    call_begin: received_at.0,
                    seq_no_begin: 0,
                    calling_ssi: party_a.tsi.ssi,
                    calling_mnc: party_a.tsi.mnc,
                    calling_mcc: party_a.tsi.mcc,
                    calling_esn: party_a.number.as_ref().map(|n| n.as_str().to_string()),
                    calling_descr: party_a.descr.clone(),
                    called_ssi: party_b.tsi.ssi,
                    called_mnc: party_b.tsi.mnc,
                    called_mcc: party_b.tsi.mcc,
                    called_esn: party_b.number.as_ref().map(|n| n.as_str().to_string()),
                    called_descr: party_b.descr.clone(),
                    simplex_duplex: 1,
                };
                match storage.insert_indicall(row).await {
                    Ok(db_id) => {
                        call.party_a = Some(party_a);
                        call.party_b = Some(party_b);
                        call.db_id = Some(db_id);
                        calls.insert(call_id, call);
                    }
                    Err(err) => {
                        log::error!("persister: insert_indicall failed: {err}");
                        alarm.raise("persister", &err.to_string()).await;
                    }
                }
            } else if let Some(call) = calls.get_mut(&call_id) {
                call.touch(received_at.0);
                let row = IndiCallStatusChangeRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    action_id: action as u8,
                    timeout: 0,
                };
                if let Err(err) = storage.insert_indicall_status_change(row).await {
                    log::error!("persister: status-change insert failed: {err}");
                }
                let ptt = PttRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    talking_party: talking as u8,
                };
                if let Err(err) = storage.insert_indicall_ptt(ptt).await {
                    log::error!("persister: ptt insert failed: {err}");
                }
            }
        }

        Event::SimplexCallPttChange {
            received_at,
            call_id,
            talking,
        } => {
            if let Some(call) = calls.get_mut(&call_id) {
                call.touch(received_at.0);
                let row = PttRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    talking_party: talking as u8,
                };
                if let Err(err) = storage.insert_indicall_ptt(row).await {
                    log::error!("persister: ptt insert failed: {err}");
                }
            }
        }

        Event::SimplexCallRelease {
            received_at,
            call_id,
            cause,
        }
        | Event::DuplexCallRelease {
            received_at,
            call_id,
            cause,
        } => {
            if let Some(call) = calls.remove(&call_id) {
                finalize_indicall(call, received_at.0, cause, storage, alarm, config).await;
            }
        }

        Event::GroupCallStartChange {
            received_at,
            call_id,
            action,
            group,
            originator: _,
        } => {
            if action == GroupCallAction::NewCallSetup {
                let mut call = Call::new(call_id, CallKind::Group, received_at.0);
                let row = GroupCallRow {
                    call_id,
                    timeout: 0,
                    call_begin: received_at.0,
                    seq_no_begin: 0,
                    group_ssi: group.tsi.ssi,
                    group_mnc: group.tsi.mnc,
                    group_mcc: group.tsi.mcc,
                    group_esn: group.number.as_ref().map(|n| n.as_str().to_string()),
                    group_descr: group.descr.clone(),
                };
                match storage.insert_groupcall(row).await {
                    Ok(db_id) => {
                        call.party_a = Some(group);
                        call.db_id = Some(db_id);
                        calls.insert(call_id, call);
                    }
                    Err(err) => {
                        log::error!("persister: insert_groupcall failed: {err}");
                        alarm.raise("persister", &err.to_string()).await;
                    }
                }
            } else if let Some(call) = calls.get_mut(&call_id) {
                call.touch(received_at.0);
                let row = GroupCallStatusChangeRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    action_id: action as u8,
                    timeout: 0,
                };
                if let Err(err) = storage.insert_groupcall_status_change(row).await {
                    log::error!("persister: group status-change insert failed: {err}");
                }
            }
        }

        Event::GroupCallPttActive { received_at, call_id, .. } => {
            if let Some(call) = calls.get_mut(&call_id) {
                call.touch(received_at.0);
                let row = PttRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    talking_party: 1,
                };
                if let Err(err) = storage.insert_groupcall_ptt(row).await {
                    log::error!("persister: group ptt insert failed: {err}");
                }
            }
        }

        Event::GroupCallPttIdle { received_at, call_id } => {
            if let Some(call) = calls.get_mut(&call_id) {
                call.touch(received_at.0);
                let row = PttRow {
                    call_id,
                    seq_no: 0,
                    received_at: received_at.0,
                    talking_party: 0,
                };
                if let Err(err) = storage.insert_groupcall_ptt(row).await {
                    log::error!("persister: group ptt insert failed: {err}");
                }
            }
        }

        Event::GroupCallRelease {
            received_at,
            call_id,
            cause,
        } => {
            if let Some(call) = calls.remove(&call_id) {
                finalize_groupcall(call, received_at.0, cause, storage, alarm, config).await;
            }
        }

        Event::StatusSds {
            received_at,
            sender,
            recipient,
            status_code,
        } => {
            let row = SdsStatusRow {
                received_at: received_at.0,
                calling_ssi: sender.tsi.ssi,
                calling_mnc: sender.tsi.mnc,
                calling_mcc: sender.tsi.mcc,
                called_ssi: recipient.tsi.ssi,
                called_mnc: recipient.tsi.mnc,
                called_mcc: recipient.tsi.mcc,
                precoded_status_value: status_code,
            };
            if let Err(err) = storage.insert_sdsstatus(row).await {
                log::error!("persister: sds status insert failed: {err}");
                alarm.raise("persister", &err.to_string()).await;
            }
        }

        Event::TextSds {
            received_at,
            sender,
            recipient,
            text,
        } => {
            let row = SdsDataRow {
                received_at: received_at.0,
                calling_ssi: sender.tsi.ssi,
                calling_mnc: sender.tsi.mnc,
                calling_mcc: sender.tsi.mcc,
                called_ssi: recipient.tsi.ssi,
                called_mnc: recipient.tsi.mnc,
                called_mcc: recipient.tsi.mcc,
                user_data_length: text.len() as u16,
                user_data: text,
            };
            if let Err(err) = storage.insert_sdsdata(row).await {
                log::error!("persister: sds data insert failed: {err}");
                alarm.raise("persister", &err.to_string()).await;
            }
        }

        Event::VoiceFrame { .. } => {
            // Delivered only on the voice topic; never matches the
            // signaling subscription's prefix.
        }
    }
}

fn handle_voice(calls: &mut HashMap<u32, Call>, event: Event) {
    let Event::VoiceFrame {
        call_id,
        originator,
        payload,
        ..
    } = event
    else {
        return;
    };

    match calls.get_mut(&call_id) {
        Some(call) => {
            call.touch(crate::utils::now_unix_secs());
            call.ingest_voice(originator, &payload);
        }
        None => {
            log::debug!("persister: voice frame for unknown call {call_id}, dropping");
        }
    }
}

/// Interleaves stream A and stream B sample-by-sample, discarding any
/// trailing excess with a warning.
fn interleave_duplex(a: &[u8], b: &[u8]) -> Vec<u8> {
    let pairs = a.len().min(b.len());
    if a.len() != b.len() {
        log::warn!(
            "persister: duplex streams of unequal length ({} vs {}), discarding trailing {} bytes",
            a.len(),
            b.len(),
            a.len().max(b.len()) - pairs
        );
    }
    let mut out = Vec::with_capacity(pairs * 2);
    for i in 0..pairs {
        out.push(a[i]);
        out.push(b[i]);
    }
    out
}

/// Builds the WAV-shaped blob for a finalized call's samples, optionally
/// writing it to the working directory (`generate_wav_files`) and replacing
/// it with an MP3-encoded version (`mp3_mode`) before persisting. Returns
/// `None` for a call that produced no audio at all.
async fn build_voice_row(
    db_id: i64,
    call_begin: u64,
    call_end: u64,
    samples: Vec<u8>,
    channels: u16,
    config: &PersisterConfig,
    alarm: &Arc<dyn AlarmRaiser>,
) -> Option<VoiceRow> {
    if samples.is_empty() {
        return None;
    }

    let header = build_alaw_header(samples.len() as u32, channels);
    let mut blob = Vec::with_capacity(header.len() + samples.len());
    blob.extend_from_slice(&header);
    blob.extend_from_slice(&samples);

    if config.generate_wav_files {
        let wav_path = config.work_dir.join(format!("call_{db_id}.wav"));
        if let Err(err) = tokio::fs::write(&wav_path, &blob).await {
            log::error!("persister: failed to write wav file for db_id {db_id}: {err}");
        }
    }

    let duration = format_duration_hms_millis(samples.len(), crate::protocol_constants::ALAW_SAMPLE_RATE, channels);

    let mut voice_data = blob;
    if config.mp3_mode {
        match encode_to_mp3(config, db_id, &voice_data).await {
            Ok(mp3) => voice_data = mp3,
            Err(err) => {
                log::error!("persister: mp3 encode failed for db_id {db_id}: {err}");
                alarm.raise("persister", &err.to_string()).await;
            }
        }
    }

    Some(VoiceRow {
        db_id,
        call_begin,
        call_end,
        voice_data_len: voice_data.len() as u64,
        voice_data,
        duration,
    })
}

/// Writes `wav_bytes` to a temp file, runs the configured converter command
/// against it, and reads back the resulting MP3.
async fn encode_to_mp3(config: &PersisterConfig, db_id: i64, wav_bytes: &[u8]) -> AppResult<Vec<u8>> {
    let input_path = config.work_dir.join(format!("mp3enc_{db_id}.wav"));
    let output_path = config.work_dir.join(format!("mp3enc_{db_id}.mp3"));
    let log_label = config.work_dir.join(format!("mp3enc_{db_id}"));

    tokio::fs::write(&input_path, wav_bytes).await?;

    let command_str = substitute_command_template(
        &config.mp3_converter_command_template,
        &[&input_path.display().to_string(), &output_path.display().to_string(), &log_label.display().to_string()],
    );
    let mut command = Command::new("sh");
    command.arg("-c").arg(&command_str);
    let mut supervisor = ChildSupervisor::spawn(command)?;
    supervisor.finished().await?;

    let mp3_bytes = tokio::fs::read(&output_path).await?;
    let _ = tokio::fs::remove_file(&input_path).await;
    let _ = tokio::fs::remove_file(&output_path).await;
    Ok(mp3_bytes)
}

/// Fills a printf-style template's `%s` slots positionally with `values`,
/// left to right; extra slots beyond `values.len()` are left untouched.
fn substitute_command_template(template: &str, values: &[&str]) -> String {
    let mut result = String::new();
    let mut rest = template;
    for value in values {
        match rest.find("%s") {
            Some(idx) => {
                result.push_str(&rest[..idx]);
                result.push_str(value);
                rest = &rest[idx + 2..];
            }
            None => break,
        }
    }
    result.push_str(rest);
    result
}

async fn finalize_indicall(
    call: Call,
    call_end: u64,
    cause: ReleaseCause,
    storage: &Arc<dyn Storage>,
    alarm: &Arc<dyn AlarmRaiser>,
    config: &PersisterConfig,
) {
    let Some(db_id) = call.db_id else { return };

    if let Err(err) = storage
        .finalize_indicall(db_id, call_end, release_cause_label(cause))
        .await
    {
        log::error!("persister: finalize_indicall failed: {err}");
        alarm.raise("persister", &err.to_string()).await;
        return;
    }

    let (samples, channels) = if call.kind == CallKind::Duplex && !call.buffer_b.is_empty() {
        (interleave_duplex(&call.buffer_a, &call.buffer_b), 2u16)
    } else {
        (call.buffer_a.clone(), 1u16)
    };

    let Some(row) = build_voice_row(db_id, call.call_begin_secs, call_end, samples, channels, config, alarm).await
    else {
        return;
    };

    if let Err(err) = storage.insert_voiceindicall(row).await {
        log::error!("persister: insert_voiceindicall failed: {err}");
        alarm.raise("persister", &err.to_string()).await;
    }
}

async fn finalize_groupcall(
    call: Call,
    call_end: u64,
    cause: ReleaseCause,
    storage: &Arc<dyn Storage>,
    alarm: &Arc<dyn AlarmRaiser>,
    config: &PersisterConfig,
) {
    let Some(db_id) = call.db_id else { return };

    if let Err(err) = storage
        .finalize_groupcall(db_id, call_end, release_cause_label(cause))
        .await
    {
        log::error!("persister: finalize_groupcall failed: {err}");
        alarm.raise("persister", &err.to_string()).await;
        return;
    }

    let Some(row) =
        build_voice_row(db_id, call.call_begin_secs, call_end, call.buffer_a.clone(), 1, config, alarm).await
    else {
        return;
    };

    if let Err(err) = storage.insert_voicegroupcall(row).await {
        log::error!("persister: insert_voicegroupcall failed: {err}");
        alarm.raise("persister", &err.to_string()).await;
    }
}

async fn run_maintenance(
    calls: &mut HashMap<u32, Call>,
    storage: &Arc<dyn Storage>,
    alarm: &Arc<dyn AlarmRaiser>,
    config: &PersisterConfig,
) {
    let now = crate::utils::now_unix_secs();
    let stale_ids: Vec<u32> = calls
        .iter()
        .filter(|(_, call)| call.is_stale(now, config.call_inactivity_period_secs))
        .map(|(id, _)| *id)
        .collect();

    for call_id in stale_ids {
        if let Some(call) = calls.remove(&call_id) {
            log::info!("persister: finalizing call {call_id} due to inactivity");
            match call.kind {
                CallKind::Group => {
                    finalize_groupcall(call, now, ReleaseCause::Unknown, storage, alarm, config).await;
                }
                _ => {
                    finalize_indicall(call, now, ReleaseCause::Unknown, storage, alarm, config).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::NoopAlarmRaiser;
    use crate::model::{PartyIdentity, ReceivedAt, Tsi};
    use crate::storage::MemoryStorage;
    use bytes::Bytes;

    fn party(ssi: u32) -> PartyIdentity {
        PartyIdentity {
            tsi: Tsi { mcc: 901, mnc: 1, ssi },
            number: None,
            descr: String::new(),
        }
    }

    fn frame(call_id: u32, originator: StreamOriginator, byte: u8) -> Event {
        Event::VoiceFrame {
            received_at: ReceivedAt(0),
            call_id,
            originator,
            kind: crate::model::PayloadKind::G711Alaw,
            payload: Bytes::from(vec![byte; 480]),
        }
    }

    #[tokio::test]
    async fn simplex_call_lifecycle_persists_one_indicall_and_one_voice_row() {
        let memory = Arc::new(MemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();
        let alarm: Arc<dyn AlarmRaiser> = Arc::new(NoopAlarmRaiser);
        let config = PersisterConfig::default();
        let mut calls = HashMap::new();

        handle_signaling(
            &mut calls,
            Event::SimplexCallStartChange {
                received_at: ReceivedAt(1000),
                call_id: 100,
                action: CallAction::NewCallSetup,
                party_a: party(1),
                party_b: party(2),
            },
            &storage,
            &alarm,
            &config,
        )
        .await;
        assert!(calls.contains_key(&100));
        assert_eq!(memory.indicalls.len(), 1);

        for _ in 0..250 {
            handle_voice(&mut calls, frame(100, StreamOriginator::A, 0xAA));
        }
        assert_eq!(calls.get(&100).unwrap().buffer_a.len(), 250 * 480);

        handle_signaling(
            &mut calls,
            Event::SimplexCallRelease {
                received_at: ReceivedAt(1010),
                call_id: 100,
                cause: ReleaseCause::ARelease,
            },
            &storage,
            &alarm,
            &config,
        )
        .await;

        assert!(!calls.contains_key(&100));
        assert_eq!(memory.indicall_finalized.len(), 1);
        assert_eq!(memory.voiceindicalls.len(), 1);
        let voice_row = memory.voiceindicalls.get(&1).expect("voice row persisted");
        // 46-byte header + 250 frames * 480 bytes, mono.
        assert_eq!(voice_row.voice_data_len as usize, 46 + 250 * 480);
    }

    #[tokio::test]
    async fn generate_wav_files_writes_per_call_wav_to_work_dir() {
        let memory = Arc::new(MemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();
        let alarm: Arc<dyn AlarmRaiser> = Arc::new(NoopAlarmRaiser);
        let work_dir = std::env::temp_dir().join(format!("callstream-persister-wav-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&work_dir).await.unwrap();
        let config = PersisterConfig { generate_wav_files: true, work_dir: work_dir.clone(), ..PersisterConfig::default() };
        let mut calls = HashMap::new();

        handle_signaling(
            &mut calls,
            Event::SimplexCallStartChange {
                received_at: ReceivedAt(0),
                call_id: 400,
                action: CallAction::NewCallSetup,
                party_a: party(1),
                party_b: party(2),
            },
            &storage,
            &alarm,
            &config,
        )
        .await;
        let db_id = calls.get(&400).unwrap().db_id.unwrap();
        handle_voice(&mut calls, frame(400, StreamOriginator::A, 0x11));
        handle_signaling(
            &mut calls,
            Event::SimplexCallRelease { received_at: ReceivedAt(1), call_id: 400, cause: ReleaseCause::ARelease },
            &storage,
            &alarm,
            &config,
        )
        .await;

        let wav_path = work_dir.join(format!("call_{db_id}.wav"));
        assert!(wav_path.exists());
        let contents = tokio::fs::read(&wav_path).await.unwrap();
        assert_eq!(contents.len(), 46 + 480);
    }

    #[tokio::test]
    async fn mp3_mode_runs_configured_encoder_and_persists_its_output() {
        let memory = Arc::new(MemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();
        let alarm: Arc<dyn AlarmRaiser> = Arc::new(NoopAlarmRaiser);
        let work_dir = std::env::temp_dir().join(format!("callstream-persister-mp3-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&work_dir).await.unwrap();
        let config = PersisterConfig {
            mp3_mode: true,
            mp3_converter_command_template: "cp %s %s".to_string(),
            work_dir: work_dir.clone(),
            ..PersisterConfig::default()
        };
        let mut calls = HashMap::new();

        handle_signaling(
            &mut calls,
            Event::SimplexCallStartChange {
                received_at: ReceivedAt(0),
                call_id: 300,
                action: CallAction::NewCallSetup,
                party_a: party(1),
                party_b: party(2),
            },
            &storage,
            &alarm,
            &config,
        )
        .await;
        handle_voice(&mut calls, frame(300, StreamOriginator::A, 0x7F));
        handle_signaling(
            &mut calls,
            Event::SimplexCallRelease { received_at: ReceivedAt(1), call_id: 300, cause: ReleaseCause::ARelease },
            &storage,
            &alarm,
            &config,
        )
        .await;

        let voice_row = memory.voiceindicalls.get(&1).expect("voice row persisted");
        // `cp` copies the wav-shaped input to the output byte-for-byte, so
        // the persisted length must still match the original wav size.
        assert_eq!(voice_row.voice_data_len as usize, 46 + 480);
    }

    #[test]
    fn substitute_command_template_fills_slots_left_to_right() {
        let out = substitute_command_template("lame %s %s >> %s.log 2>&1", &["in.wav", "out.mp3", "call_1"]);
        assert_eq!(out, "lame in.wav out.mp3 >> call_1.log 2>&1");
    }

    #[test]
    fn interleave_pairs_equal_length_streams() {
        let a = vec![1, 2, 3];
        let b = vec![10, 20, 30];
        let out = interleave_duplex(&a, &b);
        assert_eq!(out, vec![1, 10, 2, 20, 3, 30]);
    }

    #[test]
    fn interleave_truncates_unequal_streams_with_warning() {
        let a = vec![1, 2, 3, 4];
        let b = vec![10, 20];
        let out = interleave_duplex(&a, &b);
        assert_eq!(out, vec![1, 10, 2, 20]);
    }

    #[test]
    fn duplex_voice_buffers_grow_only_on_pair_completion() {
        let mut calls = HashMap::new();
        calls.insert(200, Call::new(200, CallKind::Duplex, 0));
        handle_voice(&mut calls, frame(200, StreamOriginator::A, 1));
        assert_eq!(calls.get(&200).unwrap().buffer_a.len(), 0);
        handle_voice(&mut calls, frame(200, StreamOriginator::B, 2));
        assert_eq!(calls.get(&200).unwrap().buffer_a.len(), 480);
        assert_eq!(calls.get(&200).unwrap().buffer_b.len(), 480);
    }

    #[test]
    fn voice_for_absent_call_is_dropped_without_panic() {
        let mut calls = HashMap::new();
        handle_voice(&mut calls, frame(999, StreamOriginator::A, 1));
        assert!(calls.is_empty());
    }
}
