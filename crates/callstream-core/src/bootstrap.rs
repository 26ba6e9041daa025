//! Wires the Internal Bus, the persistence backend, the alarm raiser, and
//! the four worker loops together, and owns the shutdown broadcast that
//! `main.rs` trips on `SIGTERM`/`SIGINT`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::alarm::{AlarmRaiser, NoopAlarmRaiser, ProcessAlarmRaiser};
use crate::bus::Bus;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::storage::{MemoryStorage, PostgresStorage, Storage};
use crate::worker::media_router::MediaRouterConfig;
use crate::worker::persister::PersisterConfig;
use crate::worker::tracer::{NoopTracePublisher, TracePublisher, TracerConfig, UdpTracePublisher};
use crate::worker::{ingestor, media_router, persister, tracer};

/// The running system: worker task handles plus the shutdown sender used to
/// stop them.
pub struct BootstrappedServices {
    pub bus: Bus,
    shutdown_tx: broadcast::Sender<()>,
    ingestor: JoinHandle<AppResult<()>>,
    persister: JoinHandle<()>,
    media_router: JoinHandle<AppResult<()>>,
    tracer: JoinHandle<()>,
}

impl BootstrappedServices {
    /// Trips the shutdown broadcast and waits for every worker to return.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.ingestor.await;
        let _ = self.persister.await;
        let _ = self.media_router.await;
        let _ = self.tracer.await;
    }
}

fn build_storage(config: &Config) -> AppResult<Arc<dyn Storage>> {
    if config.persistence_manager.pg_conn_info.is_empty() {
        log::warn!("bootstrap: no persistence_manager.pg_conn_info configured, using in-memory storage");
        Ok(Arc::new(MemoryStorage::new()))
    } else {
        Ok(Arc::new(PostgresStorage::connect(&config.persistence_manager.pg_conn_info)?))
    }
}

fn build_alarm_raiser(config: &Config) -> Arc<dyn AlarmRaiser> {
    if config.httpd_home.is_empty() {
        Arc::new(NoopAlarmRaiser)
    } else {
        Arc::new(ProcessAlarmRaiser::new(config.httpd_home.clone(), config.apli.clone()))
    }
}

async fn build_trace_publisher(config: &Config) -> Arc<dyn TracePublisher> {
    match config.tracer_manager.json_publisher.parse::<SocketAddr>() {
        Ok(endpoint) => match UdpTracePublisher::bind(endpoint).await {
            Ok(publisher) => Arc::new(publisher),
            Err(err) => {
                log::warn!("bootstrap: failed to bind trace publisher socket: {err}");
                Arc::new(NoopTracePublisher)
            }
        },
        Err(_) => {
            log::warn!("bootstrap: no valid tracer_manager.json_publisher configured, tracing disabled");
            Arc::new(NoopTracePublisher)
        }
    }
}

/// Starts the Bus, Storage, AlarmRaiser, and all four workers, returning a
/// handle that stops them all together.
pub async fn bootstrap(config: Config) -> AppResult<BootstrappedServices> {
    let bus = Bus::default();
    let storage = build_storage(&config)?;
    let alarm = build_alarm_raiser(&config);
    let trace_publisher = build_trace_publisher(&config).await;

    let (shutdown_tx, _) = broadcast::channel(1);

    let listen_addr = SocketAddr::new(
        config.collector.log_server_endpoint.ip,
        config.collector.log_server_endpoint.port,
    );
    let ingestor_bus = bus.clone();
    let ingestor_capacity = config.collector.rolling_buffer_capacity;
    let ingestor_shutdown = shutdown_tx.subscribe();
    let ingestor = tokio::spawn(async move {
        ingestor::run(listen_addr, ingestor_capacity, ingestor_bus, ingestor_shutdown).await
    });

    let persister_bus = bus.clone();
    let persister_storage = storage.clone();
    let persister_alarm = alarm.clone();
    let persister_config = PersisterConfig {
        call_inactivity_period_secs: config.persistence_manager.call_inactivity_period,
        maintenance_frequency_secs: config.persistence_manager.maintenance_frequency,
        mp3_mode: config.basic.mp3_mode,
        generate_wav_files: config.collector.generate_wav_files,
        mp3_converter_command_template: config.persistence_manager.mp3_converter_command_template.clone(),
        work_dir: config.work_path.clone(),
    };
    let persister_shutdown = shutdown_tx.subscribe();
    let persister = tokio::spawn(async move {
        persister::run(persister_bus, persister_storage, persister_alarm, persister_config, persister_shutdown)
            .await
    });

    let media_router_bus = bus.clone();
    let media_router_storage = storage.clone();
    let media_router_config = MediaRouterConfig {
        listen_addr: "0.0.0.0:7701"
            .parse()
            .map_err(|e| AppError::Config(format!("invalid media router listen address: {e}")))?,
        feeders: config.media_manager.feeders.values().cloned().collect(),
        player_pool_size: config.media_manager.player.instances.len().max(1),
        player_command: config.media_manager.player.command_template.clone(),
        media_server_endpoint: config.media_manager.media_server_endpoint.clone(),
        voicerec_repo: config.media_manager.player.voicerec_repo.clone(),
        voicerec_url: config.media_manager.player.voicerec_url.clone(),
        use_v1_player: config.media_manager.use_v1_player,
    };
    let media_router_shutdown = shutdown_tx.subscribe();
    let media_router = tokio::spawn(async move {
        media_router::run(media_router_bus, media_router_storage, media_router_config, media_router_shutdown).await
    });

    let tracer_bus = bus.clone();
    let tracer_config = TracerConfig {
        publish_one_json_voice_msg_every: config.tracer_manager.publish_one_json_voice_msg_every,
    };
    let tracer_shutdown = shutdown_tx.subscribe();
    let tracer = tokio::spawn(async move {
        tracer::run(tracer_bus, trace_publisher, tracer_config, tracer_shutdown).await
    });

    Ok(BootstrappedServices { bus, shutdown_tx, ingestor, persister, media_router, tracer })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_starts_and_shuts_down_cleanly() {
        let mut config = Config::default();
        config.collector.log_server_endpoint.port = 0;
        config.media_manager.feeders.clear();

        let services = bootstrap(config).await.expect("bootstrap should succeed");
        services.shutdown().await;
    }
}
