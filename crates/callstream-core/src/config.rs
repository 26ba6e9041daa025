//! Server configuration: a nested struct tree deserialized from YAML, with a
//! small set of environment variable overrides read once at startup.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::protocol_constants::{
    DEFAULT_CALL_INACTIVITY_PERIOD_SECS, DEFAULT_MAINTENANCE_FREQUENCY_SECS,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogServerEndpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for LogServerEndpoint {
    fn default() -> Self {
        Self { ip: IpAddr::from([0, 0, 0, 0]), port: 5555 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub log_server_endpoint: LogServerEndpoint,
    pub generate_wav_files: bool,
    /// Bounds the Ingestor's rolling byte buffer.
    pub rolling_buffer_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            log_server_endpoint: LogServerEndpoint::default(),
            generate_wav_files: false,
            rolling_buffer_capacity: crate::protocol_constants::MIN_ROLLING_BUFFER_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceManagerConfig {
    pub pg_conn_info: String,
    pub mp3_converter_command_template: String,
    pub call_inactivity_period: u64,
    pub maintenance_frequency: u64,
    pub subscriptions: HashMap<String, String>,
}

impl Default for PersistenceManagerConfig {
    fn default() -> Self {
        Self {
            pg_conn_info: String::new(),
            mp3_converter_command_template: String::new(),
            call_inactivity_period: DEFAULT_CALL_INACTIVITY_PERIOD_SECS,
            maintenance_frequency: DEFAULT_MAINTENANCE_FREQUENCY_SECS,
            subscriptions: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FeederType {
    #[serde(rename = "M")]
    Mono,
    #[serde(rename = "S")]
    Stereo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    pub stream: String,
    pub ip: IpAddr,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: FeederType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerInstanceConfig {
    pub stream: String,
    pub feeder: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub command_template: String,
    pub filename_template: String,
    pub voicerec_repo: PathBuf,
    pub voicerec_url: String,
    pub instances: HashMap<String, PlayerInstanceConfig>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command_template: String::new(),
            filename_template: "%s.wav".to_string(),
            voicerec_repo: PathBuf::from("."),
            voicerec_url: String::new(),
            instances: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaManagerConfig {
    pub media_server_endpoint: String,
    pub player: PlayerConfig,
    pub call_inactivity_period: u64,
    pub maintenance_frequency: u64,
    pub feeders: HashMap<String, FeederConfig>,
    pub subscriptions: HashMap<String, String>,
    /// Legacy v1 player mode (launches an external player child process) vs
    /// the default v2 mode (materializes a file only).
    pub use_v1_player: bool,
}

impl Default for MediaManagerConfig {
    fn default() -> Self {
        Self {
            media_server_endpoint: String::new(),
            player: PlayerConfig::default(),
            call_inactivity_period: DEFAULT_CALL_INACTIVITY_PERIOD_SECS,
            maintenance_frequency: DEFAULT_MAINTENANCE_FREQUENCY_SECS,
            feeders: HashMap::new(),
            subscriptions: HashMap::new(),
            use_v1_player: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TracerManagerConfig {
    pub json_publisher: String,
    pub publish_one_json_voice_msg_every: u64,
    pub subscriptions: HashMap<String, String>,
}

impl Default for TracerManagerConfig {
    fn default() -> Self {
        Self {
            json_publisher: String::new(),
            publish_one_json_voice_msg_every: 100,
            subscriptions: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    /// `false` for WAV, `true` for MP3.
    pub mp3_mode: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self { mp3_mode: false }
    }
}

/// The complete configuration tree, mirroring the dotted key paths
/// (`collector.*`, `persistence_manager.*`, `media_manager.*`,
/// `tracer_manager.*`, `basic.*`) as nested YAML mappings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub persistence_manager: PersistenceManagerConfig,
    pub media_manager: MediaManagerConfig,
    pub tracer_manager: TracerManagerConfig,
    pub basic: BasicConfig,

    /// Working directory for temporary WAV/MP3/session files.
    /// Override: `CALLSTREAMSERVER_WORK_PATH`
    pub work_path: PathBuf,

    /// `HTTPD_HOME`/`APLI`, feeding the external alarm CLI.
    pub httpd_home: String,
    pub apli: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            persistence_manager: PersistenceManagerConfig::default(),
            media_manager: MediaManagerConfig::default(),
            tracer_manager: TracerManagerConfig::default(),
            basic: BasicConfig::default(),
            work_path: PathBuf::from("/tmp/callstream"),
            httpd_home: String::new(),
            apli: String::new(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file named by `path` or by
    /// `CALLSTREAMSERVER_CONF_FILE`, then applies the remaining environment
    /// overrides. No worker reads the environment after this call returns.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let resolved_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CALLSTREAMSERVER_CONF_FILE").ok().map(PathBuf::from));

        let mut config = if let Some(path) = resolved_path {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| AppError::Config(format!("failed to read {}: {e}", path.display())))?;
            serde_yaml::from_str(&content)
                .map_err(|e| AppError::Config(format!("failed to parse {}: {e}", path.display())))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CALLSTREAMSERVER_WORK_PATH") {
            self.work_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("HTTPD_HOME") {
            self.httpd_home = val;
        }
        if let Ok(val) = std::env::var("APLI") {
            self.apli = val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let config = Config::default();
        assert_eq!(config.persistence_manager.call_inactivity_period, DEFAULT_CALL_INACTIVITY_PERIOD_SECS);
        assert!(!config.basic.mp3_mode);
    }

    #[test]
    fn loads_nested_yaml_and_merges_with_defaults() {
        let yaml = r#"
collector:
  log_server_endpoint:
    ip: "127.0.0.1"
    port: 5000
persistence_manager:
  pg_conn_info: "host=localhost dbname=callstream"
  call_inactivity_period: 120
media_manager:
  feeders:
    feeder_1:
      stream: "feed1"
      ip: "127.0.0.1"
      port: 9000
      type: "M"
"#;
        let dir = std::env::temp_dir().join(format!("callstream-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        std::fs::write(&path, yaml).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.collector.log_server_endpoint.port, 5000);
        assert_eq!(config.persistence_manager.call_inactivity_period, 120);
        assert_eq!(config.media_manager.feeders.len(), 1);
        assert_eq!(config.media_manager.feeders["feeder_1"].kind, FeederType::Mono);
        // Untouched nested sections keep their defaults.
        assert_eq!(config.tracer_manager.publish_one_json_voice_msg_every, 100);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/callstream-config.yaml")));
        assert!(result.is_err());
    }
}
