//! Layered configuration: optional TOML file, then `TWISTINDEX__*` environment variables.
//!
//! The result is an immutable `Settings` value handed to each component at construction.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

use crate::address::DEFAULT_VERSION_MARKERS;
use crate::constants::*;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rpc: RpcSettings,
    pub storage: StorageSettings,
    pub api: ApiSettings,
    pub scan: ScanSettings,
    pub protocol: ProtocolConfig,
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load settings from `path` (missing file is fine) overlaid with the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(ConfigFile::from(path).required(false))
            .add_source(
                Environment::with_prefix("TWISTINDEX")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
    /// Delay between connection attempts while waiting for the node at startup.
    pub connect_retry_secs: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9332".to_string(),
            user: String::new(),
            password: String::new(),
            timeout_secs: 30,
            connect_retry_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: String,
    pub identity_file: String,
    pub data_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.twistindex".to_string(),
            identity_file: "twist_id.json".to_string(),
            data_file: "twist_data.json".to_string(),
        }
    }
}

impl StorageSettings {
    /// `data_dir` with `~` and environment variables expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        match shellexpand::full(&self.data_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(shellexpand::tilde(&self.data_dir).as_ref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub enabled: bool,
    pub bind_addr: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub poll_interval_secs: u64,
    /// When false every pass rescans from the genesis height and ignores saved checkpoints.
    pub resume_from_checkpoint: bool,
    pub progress_log_interval: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: BLOCK_SEARCH_INTERVAL_SECS,
            resume_from_checkpoint: true,
            progress_log_interval: PROGRESS_LOG_INTERVAL,
        }
    }
}

/// Fixed protocol parameters. See `constants` for the meaning of each default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub registration_address: String,
    pub registration_fee: f64,
    pub message_standard_address: String,
    pub message_standard_fee: f64,
    pub message_with_text_address: String,
    pub message_with_text_fee: f64,
    pub identity_fee_floor: f64,
    pub data_private_address: String,
    pub data_shareable_address: String,
    pub data_fee: f64,
    pub data_fee_floor: f64,
    pub min_outputs: usize,
    pub id_min_length: usize,
    pub id_max_length: usize,
    pub id_allowed_chars: String,
    pub public_key_b64_length: usize,
    pub private_key_b64_length: usize,
    pub data_owner_length: usize,
    pub data_min_payload_length: usize,
    pub identity_genesis_height: u64,
    pub data_genesis_height: u64,
    /// Characters accepted as the first character of an encoded address.
    pub version_markers: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            registration_address: REGISTRATION_ADDRESS.to_string(),
            registration_fee: REGISTRATION_FEE,
            message_standard_address: MESSAGE_STANDARD_ADDRESS.to_string(),
            message_standard_fee: MESSAGE_STANDARD_FEE,
            message_with_text_address: MESSAGE_WITH_TEXT_ADDRESS.to_string(),
            message_with_text_fee: MESSAGE_WITH_TEXT_FEE,
            identity_fee_floor: IDENTITY_FEE_FLOOR,
            data_private_address: DATA_PRIVATE_ADDRESS.to_string(),
            data_shareable_address: DATA_SHAREABLE_ADDRESS.to_string(),
            data_fee: DATA_BASELINE_FEE,
            data_fee_floor: DATA_FEE_FLOOR,
            min_outputs: MIN_PROTOCOL_OUTPUTS,
            id_min_length: ID_MIN_LENGTH,
            id_max_length: ID_MAX_LENGTH,
            id_allowed_chars: ID_ALLOWED_CHARS.to_string(),
            public_key_b64_length: PUBLIC_KEY_B64_LENGTH,
            private_key_b64_length: PRIVATE_KEY_B64_LENGTH,
            data_owner_length: DATA_OWNER_LENGTH,
            data_min_payload_length: DATA_MIN_PAYLOAD_LENGTH,
            identity_genesis_height: IDENTITY_GENESIS_HEIGHT,
            data_genesis_height: DATA_GENESIS_HEIGHT,
            version_markers: DEFAULT_VERSION_MARKERS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// "trace", "debug", "info", "warn" or "error"; `RUST_LOG` wins when set.
    pub log_level: String,
    /// "json" or "pretty"
    pub log_format: String,
    pub log_file: Option<String>,
    /// "daily", "hourly" or "never"
    pub rotation: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            log_file: None,
            rotation: "daily".to_string(),
        }
    }
}
