use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::ControllerOptions;
use crate::secrets::SecretSources;

/// Process settings for the controller binary.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSettings {
    /// Namespace the broker runs in and watches.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Directory holding the configuration resource files.
    #[serde(default = "default_config_directory")]
    pub config_directory: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,

    #[serde(default = "default_token_env_var")]
    pub token_env_var: Option<String>,

    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    #[serde(default)]
    pub log: LogSettings,
}

pub(crate) fn default_namespace() -> String {
    "default".to_string()
}

pub(crate) fn default_config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("servicebroker")
        .join("resources")
}

fn default_token_env_var() -> Option<String> {
    Some("SERVICEBROKER_TOKEN".to_string())
}

fn default_sync_timeout_secs() -> u64 {
    60
}

fn default_event_queue_capacity() -> usize {
    256
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            config_directory: default_config_directory(),
            token: None,
            token_file: None,
            token_env_var: default_token_env_var(),
            sync_timeout_secs: default_sync_timeout_secs(),
            event_queue_capacity: default_event_queue_capacity(),
            log: LogSettings::default(),
        }
    }
}

impl ControllerSettings {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Where the API token comes from.
    pub fn token_sources(&self) -> SecretSources<'_> {
        SecretSources::new(
            self.token.as_deref(),
            self.token_file.as_deref(),
            self.token_env_var.as_deref(),
        )
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            sync_timeout: self.sync_timeout(),
            event_queue_capacity: self.event_queue_capacity,
        }
    }
}

impl std::fmt::Debug for ControllerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerSettings")
            .field("namespace", &self.namespace)
            .field("config_directory", &self.config_directory)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_file", &self.token_file)
            .field("token_env_var", &self.token_env_var)
            .field("sync_timeout_secs", &self.sync_timeout_secs)
            .field("event_queue_capacity", &self.event_queue_capacity)
            .field("log", &self.log)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
