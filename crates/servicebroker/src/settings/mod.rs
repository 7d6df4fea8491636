//! Controller process settings.

pub mod loader;
pub mod schema;

pub use crate::error::SettingsError;
pub use loader::{apply_env_overrides, load_settings, load_settings_from_str, resolve_settings};
pub use schema::{ControllerSettings, LogSettings};
