pub mod controller;
pub mod error;
pub mod logging;
pub mod secrets;
pub mod settings;

pub use controller::{
    configure, Clients, ConfigReadGuard, ConfigStore, Controller, ControllerOptions,
    DirectoryStatusWriter, DirectoryWatch, ResourceWatch, ServiceBrokerConfig, StatusWriter,
    ValidationError, WatchEvent,
};
pub use error::{
    ControllerError, LoggingError, NotReady, Result, SecretError, SettingsError,
    StatusWriteError, WatchError,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretSources};
pub use settings::{load_settings, resolve_settings, ControllerSettings, LogSettings};
