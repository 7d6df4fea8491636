//! Controller-specific error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::SettingsError;
use crate::secrets::SecretError;

/// Errors that abort controller startup.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("service broker config watch failed to synchronize within {0:?}")]
    SyncTimeout(Duration),

    #[error("service broker config watch failed to synchronize: {0}")]
    SyncFailed(String),

    #[error("service broker config watch stopped unexpectedly")]
    WatchStopped,

    #[error("Invalid controller settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to resolve API token: {0}")]
    Secret(#[from] SecretError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),
}

/// Errors raised by a resource watch adapter.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Config directory not found: {0}")]
    ConfigDirNotFound(PathBuf),

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("File system watch error: {0}")]
    Notify(String),

    #[error("Event channel closed unexpectedly")]
    ChannelClosed,
}

/// Errors raised when persisting the status subresource.
#[derive(Error, Debug)]
pub enum StatusWriteError {
    #[error("Resource not found: {namespace}/{name}")]
    NotFound { namespace: String, name: String },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize status: {0}")]
    Serialize(String),

    #[error("Status update rejected: {0}")]
    Rejected(String),
}

/// Raised when a watched object is not a well-formed configuration resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected object type {api_version}/{kind}")]
    UnexpectedType { api_version: String, kind: String },

    #[error("malformed configuration resource '{name}': {message}")]
    Malformed { name: String, message: String },
}

/// Returned to readers while no valid configuration is published.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("service broker configuration is not ready")]
pub struct NotReady;

/// Result type for controller startup.
pub type Result<T> = std::result::Result<T, ControllerError>;
