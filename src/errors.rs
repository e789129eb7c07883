//! Typed error hierarchy for dockhook.
//!
//! Three top-level enums cover the three layers:
//! - `ConfigError` — startup configuration failures (the only fatal ones)
//! - `EngineError` — classified replies from the container engine
//! - `OrchestratorError` — per-request launch failures

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading `config.yaml`. Any of these stops the process
/// before the listener is bound.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Binds not found: config must list `binds` (name + bind pairs)")]
    MissingBinds,

    #[error("Bind entry {index} has an empty {field}")]
    InvalidBind { index: usize, field: &'static str },

    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    #[error("reap_interval_secs must be greater than zero")]
    ZeroReapInterval,

    #[error("command must contain at least one argument")]
    EmptyCommand,
}

/// Container engine replies, classified into the conditions the orchestrator
/// and reaper branch on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No such image: {image}")]
    ImageNotFound { image: String },

    #[error("Container name \"/{name}\" is already in use")]
    NameConflict { name: String },

    #[error("Container {id} is already in the requested state")]
    NotModified { id: String },

    #[error("No such container: {id}")]
    NotFound { id: String },

    #[error("Container engine error: {0}")]
    Api(String),
}

/// Errors from a single `ensure_running` call. None of these are process-fatal.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to create container {name}: {source}")]
    CreationFailed {
        name: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to pull image {image}: {source}")]
    PullFailed {
        image: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to start container {id} ({name}): {source}")]
    StartFailed {
        id: String,
        name: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to look up container {name}: {source}")]
    LookupFailed {
        name: String,
        #[source]
        source: EngineError,
    },

    #[error("Container name {name} is taken but no container with that name was found")]
    NameConflictUnresolved { name: String },

    #[error("Start task for container {id} panicked or was aborted")]
    StartTaskAborted { id: String },
}
