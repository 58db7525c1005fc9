//! Error taxonomy for the bridge.
//!
//! Every abnormal condition surfaces as a distinct variant so callers can tell
//! "the worker is broken" (`Transport`) from "the worker rejected this request"
//! (`Upstream`) from "we don't understand this response" (`Protocol`,
//! `UnknownResultType`).

use std::io;
use std::time::Duration;

/// Failure talking to the worker's stdio. The worker has already been
/// restarted by the time one of these reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to write request to worker: {0}")]
    Write(#[source] io::Error),

    #[error("failed to read response from worker: {0}")]
    Read(#[source] io::Error),

    /// Worker closed its stdout (exited, crashed or was killed).
    #[error("worker closed its output stream")]
    EndOfStream,

    #[error("worker did not respond within {0:?}")]
    Timeout(Duration),

    #[error("worker is not running")]
    NotRunning,
}

/// Misuse of the start/get/stop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("bridge already started, it cannot be started again")]
    AlreadyStarted,

    #[error("bridge has not been started")]
    NotStarted,

    #[error("bridge has been stopped")]
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] io::Error),
    #[error("spawn failed: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] SpawnError),

    #[error("invalid bridge configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("no schema registered for result type '{0}'")]
    UnknownResultType(String),

    /// Worker answered with `valid: false`.
    #[error("worker rejected request: {0}")]
    Upstream(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl BridgeError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Upstream(message) => Some(message),
            _ => None,
        }
    }
}

/// Startup-time mistakes while populating a result registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("result type '{0}' is already registered")]
    DuplicateResultType(String),

    #[error("result type tag must not be empty")]
    EmptyResultType,
}
