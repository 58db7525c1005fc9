//! Bridge configuration and worker spawn strategy.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::bridge::codec::DEFAULT_MAX_LINE_LENGTH;
use crate::error::{BridgeError, SpawnError};

pub const DEFAULT_EXECUTABLE: &str = "/usr/local/bin/node";
pub const DEFAULT_SCRIPT: &str = "TSBridge/ecbuild/bridge.js";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub const ENV_EXECUTABLE: &str = "TSBRIDGE_EXECUTABLE";
pub const ENV_SCRIPT: &str = "TSBRIDGE_SCRIPT";
pub const ENV_SCRIPT_ROOT: &str = "TSBRIDGE_SCRIPT_ROOT";
pub const ENV_RESPONSE_TIMEOUT_MS: &str = "TSBRIDGE_RESPONSE_TIMEOUT_MS";

/// What to run: `executable script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub executable: PathBuf,
    pub script: PathBuf,
}

/// Extension point for different worker spawn strategies.
///
/// The returned child must have stdin and stdout piped. A piped stderr is
/// forwarded into the log; anything else is left alone.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, command: &WorkerCommand) -> Result<Child, SpawnError>;
}

/// Spawns `executable script` directly.
pub struct CommandSpawner;

impl WorkerSpawner for CommandSpawner {
    fn spawn(&self, command: &WorkerCommand) -> Result<Child, SpawnError> {
        let child = Command::new(&command.executable)
            .arg(&command.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

#[derive(Clone)]
pub struct BridgeConfig {
    pub executable: PathBuf,
    pub script: PathBuf,
    /// Directory a relative `script` is resolved against (e.g. the plugin install dir).
    pub script_root: Option<PathBuf>,
    /// Bound on waiting for a response line. `None` waits forever.
    pub response_timeout: Option<Duration>,
    /// How long a closing worker gets to exit on its own before it is killed.
    pub shutdown_grace: Duration,
    pub max_line_length: usize,
    pub spawner: Arc<dyn WorkerSpawner>,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("executable", &self.executable)
            .field("script", &self.script)
            .field("script_root", &self.script_root)
            .field("response_timeout", &self.response_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("max_line_length", &self.max_line_length)
            .finish_non_exhaustive()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLE, DEFAULT_SCRIPT)
    }
}

impl BridgeConfig {
    pub fn new(executable: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            script: script.into(),
            script_root: None,
            response_timeout: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            spawner: Arc::new(CommandSpawner),
        }
    }

    /// Defaults overridden by `TSBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BridgeError> {
        let mut config = Self::default();
        if let Some(executable) = lookup(ENV_EXECUTABLE) {
            config.executable = executable.into();
        }
        if let Some(script) = lookup(ENV_SCRIPT) {
            config.script = script.into();
        }
        if let Some(root) = lookup(ENV_SCRIPT_ROOT) {
            config.script_root = Some(root.into());
        }
        if let Some(ms) = lookup(ENV_RESPONSE_TIMEOUT_MS) {
            let ms: u64 = ms.trim().parse().map_err(|e| {
                BridgeError::InvalidConfig(format!("{ENV_RESPONSE_TIMEOUT_MS}={ms:?}: {e}"))
            })?;
            config.response_timeout = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }

    pub fn with_script_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.script_root = Some(root.into());
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn WorkerSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.executable.as_os_str().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "executable path must not be empty".to_string(),
            ));
        }
        if self.script.as_os_str().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "bridge script path must not be empty".to_string(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(BridgeError::InvalidConfig(
                "max line length must be positive".to_string(),
            ));
        }
        if self.response_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BridgeError::InvalidConfig(
                "response timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolved_script(&self) -> PathBuf {
        match &self.script_root {
            Some(root) if self.script.is_relative() => root.join(&self.script),
            _ => self.script.clone(),
        }
    }

    pub fn worker_command(&self) -> WorkerCommand {
        WorkerCommand {
            executable: self.executable.clone(),
            script: self.resolved_script(),
        }
    }
}
