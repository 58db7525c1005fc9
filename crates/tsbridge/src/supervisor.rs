//! Worker supervisor - owns the worker process and its stdio.
//!
//! Flow:
//! 1. Spawn worker (`executable script`) through the configured spawner
//! 2. Frame stdin/stdout with LineCodec, forward stderr into the log
//! 3. Exchange one line out, one line back per request
//! 4. On any transport failure: close the handle, spawn a fresh worker,
//!    surface the failure (the request is not retried)

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::bridge::codec::{Frame, LineCodec};
use crate::config::{BridgeConfig, WorkerCommand, WorkerSpawner};
use crate::error::{BridgeError, SpawnError, TransportError};

/// How long the stderr forwarder may keep draining after the worker exits.
const STDERR_DRAIN: Duration = Duration::from_millis(100);

/// A running worker: process plus exclusively-owned streams.
///
/// Only ever fully open; closing consumes it.
struct WorkerHandle {
    child: Child,
    pid: Option<u32>,
    writer: FramedWrite<ChildStdin, LineCodec>,
    reader: FramedRead<ChildStdout, LineCodec>,
    stderr_task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn spawn(
        command: &WorkerCommand,
        spawner: &dyn WorkerSpawner,
        max_line_length: usize,
    ) -> Result<Self, BridgeError> {
        let mut child = spawner.spawn(command)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpawnError::Other("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpawnError::Other("stdout not captured".to_string()))?;

        let pid = child.id();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(stderr, pid)));

        tracing::info!(
            pid,
            executable = %command.executable.display(),
            script = %command.script.display(),
            "Spawned worker"
        );

        Ok(Self {
            child,
            pid,
            writer: FramedWrite::new(stdin, LineCodec::new(max_line_length)),
            reader: FramedRead::new(stdout, LineCodec::new(max_line_length)),
            stderr_task,
        })
    }

    /// Best-effort close: release both streams, let the worker exit on its
    /// own within `grace`, otherwise kill and reap it. Never fails.
    async fn close(self, grace: Duration) {
        let WorkerHandle {
            mut child,
            pid,
            writer,
            reader,
            stderr_task,
        } = self;

        // Dropping the writer closes the worker's stdin.
        drop(writer);
        drop(reader);

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(pid, %status, "Worker exited"),
            Ok(Err(e)) => tracing::warn!(pid, error = %e, "Failed to wait for worker"),
            Err(_) => {
                tracing::debug!(pid, ?grace, "Worker still running after grace period, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(pid, error = %e, "Failed to kill worker");
                }
            }
        }

        if let Some(mut task) = stderr_task
            && tokio::time::timeout(STDERR_DRAIN, &mut task).await.is_err()
        {
            task.abort();
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::info!(target: "tsbridge::worker", pid, "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(pid, error = %e, "Stopped reading worker stderr");
                break;
            }
        }
    }
}

/// Owns the worker's lifecycle: spawn, restart on failure, shutdown.
///
/// Not internally synchronized: one exchange at a time, enforced by `&mut self`.
pub struct WorkerSupervisor {
    command: WorkerCommand,
    spawner: Arc<dyn WorkerSpawner>,
    response_timeout: Option<Duration>,
    shutdown_grace: Duration,
    max_line_length: usize,
    handle: Option<WorkerHandle>,
    restarts: u64,
}

impl WorkerSupervisor {
    /// Spawn the worker. Must be called from within a Tokio runtime.
    pub async fn start(config: &BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        let mut supervisor = Self {
            command: config.worker_command(),
            spawner: Arc::clone(&config.spawner),
            response_timeout: config.response_timeout,
            shutdown_grace: config.shutdown_grace,
            max_line_length: config.max_line_length,
            handle: None,
            restarts: 0,
        };
        supervisor.handle = Some(supervisor.spawn_handle()?);
        Ok(supervisor)
    }

    fn spawn_handle(&self) -> Result<WorkerHandle, BridgeError> {
        WorkerHandle::spawn(&self.command, self.spawner.as_ref(), self.max_line_length)
    }

    /// Close the current worker (if any) and spawn a new one with the same command.
    pub async fn restart(&mut self) -> Result<(), BridgeError> {
        if let Some(handle) = self.handle.take() {
            handle.close(self.shutdown_grace).await;
        }
        self.restarts += 1;
        tracing::info!(restarts = self.restarts, "Restarting worker");
        self.handle = Some(self.spawn_handle()?);
        Ok(())
    }

    /// Write one line and flush.
    pub async fn write_line(&mut self, line: String) -> Result<(), TransportError> {
        let handle = self.handle.as_mut().ok_or(TransportError::NotRunning)?;
        handle.writer.send(line).await.map_err(TransportError::Write)
    }

    /// Read one line, bounded by the response timeout if configured.
    ///
    /// A complete line that is not UTF-8 is returned as `Ok(Err(_))`: the
    /// stream is intact, only the message is bad.
    pub async fn read_line(&mut self) -> Result<Frame, TransportError> {
        let timeout = self.response_timeout;
        let handle = self.handle.as_mut().ok_or(TransportError::NotRunning)?;

        let next = match timeout {
            Some(limit) => tokio::time::timeout(limit, handle.reader.next())
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => handle.reader.next().await,
        };

        match next {
            Some(Ok(frame)) => {
                if !handle.reader.read_buffer().is_empty() {
                    tracing::warn!(
                        pid = handle.pid,
                        buffered_bytes = handle.reader.read_buffer().len(),
                        "Worker sent more than one line for a single request"
                    );
                }
                Ok(frame)
            }
            Some(Err(e)) => Err(TransportError::Read(e)),
            None => Err(TransportError::EndOfStream),
        }
    }

    /// Send one request line and wait for one response line.
    ///
    /// Any transport failure restarts the worker before the error is
    /// returned. The request is not retried against the new worker. A reply
    /// that is not UTF-8 is a protocol error and leaves the worker running.
    pub async fn exchange(&mut self, line: String) -> Result<String, BridgeError> {
        if self.handle.is_none() {
            tracing::info!("Worker not running, spawning before request");
            self.handle = Some(self.spawn_handle()?);
        }

        let result = match self.write_line(line).await {
            Ok(()) => self.read_line().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(e)) => {
                tracing::warn!(pid = ?self.pid(), error = %e, "Worker sent a line that is not UTF-8");
                Err(BridgeError::Protocol(format!("response is not valid UTF-8: {e}")))
            }
            Err(e) => {
                tracing::warn!(pid = ?self.pid(), error = %e, "Worker transport failed");
                if let Err(restart_err) = self.restart().await {
                    tracing::error!(error = %restart_err, "Failed to restart worker");
                }
                Err(BridgeError::Transport(e))
            }
        }
    }

    /// Close the worker. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::info!(pid = handle.pid, "Shutting down worker");
            handle.close(self.shutdown_grace).await;
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn restart_count(&self) -> u64 {
        self.restarts
    }

    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }
}
