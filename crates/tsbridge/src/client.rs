//! Bridge client - one synchronous request/response exchange at a time.

use std::sync::Arc;

use serde::Serialize;

use crate::bridge::protocol::{decode_response, encode_request};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, LifecycleError};
use crate::registry::ResultRegistry;
use crate::supervisor::WorkerSupervisor;

/// Handle to a running worker plus the registry used to decode its replies.
///
/// `send_request` takes `&mut self`: one request is in flight at a time. Share
/// across tasks through [`SharedBridge`](crate::SharedBridge), whose mutex
/// serializes the write/read pair.
pub struct Bridge<R> {
    supervisor: WorkerSupervisor,
    registry: Arc<ResultRegistry<R>>,
    stopped: bool,
}

impl<R> Bridge<R> {
    /// Spawn the worker described by `config`.
    pub async fn start(
        config: BridgeConfig,
        registry: Arc<ResultRegistry<R>>,
    ) -> Result<Self, BridgeError> {
        if registry.is_empty() {
            tracing::warn!("Starting bridge with an empty result registry");
        }
        let supervisor = WorkerSupervisor::start(&config).await?;
        tracing::debug!(
            result_types = ?registry.result_types(),
            "Bridge started"
        );
        Ok(Self {
            supervisor,
            registry,
            stopped: false,
        })
    }

    /// Encode `request`, hand it to the worker, decode the reply.
    ///
    /// Errors propagate unmodified. A [`BridgeError::Transport`] means the
    /// worker has already been replaced; the request itself was not retried.
    pub async fn send_request<Q>(&mut self, request: &Q) -> Result<R, BridgeError>
    where
        Q: Serialize + ?Sized,
    {
        if self.stopped {
            return Err(LifecycleError::Stopped.into());
        }

        let line = encode_request(request)?;
        let reply = self.supervisor.exchange(line).await?;
        let result = decode_response(&reply, &self.registry);

        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Request failed");
        }
        result
    }

    /// Close the worker. Later requests fail with `LifecycleError::Stopped`.
    pub async fn shutdown(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.supervisor.shutdown().await;
        }
    }

    pub async fn stop(mut self) {
        self.shutdown().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Process id of the current worker, if one is running.
    pub fn worker_pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    pub fn restart_count(&self) -> u64 {
        self.supervisor.restart_count()
    }

    pub fn registry(&self) -> &ResultRegistry<R> {
        &self.registry
    }
}
