//! Start/get/stop lifecycle for hosts that want a single shared bridge.
//!
//! `BridgeSlot::new()` is `const`, so a host can keep one in a `static`:
//!
//! ```ignore
//! static BRIDGE: BridgeSlot<LanguageResult> = BridgeSlot::new();
//!
//! BRIDGE.start(BridgeConfig::from_env()?, registry).await?;
//! let reply = BRIDGE.get().await?.lock().await.send_request(&request).await?;
//! BRIDGE.stop().await?;
//! ```
//!
//! Tests construct independent slots instead of sharing process-wide state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::Bridge;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, LifecycleError};
use crate::registry::ResultRegistry;

/// A running bridge shared between tasks. The mutex serializes requests.
pub type SharedBridge<R> = Arc<Mutex<Bridge<R>>>;

/// Lifecycle state of a [`BridgeSlot`].
///
/// Only `Unstarted -> Running -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unstarted,
    Running,
    Stopped,
}

enum SlotState<R> {
    Unstarted,
    Running(SharedBridge<R>),
    Stopped,
}

pub struct BridgeSlot<R> {
    state: Mutex<SlotState<R>>,
}

impl<R> Default for BridgeSlot<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> BridgeSlot<R> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::const_new(SlotState::Unstarted),
        }
    }

    /// Unstarted -> Running. A failed spawn leaves the slot Unstarted.
    ///
    /// A stopped slot never starts again. A host that stops and later
    /// restarts its plugin needs a fresh `BridgeSlot` (or a plain [`Bridge`]).
    pub async fn start(
        &self,
        config: BridgeConfig,
        registry: Arc<ResultRegistry<R>>,
    ) -> Result<SharedBridge<R>, BridgeError> {
        let mut state = self.state.lock().await;
        match *state {
            SlotState::Unstarted => {}
            SlotState::Running(_) => return Err(LifecycleError::AlreadyStarted.into()),
            SlotState::Stopped => return Err(LifecycleError::Stopped.into()),
        }

        let bridge = Arc::new(Mutex::new(Bridge::start(config, registry).await?));
        *state = SlotState::Running(Arc::clone(&bridge));
        Ok(bridge)
    }

    pub async fn get(&self) -> Result<SharedBridge<R>, BridgeError> {
        match &*self.state.lock().await {
            SlotState::Running(bridge) => Ok(Arc::clone(bridge)),
            SlotState::Unstarted => Err(LifecycleError::NotStarted.into()),
            SlotState::Stopped => Err(LifecycleError::Stopped.into()),
        }
    }

    /// Running -> Stopped, closing the worker.
    ///
    /// Waits for an in-flight request on the shared bridge to finish first.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        let bridge = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, SlotState::Stopped) {
                SlotState::Running(bridge) => bridge,
                SlotState::Unstarted => {
                    *state = SlotState::Unstarted;
                    return Err(LifecycleError::NotStarted.into());
                }
                SlotState::Stopped => return Err(LifecycleError::Stopped.into()),
            }
        };

        bridge.lock().await.shutdown().await;
        tracing::info!("Bridge stopped");
        Ok(())
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        match &*self.state.lock().await {
            SlotState::Unstarted => Lifecycle::Unstarted,
            SlotState::Running(_) => Lifecycle::Running,
            SlotState::Stopped => Lifecycle::Stopped,
        }
    }
}
