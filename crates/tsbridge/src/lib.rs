//! tsbridge: line-delimited JSON bridge to a supervised worker process.
//!
//! The host sends one request at a time to a long-lived worker (by default
//! `node` running the TypeScript bridge script) over the worker's stdin and
//! reads one reply line from its stdout:
//!
//! ```text
//! host ──{"feature":"complete","line":10,"col":4}\n──► worker
//! host ◄─{"valid":true,"resultType":"AUTOCOMPLETE","completions":["foo"]}\n─ worker
//! ```
//!
//! Replies are decoded in two phases: a permissive [`Envelope`]
//! (`valid`, `resultType`, `errorMessage`), then a strict decode of the
//! payload into the schema registered for `resultType` in the
//! [`ResultRegistry`]. A broken worker is restarted automatically; the failed
//! request is reported as [`BridgeError::Transport`] and not retried.
//!
//! ```ignore
//! let registry = ResultRegistry::builder()
//!     .register::<AutoCompleteResult>(LanguageResult::AutoComplete)?
//!     .build();
//! let mut bridge = Bridge::start(BridgeConfig::from_env()?, Arc::new(registry)).await?;
//! let result = bridge.send_request(&request).await?;
//! bridge.stop().await;
//! ```

pub mod bridge;
mod client;
mod config;
mod error;
mod lifecycle;
pub mod logging;
mod registry;
mod supervisor;

pub use bridge::protocol::{Envelope, decode_response, encode_request};
pub use client::Bridge;
pub use config::{
    BridgeConfig, CommandSpawner, DEFAULT_EXECUTABLE, DEFAULT_SCRIPT, WorkerCommand,
    WorkerSpawner,
};
pub use error::{BridgeError, LifecycleError, RegistryError, SpawnError, TransportError};
pub use lifecycle::{BridgeSlot, Lifecycle, SharedBridge};
pub use registry::{Decoder, RegistryBuilder, ResultRegistry, ResultSchema};
pub use supervisor::WorkerSupervisor;
