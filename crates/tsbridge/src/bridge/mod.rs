//! Wire layer between the host and the worker process.
//!
//! # Architecture
//!
//! - **codec**: line framing (LinesCodec) for the worker's stdin/stdout
//! - **protocol**: request encoding, response envelope, two-phase decode

pub mod codec;
pub mod protocol;
