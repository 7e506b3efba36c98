//! Transport abstraction for byte-level input
//!
//! Separates I/O concerns from framing:
//! - **Transport**: How bytes arrive (Serial, capture file replay...)
//! - **Extractor**: How messages are cut out of them (handled separately)
//!
//! Each transport runs its reads on a blocking thread and hands chunks to
//! the async side through a channel.
//!
//! # Adding a new transport
//!
//! 1. Create `transport/my_transport.rs`
//! 2. Implement the `Transport` trait
//! 3. Add `pub mod my_transport;` here
//! 4. No other changes needed

pub mod replay;
pub mod serial;

pub use replay::ReplayTransport;
pub use serial::SerialTransport;

use bytes::Bytes;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;

/// Trait for spawnable transports
///
/// A transport handles:
/// - Opening the underlying source
/// - Reading raw chunks of whatever size the source delivers
/// - Threading model
///
/// A transport does NOT handle:
/// - Message framing (that's the extractor's job)
/// - Statistics or logging of messages (that's the session's job)
/// - Reconnection logic (that's the runner's job)
///
/// # Lifecycle
///
/// 1. Create transport with configuration
/// 2. Call `spawn()` to start reading in background
/// 3. Receive chunks from the returned channel
/// 4. The channel closes when the transport stops:
///    - `shutdown` flag is set, OR
///    - The source is exhausted or disconnected
pub trait Transport: Send + 'static {
    /// Spawn the transport in background
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened.
    fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<mpsc::Receiver<Bytes>>;
}
