//! Message extraction from fragmented byte streams
//!
//! Callers push arbitrary chunks of newly arrived bytes into an
//! [`Extractor`](extract::Extractor); it returns the messages that became
//! complete and keeps any trailing partial message until more data arrives.
//! Where messages sit in the stream is decided by a
//! [`Locator`](locator::Locator) (XBus and COBS framings are provided).
//!
//! The remaining modules make up the `msg-extract` binary: serial and
//! capture-file transports, the async pipeline, configuration and output.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod locator;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod transport;

pub use error::{ExtractError, Result};
pub use extract::{Extraction, Extractor, Status};
pub use locator::{Locator, Location};
