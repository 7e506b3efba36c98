//! Source-to-sink pipeline
//!
//! Wires a transport, one extractor and a message sink together:
//!
//! ```text
//! Transport --chunks--> ExtractSession --messages--> sink
//!                           |
//!                       Extractor (one per stream)
//! ```

mod runner;
pub mod session;
pub mod stats;

pub use session::{ExtractSession, SessionEnd};
pub use stats::Stats;

use crate::config::{Config, ExtractorConfig};
use crate::error::Result;
use crate::extract::{Extractor, ExtractorStats};
use crate::locator;
use bytes::Bytes;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Build an extractor for the configured protocol and retry budget
pub fn build_extractor(config: &ExtractorConfig) -> Extractor {
    Extractor::new(locator::for_protocol(config.protocol))
        .with_max_retries(config.max_incomplete_retries)
}

/// Run the configured source until shutdown or end of input
///
/// Extracted messages are sent to `sink` in stream order.
/// Returns the extractor counters on completion.
pub async fn run(
    config: &Config,
    sink: mpsc::Sender<Bytes>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<ExtractorStats> {
    let mut extractor = build_extractor(&config.extractor);
    runner::run(config, &mut extractor, sink, shutdown, stats).await?;
    Ok(extractor.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    #[test]
    fn test_build_extractor() {
        let config = ExtractorConfig {
            protocol: Protocol::Cobs,
            max_incomplete_retries: 2,
        };
        let extractor = build_extractor(&config);
        assert!(extractor.has_locator());
        assert_eq!(extractor.max_retries(), 2);
        assert_eq!(extractor.retry_count(), 0);
    }
}
