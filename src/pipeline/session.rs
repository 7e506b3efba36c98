//! Extraction session - feeds one transport into one extractor
//!
//! The session handles:
//! - Pulling raw chunks from the transport channel
//! - Running them through the extractor
//! - Forwarding extracted messages to the sink
//! - Statistics tracking
//!
//! The session does NOT handle:
//! - Transport lifecycle (that's the caller's responsibility)
//! - Reconnection logic (handled by the runner)

use super::stats::Stats;
use crate::constants::{SHUTDOWN_POLL_MS, STATS_INTERVAL_SECS};
use crate::error::Result;
use crate::extract::Extractor;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown flag was set
    Shutdown,
    /// Transport channel closed (disconnect or end of capture)
    SourceClosed,
    /// Message sink was dropped
    SinkClosed,
}

/// Session between a transport and a message sink
///
/// The extractor is borrowed so it outlives the session: a reconnecting
/// runner keeps one extractor (and its retry state) across sessions.
///
/// # Example
///
/// ```ignore
/// let rx = SerialTransport::new("/dev/ttyUSB0", 115_200).spawn(shutdown.clone())?;
/// let session = ExtractSession::new(rx, sink_tx, stats);
/// session.run(&mut extractor, shutdown).await?;
/// ```
pub struct ExtractSession {
    /// Raw chunks from the transport
    source: mpsc::Receiver<Bytes>,
    /// Extracted messages
    sink: mpsc::Sender<Bytes>,
    /// Traffic statistics
    stats: Arc<Stats>,
}

impl ExtractSession {
    pub fn new(source: mpsc::Receiver<Bytes>, sink: mpsc::Sender<Bytes>, stats: Arc<Stats>) -> Self {
        Self {
            source,
            sink,
            stats,
        }
    }

    /// Run until shutdown, source close or sink close
    ///
    /// # Errors
    ///
    /// Propagates extractor errors (missing locator or locator contract
    /// violation). Malformed stream data is never an error.
    pub async fn run(
        mut self,
        extractor: &mut Extractor,
        shutdown: Arc<AtomicBool>,
    ) -> Result<SessionEnd> {
        let mut summary = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));
        summary.tick().await;

        loop {
            tokio::select! {
                biased;

                // Periodic shutdown check
                _ = tokio::time::sleep(Duration::from_millis(SHUTDOWN_POLL_MS)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        return Ok(SessionEnd::Shutdown);
                    }
                }

                chunk = self.source.recv() => {
                    let Some(chunk) = chunk else {
                        return Ok(SessionEnd::SourceClosed);
                    };
                    if !self.process_chunk(extractor, &chunk).await? {
                        return Ok(SessionEnd::SinkClosed);
                    }
                }

                _ = summary.tick() => {
                    let (rx_rate, msg_rate) = self.stats.update_rates();
                    let ex = extractor.stats();
                    debug!(
                        "{:.1} KB/s, {:.0} msg/s, {} buffered, {} skipped bytes, {} abandoned",
                        rx_rate,
                        msg_rate,
                        extractor.buffered_len(),
                        ex.skipped_bytes,
                        ex.abandoned
                    );
                }
            }
        }
    }

    /// Extract from one chunk and forward the messages
    ///
    /// Returns `false` when the sink is gone.
    async fn process_chunk(&mut self, extractor: &mut Extractor, chunk: &[u8]) -> Result<bool> {
        self.stats.add_rx(chunk.len());

        let extraction = extractor.process_new_data(chunk)?;
        self.stats.add_messages(extraction.messages.len());

        for message in extraction.messages {
            if self.sink.send(message).await.is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::locator::{xbus, XbusLocator};

    fn frame(mid: u8, payload: &[u8]) -> Vec<u8> {
        xbus::encode(xbus::BID_MASTER, mid, payload).unwrap()
    }

    #[tokio::test]
    async fn test_session_extracts_across_chunks() {
        let (src_tx, src_rx) = mpsc::channel(16);
        let (sink_tx, mut sink_rx) = mpsc::channel(16);
        let stats = Arc::new(Stats::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut extractor = Extractor::new(Arc::new(XbusLocator::new()));

        let a = frame(0x10, &[1, 2, 3]);
        let b = frame(0x11, &[4]);
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        src_tx.send(Bytes::copy_from_slice(&stream[..4])).await.unwrap();
        src_tx.send(Bytes::copy_from_slice(&stream[4..])).await.unwrap();
        drop(src_tx);

        let session = ExtractSession::new(src_rx, sink_tx, stats.clone());
        let end = session.run(&mut extractor, shutdown).await.unwrap();
        assert_eq!(end, SessionEnd::SourceClosed);

        assert_eq!(sink_rx.recv().await.unwrap().as_ref(), a.as_slice());
        assert_eq!(sink_rx.recv().await.unwrap().as_ref(), b.as_slice());
        assert_eq!(stats.messages(), 2);
        assert_eq!(stats.rx_bytes(), stream.len() as u64);
    }

    #[tokio::test]
    async fn test_session_shutdown() {
        let (_src_tx, src_rx) = mpsc::channel::<Bytes>(16);
        let (sink_tx, _sink_rx) = mpsc::channel(16);
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut extractor = Extractor::new(Arc::new(XbusLocator::new()));

        let session = ExtractSession::new(src_rx, sink_tx, Arc::new(Stats::new()));
        let end = session.run(&mut extractor, shutdown).await.unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_session_sink_closed() {
        let (src_tx, src_rx) = mpsc::channel(16);
        let (sink_tx, sink_rx) = mpsc::channel(16);
        drop(sink_rx);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut extractor = Extractor::new(Arc::new(XbusLocator::new()));

        src_tx.send(Bytes::from(frame(0x10, &[]))).await.unwrap();

        let session = ExtractSession::new(src_rx, sink_tx, Arc::new(Stats::new()));
        let end = session.run(&mut extractor, shutdown).await.unwrap();
        assert_eq!(end, SessionEnd::SinkClosed);
    }

    #[tokio::test]
    async fn test_session_propagates_missing_locator() {
        let (src_tx, src_rx) = mpsc::channel(16);
        let (sink_tx, _sink_rx) = mpsc::channel(16);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut extractor = Extractor::unbound();

        src_tx.send(Bytes::from_static(&[1, 2, 3])).await.unwrap();

        let session = ExtractSession::new(src_rx, sink_tx, Arc::new(Stats::new()));
        let result = session.run(&mut extractor, shutdown).await;
        assert!(matches!(result, Err(ExtractError::NoLocator)));
    }
}
