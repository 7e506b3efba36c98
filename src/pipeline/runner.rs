//! Pipeline runner (internal implementation)
//!
//! Unified execution for all source kinds.
//! Handles auto-reconnection for the serial source.

use super::session::{ExtractSession, SessionEnd};
use super::stats::Stats;
use crate::config::{Config, SourceKind};
use crate::constants::{POST_DISCONNECT_DELAY_SECS, RECONNECT_DELAY_SECS};
use crate::error::{ExtractError, Result};
use crate::extract::Extractor;
use crate::transport::{ReplayTransport, SerialTransport, Transport};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

// =============================================================================
// Main entry point
// =============================================================================

/// Run the configured source through `extractor` until done
pub(super) async fn run(
    config: &Config,
    extractor: &mut Extractor,
    sink: mpsc::Sender<Bytes>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<()> {
    match config.source.kind {
        SourceKind::Serial => run_serial(config, extractor, sink, shutdown, stats).await,
        SourceKind::Replay => run_replay(config, extractor, sink, shutdown, stats).await,
    }
}

// =============================================================================
// Serial (with auto-reconnection)
// =============================================================================

/// Run with the serial source
///
/// The extractor survives reconnects; its buffer is cleared each time a
/// new connection starts since the stream is discontinuous.
async fn run_serial(
    config: &Config,
    extractor: &mut Extractor,
    sink: mpsc::Sender<Bytes>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<()> {
    while !shutdown.load(Ordering::Relaxed) {
        // Detect or use configured port
        let port_name = if config.source.serial_port.is_empty() {
            match SerialTransport::detect(&config.device) {
                Ok(p) => {
                    info!("Found device on {}", p);
                    p
                }
                Err(ExtractError::MultipleDevicesFound { count }) => {
                    warn!("{} matching devices found, specify a port", count);
                    tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                    continue;
                }
                Err(_) => {
                    // Device not found, wait and retry (passive waiting)
                    tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                    continue;
                }
            }
        } else {
            config.source.serial_port.clone()
        };

        let rx = match SerialTransport::new(&port_name, config.source.baud_rate)
            .spawn(shutdown.clone())
        {
            Ok(rx) => rx,
            Err(e) => {
                warn!("{}", e);
                tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                continue;
            }
        };

        info!("Connected: {} @ {} baud", port_name, config.source.baud_rate);
        extractor.clear_buffer();

        let session = ExtractSession::new(rx, sink.clone(), stats.clone());
        match session.run(extractor, shutdown.clone()).await? {
            SessionEnd::Shutdown | SessionEnd::SinkClosed => break,
            SessionEnd::SourceClosed => {}
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        warn!("Connection lost, reconnecting...");
        tokio::time::sleep(Duration::from_secs(POST_DISCONNECT_DELAY_SECS)).await;
    }

    Ok(())
}

// =============================================================================
// Replay (no reconnection)
// =============================================================================

/// Run with a capture file, once
async fn run_replay(
    config: &Config,
    extractor: &mut Extractor,
    sink: mpsc::Sender<Bytes>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<()> {
    let path = config
        .source
        .replay_file
        .clone()
        .ok_or_else(|| ExtractError::ConfigValidation {
            field: "source.replay_file",
            reason: "required when source.kind = \"replay\"".into(),
        })?;

    let rx = ReplayTransport::new(&path, config.source.chunk_size)
        .with_interval(Duration::from_millis(config.source.replay_interval_ms))
        .spawn(shutdown.clone())?;

    info!("Replaying {} in {} byte chunks", path.display(), config.source.chunk_size);

    let session = ExtractSession::new(rx, sink, stats);
    session.run(extractor, shutdown).await?;

    if extractor.buffered_len() > 0 {
        info!("{} trailing bytes left unconsumed", extractor.buffered_len());
    }
    Ok(())
}
