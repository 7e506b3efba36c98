//! Capture file replay
//!
//! Reads a recorded byte stream in fixed-size chunks on a blocking thread,
//! optionally pausing between chunks to mimic a live link. The channel
//! closes at end of file.

use super::Transport;
use crate::constants::CHANNEL_CAPACITY;
use crate::error::{ExtractError, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

pub struct ReplayTransport {
    path: PathBuf,
    chunk_size: usize,
    interval: Duration,
}

impl ReplayTransport {
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            chunk_size: chunk_size.max(1),
            interval: Duration::ZERO,
        }
    }

    /// Pause between chunks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Read until `buf` is full or EOF
fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Transport for ReplayTransport {
    fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<mpsc::Receiver<Bytes>> {
        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
        let mut file = File::open(&self.path).map_err(|e| ExtractError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        std::thread::spawn(move || {
            let mut buf = vec![0u8; self.chunk_size];

            while !shutdown.load(Ordering::Relaxed) {
                match read_chunk(&mut file, &mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Replay read failed: {}: {}", self.path.display(), e);
                        break;
                    }
                }

                if !self.interval.is_zero() {
                    std::thread::sleep(self.interval);
                }
            }
        });

        Ok(rx)
    }
}
