//! Traffic statistics for the pipeline
//!
//! Thread-safe counters for measuring throughput.
//! Uses lock-free atomics for all operations.

use crate::constants::RATE_UPDATE_MIN_INTERVAL_SECS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Traffic statistics with rate calculation (fully lock-free)
pub struct Stats {
    /// Total bytes read from the source
    rx_total: AtomicU64,
    /// Total messages extracted
    msg_total: AtomicU64,
    /// Snapshot of rx_total at last rate calculation
    rx_snapshot: AtomicU64,
    /// Snapshot of msg_total at last rate calculation
    msg_snapshot: AtomicU64,
    /// Reference instant for time calculations
    start_time: Instant,
    /// Nanoseconds since start_time at last rate calculation
    last_calc_nanos: AtomicU64,
    /// Cached RX rate in KB/s (stored as f64 bits)
    rx_rate: AtomicU64,
    /// Cached message rate in msg/s (stored as f64 bits)
    msg_rate: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            rx_total: AtomicU64::new(0),
            msg_total: AtomicU64::new(0),
            rx_snapshot: AtomicU64::new(0),
            msg_snapshot: AtomicU64::new(0),
            start_time: Instant::now(),
            last_calc_nanos: AtomicU64::new(0),
            rx_rate: AtomicU64::new(0),
            msg_rate: AtomicU64::new(0),
        }
    }

    /// Add bytes read from the source
    #[inline]
    pub fn add_rx(&self, bytes: usize) {
        self.rx_total.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Add extracted messages
    #[inline]
    pub fn add_messages(&self, count: usize) {
        self.msg_total.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn rx_bytes(&self) -> u64 {
        self.rx_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn messages(&self) -> u64 {
        self.msg_total.load(Ordering::Relaxed)
    }

    /// Update rate calculations and return (rx_kb_s, msg_s)
    pub fn update_rates(&self) -> (f64, f64) {
        let now_nanos = self.start_time.elapsed().as_nanos() as u64;
        let last_nanos = self.last_calc_nanos.load(Ordering::Relaxed);
        let elapsed = (now_nanos - last_nanos) as f64 / 1_000_000_000.0;

        if elapsed < RATE_UPDATE_MIN_INTERVAL_SECS {
            return self.cached_rates();
        }

        // Try to claim the update (avoid duplicate calculations)
        if self
            .last_calc_nanos
            .compare_exchange(last_nanos, now_nanos, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return self.cached_rates();
        }

        let rx_now = self.rx_total.load(Ordering::Relaxed);
        let msg_now = self.msg_total.load(Ordering::Relaxed);
        let rx_prev = self.rx_snapshot.swap(rx_now, Ordering::Relaxed);
        let msg_prev = self.msg_snapshot.swap(msg_now, Ordering::Relaxed);

        let rx_rate = (rx_now - rx_prev) as f64 / elapsed / 1024.0; // KB/s
        let msg_rate = (msg_now - msg_prev) as f64 / elapsed;

        self.rx_rate.store(rx_rate.to_bits(), Ordering::Relaxed);
        self.msg_rate.store(msg_rate.to_bits(), Ordering::Relaxed);

        (rx_rate, msg_rate)
    }

    fn cached_rates(&self) -> (f64, f64) {
        let rx = f64::from_bits(self.rx_rate.load(Ordering::Relaxed));
        let msg = f64::from_bits(self.msg_rate.load(Ordering::Relaxed));
        (rx, msg)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
