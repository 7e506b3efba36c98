//! Message extraction from a fragmented byte stream
//!
//! The extractor owns a sliding window over the stream (`StreamBuffer`) and
//! drives a `Locator` over it on every call:
//!
//! - Complete, validated candidates are emitted in order
//! - Garbage in front of a candidate is skipped
//! - A truncated candidate in front of a complete one is waited on for up
//!   to `max_retries` calls before it is skipped together with the garbage
//!
//! The retry budget is counted in calls to `process_new_data`, not in bytes
//! or time. Feed reasonably sized chunks (not single bytes), and make sure
//! no single message spans more calls than the budget allows.

mod buffer;

pub use buffer::StreamBuffer;

use crate::constants::{ABANDON_DUMP_BYTES, MAX_INCOMPLETE_RETRY_COUNT, STREAM_BUFFER_CAPACITY};
use crate::error::{ExtractError, Result};
use crate::locator::Locator;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Outcome of a successful `process_new_data` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// One or more messages were extracted
    Ok,
    /// Nothing complete yet (waiting for more data)
    TimeoutNoData,
}

/// Messages extracted by one call, in stream order
#[derive(Debug, Clone)]
pub struct Extraction {
    pub messages: Vec<Bytes>,
    pub status: Status,
}

/// Synchronisation state between calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No incomplete candidate is being waited on
    #[default]
    Synced,
    /// Waiting for a truncated candidate to complete
    AwaitingCompletion {
        /// Calls that have observed it still incomplete
        retries: u32,
    },
}

/// Cumulative extraction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorStats {
    /// Messages emitted
    pub messages: u64,
    /// Bytes discarded as garbage or abandoned candidates
    pub skipped_bytes: u64,
    /// Calls that deferred on an incomplete candidate
    pub deferrals: u64,
    /// Incomplete candidates given up on
    pub abandoned: u64,
}

/// Extracts framed messages from arbitrarily chunked input
///
/// One instance per stream. Not meant to be shared between threads:
/// calls must be serialized by the owner.
///
/// # Example
///
/// ```
/// use msg_extractor::extract::{Extractor, Status};
/// use msg_extractor::locator::{xbus, XbusLocator};
/// use std::sync::Arc;
///
/// let mut extractor = Extractor::new(Arc::new(XbusLocator::new()));
/// let frame = xbus::encode(xbus::BID_MASTER, 0x30, &[]).unwrap();
///
/// let first = extractor.process_new_data(&frame[..2]).unwrap();
/// assert_eq!(first.status, Status::TimeoutNoData);
///
/// let second = extractor.process_new_data(&frame[2..]).unwrap();
/// assert_eq!(second.status, Status::Ok);
/// assert_eq!(second.messages[0].as_ref(), frame.as_slice());
/// ```
pub struct Extractor {
    locator: Option<Arc<dyn Locator>>,
    buffer: StreamBuffer,
    state: SyncState,
    max_retries: u32,
    stats: ExtractorStats,
}

impl Extractor {
    /// Create an extractor bound to `locator`
    pub fn new(locator: Arc<dyn Locator>) -> Self {
        let mut extractor = Self::unbound();
        extractor.bind(locator);
        extractor
    }

    /// Create an extractor with no locator (every call fails until bound)
    pub fn unbound() -> Self {
        Self {
            locator: None,
            buffer: StreamBuffer::with_capacity(STREAM_BUFFER_CAPACITY),
            state: SyncState::Synced,
            max_retries: MAX_INCOMPLETE_RETRY_COUNT,
            stats: ExtractorStats::default(),
        }
    }

    /// Override the number of calls to wait on an incomplete candidate
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bind (or replace) the locator
    pub fn bind(&mut self, locator: Arc<dyn Locator>) {
        self.locator = Some(locator);
    }

    /// Process newly arrived bytes
    ///
    /// Appends `chunk` to the buffer and returns every message that became
    /// complete. Trailing partial data is kept for the next call.
    ///
    /// # Errors
    ///
    /// - `NoLocator` - no locator bound (buffer untouched)
    /// - `LocatorContract` - the locator returned an inconsistent location
    ///   before any message was accepted in this call (buffer untouched).
    ///   Messages accepted earlier in the call are returned first and the
    ///   violation surfaces on the next call.
    pub fn process_new_data(&mut self, chunk: &[u8]) -> Result<Extraction> {
        let Some(locator) = self.locator.clone() else {
            return Err(ExtractError::NoLocator);
        };

        if !chunk.is_empty() {
            let before = self.buffer.len();
            self.buffer.append(chunk);
            debug_assert_eq!(self.buffer.len(), before + chunk.len());
        }

        let mut consumed = 0;
        let mut messages = Vec::new();

        loop {
            let window = self.buffer.window_from(consumed);
            let location = locator.find_candidate(window);

            let Some(start) = location.start else {
                trace!("{}: no candidate in {} bytes", locator.name(), window.len());
                return Ok(self.finish(consumed, messages));
            };

            if !location.is_consistent(window.len()) {
                if !messages.is_empty() {
                    // Deliver what was accepted, the next call reports the violation
                    warn!(
                        "{}: inconsistent location {:?} after {} messages",
                        locator.name(),
                        location,
                        messages.len()
                    );
                    return Ok(self.finish(consumed, messages));
                }
                return Err(ExtractError::LocatorContract {
                    start: location.start,
                    incomplete: location.incomplete,
                    size: location.size,
                    window: window.len(),
                });
            }

            let size = location.size;
            let valid = locator.validate(&window[start..start + size]);
            trace!(
                "{}: candidate at {} ({} bytes), valid: {}",
                locator.name(),
                start,
                size,
                valid
            );
            if !valid {
                return Ok(self.finish(consumed, messages));
            }

            if start > 0 {
                match location.incomplete {
                    Some(incomplete) => {
                        let retries = self.retry_count();
                        if retries < self.max_retries {
                            // Keep the incomplete candidate, drop what is before it
                            self.state = SyncState::AwaitingCompletion {
                                retries: retries + 1,
                            };
                            self.stats.deferrals += 1;
                            if incomplete > 0 {
                                warn!("Skipping {} bytes from the input buffer", incomplete);
                                self.stats.skipped_bytes += incomplete as u64;
                                consumed += incomplete;
                            }
                            return Ok(self.finish(consumed, messages));
                        }

                        warn!(
                            "Skipping {} bytes from the input buffer that may contain an incomplete message at {} (next message: {} bytes, starts {})",
                            start,
                            incomplete,
                            size,
                            head_hex(&window[start..start + size])
                        );
                        self.stats.abandoned += 1;
                    }
                    None => {
                        warn!("Skipping {} bytes from the input buffer", start);
                    }
                }
                self.stats.skipped_bytes += start as u64;
            }

            if let SyncState::AwaitingCompletion { retries } = self.state {
                debug!("Resetting retry count from {}", retries);
                self.state = SyncState::Synced;
            }

            messages.push(Bytes::copy_from_slice(&window[start..start + size]));
            self.stats.messages += 1;
            consumed += start + size;
        }
    }

    /// Discard all buffered bytes
    ///
    /// Use after a stream discontinuity (e.g. reconnect). The retry state
    /// is left as is.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Drop the consumed prefix and build the call result
    fn finish(&mut self, consumed: usize, messages: Vec<Bytes>) -> Extraction {
        if consumed > 0 {
            self.buffer.drop_front(consumed);
        }
        let status = if messages.is_empty() {
            Status::TimeoutNoData
        } else {
            Status::Ok
        };
        Extraction { messages, status }
    }

    /// Whether a locator is bound
    pub fn has_locator(&self) -> bool {
        self.locator.is_some()
    }

    /// Bytes currently retained
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Calls that have observed the pending incomplete candidate (0 when synced)
    pub fn retry_count(&self) -> u32 {
        match self.state {
            SyncState::Synced => 0,
            SyncState::AwaitingCompletion { retries } => retries,
        }
    }

    /// Current synchronisation state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Calls an incomplete candidate is waited on before it is skipped
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Counters accumulated since construction
    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }
}

/// Hex of the first few bytes of a message, for diagnostics
fn head_hex(message: &[u8]) -> String {
    hex::encode(&message[..message.len().min(ABANDON_DUMP_BYTES)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{xbus, Location, XbusLocator};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn xbus_extractor() -> Extractor {
        Extractor::new(Arc::new(XbusLocator::new()))
    }

    fn frame(mid: u8, payload: &[u8]) -> Vec<u8> {
        xbus::encode(xbus::BID_MASTER, mid, payload).unwrap()
    }

    /// Plausible header announcing 32 bytes, followed by only 3
    fn truncated() -> Vec<u8> {
        vec![xbus::PREAMBLE, xbus::BID_MASTER, 0x20, 0x20, 0x01, 0x02, 0x03]
    }

    /// Locator returning a fixed location for any non-empty window
    struct FixedLocator {
        location: Location,
        valid: bool,
    }

    impl Locator for FixedLocator {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn find_candidate(&self, window: &[u8]) -> Location {
            if window.is_empty() {
                Location::not_found()
            } else {
                self.location
            }
        }

        fn validate(&self, _candidate: &[u8]) -> bool {
            self.valid
        }
    }

    /// Locator that finds one valid candidate, then misreports every query
    struct SecondQueryBreaks {
        queries: AtomicUsize,
    }

    impl Locator for SecondQueryBreaks {
        fn name(&self) -> &'static str {
            "second-query-breaks"
        }

        fn find_candidate(&self, _window: &[u8]) -> Location {
            if self.queries.fetch_add(1, Ordering::SeqCst) == 0 {
                Location::found(0, 5)
            } else {
                Location::found(2, 1).with_incomplete(Some(3))
            }
        }

        fn validate(&self, _candidate: &[u8]) -> bool {
            true
        }
    }

    #[test]
    fn test_single_message() {
        let mut ex = xbus_extractor();
        let f = frame(0x10, &[1, 2, 3]);

        let out = ex.process_new_data(&f).unwrap();
        assert_eq!(out.status, Status::Ok);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].as_ref(), f.as_slice());
        assert_eq!(ex.buffered_len(), 0);
    }

    #[test]
    fn test_several_messages_one_chunk() {
        let mut ex = xbus_extractor();
        let a = frame(0x10, &[1]);
        let b = frame(0x11, &[2, 2]);
        let mut data = a.clone();
        data.extend_from_slice(&b);

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].as_ref(), a.as_slice());
        assert_eq!(out.messages[1].as_ref(), b.as_slice());
        assert_eq!(ex.stats().messages, 2);
    }

    #[test]
    fn test_partial_tail_retained() {
        let mut ex = xbus_extractor();
        let a = frame(0x10, &[1]);
        let b = frame(0x11, &[2, 2, 2]);
        let mut data = a.clone();
        data.extend_from_slice(&b[..3]);

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.messages.len(), 1);
        assert_eq!(ex.buffered_len(), 3);

        let out = ex.process_new_data(&b[3..]).unwrap();
        assert_eq!(out.messages[0].as_ref(), b.as_slice());
        assert_eq!(ex.buffered_len(), 0);
    }

    #[test]
    fn test_junk_skipped_without_retry() {
        let mut ex = xbus_extractor();
        let mut data = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        let f = frame(0x10, &[9]);
        data.extend_from_slice(&f);

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.messages.len(), 1);
        assert_eq!(ex.retry_count(), 0);
        assert_eq!(ex.stats().skipped_bytes, 5);
        assert_eq!(ex.buffered_len(), 0);
    }

    #[test]
    fn test_deferral_drops_only_leading_junk() {
        let mut ex = xbus_extractor();
        let mut data = vec![0x01, 0x02];
        data.extend_from_slice(&truncated());
        data.extend_from_slice(&frame(0x10, &[9]));
        let total = data.len();

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.status, Status::TimeoutNoData);
        assert!(out.messages.is_empty());
        assert_eq!(ex.retry_count(), 1);
        assert_eq!(ex.state(), SyncState::AwaitingCompletion { retries: 1 });
        assert_eq!(ex.buffered_len(), total - 2);
    }

    #[test]
    fn test_deferral_after_accepted_message_reports_ok() {
        let mut ex = xbus_extractor();
        let first = frame(0x10, &[1]);
        let mut data = first.clone();
        data.extend_from_slice(&truncated());
        data.extend_from_slice(&frame(0x11, &[2]));

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.status, Status::Ok);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].as_ref(), first.as_slice());
        assert_eq!(ex.retry_count(), 1);
    }

    #[test]
    fn test_abandon_after_budget() {
        let mut ex = xbus_extractor();
        let inc = truncated();
        let f = frame(0x10, &[9]);
        let mut data = inc.clone();
        data.extend_from_slice(&f);

        ex.process_new_data(&data).unwrap();
        for expected in 2..=5 {
            let out = ex.process_new_data(&[]).unwrap();
            assert_eq!(out.status, Status::TimeoutNoData);
            assert_eq!(ex.retry_count(), expected);
        }

        let out = ex.process_new_data(&[]).unwrap();
        assert_eq!(out.status, Status::Ok);
        assert_eq!(out.messages[0].as_ref(), f.as_slice());
        assert_eq!(ex.retry_count(), 0);
        assert_eq!(ex.buffered_len(), 0);
        assert_eq!(ex.stats().abandoned, 1);
        assert_eq!(ex.stats().skipped_bytes, inc.len() as u64);
    }

    #[test]
    fn test_custom_retry_budget() {
        let mut ex = xbus_extractor().with_max_retries(1);
        let mut data = truncated();
        data.extend_from_slice(&frame(0x10, &[9]));

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.status, Status::TimeoutNoData);
        let out = ex.process_new_data(&[]).unwrap();
        assert_eq!(out.status, Status::Ok);
    }

    #[test]
    fn test_deferral_at_origin_keeps_everything() {
        let mut ex = xbus_extractor();
        let long = frame(0x10, &[0x11; 12]);
        let short = frame(0x11, &[0x22]);

        // Short frame sits inside the span the long frame announces
        let mut data = long[..6].to_vec();
        data.extend_from_slice(&short);
        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.status, Status::TimeoutNoData);
        assert_eq!(ex.retry_count(), 1);
        assert_eq!(ex.buffered_len(), data.len());
        assert_eq!(ex.stats().skipped_bytes, 0);
    }

    #[test]
    fn test_no_locator() {
        let mut ex = Extractor::unbound();
        assert!(matches!(
            ex.process_new_data(&[1, 2, 3]),
            Err(ExtractError::NoLocator)
        ));
        assert_eq!(ex.buffered_len(), 0);

        ex.bind(Arc::new(XbusLocator::new()));
        assert!(ex.has_locator());
        let f = frame(0x10, &[]);
        assert_eq!(ex.process_new_data(&f).unwrap().status, Status::Ok);
    }

    #[test]
    fn test_contract_violation() {
        let locator = FixedLocator {
            location: Location::found(1, 1).with_incomplete(Some(1)),
            valid: true,
        };
        let mut ex = Extractor::new(Arc::new(locator));
        assert!(matches!(
            ex.process_new_data(&[1, 2, 3]),
            Err(ExtractError::LocatorContract { .. })
        ));
    }

    #[test]
    fn test_candidate_past_window_is_violation() {
        let locator = FixedLocator {
            location: Location::found(0, 10),
            valid: true,
        };
        let mut ex = Extractor::new(Arc::new(locator));
        assert!(matches!(
            ex.process_new_data(&[1, 2, 3]),
            Err(ExtractError::LocatorContract { window: 3, .. })
        ));
    }

    #[test]
    fn test_oversized_location_is_violation() {
        let locator = FixedLocator {
            location: Location::found(1, usize::MAX),
            valid: true,
        };
        let mut ex = Extractor::new(Arc::new(locator));
        assert!(matches!(
            ex.process_new_data(&[1, 2, 3]),
            Err(ExtractError::LocatorContract { .. })
        ));
        assert_eq!(ex.buffered_len(), 3);
    }

    #[test]
    fn test_violation_after_accept_keeps_message() {
        let locator = SecondQueryBreaks {
            queries: AtomicUsize::new(0),
        };
        let mut ex = Extractor::new(Arc::new(locator));
        let data = [1, 2, 3, 4, 5, 6, 7, 8, 9];

        let out = ex.process_new_data(&data).unwrap();
        assert_eq!(out.status, Status::Ok);
        assert_eq!(out.messages, vec![Bytes::copy_from_slice(&data[..5])]);
        assert_eq!(ex.stats().messages, 1);
        assert_eq!(ex.buffered_len(), 4);

        assert!(matches!(
            ex.process_new_data(&[]),
            Err(ExtractError::LocatorContract { window: 4, .. })
        ));
        assert_eq!(ex.buffered_len(), 4);
        assert_eq!(ex.stats().messages, 1);
    }

    #[test]
    fn test_head_hex_limits_dump() {
        assert_eq!(head_hex(&[0xFA, 0xFF, 0x30, 0x00, 0xD1, 0x99]), "faff3000d1");
        assert_eq!(head_hex(&[0x01, 0x02]), "0102");
    }

    #[test]
    fn test_never_validating_locator_is_steady() {
        let locator = FixedLocator {
            location: Location::found(0, 1),
            valid: false,
        };
        let mut ex = Extractor::new(Arc::new(locator));
        for i in 1..=3 {
            let out = ex.process_new_data(&[0xAB]).unwrap();
            assert_eq!(out.status, Status::TimeoutNoData);
            assert_eq!(ex.buffered_len(), i);
        }
    }

    #[test]
    fn test_clear_buffer_keeps_retry_state() {
        let mut ex = xbus_extractor();
        let mut data = truncated();
        data.extend_from_slice(&frame(0x10, &[9]));
        ex.process_new_data(&data).unwrap();

        ex.clear_buffer();
        ex.clear_buffer();
        assert_eq!(ex.buffered_len(), 0);
        assert_eq!(ex.retry_count(), 1);

        let f = frame(0x12, &[]);
        let out = ex.process_new_data(&f).unwrap();
        assert_eq!(out.messages.len(), 1);
        assert_eq!(ex.retry_count(), 0);
    }
}
