//! Message locator abstraction
//!
//! Separates message recognition from stream buffering:
//! - **Locator**: Where a candidate message sits in a byte window, and
//!   whether it is structurally sound (XBus, COBS, etc.)
//! - **Extractor**: What to keep, skip or wait for (handled separately)
//!
//! # Adding a new locator
//!
//! 1. Create `locator/my_locator.rs`
//! 2. Implement the `Locator` trait
//! 3. Add `pub mod my_locator;` here
//! 4. Add a variant to `config::Protocol` if it should be selectable

pub mod cobs;
pub mod xbus;

pub use cobs::CobsLocator;
pub use xbus::XbusLocator;

use crate::config::Protocol;
use std::sync::Arc;

/// Outcome of one locator query over a byte window
///
/// Offsets are relative to the start of the queried window.
/// When both are present, `incomplete < start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Bytes to skip before the located message begins (`None` = not found)
    pub start: Option<usize>,
    /// Offset of an earlier, plausible but truncated candidate
    pub incomplete: Option<usize>,
    /// Length of the complete message at `start`
    pub size: usize,
}

impl Location {
    /// A complete candidate of `size` bytes at `start`
    pub fn found(start: usize, size: usize) -> Self {
        Self {
            start: Some(start),
            incomplete: None,
            size,
        }
    }

    /// Nothing usable in the window
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Attach the offset of a truncated candidate seen before `start`
    pub fn with_incomplete(mut self, incomplete: Option<usize>) -> Self {
        self.incomplete = incomplete;
        self
    }

    /// Whether a complete candidate was located
    pub fn is_found(&self) -> bool {
        self.start.is_some()
    }

    /// Check the ordering and bounds guarantees against the queried window
    pub fn is_consistent(&self, window_len: usize) -> bool {
        match (self.start, self.incomplete) {
            (None, _) => true,
            (Some(start), incomplete) => {
                incomplete.map_or(true, |i| i < start)
                    && start
                        .checked_add(self.size)
                        .map_or(false, |end| end > 0 && end <= window_len)
            }
        }
    }
}

/// Locator trait for finding framed messages in raw bytes
///
/// A locator is stateless from the extractor's point of view: it is
/// queried once per loop iteration over the current window and never
/// mutated. Implementations must be safe to share between extractors.
pub trait Locator: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Find the next complete candidate in `window`
    ///
    /// Reports the first truncated-but-plausible candidate preceding it
    /// (if any) through `Location::incomplete`.
    fn find_candidate(&self, window: &[u8]) -> Location;

    /// Structural sanity check of a located candidate
    ///
    /// `candidate` is exactly the `size` bytes at `start`.
    fn validate(&self, candidate: &[u8]) -> bool;
}

/// Build the locator for a configured protocol
pub fn for_protocol(protocol: Protocol) -> Arc<dyn Locator> {
    match protocol {
        Protocol::Xbus => Arc::new(XbusLocator::new()),
        Protocol::Cobs => Arc::new(CobsLocator::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_consistent() {
        let loc = Location::not_found().with_incomplete(Some(3));
        assert!(!loc.is_found());
        assert!(loc.is_consistent(0));
    }

    #[test]
    fn test_incomplete_must_precede_start() {
        assert!(Location::found(4, 2).with_incomplete(Some(1)).is_consistent(6));
        assert!(!Location::found(4, 2).with_incomplete(Some(4)).is_consistent(6));
        assert!(!Location::found(4, 2).with_incomplete(Some(5)).is_consistent(6));
    }

    #[test]
    fn test_candidate_must_fit_window() {
        assert!(Location::found(0, 6).is_consistent(6));
        assert!(!Location::found(1, 6).is_consistent(6));
    }

    #[test]
    fn test_oversized_candidate_rejected_without_overflow() {
        assert!(!Location::found(1, usize::MAX).is_consistent(6));
        assert!(!Location::found(usize::MAX, 1).is_consistent(6));
    }

    #[test]
    fn test_empty_candidate_at_origin_rejected() {
        assert!(!Location::found(0, 0).is_consistent(4));
    }

    #[test]
    fn test_for_protocol_names() {
        assert_eq!(for_protocol(Protocol::Xbus).name(), "xbus");
        assert_eq!(for_protocol(Protocol::Cobs).name(), "cobs");
    }
}
