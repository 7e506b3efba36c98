//! Sliding window over not-yet-consumed stream bytes

use bytes::{Buf, BytesMut};

/// Append-at-tail, trim-from-head byte buffer
///
/// Holds exactly the bytes received but not yet consumed as a message or
/// discarded as garbage. No size limit is enforced here.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    data: BytesMut,
}

impl StreamBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Extend the tail with newly received bytes
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Read-only view from `offset` to the tail
    ///
    /// Panics if `offset > len()`.
    pub fn window_from(&self, offset: usize) -> &[u8] {
        &self.data[offset..]
    }

    /// Permanently discard the first `n` bytes
    ///
    /// Panics if `n > len()`.
    pub fn drop_front(&mut self, n: usize) {
        self.data.advance(n);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
