//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Extraction
// =============================================================================

/// Process calls to wait on an incomplete message before skipping over it
pub const MAX_INCOMPLETE_RETRY_COUNT: u32 = 5;

/// Initial capacity of the stream buffer
pub const STREAM_BUFFER_CAPACITY: usize = 4096;

/// Leading bytes of the next message dumped when an incomplete candidate is abandoned
pub const ABANDON_DUMP_BYTES: usize = 5;

// =============================================================================
// Serial
// =============================================================================

/// Default baud rate (ignored by USB CDC devices)
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial read timeout (milliseconds)
pub const SERIAL_READ_TIMEOUT_MS: u64 = 10;

/// Serial read buffer size
pub const SERIAL_BUFFER_SIZE: usize = 4096;

/// Consecutive zero-byte reads before assuming port disconnected
pub const SERIAL_DISCONNECT_THRESHOLD: u32 = 10;

// =============================================================================
// Replay
// =============================================================================

/// Default chunk size when replaying a capture file
pub const DEFAULT_REPLAY_CHUNK_SIZE: usize = 256;

// =============================================================================
// Timing
// =============================================================================

/// Delay between serial reconnection attempts (seconds)
pub const RECONNECT_DELAY_SECS: u64 = 2;

/// Delay after connection loss before retry (seconds)
pub const POST_DISCONNECT_DELAY_SECS: u64 = 3;

/// Shutdown flag polling interval inside a session (milliseconds)
pub const SHUTDOWN_POLL_MS: u64 = 100;

/// Interval between throughput summaries (seconds)
pub const STATS_INTERVAL_SECS: u64 = 5;

/// Minimum interval between rate updates (seconds)
pub const RATE_UPDATE_MIN_INTERVAL_SECS: f64 = 0.1;

// =============================================================================
// Buffers
// =============================================================================

/// Channel capacity for async message passing
pub const CHANNEL_CAPACITY: usize = 256;
