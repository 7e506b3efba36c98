//! Centralized error types for the extractor
//!
//! All errors are represented by the `ExtractError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, ExtractError>`.
//!
//! Malformed stream content is never an error: it is handled by the
//! extractor's skip policy. Only a missing or misbehaving locator, and the
//! surrounding I/O and configuration, are reported here.

use std::fmt;
use std::path::PathBuf;

/// All extractor errors
#[derive(Debug)]
pub enum ExtractError {
    // === Extraction ===
    /// No locator bound to the extractor
    NoLocator,
    /// Locator returned a location that breaks its contract
    LocatorContract {
        start: Option<usize>,
        incomplete: Option<usize>,
        size: usize,
        window: usize,
    },

    // === Transport ===
    /// Failed to open serial port
    SerialOpen {
        port: String,
        source: std::io::Error,
    },

    // === IO ===
    /// File system operation failed
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read config file
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },

    // === Detection ===
    /// No device found matching configuration
    NoDeviceFound,
    /// Multiple devices found matching configuration
    MultipleDevicesFound { count: usize },

    // === Runtime ===
    /// Tokio runtime creation failed
    Runtime { source: std::io::Error },
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SerialOpen { source, .. }
            | Self::Io { source, .. }
            | Self::ConfigRead { source, .. }
            | Self::Runtime { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLocator => write!(f, "No message locator bound"),
            Self::LocatorContract {
                start,
                incomplete,
                size,
                window,
            } => write!(
                f,
                "Locator contract violated: start={:?} incomplete={:?} size={} window={}",
                start, incomplete, size, window
            ),
            Self::SerialOpen { port, .. } => write!(f, "Cannot open serial port: {}", port),
            Self::Io { path, .. } => write!(f, "IO error: {}", path.display()),
            Self::ConfigRead { path, .. } => {
                write!(f, "Cannot read config: {}", path.display())
            }
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::NoDeviceFound => write!(f, "No device found"),
            Self::MultipleDevicesFound { count } => {
                write!(f, "Multiple devices found ({})", count)
            }
            Self::Runtime { .. } => write!(f, "Failed to create runtime"),
        }
    }
}

/// Alias for Result with ExtractError
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_contract_violation() {
        let err = ExtractError::LocatorContract {
            start: Some(2),
            incomplete: Some(4),
            size: 8,
            window: 16,
        };
        let text = err.to_string();
        assert!(text.contains("start=Some(2)"));
        assert!(text.contains("incomplete=Some(4)"));
    }

    #[test]
    fn test_source_chain() {
        let err = ExtractError::SerialOpen {
            port: "/dev/ttyUSB0".into(),
            source: std::io::Error::other("busy"),
        };
        assert!(err.source().is_some());
        assert!(ExtractError::NoLocator.source().is_none());
    }
}
