//! Configuration management
//!
//! Config file is stored next to the executable as `msg-extract.toml`,
//! or passed explicitly with `--config`. CLI flags override file values.

use crate::cli::Cli;
use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_REPLAY_CHUNK_SIZE, MAX_INCOMPLETE_RETRY_COUNT};
use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "msg-extract.toml";

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub device: DeviceConfig,
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
}

// =============================================================================
// Source Configuration
// =============================================================================

/// Where the byte stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Live serial port. Reconnects when the device is unplugged/replugged.
    #[default]
    Serial,
    /// Capture file replayed in fixed-size chunks
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Serial port name (empty = auto-detect using [device])
    pub serial_port: String,

    /// Baud rate (ignored by USB CDC devices)
    pub baud_rate: u32,

    /// Capture file to replay
    /// Only used when kind = Replay
    pub replay_file: Option<PathBuf>,

    /// Bytes handed to the extractor per replayed chunk
    pub chunk_size: usize,

    /// Pause between replayed chunks (0 = as fast as possible)
    pub replay_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Serial,
            serial_port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            replay_file: None,
            chunk_size: DEFAULT_REPLAY_CHUNK_SIZE,
            replay_interval_ms: 0,
        }
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// USB device detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB Vendor ID
    pub vid: u16,
    /// List of accepted USB Product IDs (empty = any)
    pub pid_list: Vec<u16>,
    /// Platform-specific port name hints (optional)
    pub name_hint: PlatformNameHint,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vid: 0x2639,
            pid_list: Vec::new(),
            name_hint: PlatformNameHint::default(),
        }
    }
}

/// Platform-specific port name hints for device detection fallback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformNameHint {
    /// Windows port name pattern (e.g., "COM")
    pub windows: Option<String>,
    /// macOS port name pattern (e.g., "usbserial")
    pub macos: Option<String>,
    /// Linux port name pattern (e.g., "ttyUSB")
    pub linux: Option<String>,
}

impl PlatformNameHint {
    /// Returns the hint for the current platform
    pub fn current(&self) -> Option<&str> {
        #[cfg(windows)]
        {
            self.windows.as_deref()
        }
        #[cfg(target_os = "macos")]
        {
            self.macos.as_deref()
        }
        #[cfg(target_os = "linux")]
        {
            self.linux.as_deref()
        }
        #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

// =============================================================================
// Extractor Configuration
// =============================================================================

/// Framing protocol used to locate messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// 0xFA-preambled, checksummed XBus frames
    #[default]
    Xbus,
    /// 0x00-delimited COBS frames
    Cobs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub protocol: Protocol,
    /// Calls to wait on an incomplete message before skipping it
    pub max_incomplete_retries: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Xbus,
            max_incomplete_retries: MAX_INCOMPLETE_RETRY_COUNT,
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

/// How extracted messages are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One hex line per message
    #[default]
    Hex,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

// =============================================================================
// Loading / validation
// =============================================================================

impl Config {
    /// Reject values the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.source.chunk_size == 0 {
            return Err(ExtractError::ConfigValidation {
                field: "source.chunk_size",
                reason: "must be greater than 0".into(),
            });
        }
        if self.source.baud_rate == 0 {
            return Err(ExtractError::ConfigValidation {
                field: "source.baud_rate",
                reason: "must be greater than 0".into(),
            });
        }
        if self.extractor.max_incomplete_retries == 0 {
            return Err(ExtractError::ConfigValidation {
                field: "extractor.max_incomplete_retries",
                reason: "must be greater than 0".into(),
            });
        }
        if self.source.kind == SourceKind::Replay && self.source.replay_file.is_none() {
            return Err(ExtractError::ConfigValidation {
                field: "source.replay_file",
                reason: "required when source.kind = \"replay\"".into(),
            });
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref port) = cli.port {
            self.source.kind = SourceKind::Serial;
            self.source.serial_port = port.clone();
        }
        if let Some(baud) = cli.baud {
            self.source.baud_rate = baud;
        }
        if let Some(ref file) = cli.replay {
            self.source.kind = SourceKind::Replay;
            self.source.replay_file = Some(file.clone());
        }
        if let Some(chunk_size) = cli.chunk_size {
            self.source.chunk_size = chunk_size;
        }
        if let Some(protocol) = cli.protocol {
            self.extractor.protocol = protocol;
        }
        if let Some(retries) = cli.max_retries {
            self.extractor.max_incomplete_retries = retries;
        }
        if let Some(format) = cli.format {
            self.output.format = format;
        }
    }
}

/// Default config path (next to the executable)
pub fn default_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| ExtractError::ConfigRead {
        path: PathBuf::from("executable"),
        source: e,
    })?;
    let exe_dir = exe.parent().ok_or_else(|| ExtractError::ConfigValidation {
        field: "exe_path",
        reason: "no parent directory".into(),
    })?;
    Ok(exe_dir.join(CONFIG_FILE_NAME))
}

/// Read and parse a config file
pub fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| ExtractError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ExtractError::ConfigValidation {
        field: "config",
        reason: format!("{}: {}", path.display(), e),
    })
}

/// Load config
///
/// An explicit path must exist and parse. Otherwise the default file is
/// tried, falling back to defaults when it is missing or broken.
pub fn load(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return load_from(path);
    }

    let path = match default_path() {
        Ok(p) => p,
        Err(e) => {
            warn!("Failed to determine config path: {}, using defaults", e);
            return Ok(Config::default());
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    match load_from(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("{}, using defaults", e);
            Ok(Config::default())
        }
    }
}

/// Save config to file
pub fn save(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).map_err(|e| ExtractError::ConfigValidation {
        field: "config",
        reason: e.to_string(),
    })?;
    fs::write(path, content).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

// ============================================================================
// Tests
// ============================================================================
