//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.
//! Every flag is optional and overrides the matching config file value.

use crate::config::{OutputFormat, Protocol};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Extract framed messages from a serial port or capture file
#[derive(Parser, Debug, Default)]
#[command(name = "msg-extract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file (default: msg-extract.toml next to the executable)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial port to read (overrides config)
    #[arg(long, value_name = "PORT", conflicts_with = "replay")]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long, value_name = "BAUD")]
    pub baud: Option<u32>,

    /// Replay a capture file instead of reading a serial port
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Bytes per replayed chunk
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Framing protocol
    #[arg(long, value_enum)]
    pub protocol: Option<Protocol>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Calls to wait on an incomplete message before skipping it
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports
    Ports,
}

// =============================================================================
// Tests
// =============================================================================
