//! msg-extract - print framed messages from a serial port or capture file
//!
//! Usage:
//!   msg-extract                         Read the configured/auto-detected serial port
//!   msg-extract --port /dev/ttyUSB0     Read a specific port
//!   msg-extract --replay capture.bin    Replay a capture file
//!   msg-extract ports                   List serial ports

use bytes::Bytes;
use clap::Parser;
use msg_extractor::cli::{Cli, Command};
use msg_extractor::config::{self, Config};
use msg_extractor::error::{ExtractError, Result};
use msg_extractor::pipeline::{self, Stats};
use msg_extractor::{logging, output, transport};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(Command::Ports) = cli.command {
        for line in transport::serial::list_ports()? {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut config = config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);
    config.validate()?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| ExtractError::Runtime { source: e })?;
    rt.block_on(run_pipeline(config))
}

async fn run_pipeline(config: Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    let format = config.output.format;
    let (sink_tx, sink_rx) = mpsc::channel::<Bytes>(msg_extractor::constants::CHANNEL_CAPACITY);
    let printer = tokio::spawn(output::print_messages(sink_rx, format, std::io::stdout()));

    let stats = Arc::new(Stats::new());
    let result = pipeline::run(&config, sink_tx, shutdown, stats.clone()).await;
    let _ = printer.await;

    let summary = result?;
    info!(
        "{} bytes read, {} messages, {} bytes skipped, {} incomplete messages abandoned",
        stats.rx_bytes(),
        summary.messages,
        summary.skipped_bytes,
        summary.abandoned
    );
    Ok(())
}
