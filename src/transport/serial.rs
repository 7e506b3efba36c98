//! Serial transport for USB serial devices
//!
//! A blocking reader thread reads from the port and sends chunks to the
//! channel. The transport stops when:
//! - `shutdown` flag is set
//! - Serial port disconnects (detected via consecutive empty reads or errors)

use super::Transport;
use crate::config::DeviceConfig;
use crate::constants::{
    CHANNEL_CAPACITY, SERIAL_BUFFER_SIZE, SERIAL_DISCONNECT_THRESHOLD, SERIAL_READ_TIMEOUT_MS,
};
use crate::error::{ExtractError, Result};
use bytes::Bytes;
use serialport::{SerialPortInfo, SerialPortType};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Serial transport
///
/// # Example
///
/// ```ignore
/// // Auto-detect device using [device] config
/// let port = SerialTransport::detect(&config.device)?;
/// let rx = SerialTransport::new(&port, 115_200).spawn(shutdown)?;
/// ```
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Create a new serial transport for the specified port
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Detect a USB device matching the given configuration
    ///
    /// Matches on VID (and PID when `pid_list` is not empty). Falls back to
    /// name pattern matching if USB info is not available.
    ///
    /// # Errors
    ///
    /// - `NoDeviceFound` - No matching device found
    /// - `MultipleDevicesFound` - More than one matching device found
    pub fn detect(config: &DeviceConfig) -> Result<String> {
        let ports = serialport::available_ports().unwrap_or_default();

        let matching: Vec<_> = ports.iter().filter(|p| matches_device(p, config)).collect();

        match matching.len() {
            0 => Err(ExtractError::NoDeviceFound),
            1 => Ok(matching[0].port_name.clone()),
            n => Err(ExtractError::MultipleDevicesFound { count: n }),
        }
    }

    /// Open the serial port with a short read timeout
    pub fn open(&self) -> Result<Box<dyn serialport::SerialPort>> {
        serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
            .open()
            .map_err(|e| ExtractError::SerialOpen {
                port: self.port_name.clone(),
                source: std::io::Error::other(e.to_string()),
            })
    }
}

/// Check if a serial port matches the device configuration
fn matches_device(port: &SerialPortInfo, config: &DeviceConfig) -> bool {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => {
            usb.vid == config.vid
                && (config.pid_list.is_empty() || config.pid_list.contains(&usb.pid))
        }
        _ => config
            .name_hint
            .current()
            .map(|hint| port.port_name.contains(hint))
            .unwrap_or(false),
    }
}

/// Describe available ports, one line each
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| ExtractError::SerialOpen {
        port: "<enumerate>".into(),
        source: std::io::Error::other(e.to_string()),
    })?;

    Ok(ports
        .iter()
        .map(|p| match &p.port_type {
            SerialPortType::UsbPort(usb) => format!(
                "{}  usb {:04x}:{:04x} {}",
                p.port_name,
                usb.vid,
                usb.pid,
                usb.product.as_deref().unwrap_or("")
            ),
            _ => p.port_name.clone(),
        })
        .collect())
}

impl Transport for SerialTransport {
    fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<mpsc::Receiver<Bytes>> {
        let (in_tx, in_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
        let mut port = self.open()?;
        let port_name = self.port_name;

        std::thread::spawn(move || {
            let mut buf = [0u8; SERIAL_BUFFER_SIZE];
            let mut consecutive_errors = 0u32;

            while !shutdown.load(Ordering::Relaxed) {
                match port.read(&mut buf) {
                    Ok(n) if n > 0 => {
                        consecutive_errors = 0;
                        if in_tx
                            .blocking_send(Bytes::copy_from_slice(&buf[..n]))
                            .is_err()
                        {
                            // Receiver dropped
                            break;
                        }
                    }
                    Ok(_) => {
                        consecutive_errors += 1;
                        if consecutive_errors > SERIAL_DISCONNECT_THRESHOLD {
                            debug!("{}: too many empty reads, assuming disconnect", port_name);
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        consecutive_errors = 0;
                    }
                    Err(e) => {
                        debug!("{}: read error: {}", port_name, e);
                        break;
                    }
                }
            }
            // Channel closes when in_tx is dropped
        });

        Ok(in_rx)
    }
}
