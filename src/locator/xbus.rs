//! XBus message locator
//!
//! Frame layout:
//!
//! ```text
//! 0xFA | BID | MID | LEN | DATA[LEN] | CS
//! 0xFA | BID | MID | 0xFF | LENH | LENL | DATA[LEN] | CS
//! ```
//!
//! The checksum byte makes the sum of every byte after the preamble
//! (BID through CS) equal zero modulo 256.

use super::{Locator, Location};
use std::fmt;

pub const PREAMBLE: u8 = 0xFA;
pub const BID_MASTER: u8 = 0xFF;
/// LEN value announcing a 16-bit extended length
pub const EXTENDED_LENGTH: u8 = 0xFF;
pub const MAX_PAYLOAD_SIZE: usize = 2048;

const HEADER_SIZE: usize = 4;
const EXTENDED_HEADER_SIZE: usize = 6;

#[derive(Debug)]
pub enum XbusError {
    FrameTooLarge(usize),
}

impl fmt::Display for XbusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooLarge(size) => {
                write!(f, "Payload too large: {} bytes (max {})", size, MAX_PAYLOAD_SIZE)
            }
        }
    }
}

impl std::error::Error for XbusError {}

/// Result of reading a header at a preamble position
#[derive(Debug, PartialEq, Eq)]
enum Header {
    /// Not enough bytes to read the length yet
    Truncated,
    /// Announced length is out of range
    Invalid,
    /// Total frame size including preamble and checksum
    Frame(usize),
}

fn parse_header(bytes: &[u8]) -> Header {
    if bytes.len() < HEADER_SIZE {
        return Header::Truncated;
    }

    let (header, payload) = if bytes[3] == EXTENDED_LENGTH {
        if bytes.len() < EXTENDED_HEADER_SIZE {
            return Header::Truncated;
        }
        let len = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        (EXTENDED_HEADER_SIZE, len)
    } else {
        (HEADER_SIZE, bytes[3] as usize)
    };

    if payload > MAX_PAYLOAD_SIZE {
        return Header::Invalid;
    }

    Header::Frame(header + payload + 1)
}

fn checksum_ok(frame: &[u8]) -> bool {
    frame[1..].iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0
}

/// Locator for XBus framed messages
///
/// Scans the window for preambles. The first preamble whose header is
/// plausible but whose frame runs past the end of the window is reported
/// as incomplete; scanning continues behind it so a complete message
/// further on can still be found. Frames with a bad checksum are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct XbusLocator;

impl XbusLocator {
    pub fn new() -> Self {
        Self
    }
}

impl Locator for XbusLocator {
    fn name(&self) -> &'static str {
        "xbus"
    }

    fn find_candidate(&self, window: &[u8]) -> Location {
        let mut incomplete = None;
        let mut pos = 0;

        while let Some(offset) = window[pos..].iter().position(|&b| b == PREAMBLE) {
            let at = pos + offset;

            match parse_header(&window[at..]) {
                Header::Truncated => {
                    incomplete.get_or_insert(at);
                }
                Header::Invalid => {}
                Header::Frame(total) => {
                    if at + total > window.len() {
                        incomplete.get_or_insert(at);
                    } else if checksum_ok(&window[at..at + total]) {
                        return Location::found(at, total).with_incomplete(incomplete);
                    }
                }
            }

            pos = at + 1;
        }

        Location::not_found().with_incomplete(incomplete)
    }

    fn validate(&self, candidate: &[u8]) -> bool {
        candidate.first() == Some(&PREAMBLE)
            && parse_header(candidate) == Header::Frame(candidate.len())
            && checksum_ok(candidate)
    }
}

/// Encode an XBus frame into provided buffer
///
/// Clears output buffer. Uses the extended length form for payloads of
/// 255 bytes or more. Returns number of bytes written.
pub fn encode_into(
    bid: u8,
    mid: u8,
    payload: &[u8],
    output: &mut Vec<u8>,
) -> Result<usize, XbusError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(XbusError::FrameTooLarge(payload.len()));
    }

    output.clear();
    output.reserve(payload.len() + EXTENDED_HEADER_SIZE + 1);
    output.extend_from_slice(&[PREAMBLE, bid, mid]);

    if payload.len() >= EXTENDED_LENGTH as usize {
        output.push(EXTENDED_LENGTH);
        output.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        output.push(payload.len() as u8);
    }
    output.extend_from_slice(payload);

    let sum = output[1..].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    output.push(sum.wrapping_neg());
    Ok(output.len())
}

/// Encode an XBus frame into a new buffer
pub fn encode(bid: u8, mid: u8, payload: &[u8]) -> Result<Vec<u8>, XbusError> {
    let mut output = Vec::new();
    encode_into(bid, mid, payload, &mut output)?;
    Ok(output)
}
