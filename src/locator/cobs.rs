//! COBS (Consistent Overhead Byte Stuffing) framing
//!
//! Encodes data so 0x00 never appears in payload, allowing it as frame delimiter.
//! The locator reports each encoded frame together with its trailing delimiter;
//! use `decode_frame` to recover the payload of an extracted message.

use super::{Locator, Location};
use bytes::{Bytes, BytesMut};
use std::fmt;

pub const MAX_FRAME_SIZE: usize = 4096;
pub const DELIMITER: u8 = 0x00;

#[derive(Debug)]
pub enum CobsError {
    FrameTooLarge(usize),
    InvalidEncoding,
}

impl fmt::Display for CobsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooLarge(size) => {
                write!(f, "Frame too large: {} bytes (max {})", size, MAX_FRAME_SIZE)
            }
            Self::InvalidEncoding => write!(f, "Invalid COBS encoding"),
        }
    }
}

impl std::error::Error for CobsError {}

/// Encode data using COBS into provided buffer
///
/// Clears output buffer, encodes data with trailing 0x00 delimiter.
/// Returns number of bytes written.
pub fn encode_into(data: &[u8], output: &mut Vec<u8>) -> Result<usize, CobsError> {
    if data.len() > MAX_FRAME_SIZE - 2 {
        return Err(CobsError::FrameTooLarge(data.len()));
    }

    output.clear();
    output.reserve(data.len() + (data.len() / 254) + 2);

    let mut code_index = 0;
    output.push(0);
    let mut code: u8 = 1;

    for &byte in data {
        if byte == 0 {
            output[code_index] = code;
            code_index = output.len();
            output.push(0);
            code = 1;
        } else {
            output.push(byte);
            code += 1;
            if code == 255 {
                output[code_index] = code;
                code_index = output.len();
                output.push(0);
                code = 1;
            }
        }
    }

    output[code_index] = code;
    output.push(DELIMITER);
    Ok(output.len())
}

/// Walk the code blocks of an encoded frame without copying
///
/// Input should NOT include trailing delimiter.
/// Returns the decoded length.
fn decoded_len(encoded: &[u8]) -> Result<usize, CobsError> {
    let mut i = 0;
    let mut len = 0;

    while i < encoded.len() {
        let code = encoded[i] as usize;
        if code == 0 {
            return Err(CobsError::InvalidEncoding);
        }

        i += 1;
        let copy_len = code - 1;
        if i + copy_len > encoded.len() {
            return Err(CobsError::InvalidEncoding);
        }

        len += copy_len;
        i += copy_len;
        if code < 255 && i < encoded.len() {
            len += 1;
        }
    }

    Ok(len)
}

/// Decode COBS-encoded data into BytesMut
///
/// Input should NOT include trailing delimiter.
/// Extends the BytesMut buffer (does not clear - caller should clear if needed).
/// Returns number of bytes written.
pub fn decode_into_bytes(encoded: &[u8], output: &mut BytesMut) -> Result<usize, CobsError> {
    let total = decoded_len(encoded)?;
    output.reserve(total);

    let mut i = 0;
    while i < encoded.len() {
        let code = encoded[i] as usize;
        i += 1;
        let copy_len = code - 1;

        output.extend_from_slice(&encoded[i..i + copy_len]);
        i += copy_len;

        if code < 255 && i < encoded.len() {
            output.extend_from_slice(&[0]);
        }
    }

    Ok(total)
}

/// Decode an extracted message (encoded bytes plus delimiter)
pub fn decode_frame(message: &[u8]) -> Result<Bytes, CobsError> {
    let encoded = message.strip_suffix(&[DELIMITER]).unwrap_or(message);
    let mut output = BytesMut::with_capacity(encoded.len());
    decode_into_bytes(encoded, &mut output)?;
    Ok(output.freeze())
}

/// Locator for 0x00-delimited COBS frames
///
/// Empty frames and frames with an invalid encoding are skipped. Bytes
/// after the last delimiter are never reported: nothing complete can
/// follow them, so the extractor simply waits for more data.
#[derive(Debug, Clone, Copy, Default)]
pub struct CobsLocator;

impl CobsLocator {
    pub fn new() -> Self {
        Self
    }
}

impl Locator for CobsLocator {
    fn name(&self) -> &'static str {
        "cobs"
    }

    fn find_candidate(&self, window: &[u8]) -> Location {
        let mut frame_start = 0;

        while let Some(offset) = window[frame_start..].iter().position(|&b| b == DELIMITER) {
            let end = frame_start + offset;
            let encoded = &window[frame_start..end];

            if !encoded.is_empty()
                && encoded.len() <= MAX_FRAME_SIZE
                && decoded_len(encoded).is_ok()
            {
                return Location::found(frame_start, encoded.len() + 1);
            }

            frame_start = end + 1;
        }

        Location::not_found()
    }

    fn validate(&self, candidate: &[u8]) -> bool {
        match candidate.split_last() {
            Some((&DELIMITER, encoded)) => {
                !encoded.is_empty()
                    && !encoded.contains(&DELIMITER)
                    && decoded_len(encoded).is_ok()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(data, &mut out).unwrap();
        out
    }

    #[test]
    fn roundtrip() {
        let cases = vec![
            vec![0x01],
            vec![0x00],
            vec![0x01, 0x02, 0x03],
            vec![0x00, 0x00, 0x00],
            vec![0x01, 0x00, 0x02, 0x00, 0x03],
        ];

        for original in cases {
            let frame = encoded(&original);
            assert_eq!(decode_frame(&frame).unwrap().as_ref(), original.as_slice());
        }
    }

    #[test]
    fn no_zeros_in_encoded() {
        let frame = encoded(&[0x00, 0x01, 0x00, 0x02, 0x00]);
        for &byte in &frame[..frame.len() - 1] {
            assert_ne!(byte, 0x00);
        }
    }

    #[test]
    fn long_run_uses_max_code() {
        let data = vec![0x42; 300];
        let frame = encoded(&data);
        assert_eq!(frame[0], 0xFF);
        assert_eq!(decode_frame(&frame).unwrap().len(), 300);
    }

    #[test]
    fn invalid_encoding_rejected() {
        // Code byte claims 5 bytes, only 2 follow
        assert!(matches!(
            decode_frame(&[0x05, 0x01, 0x02, 0x00]),
            Err(CobsError::InvalidEncoding)
        ));
    }

    #[test]
    fn locate_first_frame() {
        let frame = encoded(&[1, 2, 3]);
        let mut data = frame.clone();
        data.extend_from_slice(&encoded(&[4]));

        let loc = CobsLocator.find_candidate(&data);
        assert_eq!(loc, Location::found(0, frame.len()));
    }

    #[test]
    fn locate_skips_empty_and_invalid_frames() {
        let mut data = vec![0x00, 0x00, 0x05, 0x01, 0x00];
        let frame = encoded(&[7, 8]);
        data.extend_from_slice(&frame);

        let loc = CobsLocator.find_candidate(&data);
        assert_eq!(loc.start, Some(5));
        assert_eq!(loc.size, frame.len());
        assert_eq!(loc.incomplete, None);
    }

    #[test]
    fn locate_ignores_undelimited_tail() {
        let loc = CobsLocator.find_candidate(&[0x03, 0x01, 0x02]);
        assert!(!loc.is_found());
    }

    #[test]
    fn validate_frame() {
        let frame = encoded(&[1, 0, 2]);
        assert!(CobsLocator.validate(&frame));
        assert!(!CobsLocator.validate(&frame[..frame.len() - 1]));
        assert!(!CobsLocator.validate(&[0x00]));
    }
}
