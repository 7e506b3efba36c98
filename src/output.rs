//! Message printing

use crate::config::OutputFormat;
use bytes::Bytes;
use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc;

/// One extracted message as printed in JSON lines
#[derive(Debug, Serialize)]
struct MessageRecord<'a> {
    seq: u64,
    timestamp: String, // HH:MM:SS.mmm
    len: usize,
    hex: &'a str,
}

/// Format one extracted message as a single output line
pub fn format_message(seq: u64, message: &[u8], format: OutputFormat) -> String {
    let hex = hex::encode_upper(message);
    match format {
        OutputFormat::Hex => format!("{:>6} {:>5}  {}", seq, message.len(), hex),
        OutputFormat::Json => {
            let record = MessageRecord {
                seq,
                timestamp: chrono::Local::now().format("%H:%M:%S%.3f").to_string(),
                len: message.len(),
                hex: &hex,
            };
            // Plain struct of strings and integers
            serde_json::to_string(&record).unwrap_or_default()
        }
    }
}

/// Print messages from `rx` to `out` until the channel closes
///
/// Messages are numbered from 1. Stops early if `out` fails (e.g. stdout
/// piped into `head`). Returns the number of lines written.
pub async fn print_messages<W: Write>(
    mut rx: mpsc::Receiver<Bytes>,
    format: OutputFormat,
    mut out: W,
) -> u64 {
    let mut seq = 0u64;
    while let Some(message) = rx.recv().await {
        let line = format_message(seq + 1, &message, format);
        if writeln!(out, "{}", line).is_err() {
            break;
        }
        seq += 1;
    }
    seq
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex() {
        let line = format_message(7, &[0xFA, 0xFF, 0x30, 0x00, 0xD1], OutputFormat::Hex);
        assert_eq!(line, "     7     5  FAFF3000D1");
    }

    #[test]
    fn test_format_json() {
        let line = format_message(1, &[0x01, 0xAB], OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["seq"], 1);
        assert_eq!(value["len"], 2);
        assert_eq!(value["hex"], "01AB");
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_print_messages_until_closed() {
        let (tx, rx) = mpsc::channel::<Bytes>(4);
        tx.send(Bytes::from_static(&[0xFA, 0xFF, 0x30, 0x00, 0xD1]))
            .await
            .unwrap();
        tx.send(Bytes::from_static(&[0x01])).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = print_messages(rx, OutputFormat::Hex, &mut out).await;
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["     1     5  FAFF3000D1", "     2     1  01"]);
    }
}
