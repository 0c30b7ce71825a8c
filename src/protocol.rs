//! SIS command encoding and receive-side line framing.
//!
//! All functions are pure (no I/O), fully unit-testable.

use std::fmt;

use tracing::{trace, warn};

use crate::types::Input;

/// Longest line kept before the framer gives up and resets.
pub const MAX_LINE_LEN: usize = 256;

/// A command sent to the switcher. Fire-and-forget: the device confirms
/// asynchronously with a later message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `I`: request a full status dump.
    Query,
    /// `F2` when enabling auto-switch mode, `F1` when returning to manual.
    SetAutoMode(bool),
    /// `<n>!`: route video and audio to input `n`.
    SelectInput(Input),
}

impl Command {
    /// The ASCII token, without terminator.
    pub fn token(&self) -> String {
        match self {
            Command::Query => "I".to_string(),
            Command::SetAutoMode(true) => "F2".to_string(),
            Command::SetAutoMode(false) => "F1".to_string(),
            Command::SelectInput(input) => format!("{input}!"),
        }
    }

    /// Encode as wire bytes with the CR terminator appended.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}\r", self.token()).into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Accumulates received bytes into lines terminated by CR and/or LF.
///
/// Terminators on an empty buffer are swallowed, so `\r\n` pairs and idle
/// line noise never produce empty lines. Non-ASCII bytes are dropped. A line
/// longer than [`MAX_LINE_LEN`] is discarded up to its terminator.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: String,
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a completed line when a terminator closes a
    /// non-empty buffer.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\r' | b'\n' => {
                if std::mem::take(&mut self.discarding) || self.buf.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.buf))
                }
            }
            _ if self.discarding => None,
            b if b.is_ascii() => {
                if self.buf.len() >= MAX_LINE_LEN {
                    warn!(len = self.buf.len(), "line too long, discarding it");
                    self.buf.clear();
                    self.discarding = true;
                } else {
                    self.buf.push(b as char);
                }
                None
            }
            b => {
                trace!("dropping undecodable byte {b:#04X}");
                None
            }
        }
    }

    /// Feed a slice, collecting every completed line.
    pub fn push_all(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Bytes buffered towards the next line.
    pub fn pending(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(n: u8) -> Input {
        Input::new(n).unwrap()
    }

    #[test]
    fn test_encode_query() {
        assert_eq!(Command::Query.encode(), b"I\r");
    }

    #[test]
    fn test_encode_mode() {
        assert_eq!(Command::SetAutoMode(true).encode(), b"F2\r");
        assert_eq!(Command::SetAutoMode(false).encode(), b"F1\r");
    }

    #[test]
    fn test_encode_select_input() {
        assert_eq!(Command::SelectInput(input(1)).encode(), b"1!\r");
        assert_eq!(Command::SelectInput(input(6)).encode(), b"6!\r");
    }

    #[test]
    fn test_display_is_token() {
        assert_eq!(Command::SelectInput(input(3)).to_string(), "3!");
        assert_eq!(Command::Query.to_string(), "I");
    }

    #[test]
    fn test_framer_cr_and_lf() {
        let mut framer = LineFramer::new();
        let lines = framer.push_all(b"In5 All\r\nC4\nReconfig\r");
        assert_eq!(lines, vec!["In5 All", "C4", "Reconfig"]);
        assert_eq!(framer.pending(), "");
    }

    #[test]
    fn test_framer_ignores_bare_terminators() {
        let mut framer = LineFramer::new();
        assert!(framer.push_all(b"\r\n\r\r\n").is_empty());
    }

    #[test]
    fn test_framer_keeps_partial_line() {
        let mut framer = LineFramer::new();
        assert!(framer.push_all(b"V3 A3").is_empty());
        assert_eq!(framer.pending(), "V3 A3");
        assert_eq!(framer.push_all(b" F1\r"), vec!["V3 A3 F1"]);
    }

    #[test]
    fn test_framer_drops_non_ascii() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push_all(b"C\xFF3\r"), vec!["C3"]);
    }

    #[test]
    fn test_framer_discards_overlong_line() {
        let mut framer = LineFramer::new();
        let noise = vec![b'x'; MAX_LINE_LEN];
        assert!(framer.push_all(&noise).is_empty());
        assert!(framer.push_all(b"C2\r").is_empty());
        assert_eq!(framer.pending(), "");
        assert_eq!(framer.push_all(b"C2\r"), vec!["C2"]);
    }

    #[test]
    fn test_framer_accepts_line_at_limit() {
        let mut framer = LineFramer::new();
        let mut line = vec![b'x'; MAX_LINE_LEN];
        line.push(b'\r');
        let lines = framer.push_all(&line);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE_LEN);
    }
}
