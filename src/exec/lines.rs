// src/exec/lines.rs

//! Reassembly of text lines from arbitrarily split byte chunks.
//!
//! `\r` and `\n` both terminate a line, so carriage-return progress bars
//! (`"  10%\r  20%\r"`) yield one line per update. Completed lines are
//! whitespace-trimmed and empty fragments are dropped, which applies to
//! stdout and stderr alike.

/// Accumulates bytes until a line terminator arrives.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed (in order).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if let Some(line) = self.take_line() {
                    lines.push(line);
                }
            } else {
                self.buf.push(byte);
            }
        }
        lines
    }

    /// Flush a trailing fragment that never saw a terminator.
    pub fn finish(&mut self) -> Option<String> {
        self.take_line()
    }

    /// True when no partial line is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take_line(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&raw);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
