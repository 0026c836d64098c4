// src/engine/status.rs

//! Status rendering.

use tracing::{error, info};

use crate::exec::ProcessHandle;

/// Where aggregate status and per-flash results go.
pub trait StatusSink: Send {
    /// Render the set of in-flight flashes (launch order).
    fn render(&mut self, active: &[ProcessHandle]);

    fn flash_succeeded(&mut self, handle: &ProcessHandle);

    fn flash_failed(&mut self, handle: &ProcessHandle, exit_code: i32);
}

/// One-line summary: `label 42% last line | label 7% ...`, or `idle`.
pub fn format_status_line(active: &[ProcessHandle]) -> String {
    if active.is_empty() {
        return "idle".to_string();
    }
    active
        .iter()
        .map(|h| match h.last_output_line() {
            Some(line) => format!("{} {:>3}% {}", h.display_name(), h.progress(), line),
            None => format!("{} {:>3}%", h.display_name(), h.progress()),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Sink that writes through `tracing`, skipping unchanged status lines.
#[derive(Debug, Default)]
pub struct LogStatusSink {
    last: Option<String>,
}

impl LogStatusSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for LogStatusSink {
    fn render(&mut self, active: &[ProcessHandle]) {
        let line = format_status_line(active);
        if self.last.as_deref() == Some(line.as_str()) {
            return;
        }
        info!(active = active.len(), status = %line, "status");
        self.last = Some(line);
    }

    fn flash_succeeded(&mut self, handle: &ProcessHandle) {
        info!(label = %handle.display_name(), "flash succeeded");
    }

    fn flash_failed(&mut self, handle: &ProcessHandle, exit_code: i32) {
        let last = handle.last_diagnostic_line().unwrap_or_default();
        error!(
            label = %handle.display_name(),
            exit_code,
            last_line = %last,
            "flash failed"
        );
        for line in handle.line_log() {
            error!(label = %handle.display_name(), "  {line}");
        }
    }
}
