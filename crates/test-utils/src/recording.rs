//! Recording fakes for the supervisor callback, hub indicator and status
//! sink seams.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dfu_watch::engine::{format_status_line, StatusSink};
use dfu_watch::errors::HubError;
use dfu_watch::exec::{ProcessHandle, ProgressUpdate, SupervisorCallbacks};
use dfu_watch::types::IndicatorColor;
use dfu_watch::usb::PortIndicator;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One callback invocation, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Started,
    Output(String),
    Error(String),
    Progress(u8),
    Completed { progress: u8, exit_code: Option<i32> },
}

/// Callbacks that record everything they see.
///
/// Clones share the same record, so keep one clone in the test and hand the
/// other to the supervisor. Can be told to fail or panic on a given line.
#[derive(Debug, Clone, Default)]
pub struct RecordingCallbacks {
    events: Arc<Mutex<Vec<Recorded>>>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    panic_on_start: bool,
    fail_on_completion: bool,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error from the output-line hook for lines containing `text`.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// Panic in the output-line hook for lines containing `text`.
    pub fn panicking_on(mut self, text: &str) -> Self {
        self.panic_on = Some(text.to_string());
        self
    }

    /// Panic in the start hook, after recording the start.
    pub fn panicking_on_start(mut self) -> Self {
        self.panic_on_start = true;
        self
    }

    /// Return an error from the completion notification.
    pub fn failing_on_completion(mut self) -> Self {
        self.fail_on_completion = true;
        self
    }

    pub fn events(&self) -> Vec<Recorded> {
        lock(&self.events).clone()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<(u8, Option<i32>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Completed {
                    progress,
                    exit_code,
                } => Some((progress, exit_code)),
                _ => None,
            })
            .collect()
    }

    pub fn output_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Output(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Error(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Recorded) {
        lock(&self.events).push(event);
    }
}

impl SupervisorCallbacks for RecordingCallbacks {
    fn on_start(&self, _handle: &ProcessHandle) {
        self.push(Recorded::Started);
        if self.panic_on_start {
            panic!("start hook panicked");
        }
    }

    fn on_progress(&self, update: &ProgressUpdate) -> anyhow::Result<()> {
        if update.complete {
            self.push(Recorded::Completed {
                progress: update.progress,
                exit_code: update.exit_code,
            });
            if self.fail_on_completion {
                anyhow::bail!("completion hook failed");
            }
        } else {
            self.push(Recorded::Progress(update.progress));
        }
        Ok(())
    }

    fn on_output_line(&self, _handle: &ProcessHandle, line: &str) -> anyhow::Result<()> {
        self.push(Recorded::Output(line.to_string()));
        if self.panic_on.as_deref().is_some_and(|t| line.contains(t)) {
            panic!("callback panicked on `{line}`");
        }
        if self.fail_on.as_deref().is_some_and(|t| line.contains(t)) {
            anyhow::bail!("callback rejected `{line}`");
        }
        Ok(())
    }

    fn on_error_line(&self, _handle: &ProcessHandle, line: &str) -> anyhow::Result<()> {
        self.push(Recorded::Error(line.to_string()));
        Ok(())
    }
}

/// Port indicator that records every `(port, color)` it is asked to set.
#[derive(Debug, Clone, Default)]
pub struct FakeIndicator {
    calls: Arc<Mutex<Vec<(u8, IndicatorColor)>>>,
    fail: bool,
}

impl FakeIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails, as if the hub had gone away.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(u8, IndicatorColor)> {
        lock(&self.calls).clone()
    }
}

impl PortIndicator for FakeIndicator {
    fn set_indicator(&mut self, port: u8, color: IndicatorColor) -> Result<(), HubError> {
        lock(&self.calls).push((port, color));
        if self.fail {
            return Err(HubError::NotFound {
                vendor_id: 0,
                product_id: 0,
            });
        }
        Ok(())
    }
}

/// A failed flash as reported to a status sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub label: String,
    pub exit_code: i32,
    pub last_line: Option<String>,
    pub log: Vec<String>,
}

/// Status sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    pub renders: Vec<String>,
    pub max_active: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailureReport>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for RecordingStatusSink {
    fn render(&mut self, active: &[ProcessHandle]) {
        self.max_active = self.max_active.max(active.len());
        self.renders.push(format_status_line(active));
    }

    fn flash_succeeded(&mut self, handle: &ProcessHandle) {
        self.succeeded.push(handle.display_name());
    }

    fn flash_failed(&mut self, handle: &ProcessHandle, exit_code: i32) {
        self.failed.push(FailureReport {
            label: handle.display_name(),
            exit_code,
            last_line: handle.last_diagnostic_line(),
            log: handle.line_log(),
        });
    }
}
