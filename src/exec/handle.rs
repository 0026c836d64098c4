// src/exec/handle.rs

//! Observable state of one supervised process.
//!
//! A [`ProcessHandle`] is a cheap, cloneable view. The supervisor's drain loop
//! is the only writer (the mutators are crate-private); any number of
//! observers may read at any time. Scalars are atomics; the exit code lives
//! in a `OnceLock` so it can be set exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::SystemTime;

use crate::types::SupervisorState;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One line of output and when it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedLine {
    pub text: String,
    pub at: SystemTime,
}

#[derive(Debug, Default)]
struct OutputLog {
    last_output: Option<TimedLine>,
    last_error: Option<TimedLine>,
    lines: Vec<String>,
}

#[derive(Debug)]
struct Shared {
    id: u64,
    label: Option<String>,
    command: String,
    pid: Option<u32>,
    state: AtomicU8,
    progress: AtomicU8,
    exit_code: OnceLock<i32>,
    output: RwLock<OutputLog>,
}

/// Shared, read-only view of a supervised process.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<Shared>,
}

impl ProcessHandle {
    pub(crate) fn new(label: Option<String>, command: String, pid: Option<u32>) -> Self {
        Self {
            inner: Arc::new(Shared {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                label,
                command,
                pid,
                state: AtomicU8::new(SupervisorState::Running.as_u8()),
                progress: AtomicU8::new(0),
                exit_code: OnceLock::new(),
                output: RwLock::new(OutputLog::default()),
            }),
        }
    }

    /// Process-unique identity; increases with every launch.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Label if one was given, otherwise `#<id>`.
    pub fn display_name(&self) -> String {
        match &self.inner.label {
            Some(label) => label.clone(),
            None => format!("#{}", self.inner.id),
        }
    }

    pub fn command(&self) -> &str {
        &self.inner.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn state(&self) -> SupervisorState {
        SupervisorState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// True once the exit code is recorded and all output was dispatched.
    pub fn is_complete(&self) -> bool {
        self.state() == SupervisorState::Completed
    }

    /// Last percentage seen on stdout (0 until one is seen).
    pub fn progress(&self) -> u8 {
        self.inner.progress.load(Ordering::Acquire)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.inner.exit_code.get().copied()
    }

    pub fn last_output_line(&self) -> Option<String> {
        self.read_log(|log| log.last_output.as_ref().map(|l| l.text.clone()))
    }

    pub fn last_output_time(&self) -> Option<SystemTime> {
        self.read_log(|log| log.last_output.as_ref().map(|l| l.at))
    }

    pub fn last_error_line(&self) -> Option<String> {
        self.read_log(|log| log.last_error.as_ref().map(|l| l.text.clone()))
    }

    pub fn last_error_time(&self) -> Option<SystemTime> {
        self.read_log(|log| log.last_error.as_ref().map(|l| l.at))
    }

    /// Most useful line for a failure report: last stderr line, else last
    /// stdout line.
    pub fn last_diagnostic_line(&self) -> Option<String> {
        self.read_log(|log| {
            log.last_error
                .as_ref()
                .or(log.last_output.as_ref())
                .map(|l| l.text.clone())
        })
    }

    /// Every line seen so far, stdout and stderr interleaved in arrival order.
    pub fn line_log(&self) -> Vec<String> {
        self.read_log(|log| log.lines.clone())
    }

    fn read_log<T>(&self, f: impl FnOnce(&OutputLog) -> T) -> T {
        let guard = self
            .inner
            .output
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write_log(&self, f: impl FnOnce(&mut OutputLog)) {
        let mut guard = self
            .inner
            .output
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    pub(crate) fn set_state(&self, state: SupervisorState) {
        self.inner.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn set_progress(&self, progress: u8) {
        self.inner.progress.store(progress, Ordering::Release);
    }

    /// Returns false if an exit code had already been recorded.
    pub(crate) fn set_exit_code(&self, code: i32) -> bool {
        self.inner.exit_code.set(code).is_ok()
    }

    pub(crate) fn record_output(&self, line: &str) {
        let at = SystemTime::now();
        self.write_log(|log| {
            log.last_output = Some(TimedLine {
                text: line.to_string(),
                at,
            });
            log.lines.push(line.to_string());
        });
    }

    pub(crate) fn record_error(&self, line: &str) {
        let at = SystemTime::now();
        self.write_log(|log| {
            log.last_error = Some(TimedLine {
                text: line.to_string(),
                at,
            });
            log.lines.push(line.to_string());
        });
    }
}

impl PartialEq for ProcessHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ProcessHandle {}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("pid", &self.inner.pid)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .field("exit_code", &self.exit_code())
            .finish_non_exhaustive()
    }
}
