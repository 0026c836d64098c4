// src/exec/mod.rs

//! Process execution layer.
//!
//! This module launches the flashing command and supervises it until every
//! byte of its output has been consumed.
//!
//! - [`launcher`] starts a process with non-blocking access to stdout/stderr.
//! - [`lines`] reassembles lines from arbitrarily split byte chunks.
//! - [`progress`] extracts a percent-complete value from a stdout line.
//! - [`handle`] holds the observable state shared with other threads.
//! - [`callbacks`] defines the progress/completion callback protocol.
//! - [`supervisor`] runs the per-process drain loop.

pub mod callbacks;
pub mod handle;
pub mod launcher;
pub mod lines;
pub mod progress;
pub mod supervisor;

pub use callbacks::{NoCallbacks, ProgressUpdate, SupervisorCallbacks};
pub use handle::{ProcessHandle, TimedLine};
pub use launcher::{launch, CommandSpec, LaunchedProcess, OutputStream, ReadOutcome};
pub use lines::LineAssembler;
pub use progress::extract_progress;
pub use supervisor::{
    launch_supervised, SupervisionOutcome, SupervisionReport, Supervisor, SupervisorOptions,
};
