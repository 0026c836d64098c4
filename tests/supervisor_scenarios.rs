// tests/supervisor_scenarios.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::time::{Duration, Instant};

use dfu_watch::errors::{CallbackError, CallbackStage, LaunchError, SupervisorError};
use dfu_watch::exec::{
    launch_supervised, CommandSpec, NoCallbacks, ProgressUpdate, SupervisionOutcome,
    Supervisor, SupervisorOptions,
};
use dfu_watch::types::SupervisorState;
use dfu_watch_test_utils::recording::{Recorded, RecordingCallbacks};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        idle_delay: Duration::from_millis(10),
        ..SupervisorOptions::default()
    }
}

fn start(cmd: &str, callbacks: RecordingCallbacks) -> Result<Supervisor, LaunchError> {
    Supervisor::start(
        CommandSpec::shell(cmd),
        Some("dev-1".to_string()),
        callbacks,
        fast_options(),
    )
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn progress_lines_then_completion_with_final_progress() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start(
        r"printf 'Downloading 0%%\nDownloading 50%%\nDownloading 100%%\n'",
        recorder.clone(),
    )?;
    let handle = sup.handle().clone();

    let outcome = with_timeout(sup.wait()).await?;

    assert_eq!(
        outcome,
        SupervisionOutcome::Completed {
            exit_code: 0,
            progress: 100
        }
    );
    assert_eq!(recorder.progress_values(), vec![0, 50, 100]);
    assert_eq!(recorder.completions(), vec![(100, Some(0))]);

    assert_eq!(handle.label(), Some("dev-1"));
    assert_eq!(handle.progress(), 100);
    assert_eq!(handle.exit_code(), Some(0));
    assert!(handle.is_complete());
    assert_eq!(handle.state(), SupervisorState::Completed);
    assert_eq!(
        handle.line_log(),
        vec!["Downloading 0%", "Downloading 50%", "Downloading 100%"]
    );
    Ok(())
}

#[tokio::test]
async fn stderr_only_failure_reports_exit_code_and_error_line() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start("printf 'flash failed\\n' >&2; exit 1", recorder.clone())?;
    let handle = sup.handle().clone();

    let outcome = with_timeout(sup.wait()).await?;

    assert_eq!(
        outcome,
        SupervisionOutcome::Completed {
            exit_code: 1,
            progress: 0
        }
    );
    assert_eq!(recorder.completions(), vec![(0, Some(1))]);
    assert_eq!(recorder.error_lines(), vec!["flash failed"]);
    assert!(recorder.output_lines().is_empty());

    assert_eq!(handle.last_error_line().as_deref(), Some("flash failed"));
    assert!(handle.last_error_time().is_some());
    assert_eq!(handle.last_output_line(), None);
    assert_eq!(handle.last_diagnostic_line().as_deref(), Some("flash failed"));
    assert_eq!(handle.exit_code(), Some(1));
    Ok(())
}

#[tokio::test]
async fn closure_callbacks_receive_progress_and_completion() -> TestResult {
    init_tracing();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(u8, bool, Option<i32>)>();
    let sup = launch_supervised(
        "echo 'step 25% done'; echo 'step 75% done'",
        None,
        move |update: &ProgressUpdate| -> anyhow::Result<()> {
            tx.send((update.progress, update.complete, update.exit_code))?;
            Ok(())
        },
    )?;
    assert_eq!(sup.handle().label(), None);

    with_timeout(sup.wait()).await?;

    let mut seen = Vec::new();
    while let Ok(item) = rx.try_recv() {
        seen.push(item);
    }
    assert_eq!(
        seen,
        vec![(25, false, None), (75, false, None), (75, true, Some(0))]
    );
    Ok(())
}

#[tokio::test]
async fn failing_callback_does_not_stop_draining() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new().failing_on("bad");
    let sup = start(
        r"printf 'ok 10%%\nbad line\nafter 20%%\n'",
        recorder.clone(),
    )?;

    let report = with_timeout(sup.join()).await?;

    assert_eq!(
        report.outcome,
        SupervisionOutcome::Completed {
            exit_code: 0,
            progress: 20
        }
    );
    assert_eq!(
        recorder.output_lines(),
        vec!["ok 10%", "bad line", "after 20%"]
    );
    assert_eq!(recorder.completions(), vec![(20, Some(0))]);

    let deferred = report.deferred_error.as_ref().ok_or("expected deferred error")?;
    assert!(matches!(deferred, CallbackError::Failed { .. }));
    assert_eq!(deferred.stage(), CallbackStage::OutputLine);

    assert!(report.into_result().is_err());
    Ok(())
}

#[tokio::test]
async fn panicking_callback_is_isolated() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new().panicking_on("boom");
    let sup = start(r"printf 'boom\nstill here 60%%\n'", recorder.clone())?;

    let report = with_timeout(sup.join()).await?;

    assert!(matches!(
        report.deferred_error,
        Some(CallbackError::Panicked {
            stage: CallbackStage::OutputLine,
            ..
        })
    ));
    assert_eq!(recorder.output_lines(), vec!["boom", "still here 60%"]);
    assert_eq!(recorder.completions(), vec![(60, Some(0))]);
    Ok(())
}

#[tokio::test]
async fn panicking_start_hook_is_deferred_and_process_still_supervised() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new().panicking_on_start();
    let sup = start("echo 'flash 100%'", recorder.clone())?;
    let handle = sup.handle().clone();

    let report = with_timeout(sup.join()).await?;

    assert!(matches!(
        report.deferred_error,
        Some(CallbackError::Panicked {
            stage: CallbackStage::Start,
            ..
        })
    ));
    assert_eq!(
        report.outcome,
        SupervisionOutcome::Completed {
            exit_code: 0,
            progress: 100
        }
    );
    assert_eq!(recorder.output_lines(), vec!["flash 100%"]);
    assert_eq!(recorder.completions(), vec![(100, Some(0))]);
    assert!(handle.is_complete());
    Ok(())
}

#[tokio::test]
async fn completion_error_is_raised_after_completion_was_delivered() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new().failing_on_completion();
    let sup = start("echo hello", recorder.clone())?;

    let result = with_timeout(sup.wait()).await;

    match result {
        Err(SupervisorError::Callback(err)) => {
            assert_eq!(err.stage(), CallbackStage::Completion);
        }
        other => panic!("expected deferred completion error, got {other:?}"),
    }
    assert_eq!(recorder.completions(), vec![(0, Some(0))]);
    Ok(())
}

#[tokio::test]
async fn completion_is_the_last_callback() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start(
        "echo 'a 1%'; echo oops >&2; echo 'b 2%'; echo tail >&2",
        recorder.clone(),
    )?;
    with_timeout(sup.wait()).await?;

    let events = recorder.events();
    assert_eq!(events.first(), Some(&Recorded::Started));
    assert_eq!(
        events.last(),
        Some(&Recorded::Completed {
            progress: 2,
            exit_code: Some(0)
        })
    );
    let completions = events
        .iter()
        .filter(|e| matches!(e, Recorded::Completed { .. }))
        .count();
    assert_eq!(completions, 1);

    // Per-stream order is preserved.
    assert_eq!(recorder.output_lines(), vec!["a 1%", "b 2%"]);
    assert_eq!(recorder.error_lines(), vec!["oops", "tail"]);
    Ok(())
}

#[tokio::test]
async fn trailing_fragment_without_newline_is_flushed() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start(r"printf 'no newline 42%%'", recorder.clone())?;
    let handle = sup.handle().clone();

    with_timeout(sup.wait()).await?;

    assert_eq!(recorder.output_lines(), vec!["no newline 42%"]);
    assert_eq!(recorder.completions(), vec![(42, Some(0))]);
    assert_eq!(handle.last_output_line().as_deref(), Some("no newline 42%"));
    Ok(())
}

#[tokio::test]
async fn carriage_return_progress_yields_one_line_per_update() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start(
        r"printf 'Download 10%%\rDownload 20%%\r\r  Download 30%%  \n'",
        recorder.clone(),
    )?;
    with_timeout(sup.wait()).await?;

    assert_eq!(
        recorder.output_lines(),
        vec!["Download 10%", "Download 20%", "Download 30%"]
    );
    assert_eq!(recorder.progress_values(), vec![10, 20, 30]);
    Ok(())
}

#[tokio::test]
async fn no_output_is_lost_at_exit() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start("seq 1 5000; seq 1 300 >&2", recorder.clone())?;
    let handle = sup.handle().clone();

    with_timeout(sup.wait()).await?;

    let out = recorder.output_lines();
    assert_eq!(out.len(), 5000);
    assert_eq!(out.first().map(String::as_str), Some("1"));
    assert_eq!(out.last().map(String::as_str), Some("5000"));
    assert_eq!(recorder.error_lines().len(), 300);
    assert_eq!(handle.line_log().len(), 5300);
    Ok(())
}

#[tokio::test]
async fn zero_exit_linger_still_drains_all_output() -> TestResult {
    init_tracing();

    let options = SupervisorOptions {
        exit_linger: Duration::ZERO,
        ..fast_options()
    };
    for _ in 0..20 {
        let sup = Supervisor::start(
            CommandSpec::shell("sleep 0.02; seq 1 2000"),
            None,
            NoCallbacks,
            options,
        )?;
        let handle = sup.handle().clone();

        with_timeout(sup.wait()).await?;

        assert_eq!(handle.line_log().len(), 2000);
        assert_eq!(handle.last_output_line().as_deref(), Some("2000"));
    }
    Ok(())
}

#[tokio::test]
async fn zero_exit_linger_with_inherited_pipes_completes_after_quiet_cycles() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let options = SupervisorOptions {
        exit_linger: Duration::ZERO,
        ..fast_options()
    };
    let sup = Supervisor::start(
        CommandSpec::shell("sleep 3 & echo done"),
        None,
        recorder.clone(),
        options,
    )?;

    let started = Instant::now();
    with_timeout(sup.wait()).await?;

    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(recorder.output_lines(), vec!["done"]);
    assert_eq!(recorder.completions(), vec![(0, Some(0))]);
    Ok(())
}

#[tokio::test]
async fn exit_linger_bounds_wait_for_inherited_pipes() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let options = SupervisorOptions {
        idle_delay: Duration::from_millis(10),
        exit_linger: Duration::from_millis(200),
        ..SupervisorOptions::default()
    };
    // The background sleep keeps both pipes open after the shell exits.
    let sup = Supervisor::start(
        CommandSpec::shell("sleep 3 & echo done"),
        None,
        recorder.clone(),
        options,
    )?;

    let started = Instant::now();
    let outcome = with_timeout(sup.wait()).await?;

    assert!(matches!(
        outcome,
        SupervisionOutcome::Completed { exit_code: 0, .. }
    ));
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(recorder.output_lines(), vec!["done"]);
    Ok(())
}

#[tokio::test]
async fn stop_detaches_without_completion_callback() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let options = SupervisorOptions {
        kill_on_stop: true,
        ..fast_options()
    };
    let sup = Supervisor::start(
        CommandSpec::shell("echo started; sleep 30"),
        Some("slow".to_string()),
        recorder.clone(),
        options,
    )?;
    let handle = sup.handle().clone();
    assert!(handle.pid().is_some());

    with_timeout(wait_until(|| !recorder.output_lines().is_empty())).await;
    assert!(!sup.is_finished());

    let report = with_timeout(sup.stop()).await?;

    assert_eq!(report.outcome, SupervisionOutcome::Detached);
    assert!(report.deferred_error.is_none());
    assert!(recorder.completions().is_empty());
    assert_eq!(handle.state(), SupervisorState::Detached);
    assert_eq!(handle.exit_code(), None);
    assert!(!handle.is_complete());
    Ok(())
}

#[tokio::test]
async fn stop_after_completion_returns_completed_report() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let sup = start("exit 3", recorder.clone())?;
    let handle = sup.handle().clone();

    with_timeout(wait_until(|| handle.is_complete())).await;
    let report = with_timeout(sup.stop()).await?;

    assert_eq!(
        report.outcome,
        SupervisionOutcome::Completed {
            exit_code: 3,
            progress: 0
        }
    );
    assert_eq!(recorder.completions(), vec![(0, Some(3))]);
    Ok(())
}

#[tokio::test]
async fn missing_program_is_a_launch_error() -> TestResult {
    init_tracing();

    let result = Supervisor::start(
        CommandSpec::argv("/nonexistent/dfu-tool", ["-l"]),
        None,
        RecordingCallbacks::new(),
        fast_options(),
    );

    match result {
        Err(LaunchError::Spawn { command, .. }) => {
            assert!(command.contains("/nonexistent/dfu-tool"));
        }
        other => panic!("expected spawn error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn empty_command_is_rejected() -> TestResult {
    init_tracing();

    let recorder = RecordingCallbacks::new();
    let result = start("   ", recorder.clone());

    assert!(matches!(result, Err(LaunchError::EmptyCommand)));
    assert!(recorder.events().is_empty());
    Ok(())
}
