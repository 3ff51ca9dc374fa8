//! End-to-end runs with `sh` standing in for the checker.

use std::sync::Arc;
use std::time::Duration;

use hushcheck::checker::{Invocation, StreamError};
use hushcheck::config::{CheckConfig, FlagConfig};
use hushcheck::filter::RuleTable;
use hushcheck::output::{CaptureSink, OutputSink, StreamTag};
use hushcheck::supervisor::{
    ExitOutcome, Interruption, Interrupts, RunState, Supervisor, SupervisorError,
    EXIT_STREAM_FAILURE,
};
use tokio::sync::mpsc;

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Invoke `sh -c script sh extra...`; `extra` lands in the flag scan.
fn sh(script: &str, extra: &[&str]) -> Invocation {
    let mut args = vec!["-c".to_string(), script.to_string(), "sh".to_string()];
    args.extend(extra.iter().map(|s| (*s).to_string()));
    Invocation::new("sh", args, &FlagConfig::default())
}

fn supervisor(sink: &Arc<CaptureSink>) -> Supervisor {
    Supervisor::new(
        RuleTable::with_default_rules(),
        Arc::clone(sink) as Arc<dyn OutputSink>,
    )
}

async fn run(supervisor: &mut Supervisor, invocation: &Invocation) -> ExitOutcome {
    tokio::time::timeout(RUN_TIMEOUT, supervisor.run(invocation))
        .await
        .expect("run should finish")
        .expect("run should succeed")
}

/// Send `interruptions` once the sink has seen `marker` on stdout.
fn interrupt_after(
    sink: &Arc<CaptureSink>,
    marker: &'static str,
    interruptions: Vec<Interruption>,
) -> Interrupts {
    let (tx, interrupts) = Interrupts::channel(4);
    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        while !sink.text(StreamTag::Stdout).iter().any(|l| l == marker) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        send_all(&tx, interruptions).await;
    });
    interrupts
}

async fn send_all(tx: &mpsc::Sender<Interruption>, interruptions: Vec<Interruption>) {
    for interruption in interruptions {
        let _ = tx.send(interruption).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

const NOISY_SUMMARY: &str = "\
printf 'No configuration file found.\\n'
printf 'Searching for source files\\n'
printf 'Found 3 source files\\n'
printf '0 errors, 0 warnings, 0 informations \\n'";

#[tokio::test]
async fn noise_is_filtered_from_normal_run() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    let outcome = run(&mut supervisor, &sh(NOISY_SUMMARY, &[])).await;

    assert_eq!(outcome.exit_code(), 0);
    assert!(!outcome.was_interrupted());
    assert_eq!(
        sink.text(StreamTag::Stdout),
        vec!["Found 3 source files", "0 errors, 0 warnings, 0 informations "]
    );
    assert_eq!(outcome.stdout.kept, 2);
    assert_eq!(outcome.stdout.dropped, 2);
    assert_eq!(supervisor.state(), RunState::Completed);
}

#[tokio::test]
async fn structured_output_is_not_filtered() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    let outcome = run(&mut supervisor, &sh(NOISY_SUMMARY, &["--verifytypes", "pkg"])).await;

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(sink.text(StreamTag::Stdout).len(), 4);
    assert_eq!(outcome.stdout.dropped, 0);
}

#[tokio::test]
async fn exit_codes_are_propagated() {
    for code in [0, 1, 2, 3] {
        let sink = Arc::new(CaptureSink::new());
        let mut supervisor = supervisor(&sink);
        let script = format!("echo result; exit {code}");
        let outcome = run(&mut supervisor, &sh(&script, &[])).await;
        assert_eq!(outcome.exit_code(), code);
        assert_eq!(outcome.checker_code, code);
    }
}

#[tokio::test]
async fn checker_killed_by_signal_maps_to_128_plus_signal() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    let outcome = run(&mut supervisor, &sh("kill -TERM $$", &[])).await;
    assert_eq!(outcome.exit_code(), 143);
    assert!(!outcome.was_interrupted());
}

#[tokio::test]
async fn stderr_lines_stay_on_stderr() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    let outcome = run(
        &mut supervisor,
        &sh("echo out; echo oops >&2; echo 'Searching for source files' >&2", &[]),
    )
    .await;

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(sink.text(StreamTag::Stdout), vec!["out"]);
    assert_eq!(sink.text(StreamTag::Stderr), vec!["oops"]);
    assert_eq!(outcome.stderr.dropped, 1);
}

#[tokio::test]
async fn per_stream_order_is_preserved() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    run(
        &mut supervisor,
        &sh("i=0; while [ $i -lt 200 ]; do echo $i; echo e$i >&2; i=$((i+1)); done", &[]),
    )
    .await;

    let expected_out: Vec<String> = (0..200).map(|i| i.to_string()).collect();
    let expected_err: Vec<String> = (0..200).map(|i| format!("e{i}")).collect();
    assert_eq!(sink.text(StreamTag::Stdout), expected_out);
    assert_eq!(sink.text(StreamTag::Stderr), expected_err);
}

#[tokio::test]
async fn large_output_on_both_streams_does_not_deadlock() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    // Fill stderr well past the pipe buffer before stdout sees anything.
    let outcome = run(
        &mut supervisor,
        &sh("yes stderr-line | head -n 50000 >&2; yes stdout-line | head -n 50000", &[]),
    )
    .await;

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.stdout.kept, 50000);
    assert_eq!(outcome.stderr.kept, 50000);
}

#[tokio::test]
async fn unterminated_last_line_gets_newline() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    run(&mut supervisor, &sh("printf 'first\\nlast'", &[])).await;
    assert_eq!(sink.bytes(StreamTag::Stdout), b"first\nlast\n".to_vec());
}

#[tokio::test]
async fn missing_checker_fails_to_spawn() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);
    let invocation =
        Invocation::new("hushcheck-no-such-checker", ["src/"], &FlagConfig::default());

    let err = supervisor.run(&invocation).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn(_)));
    assert_eq!(err.exit_code(), 127);
    assert_eq!(supervisor.state(), RunState::Failed);
    assert!(sink.lines().is_empty());
}

struct BrokenSink;

impl OutputSink for BrokenSink {
    fn write_line(&self, _stream: StreamTag, _line: &[u8]) -> std::io::Result<()> {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }
}

#[tokio::test]
async fn sink_failure_terminates_checker() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let mut supervisor = Supervisor::new(RuleTable::with_default_rules(), Arc::new(BrokenSink))
        .with_terminate_timeout(Duration::from_secs(2));

    let script = format!(
        "echo $$ > '{}'; echo hello; while :; do sleep 0.05; done",
        pid_file.display()
    );
    let err = tokio::time::timeout(RUN_TIMEOUT, supervisor.run(&sh(&script, &["--watch"])))
        .await
        .expect("run should stop after the sink fails")
        .unwrap_err();

    assert!(matches!(
        err,
        SupervisorError::Stream(StreamError::Write {
            stream: StreamTag::Stdout,
            ..
        })
    ));
    assert_eq!(err.exit_code(), EXIT_STREAM_FAILURE);
    assert_eq!(supervisor.state(), RunState::Failed);

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None);
    assert_eq!(alive, Err(nix::errno::Errno::ESRCH));
}

#[tokio::test]
async fn watch_mode_interrupt_is_forwarded_and_shutdown_output_kept() {
    let sink = Arc::new(CaptureSink::new());
    let interrupts = interrupt_after(&sink, "ready", vec![Interruption::Interrupt]);
    let mut supervisor = supervisor(&sink).with_interrupts(interrupts);

    let script = "trap 'echo Searching again; echo stopping; exit 130' INT
echo 'Searching for source files'
echo ready
while :; do sleep 0.05; done";
    let outcome = run(&mut supervisor, &sh(script, &["--watch"])).await;

    assert_eq!(outcome.interruption, Some(Interruption::Interrupt));
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(outcome.checker_code, 130);
    assert_eq!(sink.text(StreamTag::Stdout), vec!["ready", "stopping"]);
}

#[tokio::test]
async fn interruption_code_overrides_clean_checker_exit() {
    let sink = Arc::new(CaptureSink::new());
    let interrupts = interrupt_after(&sink, "ready", vec![Interruption::Terminate]);
    let mut supervisor = supervisor(&sink).with_interrupts(interrupts);

    let script = "trap 'exit 0' INT; echo ready; while :; do sleep 0.05; done";
    let outcome = run(&mut supervisor, &sh(script, &["-w"])).await;

    assert_eq!(outcome.checker_code, 0);
    assert_eq!(outcome.exit_code(), 143);
}

#[tokio::test]
async fn interrupt_traceback_is_suppressed() {
    let sink = Arc::new(CaptureSink::new());
    let interrupts = interrupt_after(&sink, "ready", vec![Interruption::Interrupt]);
    let mut supervisor = supervisor(&sink).with_interrupts(interrupts);

    let script = "on_int() {
  printf 'Traceback (most recent call last):\\n' >&2
  printf '  File \"x.py\", line 1\\n' >&2
  printf 'KeyboardInterrupt\\n' >&2
  echo bye >&2
  exit 130
}
trap on_int INT
echo ready
while :; do sleep 0.05; done";
    let outcome = run(&mut supervisor, &sh(script, &[])).await;

    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(sink.text(StreamTag::Stderr), vec!["bye"]);
    assert_eq!(outcome.stderr.dropped, 3);
}

#[tokio::test]
async fn traceback_without_interruption_is_kept() {
    let sink = Arc::new(CaptureSink::new());
    let mut supervisor = supervisor(&sink);

    let script = "printf 'Traceback (most recent call last):\\nKeyboardInterrupt\\n' >&2; exit 1";
    let outcome = run(&mut supervisor, &sh(script, &[])).await;

    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(sink.text(StreamTag::Stderr).len(), 2);
}

#[tokio::test]
async fn second_interruption_kills_checker() {
    let sink = Arc::new(CaptureSink::new());
    let interrupts = interrupt_after(
        &sink,
        "ready",
        vec![Interruption::Interrupt, Interruption::Interrupt],
    );
    let mut supervisor = supervisor(&sink).with_interrupts(interrupts);

    let script = "trap '' INT; echo ready; while :; do sleep 0.05; done";
    let outcome = run(&mut supervisor, &sh(script, &["--watch"])).await;

    // SIGKILL
    assert_eq!(outcome.checker_code, 137);
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(supervisor.state(), RunState::Completed);
}

#[tokio::test]
async fn stdout_delay_lets_stderr_go_first() {
    let sink = Arc::new(CaptureSink::new());
    let config: CheckConfig = toml::from_str("stdout_delay_ms = 300").unwrap();
    let mut supervisor =
        Supervisor::from_config(&config, Arc::clone(&sink) as Arc<dyn OutputSink>).unwrap();

    run(&mut supervisor, &sh("echo out; echo err >&2", &[])).await;

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], (StreamTag::Stderr, b"err\n".to_vec()));
    assert_eq!(lines[1], (StreamTag::Stdout, b"out\n".to_vec()));
}
