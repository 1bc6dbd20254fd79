//! Step executor: runs one step's shell command with a wall-clock timeout.
//!
//! The command is an opaque shell string handed to `sh -c`, spawned into its
//! own process group so a timed-out step's children die with it. Stdout and
//! stderr are drained by reader threads (a full pipe buffer can otherwise
//! deadlock a child that writes more than the kernel buffers).
//!
//! The executor never returns an error to the caller: spawn failures,
//! nonzero exits, and timeouts are all classified into a `StepResult`.

use crate::step::{Step, StepResult};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting for a child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute a step's command and classify the outcome.
///
/// - `PASS`: exit code 0 within the timeout.
/// - `FAIL`: nonzero exit, death by signal, or a spawn error.
/// - `TIMEOUT`: the deadline expired; the process group was killed and the
///   result's error message contains "Timeout".
///
/// `SKIP` is never produced here; only the run coordinator assigns it.
pub fn execute(step: &Step) -> StepResult {
    let start = Instant::now();

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&step.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return StepResult::fail(
                step,
                elapsed_ms(start),
                String::new(),
                format!("failed to spawn shell for step '{}': {}", step.id, e),
                None,
            );
        }
    };

    let stdout_reader = spawn_drain(child.stdout.take());
    let stderr_reader = spawn_drain(child.stderr.take());

    let timeout = Duration::from_secs(step.timeout);
    let waited = wait_with_timeout(&mut child, timeout);

    let output = join_drain(stdout_reader);
    let errout = join_drain(stderr_reader);
    let duration_ms = elapsed_ms(start);

    match waited {
        Waited::Exited(status) => classify_exit(step, status, duration_ms, output, errout),
        Waited::TimedOut => StepResult::timeout(step, duration_ms, output),
        Waited::WaitError(msg) => StepResult::fail(step, duration_ms, output, msg, None),
    }
}

fn classify_exit(
    step: &Step,
    status: ExitStatus,
    duration_ms: u64,
    output: String,
    errout: String,
) -> StepResult {
    if status.success() {
        return StepResult::pass(step, duration_ms, output);
    }

    match status.code() {
        Some(code) => {
            let error = if errout.is_empty() {
                format!("Command failed with exit code {}", code)
            } else {
                errout
            };
            StepResult::fail(step, duration_ms, output, error, Some(code))
        }
        // Killed by a signal we did not send (the timeout path never reaches
        // here; it is classified before wait status inspection).
        None => StepResult::fail(
            step,
            duration_ms,
            output,
            format!("Command terminated by signal: {}", errout),
            None,
        ),
    }
}

enum Waited {
    Exited(ExitStatus),
    TimedOut,
    WaitError(String),
}

/// Poll the child until it exits or the timeout expires.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Waited {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Waited::Exited(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    kill_process_group(child);
                    return Waited::TimedOut;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Waited::WaitError(format!("failed to check process status: {}", e)),
        }
    }
}

/// Kill the child and everything in its process group.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // The child was spawned with process_group(0), so its pid is the pgid.
        unsafe {
            libc::killpg(child.id() as i32, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Drain a pipe on a background thread so the child never blocks on a full
/// pipe buffer.
fn spawn_drain<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).to_string())
        .unwrap_or_default()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
