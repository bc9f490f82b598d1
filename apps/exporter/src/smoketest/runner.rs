use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

/// How long to wait for stderr EOF after the process has exited. Grandchildren
/// that inherited the pipe can keep it open past the parent's exit.
const STDERR_DRAIN_GRACE: Duration = Duration::from_secs(1);

const STDERR_CHUNK_SIZE: usize = 4096;

/// Outcome of a single command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Exited with status zero within the timeout
    pub completed: bool,

    /// Killed because the timeout elapsed first
    pub timed_out: bool,

    /// Captured standard error, or the launch/exit error when there was none
    pub stderr: String,

    /// Wall-clock time from launch to exit or kill, in whole milliseconds
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn completed(elapsed_ms: u64) -> Self {
        Self { completed: true, timed_out: false, stderr: String::new(), elapsed_ms }
    }

    pub fn timed_out(elapsed_ms: u64) -> Self {
        Self { completed: false, timed_out: true, stderr: String::new(), elapsed_ms }
    }

    pub fn failed(stderr: String, elapsed_ms: u64) -> Self {
        Self { completed: false, timed_out: false, stderr, elapsed_ms }
    }
}

/// Runs smoketest commands. Implementations never fail: every problem is
/// reported through the returned [`RunReport`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &[String], limit: Duration) -> RunReport;
}

/// Runs commands as child processes of the exporter
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn spawn(command: &[String]) -> io::Result<Child> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &[String], limit: Duration) -> RunReport {
        let start = Instant::now();

        let mut child = match Self::spawn(command) {
            Ok(child) => child,
            Err(e) => {
                let program = command.first().map(String::as_str).unwrap_or_default();
                return RunReport::failed(
                    format!("Failed to launch command '{program}': {e}"),
                    elapsed_ms(start),
                );
            }
        };

        let stderr = child.stderr.take().map(StderrCapture::start);

        let status = match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return RunReport::failed(
                    format!("Failed to wait for command: {e}"),
                    elapsed_ms(start),
                );
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill timed out command: {}", e);
                }
                return RunReport::timed_out(elapsed_ms(start));
            }
        };

        let elapsed = elapsed_ms(start);

        if status.success() {
            return RunReport::completed(elapsed);
        }

        let captured = match stderr {
            Some(capture) => capture.finish(STDERR_DRAIN_GRACE).await,
            None => String::new(),
        };

        let message = if captured.trim().is_empty() {
            format!("Command exited with {status}")
        } else {
            captured
        };

        RunReport::failed(message, elapsed)
    }
}

/// Copies stderr into a shared buffer chunk by chunk, so a chatty child never
/// blocks on a full pipe and text written before exit survives a pipe that a
/// grandchild keeps open. The reader task is aborted when the capture drops.
struct StderrCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StderrCapture {
    fn start(mut stderr: ChildStderr) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();

        let task = tokio::spawn(async move {
            let mut chunk = [0u8; STDERR_CHUNK_SIZE];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(read) => {
                        let mut buffer = sink.lock().unwrap_or_else(PoisonError::into_inner);
                        buffer.extend_from_slice(&chunk[..read]);
                    }
                    Err(e) => {
                        debug!("Failed to read command stderr: {}", e);
                        break;
                    }
                }
            }
        });

        Self { buffer, task }
    }

    /// Wait up to `grace` for EOF, then return whatever has arrived
    async fn finish(mut self, grace: Duration) -> String {
        if timeout(grace, &mut self.task).await.is_err() {
            debug!("Command stderr still open after exit, keeping partial output");
        }

        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Drop for StderrCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    (start.elapsed().as_secs_f64() * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[tokio::test]
    async fn test_successful_command() {
        let report = ProcessRunner.run(&command(&["true"]), Duration::from_secs(5)).await;

        assert!(report.completed);
        assert!(!report.timed_out);
        assert!(report.stderr.is_empty());
        assert!(report.elapsed_ms < 5000);
    }

    #[tokio::test]
    async fn test_command_times_out() {
        let start = Instant::now();
        let report = ProcessRunner
            .run(&command(&["sleep", "10"]), Duration::from_millis(200))
            .await;

        assert!(report.timed_out);
        assert!(!report.completed);
        assert!(report.elapsed_ms >= 200);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_non_zero_exit_captures_stderr() {
        let report = ProcessRunner
            .run(
                &command(&["sh", "-c", "echo 'curl: connection refused' >&2; exit 3"]),
                Duration::from_secs(5),
            )
            .await;

        assert!(!report.completed);
        assert!(!report.timed_out);
        assert!(report.stderr.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_without_stderr() {
        let report = ProcessRunner.run(&command(&["false"]), Duration::from_secs(5)).await;

        assert!(!report.completed);
        assert!(!report.timed_out);
        assert!(!report.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_stderr_kept_when_grandchild_holds_pipe() {
        let report = ProcessRunner
            .run(
                &command(&[
                    "sh",
                    "-c",
                    "sleep 5 & echo 'curl: Failed to connect: Connection refused' >&2; exit 7",
                ]),
                Duration::from_secs(3),
            )
            .await;

        assert!(!report.completed);
        assert!(!report.timed_out);
        assert!(report.stderr.contains("Connection refused"));
        assert!(report.elapsed_ms < 3000);
        assert_eq!(
            crate::smoketest::classify("auth", &report.stderr),
            "Smoketest command is unable to connect to service: auth"
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_a_failure() {
        let report = ProcessRunner
            .run(&command(&["/nonexistent/smoketest-binary"]), Duration::from_secs(5))
            .await;

        assert!(!report.completed);
        assert!(!report.timed_out);
        assert!(report.stderr.contains("/nonexistent/smoketest-binary"));

        let report = ProcessRunner.run(&[], Duration::from_secs(5)).await;
        assert!(!report.completed);
        assert!(report.stderr.contains("empty command"));
    }
}
