use std::io::{self, Cursor, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ReportError;

/// Upper bound on a single ledger invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a finished process exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A spawned process whose standard output is read through [`Read`].
///
/// Callers read stdout to completion before calling [`RunningProcess::wait`].
pub trait RunningProcess: Read + Send {
    fn wait(self: Box<Self>) -> Result<ProcessExit, ReportError>;

    /// The limit the process was killed for exceeding, if it was.
    fn timed_out(&self) -> Option<Duration> {
        None
    }
}

/// Abstraction over process creation so reports can run against canned output.
pub trait Shell: Send + Sync {
    fn spawn(&self, program: &str, args: &[String]) -> Result<Box<dyn RunningProcess>, ReportError>;
}

// ── Local processes ───────────────────────────────────────────────────────────

pub struct LocalShell {
    timeout: Duration,
}

impl Default for LocalShell {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl LocalShell {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Shell for LocalShell {
    fn spawn(&self, program: &str, args: &[String]) -> Result<Box<dyn RunningProcess>, ReportError> {
        tracing::debug!(program, ?args, "spawning ledger");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;

        // Drained on its own thread so a chatty stderr cannot block stdout.
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        let child = Arc::new(Mutex::new(child));
        let expired = Arc::new(AtomicBool::new(false));
        let (cancel, cancelled) = mpsc::channel::<()>();
        let timeout = self.timeout;
        {
            let child = Arc::clone(&child);
            let expired = Arc::clone(&expired);
            thread::spawn(move || watchdog(child, expired, cancelled, timeout));
        }

        Ok(Box::new(LocalProcess {
            child,
            stdout,
            stderr,
            expired,
            _cancel: cancel,
            timeout,
            reaped: false,
        }))
    }
}

/// Kills the child once `timeout` passes, unless the process handle is dropped
/// first (which disconnects `cancelled`). Killing closes stdout, so a reader
/// blocked on it wakes up.
fn watchdog(
    child: Arc<Mutex<Child>>,
    expired: Arc<AtomicBool>,
    cancelled: Receiver<()>,
    timeout: Duration,
) {
    if cancelled.recv_timeout(timeout) != Err(RecvTimeoutError::Timeout) {
        return;
    }
    let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
    if matches!(child.try_wait(), Ok(None)) {
        expired.store(true, Ordering::SeqCst);
        let _ = child.kill();
        tracing::warn!(?timeout, "ledger timed out, killed");
    }
}

struct LocalProcess {
    child: Arc<Mutex<Child>>,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    expired: Arc<AtomicBool>,
    _cancel: Sender<()>,
    timeout: Duration,
    reaped: bool,
}

impl Read for LocalProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.stdout.read(buf);
        // Output cut short by the watchdog must not pass for a complete report.
        match result {
            Ok(0) | Err(_) if self.expired.load(Ordering::SeqCst) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("ledger exceeded {:?}", self.timeout),
            )),
            other => other,
        }
    }
}

impl RunningProcess for LocalProcess {
    fn wait(mut self: Box<Self>) -> Result<ProcessExit, ReportError> {
        let status = loop {
            let status = self
                .child
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_wait()?;
            if let Some(status) = status {
                break status;
            }
            thread::sleep(POLL_INTERVAL);
        };
        self.reaped = true;

        if self.expired.load(Ordering::SeqCst) {
            return Err(ReportError::Timeout(self.timeout));
        }

        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok(ProcessExit {
            code: status.code(),
            stderr,
        })
    }

    fn timed_out(&self) -> Option<Duration> {
        self.expired.load(Ordering::SeqCst).then_some(self.timeout)
    }
}

impl Drop for LocalProcess {
    fn drop(&mut self) {
        // Abandoned mid-stream: don't leave the child running.
        if !self.reaped {
            let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// ── Mock shell (always available, used for tests) ─────────────────────────────

/// Replies to spawns with canned stdout, in order (the last reply repeats), and
/// records the argument lists it was called with.
pub struct MockShell {
    replies: Vec<String>,
    exit_code: i32,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockShell {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self::with_replies(vec![stdout.into()])
    }

    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies,
            exit_code: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(stdout: impl Into<String>, exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::new(stdout)
        }
    }

    /// Program and arguments of every spawn so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Shell for MockShell {
    fn spawn(&self, program: &str, args: &[String]) -> Result<Box<dyn RunningProcess>, ReportError> {
        let mut calls = self
            .calls
            .lock()
            .map_err(|_| io::Error::other("mock shell lock poisoned"))?;
        let reply = self
            .replies
            .get(calls.len())
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();

        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        calls.push(call);

        Ok(Box::new(MockProcess {
            stdout: Cursor::new(reply.into_bytes()),
            exit_code: self.exit_code,
        }))
    }
}

struct MockProcess {
    stdout: Cursor<Vec<u8>>,
    exit_code: i32,
}

impl Read for MockProcess {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl RunningProcess for MockProcess {
    fn wait(self: Box<Self>) -> Result<ProcessExit, ReportError> {
        Ok(ProcessExit {
            code: Some(self.exit_code),
            stderr: if self.exit_code == 0 {
                String::new()
            } else {
                "mock failure".to_string()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_shell_replays_stdout_and_records_calls() {
        let shell = MockShell::new("a,b\n");
        let mut process = shell.spawn("ledger", &["bal".to_string()]).unwrap();
        let mut out = String::new();
        process.read_to_string(&mut out).unwrap();
        assert_eq!(out, "a,b\n");
        assert!(process.wait().unwrap().success());
        assert_eq!(shell.calls(), vec![vec!["ledger".to_string(), "bal".to_string()]]);
    }

    #[test]
    fn mock_shell_replies_in_order_then_repeats_last() {
        let shell = MockShell::with_replies(vec!["one".to_string(), "two".to_string()]);
        let read = |shell: &MockShell| {
            let mut out = String::new();
            shell.spawn("ledger", &[]).unwrap().read_to_string(&mut out).unwrap();
            out
        };
        assert_eq!(read(&shell), "one");
        assert_eq!(read(&shell), "two");
        assert_eq!(read(&shell), "two");
        assert_eq!(shell.calls().len(), 3);
    }

    #[test]
    fn mock_shell_failure_code() {
        let shell = MockShell::failing("", 2);
        let process = shell.spawn("ledger", &[]).unwrap();
        let exit = process.wait().unwrap();
        assert_eq!(exit.code, Some(2));
        assert!(!exit.success());
    }

    #[cfg(unix)]
    #[test]
    fn local_shell_reads_stdout_then_exit_status() {
        let shell = LocalShell::default();
        let mut process = shell
            .spawn("sh", &["-c".to_string(), "echo hello; exit 3".to_string()])
            .unwrap();
        let mut out = String::new();
        process.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello\n");
        assert_eq!(process.wait().unwrap().code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn local_shell_deadline_applies_while_reading() {
        let limit = Duration::from_millis(200);
        let shell = LocalShell::new(limit);
        let started = std::time::Instant::now();
        let mut process = shell.spawn("sleep", &["5".to_string()]).unwrap();

        let mut out = String::new();
        let read = process.read_to_string(&mut out);
        assert_eq!(read.unwrap_err().kind(), io::ErrorKind::TimedOut);
        assert_eq!(process.timed_out(), Some(limit));
        assert!(matches!(process.wait(), Err(ReportError::Timeout(d)) if d == limit));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn local_shell_fast_process_is_not_timed_out() {
        let shell = LocalShell::new(Duration::from_secs(30));
        let mut process = shell.spawn("sh", &["-c".to_string(), "echo ok".to_string()]).unwrap();
        let mut out = String::new();
        process.read_to_string(&mut out).unwrap();
        assert_eq!(process.timed_out(), None);
        assert!(process.wait().unwrap().success());
    }

    #[cfg(unix)]
    #[test]
    fn local_shell_times_out() {
        let shell = LocalShell::new(Duration::from_millis(100));
        let process = shell
            .spawn("sh", &["-c".to_string(), "sleep 5".to_string()])
            .unwrap();
        assert!(matches!(process.wait(), Err(ReportError::Timeout(_))));
    }

    #[test]
    fn missing_binary_is_io_error() {
        let shell = LocalShell::default();
        let result = shell.spawn("/nonexistent/ledger-binary", &[]);
        assert!(matches!(result, Err(ReportError::Io(_))));
    }
}
