//! Launching the node binary and capturing its output.
//!
//! A [`NodeProcess`] owns its two line-reader tasks. `wait()` joins them
//! once the process exits and `terminate()` aborts them after the process
//! is gone, so no reader outlives its handle.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, WardenError};

/// Receives each output line of a subprocess.
pub type LineConsumer = Arc<dyn Fn(String) + Send + Sync>;

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
/// How long `wait()` lets readers drain pipes after the process exits.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A launched subprocess.
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id while the process has not been reaped.
    fn id(&self) -> Option<u32>;

    /// Start forwarding stdout and stderr lines to `consumer` in the
    /// background. Lines from both streams interleave in arrival order.
    fn stream_lines(&mut self, consumer: LineConsumer);

    /// Block until the process exits. Returns its exit code, if it had one.
    async fn wait(&mut self) -> Result<Option<i32>>;

    /// Stop the process and its readers.
    async fn terminate(&mut self) -> Result<()>;
}

/// Launches the node binary with a subcommand line.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command_line: &str) -> Result<Box<dyn ProcessHandle>>;
}

/// Runs the installed node binary with `IPFS_PATH` as its only environment.
pub struct BinaryRunner {
    binary: PathBuf,
    ipfs_path: PathBuf,
    stop_timeout: Duration,
}

impl BinaryRunner {
    pub fn new(binary: impl Into<PathBuf>, ipfs_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ipfs_path: ipfs_path.into(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

impl ProcessRunner for BinaryRunner {
    fn run(&self, command_line: &str) -> Result<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(command_line.split_whitespace())
            .env_clear()
            .env("IPFS_PATH", &self.ipfs_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| WardenError::LaunchFailed {
            binary: self.binary.clone(),
            source,
        })?;

        info!(
            "Started {} {} with PID {:?}",
            self.binary.display(),
            command_line,
            child.id()
        );

        Ok(Box::new(NodeProcess {
            child,
            readers: Vec::new(),
            stop_timeout: self.stop_timeout,
        }))
    }
}

pub struct NodeProcess {
    child: Child,
    readers: Vec<JoinHandle<()>>,
    stop_timeout: Duration,
}

impl NodeProcess {
    async fn join_readers(&mut self) {
        for reader in self.readers.drain(..) {
            let abort = reader.abort_handle();
            if tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
                debug!("Output reader still open after exit, aborting");
                abort.abort();
            }
        }
    }

    fn abort_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }

    #[cfg(unix)]
    async fn stop_gracefully(&mut self, pid: u32) -> Result<()> {
        // SAFETY: plain kill(2) on a pid we spawned and have not yet reaped.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }

        match tokio::time::timeout(self.stop_timeout, self.child.wait()).await {
            Ok(status) => {
                debug!("Process {} exited with {:?}", pid, status?.code());
            }
            Err(_) => {
                warn!("Process {} did not stop in time, force killing", pid);
                self.child.kill().await?;
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn stop_gracefully(&mut self, _pid: u32) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}

#[async_trait]
impl ProcessHandle for NodeProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn stream_lines(&mut self, consumer: LineConsumer) {
        if let Some(stdout) = self.child.stdout.take() {
            self.readers
                .push(tokio::spawn(forward_lines(stdout, Arc::clone(&consumer))));
        }
        if let Some(stderr) = self.child.stderr.take() {
            self.readers
                .push(tokio::spawn(forward_lines(stderr, Arc::clone(&consumer))));
        }
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.wait().await?;
        self.join_readers().await;
        Ok(status.code())
    }

    async fn terminate(&mut self) -> Result<()> {
        let result = match self.child.id() {
            Some(pid) => self.stop_gracefully(pid).await,
            None => Ok(()),
        };
        self.abort_readers();
        result
    }
}

impl Drop for NodeProcess {
    fn drop(&mut self) {
        self.abort_readers();
    }
}

/// Reads newline-delimited text until the stream closes. Read errors end the
/// stream quietly: they are what a terminated process looks like from here.
pub async fn forward_lines<R>(stream: R, consumer: LineConsumer)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => consumer(decode_line(&buf)),
            Err(e) => {
                debug!("Output stream interrupted: {}", e);
                break;
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collector() -> (LineConsumer, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let consumer: LineConsumer = Arc::new(move |line| sink.lock().unwrap().push(line));
        (consumer, seen)
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"last"), "last");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[tokio::test]
    async fn test_forward_lines_until_eof() {
        let (consumer, seen) = collector();
        let input: &[u8] = b"Initializing IPFS node\ngenerating keypair...\r\ndone";
        forward_lines(input, consumer).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Initializing IPFS node", "generating keypair...", "done"]
        );
    }

    #[tokio::test]
    async fn test_forward_lines_stops_on_read_error() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "terminated",
                )))
            }
        }

        let (consumer, seen) = collector();
        forward_lines(Broken, consumer).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_process_ignoring_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("stubborn.sh");
        std::fs::write(
            &script,
            "trap '' TERM\necho up\nwhile :; do /bin/sleep 1; done\n",
        )
        .unwrap();

        // Run through the shell so the freshly written file is never exec'd.
        let runner = BinaryRunner::new("/bin/sh", dir.path())
            .stop_timeout(Duration::from_millis(500));
        let mut process = runner.run(&script.display().to_string()).unwrap();
        let (consumer, seen) = collector();
        process.stream_lines(consumer);
        let pid = process.id().unwrap();

        // The trap is installed once "up" is printed.
        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(*seen.lock().unwrap(), vec!["up"]);

        let started = std::time::Instant::now();
        process.terminate().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(process.id().is_none());
        let alive = unsafe { libc::kill(pid as libc::pid_t, 0) == 0 };
        assert!(!alive);
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_launch() {
        let runner = BinaryRunner::new("/nonexistent/warden/goipfs", "/tmp/ipfs");
        match runner.run("init") {
            Err(WardenError::LaunchFailed { binary, .. }) => {
                assert_eq!(binary, PathBuf::from("/nonexistent/warden/goipfs"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("launch should fail"),
        }
    }
}
