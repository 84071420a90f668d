//! File-pair transport to the engine executable
//!
//! One exchange writes a command line to the request file, truncates the
//! response file, runs the engine to completion and reads the response file
//! back. The file pair has no synchronization of its own, so each file gets
//! a process-wide slot and an exchange holds the slots of both its files.

use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Arc, LazyLock, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::TransportError;

/// How long the engine may run before it is killed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between engine exit and reading the response file
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// How long to keep reading engine output once the engine has exited
///
/// A helper the engine left running can hold the pipes open indefinitely.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Exchange slots keyed by absolute file path
static SLOTS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| std::sync::Mutex::new(HashMap::new()));

/// Slots of both files of a pair, in path order
///
/// Every client locks in the same order, so channels that share only one
/// file still take turns without deadlocking.
fn slots_for(request_path: &Path, response_path: &Path) -> Vec<Arc<Mutex<()>>> {
    let mut keys: Vec<PathBuf> = [request_path, response_path]
        .into_iter()
        .map(|path| std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
        .collect();
    keys.sort();
    keys.dedup();

    let mut slots = SLOTS.lock().unwrap_or_else(PoisonError::into_inner);
    keys.into_iter()
        .map(|key| slots.entry(key).or_default().clone())
        .collect()
}

/// Where the engine lives and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    executable: PathBuf,
    request_path: PathBuf,
    response_path: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Duration,
    settle_delay: Duration,
}

impl Channel {
    /// Create a channel with the default timeout and settle delay
    pub fn new(
        executable: impl Into<PathBuf>,
        request_path: impl Into<PathBuf>,
        response_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            request_path: request_path.into(),
            response_path: response_path.into(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Run the engine in this directory
    ///
    /// Request and response paths are used as given, not resolved against it.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn request_path(&self) -> &Path {
        &self.request_path
    }

    pub fn response_path(&self) -> &Path {
        &self.response_path
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

/// Transport client for the engine
///
/// Cheap to clone. Clones, and any other client sharing the request or the
/// response file, take turns: only one exchange runs at a time.
#[derive(Debug, Clone)]
pub struct Client {
    channel: Arc<Channel>,
    slots: Vec<Arc<Mutex<()>>>,
}

impl Client {
    pub fn new(channel: Channel) -> Self {
        let slots = slots_for(channel.request_path(), channel.response_path());
        Self {
            channel: Arc::new(channel),
            slots,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Wait for the exchange slots of both files
    ///
    /// Hold the returned guard across encode, exchange and decode to keep the
    /// whole round trip exclusive.
    pub async fn lock(&self) -> Exchange<'_> {
        let wait_start = Instant::now();
        let mut guards = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            guards.push(slot.lock().await);
        }
        trace!(
            wait_ms = wait_start.elapsed().as_micros() as f64 / 1000.0,
            "Acquired exchange slot"
        );
        Exchange {
            channel: &self.channel,
            _slots: guards,
        }
    }

    /// Run one exchange and return the raw response text
    pub async fn exchange(&self, command_line: &str) -> Result<String, TransportError> {
        self.lock().await.send(command_line).await
    }
}

/// Exclusive access to the file pair
pub struct Exchange<'a> {
    channel: &'a Channel,
    _slots: Vec<MutexGuard<'a, ()>>,
}

impl Exchange<'_> {
    /// Write the command, run the engine and read its reply verbatim
    pub async fn send(&self, command_line: &str) -> Result<String, TransportError> {
        if command_line.contains(&['\n', '\r'][..]) {
            return Err(TransportError::InvalidCommand(command_line.to_string()));
        }

        let channel = self.channel;
        let id = Uuid::new_v4();
        let total_start = Instant::now();

        trace!(exchange = %id, command = command_line, "Writing request");

        tokio::fs::write(&channel.request_path, format!("{command_line}\n"))
            .await
            .map_err(|e| TransportError::io(&channel.request_path, e))?;
        tokio::fs::write(&channel.response_path, b"")
            .await
            .map_err(|e| TransportError::io(&channel.response_path, e))?;

        let run_start = Instant::now();
        let output = self.run_engine(id).await?;
        let run_elapsed = run_start.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(exchange = %id, status = %output.status, "Engine exited with failure");
            return Err(TransportError::BackendFailure {
                status: output.status,
                stderr,
            });
        }
        if !output.stdout.is_empty() {
            trace!(exchange = %id, stdout = %String::from_utf8_lossy(&output.stdout), "Engine stdout");
        }

        // The engine may still be flushing the response file.
        tokio::time::sleep(channel.settle_delay).await;

        let raw = tokio::fs::read_to_string(&channel.response_path)
            .await
            .map_err(|e| TransportError::io(&channel.response_path, e))?;

        debug!(
            exchange = %id,
            bytes = raw.len(),
            total_ms = total_start.elapsed().as_micros() as f64 / 1000.0,
            engine_ms = run_elapsed.as_micros() as f64 / 1000.0,
            "Exchange complete"
        );

        Ok(raw)
    }

    async fn run_engine(&self, id: Uuid) -> Result<Output, TransportError> {
        let channel = self.channel;

        let mut cmd = Command::new(&channel.executable);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        if let Some(dir) = &channel.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let pid = child.id();
        debug!(exchange = %id, pid, executable = %channel.executable.display(), "Engine started");

        let stdout = child.stdout.take().map(|pipe| tokio::spawn(read_pipe(pipe)));
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_pipe(pipe)));

        // Only the engine's own exit is bounded by the timeout; its output is
        // collected afterwards.
        let status = match tokio::time::timeout(channel.timeout, child.wait()).await {
            Ok(result) => result.map_err(|e| TransportError::io(&channel.executable, e))?,
            Err(_) => {
                kill_process_group(pid);
                if let Err(e) = child.start_kill() {
                    debug!(exchange = %id, "Engine already gone: {}", e);
                }
                for reader in [stdout, stderr].into_iter().flatten() {
                    reader.abort();
                }
                warn!(
                    exchange = %id,
                    timeout_ms = channel.timeout.as_millis() as u64,
                    "Engine timed out"
                );
                return Err(TransportError::Timeout {
                    after: channel.timeout,
                });
            }
        };

        Ok(Output {
            status,
            stdout: drain(id, stdout).await,
            stderr: drain(id, stderr).await,
        })
    }

    fn spawn_error(&self, e: std::io::Error) -> TransportError {
        let channel = self.channel;
        if e.kind() != ErrorKind::NotFound {
            return TransportError::io(&channel.executable, e);
        }
        match &channel.working_dir {
            Some(dir) if !dir.is_dir() => TransportError::io(dir, e),
            _ => TransportError::ExecutableNotFound {
                path: channel.executable.clone(),
            },
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(mut pipe: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Collect a pipe reader, giving up after [`PIPE_DRAIN_TIMEOUT`]
async fn drain(id: Uuid, reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Vec<u8> {
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut reader).await {
        Ok(Ok(Ok(bytes))) => bytes,
        Ok(Ok(Err(e))) => {
            debug!(exchange = %id, "Failed to read engine output: {}", e);
            Vec::new()
        }
        Ok(Err(e)) => {
            debug!(exchange = %id, "Engine output reader failed: {}", e);
            Vec::new()
        }
        Err(_) => {
            reader.abort();
            debug!(exchange = %id, "Engine output still open after exit, not waiting for it");
            Vec::new()
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    // The engine leads its own group, so the group id is its pid.
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, "Failed to kill engine process group: {}", e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_defaults() {
        let channel = Channel::new("/opt/engine", "/tmp/in.txt", "/tmp/out.txt");
        assert_eq!(channel.executable(), Path::new("/opt/engine"));
        assert_eq!(channel.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(channel.settle_delay(), DEFAULT_SETTLE_DELAY);
        assert_eq!(channel.working_dir(), None);
    }

    fn share_a_slot(a: &Client, b: &Client) -> bool {
        a.slots
            .iter()
            .any(|x| b.slots.iter().any(|y| Arc::ptr_eq(x, y)))
    }

    #[test]
    fn test_clients_sharing_either_file_share_a_slot() {
        let a = Client::new(Channel::new("engine", "/tmp/slot-in-1.txt", "/tmp/slot-out-1.txt"));
        let same_request = Client::new(Channel::new("other", "/tmp/slot-in-1.txt", "/tmp/slot-out-2.txt"));
        let same_response = Client::new(Channel::new("engine", "/tmp/slot-in-2.txt", "/tmp/slot-out-1.txt"));
        let unrelated = Client::new(Channel::new("engine", "/tmp/slot-in-3.txt", "/tmp/slot-out-3.txt"));

        assert!(share_a_slot(&a, &same_request));
        assert!(share_a_slot(&a, &same_response));
        assert!(!share_a_slot(&a, &unrelated));
    }

    #[test]
    fn test_slots_are_ordered_and_deduplicated() {
        let single = Client::new(Channel::new("engine", "/tmp/slot-both.txt", "/tmp/slot-both.txt"));
        assert_eq!(single.slots.len(), 1);

        let forward = Client::new(Channel::new("engine", "/tmp/slot-x-a.txt", "/tmp/slot-x-b.txt"));
        let reverse = Client::new(Channel::new("engine", "/tmp/slot-x-b.txt", "/tmp/slot-x-a.txt"));
        assert!(Arc::ptr_eq(&forward.slots[0], &reverse.slots[0]));
        assert!(Arc::ptr_eq(&forward.slots[1], &reverse.slots[1]));
    }

    #[tokio::test]
    async fn test_multiline_command_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let request = dir.path().join("input.txt");
        let client = Client::new(Channel::new("engine", &request, dir.path().join("output.txt")));

        let err = client.exchange("LISTALL\nCHECKOUT").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidCommand(_)));
        assert!(!request.exists());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("no-such-engine");
        let client = Client::new(Channel::new(
            &exe,
            dir.path().join("input.txt"),
            dir.path().join("output.txt"),
        ));

        match client.exchange("LISTALL").await {
            Err(TransportError::ExecutableNotFound { path }) => assert_eq!(path, exe),
            other => panic!("expected ExecutableNotFound, got {:?}", other),
        }
    }

    #[cfg(unix)]
    mod engine {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Scratch directory with a file pair and a shell-script engine
        struct FakeEngine {
            dir: TempDir,
        }

        impl FakeEngine {
            fn new(body: &str) -> Self {
                let dir = tempfile::tempdir().unwrap();
                let script = dir.path().join("engine.sh");
                fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
                fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
                Self { dir }
            }

            fn path(&self, name: &str) -> PathBuf {
                self.dir.path().join(name)
            }

            fn channel(&self) -> Channel {
                self.channel_for("input.txt", "output.txt")
            }

            fn channel_for(&self, request: &str, response: &str) -> Channel {
                Channel::new(self.path("engine.sh"), self.path(request), self.path(response))
                    .with_working_dir(self.dir.path())
                    .with_settle_delay(Duration::from_millis(10))
            }
        }

        #[tokio::test]
        async fn test_exchange_round_trip() {
            let engine = FakeEngine::new(
                "cp input.txt seen.txt\nprintf 'ALL_PRODUCTS\\nA|1|2|x\\nPRODUCTS_END\\n' > output.txt",
            );
            let client = Client::new(engine.channel());

            let raw = client.exchange("LISTALL").await.unwrap();
            assert_eq!(raw, "ALL_PRODUCTS\nA|1|2|x\nPRODUCTS_END\n");
            assert_eq!(fs::read_to_string(engine.path("seen.txt")).unwrap(), "LISTALL\n");
        }

        #[tokio::test]
        async fn test_response_file_is_truncated_before_the_engine_runs() {
            let engine = FakeEngine::new("wc -c < output.txt | tr -d ' ' > size.txt");
            fs::write(engine.path("output.txt"), "STALE REPLY\n").unwrap();
            let client = Client::new(engine.channel());

            let raw = client.exchange("SHOWCART").await.unwrap();
            assert_eq!(raw, "");
            assert_eq!(fs::read_to_string(engine.path("size.txt")).unwrap().trim(), "0");
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_backend_failure() {
            let engine = FakeEngine::new("echo 'cannot open files' >&2\nexit 3");
            let client = Client::new(engine.channel());

            match client.exchange("LISTALL").await {
                Err(TransportError::BackendFailure { status, stderr }) => {
                    assert_eq!(status.code(), Some(3));
                    assert_eq!(stderr, "cannot open files");
                }
                other => panic!("expected BackendFailure, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_timeout_is_bounded() {
            let engine = FakeEngine::new("sleep 10");
            let client = Client::new(engine.channel().with_timeout(Duration::from_millis(200)));

            let start = Instant::now();
            let err = client.exchange("LISTALL").await.unwrap_err();
            assert!(err.is_timeout());
            assert!(start.elapsed() < Duration::from_secs(3));
        }

        #[tokio::test]
        async fn test_exchanges_on_one_file_pair_do_not_overlap() {
            let engine = FakeEngine::new("echo start >> log.txt\nsleep 0.2\necho end >> log.txt");
            let first = Client::new(engine.channel());
            let second = Client::new(engine.channel());

            let (a, b) = tokio::join!(first.exchange("LISTALL"), second.exchange("SHOWCART"));
            a.unwrap();
            b.unwrap();

            let log = fs::read_to_string(engine.path("log.txt")).unwrap();
            assert_eq!(log, "start\nend\nstart\nend\n");
        }

        #[tokio::test]
        async fn test_channels_sharing_only_the_response_file_do_not_overlap() {
            let engine = FakeEngine::new("echo start >> log.txt\nsleep 0.2\necho end >> log.txt");
            let first = Client::new(engine.channel_for("a.txt", "output.txt"));
            let second = Client::new(engine.channel_for("b.txt", "output.txt"));

            let (a, b) = tokio::join!(first.exchange("LISTALL"), second.exchange("SHOWCART"));
            a.unwrap();
            b.unwrap();

            let log = fs::read_to_string(engine.path("log.txt")).unwrap();
            assert_eq!(log, "start\nend\nstart\nend\n");
        }

        #[tokio::test]
        async fn test_background_helper_holding_pipes_is_not_a_timeout() {
            let engine = FakeEngine::new(
                "sleep 3 &\nprintf 'ALL_PRODUCTS\\nPRODUCTS_END\\n' > output.txt\nexit 0",
            );
            let client = Client::new(engine.channel().with_timeout(Duration::from_millis(1500)));

            let start = Instant::now();
            let raw = client.exchange("LISTALL").await.unwrap();
            assert_eq!(raw, "ALL_PRODUCTS\nPRODUCTS_END\n");
            assert!(start.elapsed() < Duration::from_millis(1500));
        }
    }
}
