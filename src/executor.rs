use crate::compare::{interpret_output, outputs_match, serialize_input};
use crate::compiler::{compile, CompileStatus};
use crate::config::GraderConfig;
use crate::error::GraderResult;
use crate::languages::{LanguageConfig, LanguageRegistry};
use crate::scratch::ScratchSpace;
use crate::timer::Stopwatch;
use crate::types::*;
use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Per-stream capture limit. Bytes past it are read and discarded so the
/// child never blocks on a full pipe.
const MAX_CAPTURE_BYTES: usize = 8 * 1024 * 1024;

/// How long to keep collecting output once the child is gone. A forked
/// grandchild can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Build a command that runs `command` through `sh -c` as the leader of a
/// new process group, so everything it starts can be killed together.
pub fn shell_command(command: &str) -> TokioCommand {
    let mut cmd = std::process::Command::new("sh");
    cmd.arg("-c").arg(command).process_group(0);
    TokioCommand::from(cmd)
}

/// Runs one piece of submitted code against one input.
///
/// Holds no mutable state: clones share the language table, and every call
/// works in its own scratch directory, so any number of executions can be
/// in flight at once.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<LanguageRegistry>,
    scratch_root: PathBuf,
    default_timeout: Duration,
}

impl Executor {
    pub fn new(registry: LanguageRegistry, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            registry: Arc::new(registry),
            scratch_root: scratch_root.into(),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(LanguageRegistry::default(), config.scratch_root.clone())
            .with_default_timeout_ms(config.default_timeout_ms)
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        if timeout_ms > 0 {
            self.default_timeout = Duration::from_millis(timeout_ms);
        }
        self
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    fn time_limit(&self, timeout_ms: Option<u64>) -> Duration {
        match timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => self.default_timeout,
        }
    }

    /// Compile (if needed) and run the request's code.
    ///
    /// Every failure of the submitted code, and of the engine while running
    /// it, comes back as an [`Outcome`]. The only `Err` is an unknown
    /// language, reported before anything is written to disk.
    pub async fn execute(&self, request: &ExecutionRequest) -> GraderResult<ExecutionResult> {
        let language = self.registry.resolve(&request.language)?;
        let limit = self.time_limit(request.timeout_ms);
        let scratch = ScratchSpace::new(&self.scratch_root, &language.source_file);
        debug!(
            language = %language.language,
            dir = %scratch.dir().display(),
            timeout_ms = limit.as_millis() as u64,
            "starting execution"
        );

        let result = match self.run_in(&scratch, language, request, limit).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(language = %language.language, error = %message, "execution failed internally");
                ExecutionResult {
                    raw_output: String::new(),
                    execution_time_ms: 0.0,
                    outcome: Outcome::Internal { message },
                }
            }
        };

        scratch.release().await;
        debug!(
            language = %language.language,
            status = result.outcome.status(),
            execution_time_ms = result.execution_time_ms,
            "execution finished"
        );
        Ok(result)
    }

    async fn run_in(
        &self,
        scratch: &ScratchSpace,
        language: &LanguageConfig,
        request: &ExecutionRequest,
        limit: Duration,
    ) -> Result<ExecutionResult> {
        scratch.write_source(&request.code).await?;

        if let Some(command) = language.compile_command_for(scratch.source_path()) {
            if let CompileStatus::Failed(diagnostics) = compile(&command, scratch.dir(), limit).await? {
                info!(language = %language.language, "compilation failed");
                return Ok(ExecutionResult {
                    raw_output: String::new(),
                    execution_time_ms: 0.0,
                    outcome: Outcome::CompileFailed { diagnostics },
                });
            }
        }

        let input = request.input.as_ref().map(serialize_input);
        let command = language.run_command_for(scratch.source_path());
        let run = run_process(&command, scratch.dir(), input, limit).await?;
        Ok(classify(run, request.expected_output.as_ref()))
    }
}

/// What a child process left behind. `status` is `None` when it was killed
/// for running past its limit.
struct ProcessRun {
    stdout: String,
    stderr: String,
    status: Option<ExitStatus>,
    elapsed_ms: f64,
}

type Capture = Arc<Mutex<Vec<u8>>>;

async fn pump<R: AsyncRead + Unpin>(mut stream: R, sink: Capture) {
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut buf) = sink.lock() {
                    let room = MAX_CAPTURE_BYTES.saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
    }
}

fn drain(capture: &Capture) -> String {
    match capture.lock() {
        Ok(mut buf) => String::from_utf8_lossy(&std::mem::take(&mut *buf)).into_owned(),
        Err(_) => String::new(),
    }
}

async fn run_process(
    command: &str,
    cwd: &Path,
    input: Option<String>,
    limit: Duration,
) -> Result<ProcessRun> {
    let mut cmd = shell_command(command);
    cmd.current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let watch = Stopwatch::start();
    let mut child = cmd.spawn().context("Failed to start process")?;
    let pid = child.id();

    let stdout = Capture::default();
    let stderr = Capture::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        readers.push(tokio::spawn(pump(out, stdout.clone())));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(tokio::spawn(pump(err, stderr.clone())));
    }

    // Feed stdin off to the side so a child that prints before reading
    // cannot deadlock us. Dropping the handle closes the stream.
    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            if let Some(text) = input {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    debug!(error = %e, "child stopped reading stdin");
                }
            }
            let _ = stdin.shutdown().await;
        });
    }

    let status = match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => Some(status.context("Failed to wait for process")?),
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed out process");
            }
            info!(timeout_ms = limit.as_millis() as u64, "execution timed out");
            None
        }
    };
    let elapsed_ms = watch.elapsed_ms();
    // whatever the program left running in the background goes too
    if let Some(pid) = pid {
        kill_process_group(pid);
    }

    let aborts: Vec<_> = readers.iter().map(|r| r.abort_handle()).collect();
    if tokio::time::timeout(DRAIN_GRACE, futures::future::join_all(readers))
        .await
        .is_err()
    {
        debug!("output streams still open after exit, keeping what was captured");
        aborts.iter().for_each(|a| a.abort());
    }

    Ok(ProcessRun {
        stdout: drain(&stdout),
        stderr: drain(&stderr),
        status,
        elapsed_ms,
    })
}

/// SIGKILL every process in the group led by `pid`
pub(crate) fn kill_process_group(pid: u32) {
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pid, error = %e, "failed to kill process group"),
    }
}

fn classify(run: ProcessRun, expected: Option<&Value>) -> ExecutionResult {
    let ProcessRun {
        stdout,
        stderr,
        status,
        elapsed_ms,
    } = run;

    let outcome = match status {
        None => Outcome::TimedOut,
        Some(status) if !status.success() => Outcome::RuntimeFailed {
            exit_code: status.code(),
            stderr,
        },
        Some(_) => {
            let actual_output = interpret_output(&stdout);
            let passed = expected.map_or(true, |want| outputs_match(&actual_output, want));
            Outcome::Completed {
                actual_output,
                passed,
                stderr: (!stderr.is_empty()).then_some(stderr),
            }
        }
    };

    ExecutionResult {
        raw_output: stdout,
        execution_time_ms: elapsed_ms,
        outcome,
    }
}
