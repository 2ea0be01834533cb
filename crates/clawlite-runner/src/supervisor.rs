//! Worker process supervision.
//!
//! One [`Supervisor::run`] call owns one worker process from spawn to exit:
//!
//! 1. prepare the group workspace
//! 2. spawn the worker in the group directory, hand the caller a [`WorkerHandle`]
//! 3. write the input document (with secrets) to stdin and close it
//! 4. stream stdout through [`OutputCodec`] into the [`OutputChain`], capture stderr
//! 5. stop the worker when it goes silent past the timeout (SIGTERM, then SIGKILL)
//! 6. drain the output chain and resolve exactly one [`WorkerOutput`]
//!
//! All events for a run are handled by a single `select!` loop, so run state
//! needs no locking.

use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use clawlite_core::config::RunnerConfig;
use clawlite_core::group::{sanitize_folder, RegisteredGroup};
use clawlite_core::info_log;
use clawlite_core::observability::{audit_worker_completed, audit_worker_started};
use clawlite_core::protocol::{WorkerInput, WorkerOutput};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::capture::{CappedBuffer, LineSplitter, Utf8Carry};
use crate::codec::{extract_terminal_record, OutputCodec};
use crate::error::RunnerError;
use crate::output_chain::{OutputChain, OutputSink};
use crate::run_log::{self, RunRecord, TimeoutRecord};
use crate::workspace::{prepare_workspace, GroupWorkspace};

/// Characters of stderr quoted in a non-zero-exit error.
const STDERR_TAIL_CHARS: usize = 200;

const READ_CHUNK_BYTES: usize = 8192;

/// Longest stderr line forwarded to tracing as one event.
const MAX_LOG_LINE: usize = 4096;

/// Identifies a live worker. Passed to the caller right after spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    pub run_id: String,
    pub pid: Option<u32>,
}

pub struct Supervisor {
    config: RunnerConfig,
}

impl Supervisor {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Prepare `group`'s workspace and run one worker turn in it.
    ///
    /// `Err` only comes from workspace preparation. Once a spawn is attempted
    /// every outcome, including spawn failure and timeout, is an `Ok(WorkerOutput)`.
    /// `input.secrets` is always `None` when this returns.
    pub async fn run<F>(
        &self,
        group: &RegisteredGroup,
        is_main: bool,
        input: &mut WorkerInput,
        on_spawn: F,
        on_output: Option<Arc<dyn OutputSink>>,
    ) -> Result<WorkerOutput, RunnerError>
    where
        F: FnOnce(&WorkerHandle),
    {
        let workspace = match prepare_workspace(&self.config, group, is_main) {
            Ok(ws) => ws,
            Err(e) => {
                input.secrets = None;
                return Err(e);
            }
        };
        Ok(self
            .run_in_workspace(group, is_main, &workspace, input, on_spawn, on_output)
            .await)
    }

    /// Run one worker turn in an already prepared workspace.
    pub async fn run_in_workspace<F>(
        &self,
        group: &RegisteredGroup,
        is_main: bool,
        workspace: &GroupWorkspace,
        input: &mut WorkerInput,
        on_spawn: F,
        on_output: Option<Arc<dyn OutputSink>>,
    ) -> WorkerOutput
    where
        F: FnOnce(&WorkerHandle),
    {
        let config = &self.config;
        let started_at = Utc::now();
        let started = Instant::now();
        let run_id = format!(
            "clawlite-{}-{}",
            sanitize_folder(&group.folder),
            started_at.timestamp_millis()
        );
        let group_dir = workspace.group_dir.to_string_lossy().into_owned();

        if let Some(ref secrets) = input.secrets {
            debug!(run_id = %run_id, keys = ?secrets.keys().collect::<Vec<_>>(), "Forwarding credentials");
        }
        let payload = serde_json::to_vec(&*input);
        input.secrets = None;
        let payload = match payload {
            Ok(bytes) => bytes,
            Err(e) => return WorkerOutput::error(format!("Failed to serialize worker input: {e}")),
        };

        let mut cmd = Command::new(&config.worker_program);
        cmd.args(&config.worker_args)
            .current_dir(&workspace.group_dir)
            .envs(workspace.worker_env(&config.timezone))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(group = %group.name, run_id = %run_id, error = %e, "Worker spawn failed");
                audit_worker_completed(
                    &group.folder,
                    &run_id,
                    None,
                    started.elapsed().as_millis() as u64,
                    false,
                    false,
                );
                return WorkerOutput::error(format!("Worker spawn error: {e}"));
            }
        };

        let handle = WorkerHandle {
            run_id: run_id.clone(),
            pid: child.id(),
        };
        on_spawn(&handle);
        audit_worker_started(&group.folder, &run_id, &config.worker_program, &group_dir);
        info_log!(
            group = %group.name,
            run_id = %run_id,
            pid = ?handle.pid,
            is_main,
            "Spawned worker"
        );

        // Written from its own task so a worker that never reads stdin
        // cannot stall output handling.
        if let Some(mut stdin) = child.stdin.take() {
            let run_id = run_id.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    warn!(run_id = %run_id, error = %e, "Failed to write worker input");
                }
                if let Err(e) = stdin.shutdown().await {
                    debug!(run_id = %run_id, error = %e, "Closing worker stdin failed");
                }
            });
        }

        let configured_timeout = config.configured_timeout(group.timeout());
        let timeout = config.effective_timeout(group.timeout());
        let chain = on_output.map(|sink| OutputChain::spawn(sink, config.output_chain_capacity));

        let mut state = RunState::new(config.max_output_bytes);
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut stdout_chunk = vec![0u8; READ_CHUNK_BYTES];
        let mut stderr_chunk = vec![0u8; READ_CHUNK_BYTES];

        let mut timeout_deadline = Instant::now() + timeout;
        let mut kill_deadline: Option<Instant> = None;
        let mut drain_deadline: Option<Instant> = None;
        let mut exited = false;
        let mut exit_code: Option<i32> = None;

        loop {
            if exited && stdout.is_none() && stderr.is_none() {
                break;
            }

            let next_deadline = [
                (!state.timed_out && !exited).then_some(timeout_deadline),
                kill_deadline.filter(|_| !exited),
                drain_deadline,
            ]
            .into_iter()
            .flatten()
            .min();

            tokio::select! {
                read = read_chunk(&mut stdout, &mut stdout_chunk) => match read {
                    Ok(n) if n > 0 => {
                        let text = state.stdout_carry.decode(&stdout_chunk[..n]);
                        if state.on_stdout(&text, chain.as_ref()).await {
                            timeout_deadline = Instant::now() + timeout;
                        }
                    }
                    eof => {
                        if let Err(e) = eof {
                            warn!(run_id = %run_id, error = %e, "Reading worker stdout failed");
                        }
                        let rest = state.stdout_carry.finish();
                        if state.on_stdout(&rest, chain.as_ref()).await {
                            timeout_deadline = Instant::now() + timeout;
                        }
                        stdout = None;
                    }
                },
                read = read_chunk(&mut stderr, &mut stderr_chunk) => match read {
                    Ok(n) if n > 0 => {
                        let text = state.stderr_carry.decode(&stderr_chunk[..n]);
                        state.on_stderr(&text, &run_id);
                    }
                    eof => {
                        if let Err(e) = eof {
                            warn!(run_id = %run_id, error = %e, "Reading worker stderr failed");
                        }
                        let rest = state.stderr_carry.finish();
                        state.on_stderr(&rest, &run_id);
                        if let Some(line) = state.stderr_lines.finish() {
                            debug!(target: "clawlite::worker", run_id = %run_id, "{}", line);
                        }
                        stderr = None;
                    }
                },
                status = child.wait(), if !exited => {
                    exited = true;
                    match status {
                        Ok(status) => exit_code = status.code(),
                        Err(e) => warn!(run_id = %run_id, error = %e, "Waiting on worker failed"),
                    }
                    if stdout.is_some() || stderr.is_some() {
                        drain_deadline = Some(Instant::now() + config.kill_grace);
                    }
                },
                _ = sleep_until(next_deadline) => {
                    let now = Instant::now();
                    if drain_deadline.is_some_and(|d| now >= d) {
                        warn!(run_id = %run_id, "Worker output pipes still open after exit, closing");
                        stdout = None;
                        stderr = None;
                    }
                    if !exited {
                        if kill_deadline.is_some_and(|d| now >= d) {
                            warn!(run_id = %run_id, "Worker ignored stop request, killing");
                            kill_deadline = None;
                            if let Err(e) = child.start_kill() {
                                warn!(run_id = %run_id, error = %e, "Failed to kill worker");
                            }
                        } else if !state.timed_out && now >= timeout_deadline {
                            warn!(
                                group = %group.name,
                                run_id = %run_id,
                                timeout_ms = timeout.as_millis() as u64,
                                "Worker timed out, stopping"
                            );
                            state.timed_out = true;
                            request_stop(&mut child, &run_id);
                            kill_deadline = Some(now + config.kill_grace);
                        }
                    }
                },
            }
        }

        let streaming = chain.is_some();
        if let Some(chain) = chain {
            chain.finish().await;
        }

        let duration = started.elapsed();
        let output = if state.timed_out {
            run_log::write_log(
                &workspace.logs_dir(),
                &started_at,
                &run_log::render_timeout_log(&TimeoutRecord {
                    started_at,
                    group_name: &group.name,
                    run_id: &run_id,
                    duration,
                    configured_timeout,
                    exit_code,
                    had_streaming_output: state.had_streaming_output,
                }),
            );
            if state.had_streaming_output {
                info_log!(run_id = %run_id, "Worker timed out after streaming output");
                WorkerOutput::success(None, state.session_id.clone())
            } else {
                WorkerOutput::error(format!(
                    "Worker timed out after {}ms",
                    configured_timeout.as_millis()
                ))
            }
        } else {
            let log_path = run_log::write_log(
                &workspace.logs_dir(),
                &started_at,
                &run_log::render_run_log(&RunRecord {
                    started_at,
                    group_name: &group.name,
                    run_id: &run_id,
                    is_main,
                    duration,
                    exit_code,
                    prompt_len: input.prompt.chars().count(),
                    session_id: input.session_id.as_deref(),
                    stdout: state.stdout.as_str(),
                    stdout_truncated: state.stdout.is_truncated(),
                    stderr: state.stderr.as_str(),
                    stderr_truncated: state.stderr.is_truncated(),
                    verbose: config.verbose_logs,
                }),
            );
            if exit_code != Some(0) {
                warn!(
                    group = %group.name,
                    run_id = %run_id,
                    code = ?exit_code,
                    duration_ms = duration.as_millis() as u64,
                    log = ?log_path,
                    "Worker exited with error"
                );
                WorkerOutput::error(format!(
                    "Worker exited with code {}: {}",
                    exit_code.unwrap_or(-1),
                    state.stderr.tail(STDERR_TAIL_CHARS)
                ))
            } else if streaming {
                WorkerOutput::success(None, state.session_id.clone())
            } else {
                parse_terminal_output(state.stdout.as_str())
            }
        };

        info_log!(
            group = %group.name,
            run_id = %run_id,
            duration_ms = duration.as_millis() as u64,
            status = ?output.status,
            timed_out = state.timed_out,
            "Worker finished"
        );
        audit_worker_completed(
            &group.folder,
            &run_id,
            exit_code,
            duration.as_millis() as u64,
            output.is_success(),
            state.timed_out,
        );
        output
    }
}

/// Mutable state owned by one run's event loop.
struct RunState {
    stdout: CappedBuffer,
    stderr: CappedBuffer,
    stdout_carry: Utf8Carry,
    stderr_carry: Utf8Carry,
    stderr_lines: LineSplitter,
    codec: OutputCodec,
    session_id: Option<String>,
    had_streaming_output: bool,
    timed_out: bool,
}

impl RunState {
    fn new(max_output_bytes: usize) -> Self {
        Self {
            stdout: CappedBuffer::new("stdout", max_output_bytes),
            stderr: CappedBuffer::new("stderr", max_output_bytes),
            stdout_carry: Utf8Carry::default(),
            stderr_carry: Utf8Carry::default(),
            stderr_lines: LineSplitter::new(MAX_LOG_LINE),
            codec: OutputCodec::new(max_output_bytes),
            session_id: None,
            had_streaming_output: false,
            timed_out: false,
        }
    }

    /// Capture stdout text and, when streaming, forward decoded records.
    /// Returns whether any record was parsed.
    async fn on_stdout(&mut self, text: &str, chain: Option<&OutputChain>) -> bool {
        if text.is_empty() {
            return false;
        }
        self.stdout.push(text);
        let Some(chain) = chain else {
            return false;
        };
        let mut parsed = false;
        for record in self.codec.push(text) {
            if let Some(ref id) = record.new_session_id {
                self.session_id = Some(id.clone());
            }
            self.had_streaming_output = true;
            parsed = true;
            chain.push(record).await;
        }
        parsed
    }

    fn on_stderr(&mut self, text: &str, run_id: &str) {
        if text.is_empty() {
            return;
        }
        self.stderr.push(text);
        for line in self.stderr_lines.push(text) {
            if !line.is_empty() {
                debug!(target: "clawlite::worker", run_id = %run_id, "{}", line);
            }
        }
    }
}

/// Legacy mode: the terminal record is the last one in the captured stdout.
fn parse_terminal_output(stdout: &str) -> WorkerOutput {
    let Some(raw) = extract_terminal_record(stdout) else {
        return WorkerOutput::error(format!(
            "Failed to parse worker output: no output record\n{stdout}"
        ));
    };
    match serde_json::from_str::<WorkerOutput>(raw) {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "Failed to parse worker output");
            WorkerOutput::error(format!("Failed to parse worker output: {e}\n{stdout}"))
        }
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Ask the worker to stop: SIGTERM on unix, immediate kill elsewhere.
fn request_stop(child: &mut Child, run_id: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => return,
            Err(e) => warn!(run_id = %run_id, error = %e, "SIGTERM failed, killing worker"),
        }
    }
    if let Err(e) = child.start_kill() {
        debug!(run_id = %run_id, error = %e, "Worker already gone");
    }
}
