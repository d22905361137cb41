use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::command::ScriptInvocation;
use crate::entity::{classify, promote_stage_from_entity, strip_ansi_sgr, Entity};
use crate::pty_bridge::ChannelReader;
use crate::stage::ExecutionStage;

const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;
const LINE_CHANNEL_CAPACITY: usize = 100;
const KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to open pty: {0}")]
    PtyOpen(String),
    #[error("failed to spawn forge: {0}")]
    Spawn(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The outcome of one `forge script` run. `success` is `exit_success && processing_ok`: a clean
/// exit with output we failed to parse is not a success, and neither is a bad exit with output we
/// understood fine.
#[derive(Debug, Default)]
pub struct ScriptResult {
    pub exit_success: bool,
    pub processing_ok: bool,
    pub final_stage: ExecutionStage,
    pub script_outputs: Vec<Value>,
    pub gas_estimates: Vec<Value>,
    pub broadcast_statuses: Vec<Value>,
    pub execution_traces: Vec<Value>,
    pub transaction_receipts: Vec<Value>,
    pub console_logs: Vec<String>,
    /// Lines that matched none of the structured entity shapes, kept verbatim so a caller can
    /// echo them once if the run fails.
    pub text_lines: Vec<String>,
    pub dropped_lines: u64,
    pub ignored_lines: u64,
    pub stage_timings: BTreeMap<String, Duration>,
}

impl ScriptResult {
    pub fn success(&self) -> bool {
        self.exit_success && self.processing_ok
    }
}

pub struct RunnerOptions {
    pub debug_dir: Option<PathBuf>,
    pub deadline: Option<Duration>,
    pub json_mode: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self { debug_dir: None, deadline: None, json_mode: true }
    }
}

/// Accumulates classified lines into a `ScriptResult`. Shared by the in-memory test path
/// (`process_lines`) and the live-PTY path (`run`), which differ only in how lines reach it.
struct LineFolder {
    result: ScriptResult,
    stage: ExecutionStage,
    stage_started: Instant,
    ignored_count: u64,
}

impl LineFolder {
    fn new() -> Self {
        Self {
            result: ScriptResult::default(),
            stage: ExecutionStage::Initializing,
            stage_started: Instant::now(),
            ignored_count: 0,
        }
    }

    fn fold(&mut self, raw_line: &str, opts: &RunnerOptions) {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return;
        }
        let stripped = strip_ansi_sgr(line);

        if let Some(detected) = ExecutionStage::from_line_content(&stripped) {
            if self.stage.advance_to(detected) {
                self.record_stage_timing();
            }
        }

        let entity = classify(&stripped);
        let before = self.stage;
        promote_stage_from_entity(&mut self.stage, &entity);
        if self.stage != before {
            self.record_stage_timing();
        }

        match entity {
            Entity::ScriptOutput(v) => self.result.script_outputs.push(v),
            Entity::GasEstimate(v) => self.result.gas_estimates.push(v),
            Entity::BroadcastStatus(v) => self.result.broadcast_statuses.push(v),
            Entity::ExecutionTrace(v) => self.result.execution_traces.push(v),
            Entity::TransactionReceipt(v) => self.result.transaction_receipts.push(v),
            Entity::ConsoleLogLine(s) => self.result.console_logs.push(s),
            Entity::UnrecognizedJson(v) => {
                self.ignored_count += 1;
                if let Some(dir) = &opts.debug_dir {
                    let path = dir.join(format!("ignored-line{}.txt", self.ignored_count));
                    if let Err(e) = std::fs::write(&path, v.to_string()) {
                        warn!(error = %e, path = %path.display(), "failed to persist ignored line");
                    }
                }
            }
            Entity::TextLine(s) => self.result.text_lines.push(s),
        }
    }

    fn record_stage_timing(&mut self) {
        let name = format!("{:?}", self.stage);
        *self.result.stage_timings.entry(name).or_insert(Duration::ZERO) +=
            self.stage_started.elapsed();
        self.stage_started = Instant::now();
    }

    fn finish(mut self) -> ScriptResult {
        self.record_stage_timing();
        self.result.ignored_lines = self.ignored_count;
        self.result.final_stage = self.stage;
        self.result.processing_ok = true;
        self.result
    }
}

/// Consumes an already-demuxed line stream, classifying each line and folding it into a
/// `ScriptResult`. Kept generic over `AsyncRead` so tests can drive it with an in-memory
/// buffer instead of a live PTY.
pub async fn process_lines<R>(reader: R, opts: &RunnerOptions) -> Result<ScriptResult, RunnerError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    let mut folder = LineFolder::new();

    loop {
        raw.clear();
        let n = read_bounded_line(&mut reader, &mut raw).await?;
        if n == 0 {
            break;
        }
        folder.fold(&String::from_utf8_lossy(&raw), opts);
    }

    Ok(folder.finish())
}

/// Reads one line (including its terminator) into `buf`, refusing to grow past
/// [`MAX_LINE_BYTES`]. Returns the number of bytes read, 0 at EOF.
async fn read_bounded_line<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
) -> std::io::Result<usize> {
    loop {
        let n = reader.read_until(b'\n', buf).await?;
        if n == 0 || buf.ends_with(b"\n") || buf.len() >= MAX_LINE_BYTES {
            return Ok(buf.len());
        }
    }
}

/// Spawns `invocation` under a PTY, streams its combined output through the line-processing
/// core, and reconciles the child's exit status with the processing outcome. Respects
/// `opts.deadline` by closing the PTY, draining in-flight lines, then killing the child if it
/// hasn't exited within a grace period.
pub async fn run(
    invocation: &ScriptInvocation,
    system_env: &BTreeMap<String, String>,
    opts: RunnerOptions,
) -> Result<ScriptResult, RunnerError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize { rows: 50, cols: 200, pixel_width: 0, pixel_height: 0 })
        .map_err(|e| RunnerError::PtyOpen(e.to_string()))?;

    let mut cmd = CommandBuilder::new("forge");
    for arg in invocation.build_args() {
        cmd.arg(arg);
    }
    for (k, v) in invocation.merged_env(system_env) {
        cmd.env(k, v);
    }

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| RunnerError::Spawn(e.to_string()))?;
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| RunnerError::PtyOpen(e.to_string()))?;
    let async_reader = ChannelReader::spawn(reader, 8192);

    if !opts.json_mode {
        return run_passthrough(async_reader, &mut child, opts.deadline).await;
    }

    // Producer: splits the byte stream into lines and forwards them over a bounded channel.
    // A full channel means the consumer can't keep up; rather than block the PTY reader (and
    // risk the child blocking on a full PTY buffer in turn) we drop the line and count it.
    let deadline = opts.deadline;
    let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
    let mut dropped = 0u64;
    let producer = tokio::spawn(async move {
        let mut reader = BufReader::new(async_reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match read_bounded_line(&mut reader, &mut raw).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&raw).into_owned();
                    if let Err(mpsc::error::TrySendError::Full(_)) = line_tx.try_send(line) {
                        warn!("line channel full, dropping line");
                        dropped += 1;
                    }
                }
            }
        }
        dropped
    });

    let consumer = tokio::spawn(async move {
        let mut folder = LineFolder::new();
        while let Some(line) = line_rx.recv().await {
            folder.fold(&line, &opts);
        }
        folder.finish()
    });

    let exit_success = wait_with_deadline(&mut child, deadline).await;

    let lines_dropped = producer.await.map_err(|e| RunnerError::Spawn(e.to_string()))?;
    let mut result = consumer.await.map_err(|e| RunnerError::Spawn(e.to_string()))?;
    result.exit_success = exit_success;
    result.dropped_lines = lines_dropped;
    debug!(success = result.success(), stage = ?result.final_stage, dropped = lines_dropped, "script run complete");
    Ok(result)
}

/// Debug, non-JSON mode: the PTY stream is copied straight to stdout with no line scanning or
/// entity classification, then the child is awaited exactly as in the classifying path.
async fn run_passthrough(
    mut reader: ChannelReader,
    child: &mut Box<dyn portable_pty::Child + Send + Sync>,
    deadline: Option<Duration>,
) -> Result<ScriptResult, RunnerError> {
    let mut stdout = io::stdout();
    io::copy(&mut reader, &mut stdout).await?;

    let exit_success = wait_with_deadline(child, deadline).await;
    let result = ScriptResult { exit_success, processing_ok: true, ..ScriptResult::default() };
    debug!(success = result.success(), "script run complete (debug passthrough)");
    Ok(result)
}

async fn wait_with_deadline(
    child: &mut Box<dyn portable_pty::Child + Send + Sync>,
    deadline: Option<Duration>,
) -> bool {
    if let Some(deadline) = deadline {
        match timeout(deadline, wait_child(child)).await {
            Ok(status) => status,
            Err(_) => {
                warn!("script run exceeded deadline, terminating");
                let _ = child.kill();
                let _ = timeout(KILL_GRACE, wait_child(child)).await;
                false
            }
        }
    } else {
        wait_child(child).await
    }
}

async fn wait_child(child: &mut Box<dyn portable_pty::Child + Send + Sync>) -> bool {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => tokio::time::sleep(Duration::from_millis(25)).await,
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn opts() -> RunnerOptions {
        RunnerOptions { debug_dir: None, deadline: None, json_mode: true }
    }

    #[tokio::test]
    async fn empty_lines_are_discarded() {
        let input = Cursor::new(b"\n\n{\"raw_logs\": []}\n\n".to_vec());
        let result = process_lines(input, &opts()).await.unwrap();
        assert_eq!(result.script_outputs.len(), 1);
    }

    #[tokio::test]
    async fn unrecognized_json_is_counted_and_does_not_error() {
        let input = Cursor::new(b"{\"foo\": 1}\n{\"bar\": 2}\n".to_vec());
        let result = process_lines(input, &opts()).await.unwrap();
        assert_eq!(result.ignored_lines, 2);
        assert!(result.processing_ok);
    }

    #[tokio::test]
    async fn script_output_advances_stage_to_simulating() {
        let input = Cursor::new(b"{\"raw_logs\": []}\n".to_vec());
        let result = process_lines(input, &opts()).await.unwrap();
        assert_eq!(result.final_stage, ExecutionStage::Simulating);
    }

    #[tokio::test]
    async fn successful_broadcast_status_reaches_broadcasting_stage() {
        let input = Cursor::new(b"{\"raw_logs\": []}\n{\"status\": \"success\"}\n".to_vec());
        let result = process_lines(input, &opts()).await.unwrap();
        assert_eq!(result.final_stage, ExecutionStage::Broadcasting);
    }

    #[tokio::test]
    async fn ten_thousand_trace_lines_lose_no_contract_deployed_signal() {
        let mut bytes = Vec::new();
        for _ in 0..10_000 {
            bytes.extend_from_slice(b"{\"arena\": []}\n");
        }
        bytes.extend_from_slice(b"{\"tx_hash\": \"0xabc\"}\n");
        let result = process_lines(Cursor::new(bytes), &opts()).await.unwrap();
        assert_eq!(result.execution_traces.len(), 10_000);
        assert_eq!(result.transaction_receipts.len(), 1);
    }

    #[tokio::test]
    async fn text_lines_are_kept_for_later_display() {
        let input = Cursor::new(b"Error: script reverted\nsome other forge chatter\n".to_vec());
        let result = process_lines(input, &opts()).await.unwrap();
        assert_eq!(
            result.text_lines,
            vec!["Error: script reverted".to_string(), "some other forge chatter".to_string()]
        );
    }

    #[tokio::test]
    async fn console_log_lines_are_preserved_verbatim() {
        let input = Cursor::new(b"Logs: something happened\n".to_vec());
        let result = process_lines(input, &opts()).await.unwrap();
        assert_eq!(result.console_logs, vec!["Logs: something happened".to_string()]);
    }
}
