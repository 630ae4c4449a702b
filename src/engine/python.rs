//! Python interpreter process: spawn, stdio glue, exit status.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::thread;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;

use super::{EngineError, ScriptEngine};
use crate::config::Config;
use crate::host::HostApplication;
use crate::stream::ConsoleStream;

const BOM_CHAR: char = '\u{feff}';

pub struct PythonEngine {
    program: String,
    search_paths: Vec<PathBuf>,
    streams: Option<(ConsoleStream, ConsoleStream)>,
    log_file: Option<PathBuf>,
    host: Option<Arc<HostApplication>>,
}

impl PythonEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            search_paths: Vec::new(),
            streams: None,
            log_file: None,
            host: None,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.interpreter())
    }

    fn command(&self, script: &Path) -> Result<Command, EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-u") // unbuffered
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // the encoder emits a BOM first; the console stream strips it
            .env("PYTHONIOENCODING", "utf-8-sig")
            .kill_on_drop(true);

        if !self.search_paths.is_empty() {
            cmd.env("PYTHONPATH", join_search_paths(&self.search_paths)?);
        }
        if let Some(log_file) = &self.log_file {
            cmd.env("SRUN_LOG_FILE", log_file);
        }
        if let Some(host) = &self.host {
            cmd.env("SRUN_HOST_NAME", &host.name)
                .env("SRUN_HOST_VERSION", &host.version)
                .env("SRUN_SESSION_ID", host.session_id.to_string());
        }
        Ok(cmd)
    }
}

fn join_search_paths(paths: &[PathBuf]) -> Result<std::ffi::OsString, EngineError> {
    env::join_paths(paths).map_err(|e| EngineError::SearchPath(e.to_string()))
}

impl ScriptEngine for PythonEngine {
    fn set_search_paths(&mut self, paths: &[PathBuf]) -> Result<(), EngineError> {
        join_search_paths(paths)?;
        self.search_paths = paths.to_vec();
        Ok(())
    }

    fn set_io(&mut self, stdout: ConsoleStream, stdin: ConsoleStream) {
        self.streams = Some((stdout, stdin));
    }

    fn set_log_file(&mut self, path: &Path) {
        self.log_file = Some(path.to_path_buf());
    }

    fn set_host(&mut self, host: Arc<HostApplication>) {
        self.host = Some(host);
    }

    fn run_file(&mut self, script: &Path) -> Result<i32, EngineError> {
        if !script.is_file() {
            return Err(EngineError::ScriptNotFound(script.to_path_buf()));
        }
        let (stdout, stdin) = self.streams.clone().ok_or(EngineError::StreamsNotBound)?;
        let mut cmd = self.command(script)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(run_child(&mut cmd, &self.program, stdout, stdin))
    }
}

async fn run_child(
    cmd: &mut Command,
    program: &str,
    stdout: ConsoleStream,
    stdin: ConsoleStream,
) -> Result<i32, EngineError> {
    let mut child: Child = cmd.spawn().map_err(|source| EngineError::Spawn {
        program: program.to_string(),
        source,
    })?;
    tracing::debug!(program, pid = child.id(), "interpreter started");

    let child_stdout = child
        .stdout
        .take()
        .ok_or(EngineError::StreamsNotBound)?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or(EngineError::StreamsNotBound)?;
    let child_stdin = child
        .stdin
        .take()
        .ok_or(EngineError::StreamsNotBound)?;

    let (lines_tx, lines_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let forwarder = {
        let stdin = stdin.clone();
        thread::Builder::new()
            .name("srun-stdin".into())
            .spawn(move || forward_console_lines(stdin, lines_tx))?
    };

    let output = tokio::spawn(pump_stdout(child_stdout, stdout.clone()));
    let errors = tokio::spawn(pump_stderr(child_stderr, stdout));
    let input = tokio::spawn(pump_stdin(child_stdin, lines_rx));

    let status = child.wait().await;
    for (name, pump) in [("stdout", output), ("stderr", errors)] {
        match pump.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::debug!(stream = name, error = %err, "output pump stopped"),
            Err(err) => tracing::debug!(stream = name, error = %err, "output pump aborted"),
        }
    }
    input.abort();

    // release a forwarder still waiting for a console line
    stdin.input_feed().close();
    if forwarder.join().is_err() {
        tracing::warn!("stdin forwarder panicked");
    }

    let code = status?.code().unwrap_or(-1);
    tracing::debug!(code, "interpreter exited");
    Ok(code)
}

async fn pump_stdout(mut source: ChildStdout, mut sink: ConsoleStream) -> std::io::Result<()> {
    let mut buf = [0u8; 4096];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        sink.write_all(&buf[..n])?;
    }
}

async fn pump_stderr(source: ChildStderr, console: ConsoleStream) -> std::io::Result<()> {
    let mut lines = BufReader::new(source).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_start_matches(BOM_CHAR);
        tracing::warn!(target: "script", "{line}");
        console.write_error(line);
    }
    Ok(())
}

async fn pump_stdin(
    mut sink: ChildStdin,
    mut lines: mpsc::UnboundedReceiver<Vec<u8>>,
) -> std::io::Result<()> {
    while let Some(line) = lines.recv().await {
        sink.write_all(&line).await?;
        sink.flush().await?;
    }
    // dropping `sink` closes the script's stdin
    Ok(())
}

/// Blocking side of the stdin pump. Opening the script's input shows the
/// console so there is somewhere to type; each completed line then goes to
/// the interpreter until input closes or the console goes away.
fn forward_console_lines(stdin: ConsoleStream, tx: mpsc::UnboundedSender<Vec<u8>>) {
    stdin.activate();
    let mut buf = [0u8; 4096];
    while stdin.can_read() {
        match stdin.read_line(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "console input ended");
                break;
            }
        }
    }
}
