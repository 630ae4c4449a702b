//! Script engine interface: what the executor configures and runs.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::host::HostApplication;
use crate::stream::ConsoleStream;

pub mod python;

pub use python::PythonEngine;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("script file not found: {}", .0.display())]
    ScriptNotFound(PathBuf),
    #[error("failed to start interpreter `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid module search path: {0}")]
    SearchPath(String),
    #[error("standard streams were not bound before running the script")]
    StreamsNotBound,
    #[error("interpreter I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// An interpreter able to run one script file to completion.
///
/// The executor calls the setters once each, then `run_file` once.
pub trait ScriptEngine: Send {
    fn set_search_paths(&mut self, paths: &[PathBuf]) -> Result<(), EngineError>;
    fn set_io(&mut self, stdout: ConsoleStream, stdin: ConsoleStream);
    fn set_log_file(&mut self, path: &Path);
    /// Ambient binding the script can use to reach back into the host.
    fn set_host(&mut self, host: Arc<HostApplication>);
    /// Run the script, blocking until it ends. The returned code is the
    /// script's own exit status.
    fn run_file(&mut self, script: &Path) -> Result<i32, EngineError>;
}
