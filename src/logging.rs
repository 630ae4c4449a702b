//! Logging: the application's own subscriber and the per-script log file.
//!
//! The application log goes to stderr, or to a file when the terminal
//! belongs to the console. Each script execution additionally gets a scoped
//! subscriber that writes to the log file named in its journal data.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const APP_LOG_FILE: &str = "srun.log";

#[derive(Debug, Error)]
pub enum LogSetupError {
    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Install the process-wide subscriber.
///
/// With `log_dir` set, records go to `srun.log` inside it and the returned
/// guard must be held until exit; otherwise they go to stderr.
pub fn init(log_dir: Option<&Path>, debug: bool) -> Option<WorkerGuard> {
    let default_filter = if debug { "script_runner=debug,warn" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);

    match log_dir {
        Some(dir) => {
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("[srun] failed to create log directory {}: {}", dir.display(), e);
                return None;
            }
            let appender = tracing_appender::rolling::never(dir, APP_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = builder.with_writer(writer).with_ansi(false).try_init();
            Some(guard)
        }
        None => {
            let _ = builder.with_writer(io::stderr).try_init();
            None
        }
    }
}

/// Log file for one script execution. Records are flushed when it drops.
pub struct ScriptLog {
    dispatch: Dispatch,
    _guard: WorkerGuard,
}

impl ScriptLog {
    pub fn open(path: &Path, debug: bool) -> Result<Self, LogSetupError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| LogSetupError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LogSetupError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let (writer, guard) = tracing_appender::non_blocking(file);
        let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_max_level(level)
            .finish();

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            _guard: guard,
        })
    }

    /// Run `f` with this log as the current thread's subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_log_receives_scoped_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("script.log");
        {
            let log = ScriptLog::open(&path, false).unwrap();
            log.in_scope(|| {
                tracing::info!("visible record");
                tracing::debug!("hidden record");
            });
        }
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("visible record"));
        assert!(!text.contains("hidden record"));
    }

    #[test]
    fn debug_flag_lowers_the_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.log");
        {
            let log = ScriptLog::open(&path, true).unwrap();
            log.in_scope(|| tracing::debug!("detail record"));
        }
        assert!(fs::read_to_string(&path).unwrap().contains("detail record"));
    }

    #[test]
    fn unopenable_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for appending
        let err = ScriptLog::open(dir.path(), false).err().unwrap();
        assert!(matches!(err, LogSetupError::Open { .. }));
    }
}
