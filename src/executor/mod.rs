//! Script executor: configures one engine for one script and runs it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::console::ConsoleWindow;
use crate::engine::{EngineError, ScriptEngine};
use crate::host::HostApplication;
use crate::journal::InvocationDescriptor;
use crate::logging::ScriptLog;
use crate::stream::{ConsoleStream, StreamSettings};

/// Result code for failures caught at the executor boundary (setup errors,
/// engine errors, engine panics).
pub const EXECUTION_FAILED: i32 = -1;

pub struct ScriptExecutor<E> {
    host: Arc<HostApplication>,
    engine: E,
    console: Arc<dyn ConsoleWindow>,
    settings: StreamSettings,
}

impl<E: ScriptEngine> ScriptExecutor<E> {
    pub fn new(host: Arc<HostApplication>, engine: E, console: Arc<dyn ConsoleWindow>) -> Self {
        Self {
            host,
            engine,
            console,
            settings: StreamSettings::default(),
        }
    }

    pub fn with_stream_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run the described script and return its result code: `0` when it ran
    /// to its end, non-zero otherwise. Never panics and never returns an
    /// error; failures are written to the script log.
    pub fn execute_script(self, descriptor: &InvocationDescriptor) -> i32 {
        let log = match ScriptLog::open(&descriptor.log_file, descriptor.debug) {
            Ok(log) => log,
            Err(err) => {
                tracing::warn!(error = %err, "cannot prepare script log");
                return EXECUTION_FAILED;
            }
        };
        log.in_scope(|| self.run(descriptor))
    }

    fn run(self, descriptor: &InvocationDescriptor) -> i32 {
        tracing::info!(
            script = %descriptor.script_source.display(),
            host = %self.host.name,
            session = %self.host.session_id,
            "executing script"
        );

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_engine(descriptor))) {
            Ok(Ok(0)) => {
                tracing::info!("script completed");
                0
            }
            Ok(Ok(code)) => {
                tracing::warn!(code, "script exited with a non-zero result");
                code
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "script execution failed");
                EXECUTION_FAILED
            }
            Err(payload) => {
                tracing::error!(panic = %panic_message(payload.as_ref()), "script engine panicked");
                EXECUTION_FAILED
            }
        }
    }

    fn run_engine(self, descriptor: &InvocationDescriptor) -> Result<i32, EngineError> {
        let Self {
            host,
            mut engine,
            console,
            settings,
        } = self;

        let stream = ConsoleStream::with_settings(console, &settings);
        engine.set_search_paths(&descriptor.search_paths)?;
        engine.set_io(stream.clone(), stream.clone());
        engine.set_log_file(&descriptor.log_file);
        engine.set_host(host);
        tracing::debug!(search_paths = ?descriptor.search_paths, "engine configured");

        let result = engine.run_file(&descriptor.script_source);
        stream.finish_output();
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
