//! Runner command: the host-facing entry point.
//!
//! Reads the invocation from journal data, runs it through a
//! [`ScriptExecutor`] and reports only succeeded or cancelled. Nothing
//! escapes to the host, panics included; the detail goes to the log.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::console::ConsoleWindow;
use crate::engine::ScriptEngine;
use crate::executor::ScriptExecutor;
use crate::host::{CommandData, CommandResult, ExternalCommand};
use crate::journal::{InvocationDescriptor, JournalError};
use crate::stream::StreamSettings;

pub struct RunnerCommand<F> {
    console: Arc<dyn ConsoleWindow>,
    engine_factory: F,
    settings: StreamSettings,
}

impl<F, E> RunnerCommand<F>
where
    F: Fn() -> E,
    E: ScriptEngine,
{
    /// `engine_factory` builds a fresh engine for every execution.
    pub fn new(console: Arc<dyn ConsoleWindow>, engine_factory: F) -> Self {
        Self {
            console,
            engine_factory,
            settings: StreamSettings::default(),
        }
    }

    pub fn with_stream_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    fn run(&self, data: &CommandData) -> Result<i32, JournalError> {
        let descriptor = InvocationDescriptor::from_journal(&data.journal_data)?;
        let executor = ScriptExecutor::new(
            Arc::clone(&data.application),
            (self.engine_factory)(),
            Arc::clone(&self.console),
        )
        .with_stream_settings(self.settings.clone());
        Ok(executor.execute_script(&descriptor))
    }
}

impl<F, E> ExternalCommand for RunnerCommand<F>
where
    F: Fn() -> E,
    E: ScriptEngine,
{
    fn execute(&self, data: &CommandData) -> CommandResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(data))) {
            Ok(Ok(0)) => CommandResult::Succeeded,
            Ok(Ok(code)) => {
                tracing::warn!(code, "runner cancelled: script did not succeed");
                CommandResult::Cancelled
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "runner cancelled: unusable journal data");
                CommandResult::Cancelled
            }
            Err(_) => {
                tracing::error!("runner cancelled: panic while running the script");
                CommandResult::Cancelled
            }
        }
    }
}
