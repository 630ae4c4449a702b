//! Host application surface: the application handle, the data a command
//! is triggered with, and the outcome vocabulary the host understands.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

/// Outcome reported back to the host's command dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Succeeded,
    Cancelled,
}

impl CommandResult {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Cancelled => 1,
        }
    }
}

/// Handle to the running host application, passed through to scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostApplication {
    pub name: String,
    pub version: String,
    pub session_id: Uuid,
}

impl HostApplication {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            session_id: Uuid::new_v4(),
        }
    }
}

/// Everything the host hands a command when it triggers it.
#[derive(Debug, Clone)]
pub struct CommandData {
    pub application: Arc<HostApplication>,
    pub journal_data: HashMap<String, String>,
}

impl CommandData {
    pub fn new(application: Arc<HostApplication>, journal_data: HashMap<String, String>) -> Self {
        Self {
            application,
            journal_data,
        }
    }
}

/// A command the host can invoke. Implementations must not panic or
/// return errors into the host; the result is all the host sees.
pub trait ExternalCommand {
    fn execute(&self, data: &CommandData) -> CommandResult;
}
