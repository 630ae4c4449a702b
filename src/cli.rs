use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use script_runner::console::ConsoleMode;
use script_runner::journal::{self, DEBUG_MODE, LOG_FILE, SCRIPT_SOURCE, SEARCH_PATHS};

#[derive(Parser, Debug, Clone)]
#[command(name = "srun", about = "Run a script inside a console window", version)]
pub struct Cli {
    /// Journal entry passed to the runner (repeatable).
    #[arg(short = 'j', long = "journal", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub journal: Vec<String>,

    /// JSON file holding an object of journal entries.
    #[arg(long = "journal-file", value_name = "PATH")]
    pub journal_file: Option<PathBuf>,

    /// Script to run (sets ScriptSource).
    #[arg(short = 's', long)]
    pub script: Option<String>,

    /// `;`-separated module search paths (sets SearchPaths).
    #[arg(long = "search-paths", value_name = "PATHS")]
    pub search_paths: Option<String>,

    /// Script log file (sets LogFile).
    #[arg(short = 'l', long = "log-file", value_name = "PATH")]
    pub log_file: Option<String>,

    /// Verbose script log (sets DebugMode).
    #[arg(long)]
    pub debug: bool,

    /// Interpreter program used to run the script.
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Console front end.
    #[arg(long, value_enum)]
    pub console: Option<ConsoleMode>,
}

impl Cli {
    /// Journal data for the runner: the journal file first, then `--journal`
    /// entries, then the shortcut flags.
    pub fn journal_data(&self) -> Result<HashMap<String, String>> {
        let mut data = match &self.journal_file {
            Some(path) => journal::read_journal_file(path)?,
            None => HashMap::new(),
        };

        for entry in &self.journal {
            let (key, value) = journal::parse_entry(entry)?;
            data.insert(key, value);
        }

        let shortcuts = [
            (SCRIPT_SOURCE, &self.script),
            (SEARCH_PATHS, &self.search_paths),
            (LOG_FILE, &self.log_file),
        ];
        for (key, value) in shortcuts {
            if let Some(value) = value {
                data.insert(key.to_string(), value.clone());
            }
        }
        if self.debug {
            data.insert(DEBUG_MODE.to_string(), "true".to_string());
        }

        Ok(data)
    }

    /// Short name of the script for titles and banners.
    pub fn script_label(data: &HashMap<String, String>) -> String {
        data.get(SCRIPT_SOURCE)
            .map(PathBuf::from)
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "script".to_string())
    }
}
