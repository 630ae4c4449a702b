mod cli;

use std::io;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use script_runner::config::Config;
use script_runner::console::{self, ConsoleMode, ConsoleWindow};
use script_runner::engine::PythonEngine;
use script_runner::host::{CommandData, CommandResult, ExternalCommand, HostApplication};
use script_runner::runner::RunnerCommand;
use script_runner::{logging, tui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Load config; CLI flags take precedence
    let mut cfg = Config::load();
    if let Some(program) = &args.interpreter {
        cfg.set("INTERPRETER", program.clone());
    }

    let mut mode = args.console.unwrap_or_else(|| cfg.console_mode());
    if mode == ConsoleMode::Tui && !io::stdout().is_terminal() {
        mode = ConsoleMode::Plain;
    }

    // The TUI owns the terminal, so the app log goes to a file there
    let log_dir = (mode == ConsoleMode::Tui).then(|| cfg.app_log_dir());
    let log_guard = logging::init(log_dir.as_deref(), args.debug);

    let journal_data = args.journal_data()?;
    let label = cli::Cli::script_label(&journal_data);
    let application = Arc::new(HostApplication::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    ));
    tracing::debug!(session = %application.session_id, ?mode, "starting runner");

    let (window, host) = console::channel();
    let window: Arc<dyn ConsoleWindow> = Arc::new(window);
    let settings = cfg.stream_settings();
    let error_element = settings.error_element.clone();

    let engine_cfg = cfg.clone();
    let command = RunnerCommand::new(window, move || PythonEngine::from_config(&engine_cfg))
        .with_stream_settings(settings);
    let data = CommandData::new(application, journal_data);

    let worker = thread::Builder::new()
        .name("srun-script".into())
        .spawn(move || command.execute(&data))
        .context("failed to start the script thread")?;

    let result = match mode {
        ConsoleMode::Tui => tui::run_console(host, worker, &label, &error_element).await?,
        ConsoleMode::Plain => {
            console::plain::run(host, worker, &error_element, io::stdout().is_terminal()).await
        }
    };

    if cfg.show_exit_banner() {
        print_exit_banner(&label, result, io::stderr().is_terminal());
    }

    // process::exit skips destructors; flush the app log first
    drop(log_guard);
    std::process::exit(result.exit_code());
}

fn print_exit_banner(label: &str, result: CommandResult, color: bool) {
    let (word, ok) = match result {
        CommandResult::Succeeded => ("succeeded", true),
        CommandResult::Cancelled => ("cancelled", false),
    };
    let banner = format!("[srun] {label} {word}");
    match (color, ok) {
        (true, true) => eprintln!("{}", banner.green()),
        (true, false) => eprintln!("{}", banner.red()),
        (false, _) => eprintln!("{banner}"),
    }
}
