//! Plain console: prints appended elements to stdout and feeds stdin lines
//! to the script.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::sync::mpsc;

use super::{ConsoleHost, Element};
use crate::host::CommandResult;

const FRAME: Duration = Duration::from_millis(16);

/// Prints new document elements as text lines.
pub struct TextPrinter {
    pub error_element: String,
    pub color: bool,
    printed: usize,
}

impl TextPrinter {
    pub fn new(error_element: impl Into<String>, color: bool) -> Self {
        Self {
            error_element: error_element.into(),
            color,
            printed: 0,
        }
    }

    /// Lines for elements appended since the last call.
    pub fn take_new<'a>(&mut self, elements: &'a [Element]) -> Vec<(bool, &'a str)> {
        let fresh = elements.get(self.printed..).unwrap_or_default();
        self.printed = elements.len();
        fresh
            .iter()
            .flat_map(|el| {
                let is_error = el.tag == self.error_element;
                el.lines().map(move |line| (is_error, line))
            })
            .collect()
    }

    pub fn print_new(&mut self, elements: &[Element]) {
        let color = self.color;
        for (is_error, line) in self.take_new(elements) {
            if is_error && color {
                println!("{}", line.red());
            } else if is_error {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
    }
}

/// Drive the console until the script worker finishes.
pub async fn run(
    mut host: ConsoleHost,
    worker: JoinHandle<CommandResult>,
    error_element: &str,
    color: bool,
) -> CommandResult {
    let mut printer = TextPrinter::new(error_element, color);
    let mut lines = spawn_stdin_reader();

    loop {
        host.process_pending();
        printer.print_new(host.document().body());

        while let Ok(line) = lines.try_recv() {
            match line {
                Some(line) => {
                    if !host.submit_line(&line) {
                        tracing::debug!("input typed before the script attached to the console");
                    }
                }
                None => host.close_input(),
            }
        }

        if worker.is_finished() {
            host.process_pending();
            printer.print_new(host.document().body());
            break;
        }
        tokio::time::sleep(FRAME).await;
    }

    worker.join().unwrap_or_else(|_| {
        tracing::error!("script worker panicked");
        CommandResult::Cancelled
    })
}

/// Read stdin lines on a thread; `None` marks end of input.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Option<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = thread::Builder::new()
        .name("srun-console-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(Some(line)).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = tx.send(None);
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "console input unavailable");
    }
    rx
}
