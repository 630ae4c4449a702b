//! Event loop for the full-screen console.

use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::mpsc;

use super::{
    app::{App, INPUT_ELEMENT},
    events::TuiEvent,
    ui::render_ui,
};
use crate::console::{ConsoleHost, Element};
use crate::host::CommandResult;

const FRAME: Duration = Duration::from_millis(16); // ~60 FPS
const PAGE: usize = 10;

/// What a key press asks the loop to do
#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Close,
}

/// Terminal taken over for the console, restored on drop.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    stop_input: Arc<AtomicBool>,
    input_thread: Option<JoinHandle<()>>,
    restored: bool,
}

impl TerminalSession {
    fn enter(event_tx: mpsc::UnboundedSender<TuiEvent>) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableBracketedPaste)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let stop_input = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_input);
        let input_thread = thread::Builder::new()
            .name("srun-tui-input".into())
            .spawn(move || read_terminal_events(event_tx, stop))?;

        Ok(Self {
            terminal,
            stop_input,
            input_thread: Some(input_thread),
            restored: false,
        })
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.stop_input.store(true, Ordering::SeqCst);
        if let Some(handle) = self.input_thread.take() {
            let _ = handle.join();
        }
        disable_raw_mode()?;
        self.terminal.backend_mut().execute(DisableBracketedPaste)?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(error = %err, "failed to restore terminal");
        }
    }
}

/// Poll crossterm until asked to stop or the loop goes away.
fn read_terminal_events(tx: mpsc::UnboundedSender<TuiEvent>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
            continue;
        }
        let forwarded = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => tx.send(TuiEvent::Key(key)),
            Ok(Event::Paste(text)) => tx.send(TuiEvent::Paste(text)),
            Ok(Event::Resize(_, _)) => tx.send(TuiEvent::Resize),
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "terminal event read failed");
                break;
            }
        };
        if forwarded.is_err() {
            break; // Channel closed
        }
    }
}

/// Run the full-screen console until the script worker has finished and the
/// console is closed (or was never shown).
///
/// The terminal is only taken over once the script shows the console, so a
/// script that never writes leaves the terminal untouched.
pub async fn run_console(
    mut host: ConsoleHost,
    worker: JoinHandle<CommandResult>,
    script_label: &str,
    error_element: &str,
) -> Result<CommandResult> {
    let mut app = App::new(script_label, error_element);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TuiEvent>();
    let mut session: Option<TerminalSession> = None;
    let mut worker = Some(worker);

    loop {
        host.process_pending();

        if session.is_none() && host.is_visible() && !host.is_disposed() {
            session = Some(TerminalSession::enter(event_tx.clone())?);
        }

        if let Some(handle) = worker.take_if(|w| w.is_finished()) {
            host.process_pending();
            app.set_finished(join_worker(handle));
        }

        if let Some(active) = session.as_mut().filter(|s| !s.restored) {
            if host.is_disposed() {
                active.restore()?;
            } else {
                active
                    .terminal
                    .draw(|frame| render_ui(frame, &app, host.document()))?;

                while let Ok(tui_event) = event_rx.try_recv() {
                    match tui_event {
                        TuiEvent::Key(key) => {
                            if handle_key_event(&mut app, &mut host, key) == KeyOutcome::Close {
                                host.close();
                                active.restore()?;
                                break;
                            }
                        }
                        TuiEvent::Paste(text) => app.insert_str(&text),
                        TuiEvent::Resize => {}
                    }
                }
            }
        }

        if let Some(result) = app.finished {
            let never_shown = session.is_none();
            if never_shown || host.is_disposed() {
                if let Some(mut active) = session.take() {
                    active.restore()?;
                }
                return Ok(result);
            }
        }

        tokio::time::sleep(FRAME).await;
    }
}

fn join_worker(handle: JoinHandle<CommandResult>) -> CommandResult {
    handle.join().unwrap_or_else(|_| {
        tracing::error!("script worker panicked");
        CommandResult::Cancelled
    })
}

/// Handle keyboard events
fn handle_key_event(app: &mut App, host: &mut ConsoleHost, key: KeyEvent) -> KeyOutcome {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') if ctrl => {
            if app.handle_ctrl_c() {
                return KeyOutcome::Close;
            }
        }
        KeyCode::Char('d') if ctrl => {
            // End of input for the script
            host.close_input();
        }
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Esc if app.show_help => app.toggle_help(),
        KeyCode::Esc if app.is_finished() => return KeyOutcome::Close,
        KeyCode::Char('q') if app.is_finished() && app.input.is_empty() => {
            return KeyOutcome::Close;
        }
        KeyCode::Enter => {
            if app.is_finished() {
                return KeyOutcome::Continue;
            }
            let line = app.take_input();
            let mut echo = Element::new(INPUT_ELEMENT);
            echo.set_inner_html(line.as_str());
            host.append(echo);
            if !host.submit_line(&line) {
                tracing::debug!("line typed before the script attached to the console");
            }
            app.scroll_to_bottom();
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::End if ctrl => app.scroll_to_bottom(),
        KeyCode::Home => app.move_cursor_home(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Up => app.history_prev(),
        KeyCode::Down => app.history_next(),
        KeyCode::PageUp => app.scroll_up(PAGE),
        KeyCode::PageDown => app.scroll_down(PAGE),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }

    KeyOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{self, ConsoleWindow};
    use crate::stream::ConsoleStream;
    use std::io::Read;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn enter_echoes_and_submits_the_line() {
        let (console, mut host) = console::channel();
        let console: Arc<dyn ConsoleWindow> = Arc::new(console);
        let mut stream = ConsoleStream::new(Arc::clone(&console));
        console.show();
        host.process_pending();

        let mut app = App::new("s.py", "errordiv");
        for c in "42".chars() {
            handle_key_event(&mut app, &mut host, press(KeyCode::Char(c)));
        }
        assert_eq!(
            handle_key_event(&mut app, &mut host, press(KeyCode::Enter)),
            KeyOutcome::Continue
        );

        assert_eq!(host.document().rendered_lines(), vec!["42"]);
        assert_eq!(host.document().body()[0].tag, INPUT_ELEMENT);
        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"42\n");
    }

    #[test]
    fn q_closes_only_after_the_script_finished() {
        let (_console, mut host) = console::channel();
        let mut app = App::new("s.py", "errordiv");
        assert_eq!(
            handle_key_event(&mut app, &mut host, press(KeyCode::Char('q'))),
            KeyOutcome::Continue
        );
        assert_eq!(app.input, "q");
        app.take_input();
        app.set_finished(CommandResult::Succeeded);
        assert_eq!(
            handle_key_event(&mut app, &mut host, press(KeyCode::Char('q'))),
            KeyOutcome::Close
        );
    }

    #[tokio::test]
    async fn returns_without_touching_the_terminal_when_never_shown() {
        let (_console, host) = console::channel();
        let worker = thread::spawn(|| CommandResult::Cancelled);
        let result = run_console(host, worker, "s.py", "errordiv").await.unwrap();
        assert_eq!(result, CommandResult::Cancelled);
    }
}
