//! Console window surface: the trait the stream bridge talks to and the
//! channel-backed window used by the front ends.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::stream::InputFeed;

pub mod document;
pub mod plain;

pub use document::{ConsoleDocument, Element};

/// Document mutation marshalled onto the console's UI loop.
pub type UiTask = Box<dyn FnOnce(&mut ConsoleDocument) + Send + 'static>;

/// Window that owns a console document.
///
/// Everything here may be called from the script thread. Only `dispatch`
/// touches the document, and it must not wait for the UI loop.
pub trait ConsoleWindow: Send + Sync {
    /// Queue a document mutation for the UI loop.
    fn dispatch(&self, task: UiTask);
    fn is_visible(&self) -> bool;
    fn is_disposed(&self) -> bool;
    fn show(&self);
    fn focus(&self);
    /// Give the host loop a chance to run pending work.
    fn pump(&self);
    /// Route completed input lines typed into the window to `feed`.
    fn attach_input(&self, feed: InputFeed);
}

/// Front end used to present the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConsoleMode {
    /// Full-screen terminal console.
    Tui,
    /// Line-oriented output on stdout, input from stdin.
    Plain,
}

impl FromStr for ConsoleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tui" => Ok(Self::Tui),
            "plain" => Ok(Self::Plain),
            other => Err(format!("unknown console mode: {other}")),
        }
    }
}

/// Messages travelling from window handles to the UI loop.
pub enum ConsoleEvent {
    Show,
    Focus,
    Apply(UiTask),
    AttachInput(InputFeed),
}

impl fmt::Debug for ConsoleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Show => f.write_str("Show"),
            Self::Focus => f.write_str("Focus"),
            Self::Apply(_) => f.write_str("Apply(..)"),
            Self::AttachInput(_) => f.write_str("AttachInput(..)"),
        }
    }
}

#[derive(Debug, Default)]
struct WindowFlags {
    visible: AtomicBool,
    disposed: AtomicBool,
}

/// Script-side handle to a console whose UI loop drains a channel.
#[derive(Debug, Clone)]
pub struct ChannelConsole {
    flags: Arc<WindowFlags>,
    tx: mpsc::UnboundedSender<ConsoleEvent>,
}

/// UI-side owner of the console: document, flags and attached input.
#[derive(Debug)]
pub struct ConsoleHost {
    flags: Arc<WindowFlags>,
    rx: mpsc::UnboundedReceiver<ConsoleEvent>,
    document: ConsoleDocument,
    input: Option<InputFeed>,
    focused: bool,
}

/// Create a hidden console: the handle for the script side and the host
/// for the UI loop.
pub fn channel() -> (ChannelConsole, ConsoleHost) {
    let flags = Arc::new(WindowFlags::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let console = ChannelConsole {
        flags: Arc::clone(&flags),
        tx,
    };
    let host = ConsoleHost {
        flags,
        rx,
        document: ConsoleDocument::new(),
        input: None,
        focused: false,
    };
    (console, host)
}

impl ChannelConsole {
    fn send(&self, event: ConsoleEvent) {
        // UI loop gone: nothing can render anymore.
        if self.tx.send(event).is_err() {
            self.flags.visible.store(false, Ordering::SeqCst);
            self.flags.disposed.store(true, Ordering::SeqCst);
        }
    }
}

impl ConsoleWindow for ChannelConsole {
    fn dispatch(&self, task: UiTask) {
        self.send(ConsoleEvent::Apply(task));
    }

    fn is_visible(&self) -> bool {
        self.flags.visible.load(Ordering::SeqCst)
    }

    fn is_disposed(&self) -> bool {
        self.flags.disposed.load(Ordering::SeqCst)
    }

    fn show(&self) {
        if self.is_disposed() {
            return;
        }
        self.flags.visible.store(true, Ordering::SeqCst);
        self.send(ConsoleEvent::Show);
    }

    fn focus(&self) {
        self.send(ConsoleEvent::Focus);
    }

    fn pump(&self) {
        // The UI loop runs on its own thread; stepping aside is enough.
        std::thread::yield_now();
    }

    fn attach_input(&self, feed: InputFeed) {
        self.send(ConsoleEvent::AttachInput(feed));
    }
}

impl ConsoleHost {
    /// Apply every queued event. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            handled += 1;
            match event {
                ConsoleEvent::Show => tracing::debug!("console shown"),
                ConsoleEvent::Focus => self.focused = true,
                ConsoleEvent::Apply(task) => task(&mut self.document),
                ConsoleEvent::AttachInput(feed) => self.input = Some(feed),
            }
        }
        handled
    }

    pub fn document(&self) -> &ConsoleDocument {
        &self.document
    }

    /// Append an element directly from the UI loop.
    pub fn append(&mut self, element: Element) {
        self.document.append_child(element);
    }

    pub fn is_visible(&self) -> bool {
        self.flags.visible.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.flags.disposed.load(Ordering::SeqCst)
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Deliver one typed line to the attached stream. Returns false when
    /// no stream is listening.
    pub fn submit_line(&self, line: &str) -> bool {
        match &self.input {
            Some(feed) => {
                feed.push_line(line);
                true
            }
            None => false,
        }
    }

    /// No more input will ever be typed (e.g. stdin reached EOF).
    pub fn close_input(&self) {
        if let Some(feed) = &self.input {
            feed.close();
        }
    }

    /// Hide the window without disposing it.
    pub fn hide(&self) {
        self.flags.visible.store(false, Ordering::SeqCst);
        self.wake_reader();
    }

    /// Close and dispose the window: later writes are dropped and pending
    /// reads end.
    pub fn close(&self) {
        self.flags.visible.store(false, Ordering::SeqCst);
        self.flags.disposed.store(true, Ordering::SeqCst);
        self.wake_reader();
    }

    fn wake_reader(&self) {
        if let Some(feed) = &self.input {
            feed.wake();
        }
    }
}
