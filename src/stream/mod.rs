//! Console stream: the byte stream a script sees as its stdout and stdin.
//!
//! Writes are rendered into the console document by tasks dispatched to the
//! console's UI loop, so the writing thread never touches the document and
//! never waits on the UI loop. Reads block until the console has produced a
//! complete line, waking on line completion and re-checking the console every
//! poll interval so a closed console ends the read instead of hanging it.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::console::{ConsoleDocument, ConsoleWindow};

pub mod lines;
pub mod text;

pub use lines::LineBuffer;
pub use text::{to_markup, BomFilter, Utf8Decoder};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_OUTPUT_ELEMENT: &str = "div";
pub const DEFAULT_ERROR_ELEMENT: &str = "errordiv";

/// Rendering and polling knobs for a [`ConsoleStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub output_element: String,
    pub error_element: String,
    pub poll_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            output_element: DEFAULT_OUTPUT_ELEMENT.to_string(),
            error_element: DEFAULT_ERROR_ELEMENT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct StreamState {
    bom: BomFilter,
    decoder: Utf8Decoder,
    lines: LineBuffer,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<StreamState>,
    line_ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Console-side handle that delivers typed bytes into a stream's line
/// buffer.
#[derive(Clone)]
pub struct InputFeed {
    shared: Arc<Shared>,
}

impl InputFeed {
    pub fn push(&self, bytes: &[u8]) {
        let completed = self.shared.lock().lines.push_bytes(bytes);
        if completed > 0 {
            self.shared.line_ready.notify_all();
        }
    }

    pub fn push_line(&self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.push(&bytes);
    }

    /// End of input: pending lines are still delivered, then reads return 0.
    pub fn close(&self) {
        self.shared.lock().lines.close();
        self.shared.line_ready.notify_all();
    }

    /// Wake blocked readers so they re-check the console.
    pub fn wake(&self) {
        self.shared.line_ready.notify_all();
    }
}

impl fmt::Debug for InputFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFeed").finish_non_exhaustive()
    }
}

/// Stream bound to one console window. Clones share the same buffers, BOM
/// counter and lock.
#[derive(Clone)]
pub struct ConsoleStream {
    console: Arc<dyn ConsoleWindow>,
    shared: Arc<Shared>,
    output_element: Arc<str>,
    error_element: Arc<str>,
    poll_interval: Duration,
}

impl ConsoleStream {
    pub fn new(console: Arc<dyn ConsoleWindow>) -> Self {
        Self::with_settings(console, &StreamSettings::default())
    }

    pub fn with_settings(console: Arc<dyn ConsoleWindow>, settings: &StreamSettings) -> Self {
        let stream = Self {
            console,
            shared: Arc::new(Shared::default()),
            output_element: Arc::from(settings.output_element.as_str()),
            error_element: Arc::from(settings.error_element.as_str()),
            poll_interval: settings.poll_interval,
        };
        stream.console.focus();
        stream.console.attach_input(stream.input_feed());
        stream
    }

    pub fn input_feed(&self) -> InputFeed {
        InputFeed {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn can_read(&self) -> bool {
        !self.console.is_disposed()
    }

    pub fn can_write(&self) -> bool {
        true
    }

    pub fn can_seek(&self) -> bool {
        false
    }

    pub fn is_console_visible(&self) -> bool {
        self.console.is_visible()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Render script output. Never fails: a disposed console drops it.
    pub fn write_output(&self, buf: &[u8]) {
        {
            let mut state = self.shared.lock();
            if self.console.is_disposed() {
                return;
            }
            if !self.console.is_visible() {
                self.console.show();
            }
            let payload = state.bom.strip(buf);
            if payload.is_empty() {
                return;
            }
            let text = state.decoder.decode(payload);
            // dispatched under the lock so elements land in call order
            self.append(Arc::clone(&self.output_element), text);
        }
        self.console.pump();
    }

    /// Render whatever the decoder still holds back from a truncated
    /// multi-byte sequence. Called once the engine is done writing.
    pub fn finish_output(&self) {
        {
            let mut state = self.shared.lock();
            if self.console.is_disposed() {
                return;
            }
            let Some(text) = state.decoder.finish() else {
                return;
            };
            if !self.console.is_visible() {
                self.console.show();
            }
            self.append(Arc::clone(&self.output_element), text);
        }
        self.console.pump();
    }

    /// Show the console ahead of a read so there is somewhere to type.
    /// A disposed console stays closed.
    pub fn activate(&self) {
        let _state = self.shared.lock();
        if !self.console.is_disposed() && !self.console.is_visible() {
            self.console.show();
        }
    }

    /// Render a message in the error element. Does not touch the BOM
    /// counter.
    pub fn write_error(&self, message: &str) {
        {
            let _state = self.shared.lock();
            if self.console.is_disposed() {
                return;
            }
            if !self.console.is_visible() {
                self.console.show();
            }
            self.append(Arc::clone(&self.error_element), message.to_string());
        }
        self.console.pump();
    }

    fn append(&self, tag: Arc<str>, text: String) {
        self.console
            .dispatch(Box::new(move |doc: &mut ConsoleDocument| {
                let markup = to_markup(&text);
                if markup.is_empty() {
                    return;
                }
                let mut element = doc.create_element(&tag);
                element.set_inner_html(markup);
                doc.append_child(element);
            }));
    }

    /// Block until a completed console line is available and copy it into
    /// `buf`.
    ///
    /// Fails with `UnexpectedEof` once the console is no longer visible.
    /// Returns `Ok(0)` when the console closed its input and every line has
    /// been read.
    pub fn read_line(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.lock();
        loop {
            if let Some(n) = state.lines.read_into(buf) {
                return Ok(n);
            }
            if state.lines.is_closed() {
                return Ok(0);
            }
            if !self.console.is_visible() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "console closed while waiting for input",
                ));
            }
            drop(state);
            self.console.pump();
            state = self.shared.lock();
            if state.lines.has_line() || state.lines.is_closed() {
                continue;
            }
            state = match self.shared.line_ready.wait_timeout(state, self.poll_interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    pub fn set_len(&self, _len: u64) -> io::Result<()> {
        Err(unsupported("set_len"))
    }
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("console stream does not support {op}"),
    )
}

impl Write for ConsoleStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_output(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ConsoleStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_line(buf)
    }
}

impl Seek for ConsoleStream {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported("seek"))
    }
}

impl fmt::Debug for ConsoleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleStream")
            .field("output_element", &self.output_element)
            .field("error_element", &self.error_element)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
