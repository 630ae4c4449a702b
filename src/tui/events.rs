//! Custom event types for the TUI console.

use crossterm::event::KeyEvent;

/// Events read from the terminal while the console is on screen
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// Terminal was resized; redraw
    Resize,
}
