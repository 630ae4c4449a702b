//! TUI console state: input line, history, scrolling and run status.

use crate::host::CommandResult;
use crate::utils::unicode::char_to_byte_index;

/// Tag used for lines the user typed, echoed into the document.
pub const INPUT_ELEMENT: &str = "input";

/// Application state for the TUI console
#[derive(Debug)]
pub struct App {
    /// Script being run, shown in the title
    pub script_label: String,
    /// Tag rendered as error output
    pub error_element: String,
    /// Input buffer
    pub input: String,
    /// Cursor position in input (character index)
    pub input_cursor: usize,
    /// Input history (user-entered lines)
    pub input_history: Vec<String>,
    /// Current history index when navigating (None = new line)
    pub history_index: Option<usize>,
    /// Lines scrolled up from the bottom (0 = follow output)
    pub scroll_offset: usize,
    /// Whether to show help
    pub show_help: bool,
    /// Status message to display
    pub status_message: String,
    /// Outcome once the script worker has finished
    pub finished: Option<CommandResult>,
    /// Timestamp of last Ctrl+C press for double Ctrl+C detection
    pub last_ctrl_c_time: Option<std::time::Instant>,
}

impl App {
    pub fn new(script_label: impl Into<String>, error_element: impl Into<String>) -> Self {
        let mut app = Self {
            script_label: script_label.into(),
            error_element: error_element.into(),
            input: String::new(),
            input_cursor: 0,
            input_history: Vec::new(),
            history_index: None,
            scroll_offset: 0,
            show_help: false,
            status_message: String::new(),
            finished: None,
            last_ctrl_c_time: None,
        };
        app.update_status_message();
        app
    }

    /// Toggle help display
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    // ----- Input editing helpers -----
    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn move_cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.input_cursor < self.input_len() {
            self.input_cursor += 1;
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.input_cursor = self.input_len();
    }

    pub fn insert_char(&mut self, c: char) {
        let at = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(at, c);
        self.input_cursor += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r' && *c != '\n') {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let at = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.input_cursor < self.input_len() {
            let at = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(at);
        }
    }

    /// Take the current line for submission and record it in history.
    pub fn take_input(&mut self) -> String {
        let line = std::mem::take(&mut self.input);
        self.input_cursor = 0;
        self.push_history(line.clone());
        line
    }

    pub fn push_history(&mut self, line: String) {
        if !line.trim().is_empty() && self.input_history.last() != Some(&line) {
            self.input_history.push(line);
        }
        self.history_index = None;
    }

    pub fn history_prev(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let i = match self.history_index {
            None => self.input_history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.history_index = Some(i);
        self.input = self.input_history[i].clone();
        self.move_cursor_end();
    }

    pub fn history_next(&mut self) {
        match self.history_index {
            Some(i) if i + 1 < self.input_history.len() => {
                self.history_index = Some(i + 1);
                self.input = self.input_history[i + 1].clone();
                self.move_cursor_end();
            }
            Some(_) => {
                self.history_index = None;
                self.input.clear();
                self.input_cursor = 0;
            }
            None => {}
        }
    }

    pub fn set_finished(&mut self, result: CommandResult) {
        self.finished = Some(result);
        self.update_status_message();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    fn update_status_message(&mut self) {
        self.status_message = match self.finished {
            None => "Running | Enter sends input | F1 help | Ctrl+C twice closes".to_string(),
            Some(CommandResult::Succeeded) => "Script succeeded | q/Esc closes".to_string(),
            Some(CommandResult::Cancelled) => "Script cancelled | q/Esc closes".to_string(),
        };
    }

    /// Handle Ctrl+C press and detect double press for close
    /// Returns true if the console should close, false otherwise
    pub fn handle_ctrl_c(&mut self) -> bool {
        const DOUBLE_CTRL_C_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

        let now = std::time::Instant::now();

        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        // Single Ctrl+C - clear input and record timestamp
        self.input.clear();
        self.input_cursor = 0;
        self.history_index = None;
        self.last_ctrl_c_time = Some(now);

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_respects_multibyte_characters() {
        let mut app = App::new("s.py", "errordiv");
        app.insert_str("héllo");
        app.move_cursor_left();
        app.move_cursor_left();
        app.backspace();
        assert_eq!(app.input, "hélo");
        app.move_cursor_home();
        app.delete();
        assert_eq!(app.input, "élo");
        app.move_cursor_end();
        app.insert_char('!');
        assert_eq!(app.input, "élo!");
    }

    #[test]
    fn history_walks_back_and_forth() {
        let mut app = App::new("s.py", "errordiv");
        for line in ["one", "two", "two", " "] {
            app.insert_str(line);
            app.take_input();
        }
        assert_eq!(app.input_history, vec!["one", "two"]);
        app.history_prev();
        assert_eq!(app.input, "two");
        app.history_prev();
        app.history_prev();
        assert_eq!(app.input, "one");
        app.history_next();
        assert_eq!(app.input, "two");
        app.history_next();
        assert_eq!(app.input, "");
        assert_eq!(app.history_index, None);
    }

    #[test]
    fn double_ctrl_c_requests_close() {
        let mut app = App::new("s.py", "errordiv");
        app.insert_str("partial");
        assert!(!app.handle_ctrl_c());
        assert!(app.input.is_empty());
        assert!(app.handle_ctrl_c());
    }

    #[test]
    fn status_follows_the_outcome() {
        let mut app = App::new("s.py", "errordiv");
        assert!(app.status_message.starts_with("Running"));
        app.set_finished(CommandResult::Cancelled);
        assert!(app.is_finished());
        assert!(app.status_message.contains("cancelled"));
    }
}
