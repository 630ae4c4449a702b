//! UI layout and rendering logic for the TUI console.

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::app::{App, INPUT_ELEMENT};
use crate::console::ConsoleDocument;
use crate::host::CommandResult;
use crate::utils::unicode::prefix_width;

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App, document: &ConsoleDocument) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Output area
            Constraint::Length(3), // Input area
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_output_area(frame, app, document, main_layout[0]);
    render_input_area(frame, app, main_layout[1]);
    render_status_bar(frame, app, main_layout[2]);

    if app.show_help {
        render_help_overlay(frame);
    }
}

/// Styled lines for every element in the document body.
pub fn document_lines<'a>(app: &App, document: &'a ConsoleDocument) -> Vec<Line<'a>> {
    document
        .body()
        .iter()
        .flat_map(|el| {
            let (prefix, style) = if el.tag == app.error_element {
                ("", Style::default().fg(Color::Red))
            } else if el.tag == INPUT_ELEMENT {
                ("> ", Style::default().fg(Color::Green))
            } else {
                ("", Style::default())
            };
            el.lines()
                .map(move |line| Line::from(vec![Span::styled(format!("{prefix}{line}"), style)]))
        })
        .collect()
}

/// Render the script output area
fn render_output_area(frame: &mut Frame, app: &App, document: &ConsoleDocument, area: Rect) {
    let content_lines = document_lines(app, document);

    let title = match app.finished {
        None => format!("{} - running", app.script_label),
        Some(CommandResult::Succeeded) => format!("{} - finished", app.script_label),
        Some(CommandResult::Cancelled) => format!("{} - cancelled", app.script_label),
    };

    // Calculate scrolling
    let available_height = area.height.saturating_sub(2) as usize; // Account for borders
    let total_lines = content_lines.len();

    let mut paragraph = Paragraph::new(Text::from(content_lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });

    if total_lines > available_height {
        // scroll_offset 0 follows the newest output
        let max_scroll = total_lines.saturating_sub(available_height);
        let actual_offset = app.scroll_offset.min(max_scroll);
        paragraph = paragraph.scroll(((max_scroll - actual_offset) as u16, 0));
    }

    frame.render_widget(paragraph, area);
}

/// Render the input area and place the terminal cursor in it
fn render_input_area(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.is_finished() {
        "Input (script finished)"
    } else {
        "Input"
    };

    let input_paragraph = Paragraph::new(app.input.as_str())
        .block(Block::default().borders(Borders::ALL).title(title));

    frame.render_widget(input_paragraph, area);

    if !app.show_help {
        let column = prefix_width(&app.input, app.input_cursor) as u16;
        let x = (area.x + 1 + column).min(area.right().saturating_sub(2));
        frame.set_cursor_position(Position::new(x, area.y + 1));
    }
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status_paragraph = Paragraph::new(app.status_message.as_str())
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(status_paragraph, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(70, 60, frame.area());

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Script Console Help"),
        Line::from(""),
        Line::from("Input:"),
        Line::from("  Enter         - Send the line to the script"),
        Line::from("  ←/→ Home/End  - Move the cursor"),
        Line::from("  ↑/↓           - Browse input history"),
        Line::from(""),
        Line::from("Output:"),
        Line::from("  PgUp/PgDn     - Scroll output"),
        Line::from("  Ctrl+End      - Follow newest output"),
        Line::from(""),
        Line::from("Window:"),
        Line::from("  F1            - Toggle this help"),
        Line::from("  q/Esc         - Close once the script has finished"),
        Line::from("  Ctrl+C twice  - Close the console"),
    ];

    let help_paragraph = Paragraph::new(help_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .style(Style::default().bg(Color::Black).fg(Color::White)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
