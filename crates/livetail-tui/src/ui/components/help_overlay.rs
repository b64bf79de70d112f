use ratatui::{
    Frame,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::ui::Layout;

/// Help overlay showing keybindings
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame) {
        let lines = Self::lines();
        let popup_area = Layout::centered_popup(frame.area(), 52, lines.len() as u16 + 2);

        // Clear the background
        frame.render_widget(Clear, popup_area);

        let help_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Span::styled(
                    " Help ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );

        frame.render_widget(help_widget, popup_area);
    }

    fn lines() -> Vec<Line<'static>> {
        vec![
            Self::section("Channels"),
            Self::key_line("Tab/S-Tab", "Next / previous channel"),
            Self::key_line("1-9", "Jump to channel"),
            Self::key_line("r", "Reload history"),
            Self::key_line("R", "Reconnect live stream"),
            Line::from(""),
            Self::section("Navigation"),
            Self::key_line("j/k", "Scroll down / up"),
            Self::key_line("Ctrl+d/u", "Page down / up"),
            Self::key_line("g/G", "Go to top / bottom"),
            Self::key_line("f", "Toggle follow"),
            Line::from(""),
            Self::section("Filter"),
            Self::key_line("/", "Search message and source"),
            Self::key_line("l/L", "Next / previous level"),
            Self::key_line("n", "Clear filter"),
            Line::from(""),
            Self::section("Display"),
            Self::key_line("t/T", "Timestamps / local time"),
            Self::key_line("o", "Toggle sources"),
            Self::key_line("d", "Toggle details"),
            Self::key_line("s", "Toggle stats bar"),
            Self::key_line("c", "Clear view"),
            Self::key_line("e", "Export filtered view"),
            Self::key_line("?/Esc", "Close help"),
            Self::key_line("q", "Quit"),
        ]
    }

    fn section(title: &'static str) -> Line<'static> {
        Line::from(Span::styled(
            title,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))
    }

    fn key_line(key: &'static str, desc: &'static str) -> Line<'static> {
        Line::from(vec![
            Span::styled(format!("  {:>10}", key), Style::default().fg(Color::Green)),
            Span::styled(format!("  {}", desc), Style::default().fg(Color::White)),
        ])
    }
}
