use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};
use unicode_width::UnicodeWidthStr;

use crate::ui::Theme;

/// Status bar showing keyboard shortcuts, or a message in their place
pub struct StatusBar<'a> {
    hints: Vec<(&'a str, &'a str)>,
    message: Option<(String, Style)>,
    right: Vec<Span<'a>>,
}

impl<'a> StatusBar<'a> {
    pub fn new() -> Self {
        Self {
            hints: Vec::new(),
            message: None,
            right: Vec::new(),
        }
    }

    /// Add keyboard hints as (key, description) pairs
    pub fn hints<I>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.hints = hints.into_iter().collect();
        self
    }

    /// Show a message instead of the hints
    pub fn message<S: Into<String>>(mut self, text: S, style: Style) -> Self {
        self.message = Some((text.into(), style));
        self
    }

    /// Spans rendered flush right
    pub fn right<I>(mut self, spans: I) -> Self
    where
        I: IntoIterator<Item = Span<'a>>,
    {
        self.right = spans.into_iter().collect();
        self
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        buf.set_style(area, Theme::status_bar());

        let left = match self.message {
            Some((text, style)) => Line::from(Span::styled(format!(" {}", text), style)),
            None => {
                let mut spans = Vec::new();
                for (i, (key, desc)) in self.hints.iter().enumerate() {
                    if i > 0 {
                        spans.push(Span::styled(" ", Theme::status_bar()));
                    }
                    spans.push(Span::styled(format!("[{}]", key), Theme::status_bar_key()));
                    spans.push(Span::styled(desc.to_string(), Theme::status_bar()));
                }
                Line::from(spans)
            }
        };

        let right = Line::from(self.right);
        let right_width = right.width() as u16;
        let left_room = area.width.saturating_sub(right_width + 3);

        buf.set_line(area.x + 1, area.y, &left, left_room);

        // Right side wins when space is short
        if right_width > 0 && right_width + 1 < area.width {
            let right_x = area.x + area.width - right_width - 1;
            buf.set_line(right_x, area.y, &right, right_width);
        }
    }
}

/// Display width of a string in terminal cells
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Default hints for the log viewer
pub fn log_viewer_hints() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Tab", "Channel"),
        ("/", "Search"),
        ("l", "Level"),
        ("f", "Follow"),
        ("r", "Reload"),
        ("e", "Export"),
        ("?", "Help"),
        ("q", "Quit"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_hints_and_right_text() {
        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        StatusBar::new()
            .hints([("q", "Quit")])
            .right([Span::raw("12 logs")])
            .render(area, &mut buf);

        let text = row(&buf);
        assert!(text.starts_with(" [q]Quit"));
        assert!(text.trim_end().ends_with("12 logs"));
    }

    #[test]
    fn test_message_replaces_hints() {
        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        StatusBar::new()
            .hints([("q", "Quit")])
            .message("Exported 3 logs", Theme::success())
            .render(area, &mut buf);

        let text = row(&buf);
        assert!(text.contains("Exported 3 logs"));
        assert!(!text.contains("[q]"));
    }
}
