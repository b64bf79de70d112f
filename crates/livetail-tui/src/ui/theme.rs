use ratatui::style::{Color, Modifier, Style};

use livetail_types::{ConnectionStatus, LogLevel};

/// Color theme for the application
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const ERROR: Color = Color::Red;

    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::HIGHLIGHT)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    /// Search match inside a log line
    pub fn search_match() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    // Channel tabs
    pub fn tab() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn tab_selected() -> Style {
        Style::default()
            .fg(Self::BG)
            .bg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Connection badge in the header
    pub fn badge(status: &ConnectionStatus) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(status.color())
            .add_modifier(Modifier::BOLD)
    }

    /// Level column
    pub fn level(level: LogLevel) -> Style {
        Style::default()
            .fg(level.color())
            .add_modifier(Modifier::BOLD)
    }

    /// Message text, tinted for warnings and errors
    pub fn level_text(level: LogLevel) -> Style {
        match level {
            LogLevel::Error => Style::default().fg(Self::ERROR),
            LogLevel::Warning => Style::default().fg(Color::Yellow),
            LogLevel::Info | LogLevel::Debug => Style::default().fg(Self::FG),
        }
    }

    // Status bar
    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG_DIM).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    pub fn success() -> Style {
        Style::default().fg(Self::SUCCESS)
    }
}
