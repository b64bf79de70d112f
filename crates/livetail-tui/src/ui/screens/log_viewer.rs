use chrono::Local;
use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::UnicodeWidthChar;

use livetail_logs::{ArcLogRecord, LogBuffer, LogFilter};
use livetail_types::{LevelFilter, LogLevel, LogRecord};

use crate::app::{AppState, NotificationKind};
use crate::ui::components::{StatusBar, display_width, log_viewer_hints};
use crate::ui::{Layout, Theme};

/// Width of the source column
const SOURCE_WIDTH: usize = 10;

/// Log viewer screen
pub struct LogViewerScreen;

/// Cut `s` to at most `max_width` terminal cells, marking the cut with an ellipsis
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 1 {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

/// Single-line form of a message (embedded newlines would break the row layout)
fn one_line(s: &str) -> String {
    if s.contains(['\n', '\r', '\t']) {
        s.replace(['\n', '\r', '\t'], " ")
    } else {
        s.to_string()
    }
}

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState, log_buffer: &LogBuffer) {
        let areas = Layout::log_viewer(frame.area(), state.ui_state.stats_visible);

        Self::render_header(frame, areas.header, state);
        if let Some(stats) = areas.stats {
            Self::render_stats_bar(frame, stats, log_buffer);
        }
        Self::render_filter_bar(frame, areas.filter, state);
        Self::render_logs(frame, areas.logs, state, log_buffer);
        Self::render_status_bar(frame, areas.status, state, log_buffer);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![
            Span::styled("livetail", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
        ];

        for (i, channel) in state.channels.iter().enumerate() {
            let style = if i == state.selected_channel {
                Theme::tab_selected()
            } else {
                Theme::tab()
            };
            spans.push(Span::styled(format!(" {}:{} ", i + 1, channel), style));
            spans.push(Span::raw(" "));
        }

        spans.push(Span::styled("│ ", Theme::text_dim()));
        spans.push(Span::styled(
            format!(" {} ", state.status.label()),
            Theme::badge(&state.status),
        ));
        if let Some(reason) = state.status.reason() {
            spans.push(Span::styled(format!(" {}", reason), Theme::error()));
        }
        if state.loading {
            spans.push(Span::styled("  loading history…", Theme::text_highlight()));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_filter_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let ui = &state.ui_state;
        let mut spans = vec![Span::styled(" Level: ", Theme::text_dim())];

        let level_style = match state.filter.level {
            LevelFilter::All => Theme::text(),
            LevelFilter::Only(level) => Theme::level(level),
        };
        spans.push(Span::styled(state.filter.level.label(), level_style));
        spans.push(Span::styled("  ", Theme::text()));

        // Prompt
        if ui.search_active {
            spans.push(Span::styled(
                "/",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(ui.search_input.clone(), Theme::text_highlight()));
            spans.push(Span::styled(
                "█",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
        } else {
            spans.push(Span::styled("Search: ", Theme::text_dim()));
            spans.push(Span::styled(state.filter.search.clone(), Theme::text_highlight()));
        }

        if let Some(err) = &ui.filter_error {
            spans.push(Span::styled(" ", Theme::text()));
            spans.push(Span::styled(format!("⚠ {}", err), Theme::error()));
        }

        // Hints
        if ui.search_active {
            spans.push(Span::styled("  [Enter] Apply  [Esc] Cancel", Theme::text_dim()));
        } else if state.filter.is_narrowing() {
            spans.push(Span::styled("  [n] Clear  [/] Edit  [l] Level", Theme::text_dim()));
        }

        let filter_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if ui.search_active {
                    Theme::border_focused()
                } else if ui.filter_error.is_some() {
                    Style::default().fg(Color::Red)
                } else {
                    Theme::border()
                })
                .title(Span::styled(" Filter ", Theme::title())),
        );

        frame.render_widget(filter_bar, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, log_buffer: &LogBuffer) {
        let show_details = state.ui_state.show_details;
        let heights: Vec<usize> = state
            .visible_records(log_buffer)
            .iter()
            .map(|record| record_rows(record, show_details))
            .collect();
        let total_logs = heights.len();
        let total_rows: usize = heights.iter().sum();

        // Calculate visible area (accounting for border)
        let inner_height = area.height.saturating_sub(2) as usize;
        let follow = &mut state.ui_state.follow;
        follow.set_viewport(inner_height);
        follow.on_content_changed(total_rows);
        let offset = follow.offset();

        // Viewport-first: only format records that reach the window
        let (first, skip_rows) = locate_row(&heights, offset);
        let mut rows_left = inner_height + skip_rows;
        let visible_logs: Vec<ArcLogRecord> = state
            .ui_state
            .filter_cache
            .entries()
            .iter()
            .zip(&heights)
            .skip(first)
            .take_while(|(_, rows)| {
                let wanted = rows_left > 0;
                rows_left = rows_left.saturating_sub(**rows);
                wanted
            })
            .map(|(record, _)| record.clone())
            .collect();

        // Subtract borders and scrollbar
        let inner_width = area.width.saturating_sub(4) as usize;

        let view: &AppState = state;
        let lines: Vec<Line> = visible_logs
            .iter()
            .flat_map(|record| Self::format_record_lines(record, view, inner_width))
            .skip(skip_rows)
            .take(inner_height)
            .collect();

        let title = if state.filter.is_narrowing() {
            format!(" {} ({} of {}) ", state.filter.channel, total_logs, log_buffer.len())
        } else {
            format!(" {} ({}) ", state.filter.channel, total_logs)
        };

        let body = if lines.is_empty() {
            let hint = if state.loading {
                "Loading history…"
            } else if state.filter.is_narrowing() && !log_buffer.is_empty() {
                "No records match the current filter"
            } else {
                "Waiting for records…"
            };
            vec![Line::from(Span::styled(hint, Theme::text_dim()))]
        } else {
            lines
        };

        let logs_widget = Paragraph::new(body).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(logs_widget, area);

        // Render scrollbar
        if total_rows > inner_height {
            let max_scroll = total_rows.saturating_sub(inner_height);
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));

            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(offset.min(max_scroll));

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    fn render_stats_bar(frame: &mut Frame, area: Rect, log_buffer: &LogBuffer) {
        let counts = log_buffer.level_counts();

        let mut spans = vec![Span::styled(" ", Theme::text())];
        for level in [LogLevel::Error, LogLevel::Warning, LogLevel::Info, LogLevel::Debug] {
            spans.push(Span::styled(format!("{}:", level.as_str()), Theme::level(level)));
            spans.push(Span::styled(format!("{} ", counts.get(level)), Theme::text()));
        }

        spans.push(Span::styled("│ ", Theme::text_dim()));
        spans.push(Span::styled("Total:", Theme::text_dim()));
        spans.push(Span::styled(
            format!("{}/{}", counts.total(), log_buffer.capacity()),
            Theme::text(),
        ));

        let stats_widget = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(" Stats ", Theme::title())),
        );

        frame.render_widget(stats_widget, area);
    }

    /// Format a record into its display line, plus detail lines when enabled
    fn format_record_lines(
        record: &LogRecord,
        state: &AppState,
        available_width: usize,
    ) -> Vec<Line<'static>> {
        let ui = &state.ui_state;
        let mut spans = Vec::new();
        let mut prefix_width: usize = 0;

        // " HH:MM:SS.mmm" = 13 cells
        if ui.show_timestamps {
            let time_str = if ui.use_local_time {
                record
                    .timestamp
                    .with_timezone(&Local)
                    .format("%H:%M:%S%.3f")
                    .to_string()
            } else {
                record.timestamp.format("%H:%M:%S%.3f").to_string()
            };
            spans.push(Span::styled(format!(" {}", time_str), Theme::text_dim()));
            prefix_width += 13;
        }

        if ui.show_sources {
            let source = truncate_to_width(&record.source, SOURCE_WIDTH);
            let pad = SOURCE_WIDTH.saturating_sub(display_width(&source));
            spans.push(Span::styled(
                format!(" {}{}", " ".repeat(pad), source),
                Style::default().fg(source_color(&record.source)),
            ));
            prefix_width += SOURCE_WIDTH + 1;
        }

        // Level (fixed width) - " XXX" = 4 cells
        spans.push(Span::styled(
            format!(" {:>3}", record.level.as_str()),
            Theme::level(record.level),
        ));
        prefix_width += 4;

        spans.push(Span::styled(" │ ", Theme::text_dim()));
        prefix_width += 3;

        let message_width = available_width.saturating_sub(prefix_width);
        let display_msg = truncate_to_width(&one_line(&record.message), message_width);
        spans.extend(highlight(
            display_msg,
            &ui.active_filter,
            Theme::level_text(record.level),
        ));

        let mut lines = vec![Line::from(spans)];

        if ui.show_details {
            if let Some(details) = record.details_pretty() {
                let indent = " ".repeat(prefix_width);
                let detail_width = available_width.saturating_sub(prefix_width);
                for detail_line in details.lines() {
                    lines.push(Line::from(vec![
                        Span::raw(indent.clone()),
                        Span::styled(truncate_to_width(detail_line, detail_width), Theme::text_dim()),
                    ]));
                }
            }
        }

        lines
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, log_buffer: &LogBuffer) {
        let counts = log_buffer.level_counts();

        let mut right = Vec::new();
        if state.dropped > 0 {
            right.push(Span::styled(
                format!("[{} dropped] ", state.dropped),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }
        right.push(Span::styled(
            format!(
                "E:{} W:{} I:{} | {} logs ",
                counts.error,
                counts.warning,
                counts.info,
                counts.total()
            ),
            Theme::status_bar(),
        ));
        right.push(if state.ui_state.follow.is_pinned() {
            Span::styled("▼ follow", Theme::status_bar_key())
        } else {
            Span::styled("‖ paused", Theme::status_bar())
        });

        let mut bar = StatusBar::new().hints(log_viewer_hints()).right(right);
        if let Some(note) = &state.ui_state.notification {
            let style = match note.kind {
                NotificationKind::Info => Style::default().fg(Color::White).bg(Color::DarkGray),
                NotificationKind::Error => Style::default()
                    .fg(Color::LightRed)
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            };
            bar = bar.message(note.message.clone(), style);
        }

        frame.render_widget(bar, area);
    }
}

/// Rows a record occupies in the log list
fn record_rows(record: &LogRecord, show_details: bool) -> usize {
    if !show_details {
        return 1;
    }
    1 + record
        .details_pretty()
        .map_or(0, |details| details.lines().count())
}

/// Record containing row `offset`, and how many of its rows lie above it
fn locate_row(heights: &[usize], offset: usize) -> (usize, usize) {
    let mut start = 0;
    for (index, rows) in heights.iter().enumerate() {
        if offset < start + rows {
            return (index, offset - start);
        }
        start += rows;
    }
    (heights.len(), 0)
}

/// Split `text` into spans, highlighting search matches
fn highlight(text: String, filter: &LogFilter, base_style: Style) -> Vec<Span<'static>> {
    let matches = filter.find_matches(&text);
    if matches.is_empty() {
        return vec![Span::styled(text, base_style)];
    }

    let mut spans = Vec::new();
    let mut last_end = 0;
    for (start, end) in matches {
        if start > last_end {
            spans.push(Span::styled(text[last_end..start].to_string(), base_style));
        }
        spans.push(Span::styled(text[start..end].to_string(), Theme::search_match()));
        last_end = end;
    }
    if last_end < text.len() {
        spans.push(Span::styled(text[last_end..].to_string(), base_style));
    }
    spans
}

/// Get a consistent color for a source name
fn source_color(source: &str) -> Color {
    let hash: u32 = source
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    let colors = [
        Color::Cyan,
        Color::Magenta,
        Color::Blue,
        Color::Yellow,
        Color::Green,
        Color::LightCyan,
        Color::LightMagenta,
        Color::LightBlue,
    ];

    colors[(hash as usize) % colors.len()]
}
