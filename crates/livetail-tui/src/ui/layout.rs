use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Areas of the log viewer screen
pub struct LogViewerAreas {
    pub header: Rect,
    pub stats: Option<Rect>,
    pub filter: Rect,
    pub logs: Rect,
    pub status: Rect,
}

/// Layout helper for consistent screen layouts
pub struct Layout;

impl Layout {
    /// Split the screen into header, optional stats, filter bar, logs and status bar
    pub fn log_viewer(area: Rect, show_stats: bool) -> LogViewerAreas {
        let mut constraints = vec![Constraint::Length(3)]; // Header
        if show_stats {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Length(3)); // Filter bar
        constraints.push(Constraint::Min(1)); // Logs
        constraints.push(Constraint::Length(1)); // Status bar

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let mut idx = 0;
        let mut next = || {
            let rect = chunks[idx];
            idx += 1;
            rect
        };

        let header = next();
        let stats = if show_stats { Some(next()) } else { None };
        LogViewerAreas {
            header,
            stats,
            filter: next(),
            logs: next(),
            status: next(),
        }
    }

    /// Centered popup of at most `width` x `height`, keeping a 2-cell margin
    pub fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width.saturating_sub(4));
        let height = height.min(area.height.saturating_sub(4));
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width, height)
    }
}
