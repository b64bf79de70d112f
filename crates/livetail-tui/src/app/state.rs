use std::time::{Duration, Instant};

use livetail_logs::{ArcLogRecord, FilterState, LevelFilter, LogBuffer, LogFilter};
use livetail_types::ConnectionStatus;

use super::FollowController;

/// How long a transient notification stays up
const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Cache for filtered log results to avoid re-filtering on every render
///
/// Keyed on the buffer revision rather than its length: a full buffer keeps
/// the same length while its contents rotate.
#[derive(Default)]
pub struct FilterCache {
    key: Option<(u64, LevelFilter, String)>,
    entries: Vec<ArcLogRecord>,
}

impl FilterCache {
    /// Check if cache needs to be rebuilt for this buffer revision and filter
    pub fn needs_refresh(&self, revision: u64, filter: &LogFilter) -> bool {
        match &self.key {
            Some((rev, level, search)) => {
                *rev != revision || *level != filter.level() || search != filter.search()
            }
            None => true,
        }
    }

    /// Filtered view of `buffer`, recomputed only when stale
    pub fn refresh(&mut self, buffer: &LogBuffer, filter: &LogFilter) -> &[ArcLogRecord] {
        // Read the revision first so a concurrent push can only make the key older
        let revision = buffer.revision();
        if self.needs_refresh(revision, filter) {
            self.entries = filter.apply(&buffer.snapshot());
            self.key = Some((revision, filter.level(), filter.search().to_string()));
        }
        &self.entries
    }

    pub fn entries(&self) -> &[ArcLogRecord] {
        &self.entries
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// Status-line message that dismisses itself
#[derive(Clone, Debug)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    pub expires_at: Instant,
}

/// UI-specific transient state
pub struct UiState {
    /// Is search/filter bar active?
    pub search_active: bool,

    /// Current search input text
    pub search_input: String,

    /// Is help overlay visible?
    pub help_visible: bool,

    /// Compiled filter for the current FilterState
    pub active_filter: LogFilter,

    /// Filter compile error, shown in the filter bar
    pub filter_error: Option<String>,

    pub filter_cache: FilterCache,

    pub follow: FollowController,

    pub show_timestamps: bool,

    /// Show timestamps in local time (vs UTC)
    pub use_local_time: bool,

    pub show_sources: bool,

    /// Render record details under each line
    pub show_details: bool,

    pub stats_visible: bool,

    pub notification: Option<Notification>,
}

impl UiState {
    pub fn new(follow_threshold: usize) -> Self {
        Self {
            search_active: false,
            search_input: String::new(),
            help_visible: false,
            active_filter: LogFilter::everything(),
            filter_error: None,
            filter_cache: FilterCache::default(),
            follow: FollowController::new(follow_threshold),
            show_timestamps: true,
            use_local_time: true,
            show_sources: true,
            show_details: false,
            stats_visible: false,
            notification: None,
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Global application state
pub struct AppState {
    /// Configured channels, in tab order
    pub channels: Vec<String>,

    /// Index of the active tab
    pub selected_channel: usize,

    /// Channel, level and search of the current view
    pub filter: FilterState,

    pub status: ConnectionStatus,

    /// Snapshot request outstanding for the active channel
    pub loading: bool,

    /// Live frames that failed to decode since start
    pub dropped: u64,

    pub ui_state: UiState,

    /// Whether app should quit
    pub should_quit: bool,

    /// Dirty flag for rendering - only render when true
    pub render_dirty: bool,
}

impl AppState {
    /// Create state with `initial` selected; falls back to the first channel
    pub fn new(channels: Vec<String>, initial: &str, follow_threshold: usize) -> Self {
        let selected_channel = channels.iter().position(|c| c == initial).unwrap_or(0);
        let channel = channels
            .get(selected_channel)
            .cloned()
            .unwrap_or_else(|| initial.to_string());

        Self {
            channels,
            selected_channel,
            filter: FilterState::new(channel),
            status: ConnectionStatus::Idle,
            loading: false,
            dropped: 0,
            ui_state: UiState::new(follow_threshold),
            should_quit: false,
            render_dirty: true, // Start dirty to ensure initial render
        }
    }

    pub fn current_channel(&self) -> &str {
        &self.filter.channel
    }

    /// Make tab `index` active, returning the channel if it changed
    pub fn select_channel(&mut self, index: usize) -> Option<String> {
        let channel = self.channels.get(index)?.clone();
        if channel == self.filter.channel {
            return None;
        }
        self.selected_channel = index;
        self.filter.channel = channel.clone();
        self.ui_state.follow.reset();
        self.ui_state.filter_cache.invalidate();
        Some(channel)
    }

    pub fn next_channel(&mut self) -> Option<String> {
        if self.channels.is_empty() {
            return None;
        }
        self.select_channel((self.selected_channel + 1) % self.channels.len())
    }

    pub fn prev_channel(&mut self) -> Option<String> {
        if self.channels.is_empty() {
            return None;
        }
        let len = self.channels.len();
        self.select_channel((self.selected_channel + len - 1) % len)
    }

    /// Filtered records for the current view
    pub fn visible_records(&mut self, buffer: &LogBuffer) -> &[ArcLogRecord] {
        self.ui_state
            .filter_cache
            .refresh(buffer, &self.ui_state.active_filter)
    }

    /// Start search/filter input mode, editing the current search
    pub fn start_search(&mut self) {
        self.ui_state.search_active = true;
        self.ui_state.search_input = self.filter.search.clone();
        self.ui_state.filter_error = None;
    }

    /// Leave search input without changing the applied search
    pub fn cancel_search(&mut self) {
        self.ui_state.search_active = false;
        self.ui_state.search_input.clear();
        self.ui_state.filter_error = None;
    }

    /// Apply the current search input as a filter
    pub fn apply_filter(&mut self) {
        self.ui_state.search_active = false;
        self.filter.search = self.ui_state.search_input.clone();
        self.rebuild_filter();
    }

    /// Clear search and level selection
    pub fn clear_filter(&mut self) {
        self.filter.search.clear();
        self.filter.level = LevelFilter::All;
        self.ui_state.search_input.clear();
        self.rebuild_filter();
    }

    pub fn cycle_level(&mut self, forward: bool) {
        self.filter.level = if forward {
            self.filter.level.next()
        } else {
            self.filter.level.prev()
        };
        self.rebuild_filter();
    }

    fn rebuild_filter(&mut self) {
        match LogFilter::new(&self.filter) {
            Ok(filter) => {
                self.ui_state.active_filter = filter;
                self.ui_state.filter_error = None;
            }
            Err(e) => {
                self.ui_state.filter_error = Some(format!("Invalid search: {}", e));
                self.ui_state.search_active = true; // Keep input open to fix
            }
        }
    }

    /// Add a character to search input
    pub fn search_input_char(&mut self, c: char) {
        self.ui_state.search_input.push(c);
    }

    /// Remove last character from search input
    pub fn search_input_backspace(&mut self) {
        self.ui_state.search_input.pop();
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.push_notification(message.into(), NotificationKind::Info);
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.push_notification(message.into(), NotificationKind::Error);
    }

    fn push_notification(&mut self, message: String, kind: NotificationKind) {
        self.ui_state.notification = Some(Notification {
            message,
            kind,
            expires_at: Instant::now() + NOTIFICATION_TTL,
        });
        self.render_dirty = true;
    }

    /// Drop the notification once expired; returns true if one was removed
    pub fn expire_notification(&mut self, now: Instant) -> bool {
        let expired = self
            .ui_state
            .notification
            .as_ref()
            .is_some_and(|n| n.expires_at <= now);
        if expired {
            self.ui_state.notification = None;
        }
        expired
    }

    /// Close the help overlay, else the notification
    pub fn dismiss(&mut self) {
        if self.ui_state.help_visible {
            self.ui_state.help_visible = false;
        } else {
            self.ui_state.notification = None;
        }
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.render_dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use livetail_logs::{LogLevel, LogRecord};

    fn channels() -> Vec<String> {
        vec!["system".to_string(), "auth".to_string(), "api".to_string()]
    }

    fn record(id: &str, level: LogLevel, message: &str) -> LogRecord {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        LogRecord::new(id, ts, level, "auth", message)
    }

    #[test]
    fn test_initial_channel_falls_back_to_first() {
        let state = AppState::new(channels(), "missing", 2);
        assert_eq!(state.current_channel(), "system");
        let state = AppState::new(channels(), "api", 2);
        assert_eq!(state.selected_channel, 2);
    }

    #[test]
    fn test_channel_cycling() {
        let mut state = AppState::new(channels(), "system", 2);
        assert_eq!(state.next_channel().as_deref(), Some("auth"));
        assert_eq!(state.prev_channel().as_deref(), Some("system"));
        assert_eq!(state.prev_channel().as_deref(), Some("api"));
        assert_eq!(state.select_channel(2), None);
        assert_eq!(state.select_channel(9), None);
    }

    #[test]
    fn test_filter_cache_sees_rotation_at_capacity() {
        let buffer = LogBuffer::new(2);
        let mut state = AppState::new(channels(), "auth", 2);
        buffer.push(record("1", LogLevel::Info, "a"));
        buffer.push(record("2", LogLevel::Info, "b"));
        assert_eq!(state.visible_records(&buffer).len(), 2);

        // Same length, different contents
        buffer.push(record("3", LogLevel::Info, "c"));
        let ids: Vec<String> = state
            .visible_records(&buffer)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_search_and_level_compose() {
        let buffer = LogBuffer::new(10);
        buffer.push(record("1", LogLevel::Error, "login failed"));
        buffer.push(record("2", LogLevel::Error, "disk full"));
        buffer.push(record("3", LogLevel::Info, "login ok"));

        let mut state = AppState::new(channels(), "auth", 2);
        state.cycle_level(false);
        assert_eq!(state.filter.level, LevelFilter::Only(LogLevel::Error));
        assert_eq!(state.visible_records(&buffer).len(), 2);

        state.start_search();
        for c in "LOGIN".chars() {
            state.search_input_char(c);
        }
        state.apply_filter();
        let ids: Vec<String> = state
            .visible_records(&buffer)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, vec!["1"]);

        state.clear_filter();
        assert_eq!(state.visible_records(&buffer).len(), 3);
    }

    #[test]
    fn test_cancel_search_keeps_applied_search() {
        let mut state = AppState::new(channels(), "auth", 2);
        state.start_search();
        state.search_input_char('x');
        state.apply_filter();
        state.start_search();
        state.search_input_backspace();
        state.cancel_search();
        assert_eq!(state.filter.search, "x");
    }

    #[test]
    fn test_search_keeps_surrounding_spaces() {
        let buffer = LogBuffer::new(10);
        buffer.push(record("1", LogLevel::Info, "user auth ok"));
        buffer.push(record("2", LogLevel::Info, "reauth scheduled"));

        let mut state = AppState::new(channels(), "auth", 2);
        state.start_search();
        for c in " auth".chars() {
            state.search_input_char(c);
        }
        state.apply_filter();
        assert_eq!(state.filter.search, " auth");
        let ids: Vec<String> = state
            .visible_records(&buffer)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_notification_expiry() {
        let mut state = AppState::new(channels(), "auth", 2);
        state.notify_error("snapshot failed");
        assert!(!state.expire_notification(Instant::now()));
        assert!(state.expire_notification(Instant::now() + NOTIFICATION_TTL));
        assert!(state.ui_state.notification.is_none());
    }
}
