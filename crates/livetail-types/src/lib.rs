//! Shared types for livetail
//!
//! This crate contains data structures used across multiple livetail crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level
///
/// This is a closed set: the log service only ever emits these four values
/// and anything else on the wire is rejected at decode time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// All levels, least to most severe
    pub const ALL: [LogLevel; 4] = [Self::Debug, Self::Info, Self::Warning, Self::Error];

    /// Get display color for this level
    pub fn color(&self) -> Color {
        match self {
            Self::Debug => Color::Cyan,
            Self::Info => Color::Green,
            Self::Warning => Color::Yellow,
            Self::Error => Color::Red,
        }
    }

    /// Short display string (3 chars)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warning => "WRN",
            Self::Error => "ERR",
        }
    }

    /// Name as used on the wire and in query strings
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Returned when a string is not one of the four known levels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown log level '{}' (expected debug, info, warning or error)",
            self.0
        )
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// A single log record as delivered by the log service
///
/// Records are never mutated after decode; buffers hold them behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Server-assigned unique identifier
    pub id: String,

    /// When the event occurred
    #[serde(with = "wire_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Severity
    pub level: LogLevel,

    /// Channel/category the record belongs to ("system", "api", ...)
    pub source: String,

    /// Human-readable text
    pub message: String,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl LogRecord {
    /// Create a record without details
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            level,
            source: source.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Details rendered as indented JSON, if there are any
    pub fn details_pretty(&self) -> Option<String> {
        let details = self.details.as_ref().filter(|d| !d.is_empty())?;
        serde_json::to_string_pretty(details).ok()
    }
}

/// Shared handle to an immutable record
pub type ArcLogRecord = std::sync::Arc<LogRecord>;

/// Timestamps arrive either as RFC 3339 strings or as numeric epochs.
mod wire_timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Integers at or above this magnitude are epoch milliseconds
    const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Epoch(i64),
        Fractional(f64),
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Text(s) => parse_text(&s)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", s))),
            Raw::Epoch(n) => from_epoch(n)
                .ok_or_else(|| D::Error::custom(format!("epoch out of range: {}", n))),
            Raw::Fractional(n) => from_fractional_epoch(n)
                .ok_or_else(|| D::Error::custom(format!("epoch out of range: {}", n))),
        }
    }

    fn parse_text(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Some(ts.with_timezone(&Utc));
        }
        // Zone-less ISO-8601 is taken as UTC
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
        if n.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        }
    }

    fn from_fractional_epoch(n: f64) -> Option<DateTime<Utc>> {
        if !n.is_finite() {
            return None;
        }
        let secs = if n.abs() >= EPOCH_MILLIS_THRESHOLD as f64 {
            n / 1000.0
        } else {
            n
        };
        let whole = secs.floor();
        let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos)
    }
}

// ============================================================================
// Filter Types
// ============================================================================

/// Level selection for the filter bar
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LevelFilter {
    /// Do not filter on level
    #[default]
    All,
    /// Only records with exactly this level
    Only(LogLevel),
}

impl LevelFilter {
    /// Check a level against this selection
    pub fn matches(&self, level: LogLevel) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == level,
        }
    }

    /// The selected level, if any
    pub fn level(&self) -> Option<LogLevel> {
        match self {
            Self::All => None,
            Self::Only(level) => Some(*level),
        }
    }

    /// Get display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(level) => level.wire_name(),
        }
    }

    /// Cycle to the next selection
    pub fn next(&self) -> Self {
        match self {
            Self::All => Self::Only(LogLevel::Debug),
            Self::Only(LogLevel::Debug) => Self::Only(LogLevel::Info),
            Self::Only(LogLevel::Info) => Self::Only(LogLevel::Warning),
            Self::Only(LogLevel::Warning) => Self::Only(LogLevel::Error),
            Self::Only(LogLevel::Error) => Self::All,
        }
    }

    /// Cycle to the previous selection
    pub fn prev(&self) -> Self {
        match self {
            Self::All => Self::Only(LogLevel::Error),
            Self::Only(LogLevel::Debug) => Self::All,
            Self::Only(LogLevel::Info) => Self::Only(LogLevel::Debug),
            Self::Only(LogLevel::Warning) => Self::Only(LogLevel::Info),
            Self::Only(LogLevel::Error) => Self::Only(LogLevel::Warning),
        }
    }
}

/// What the viewer is currently showing
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterState {
    /// Active channel (tab)
    pub channel: String,

    /// Level selection
    pub level: LevelFilter,

    /// Case-insensitive substring matched against message and source
    pub search: String,
}

impl FilterState {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            level: LevelFilter::All,
            search: String::new(),
        }
    }

    /// True when level or search narrows the view
    pub fn is_narrowing(&self) -> bool {
        self.level != LevelFilter::All || !self.search.is_empty()
    }
}

// ============================================================================
// Connection Types
// ============================================================================

/// Live connection state as shown in the header badge
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Nothing attempted yet
    #[default]
    Idle,
    /// Waiting for the auth token
    Authenticating,
    /// Token obtained, handshake in progress
    Connecting,
    /// Live records are flowing
    Connected,
    /// Token fetch failed; no connection was attempted
    AuthFailed(String),
    /// Connection dropped or could not be established
    Disconnected(String),
}

impl ConnectionStatus {
    /// Short badge label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authenticating => "authenticating",
            Self::Connecting => "connecting",
            Self::Connected => "live",
            Self::AuthFailed(_) => "cannot authenticate",
            Self::Disconnected(_) => "disconnected",
        }
    }

    /// Badge color
    pub fn color(&self) -> Color {
        match self {
            Self::Idle => Color::DarkGray,
            Self::Authenticating | Self::Connecting => Color::Yellow,
            Self::Connected => Color::Green,
            Self::AuthFailed(_) => Color::Magenta,
            Self::Disconnected(_) => Color::Red,
        }
    }

    /// Failure detail, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::AuthFailed(reason) | Self::Disconnected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether a subscription is currently delivering records
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connected)
    }
}
