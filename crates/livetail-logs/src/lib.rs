//! Log processing for livetail
//!
//! This crate provides the bounded record buffer, the view filter, the
//! channel session that guards snapshot loads, and export.

mod buffer;
mod export;
mod filter;
mod session;

pub use buffer::{LevelCounts, LogBuffer};
pub use export::{ExportFormat, export_file_name, export_to_file, write_records};
pub use filter::LogFilter;
pub use session::{ChannelSession, SnapshotOutcome, SnapshotTicket};

// Re-export types used in our public API
pub use livetail_types::{ArcLogRecord, FilterState, LevelFilter, LogLevel, LogRecord};
