//! Channel session: which channel the buffer tracks, and which snapshot
//! responses are still allowed to land in it.

use tracing::debug;

use livetail_types::LogRecord;

use crate::LogBuffer;

/// Identifies one snapshot request
///
/// A ticket is only honoured while its epoch is the session's current one.
/// Every switch or reload issues a new epoch, so responses for earlier
/// requests are recognised as stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotTicket {
    channel: String,
    epoch: u64,
}

impl SnapshotTicket {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Result of handing a snapshot response to the session
#[derive(Debug, PartialEq, Eq)]
pub enum SnapshotOutcome<E> {
    /// Buffer was replaced with this many records
    Applied(usize),
    /// Response belongs to an older request and was discarded
    Stale,
    /// Fetch failed; buffer left untouched
    Failed(E),
}

/// Tracks the active channel and guards the buffer against stale snapshots
#[derive(Debug)]
pub struct ChannelSession {
    channel: String,
    epoch: u64,
    pending: Option<u64>,
}

impl ChannelSession {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            epoch: 0,
            pending: None,
        }
    }

    /// Channel the buffer currently tracks
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the current snapshot request is still outstanding
    pub fn is_loading(&self) -> bool {
        self.pending == Some(self.epoch)
    }

    /// Start a snapshot load for the current channel
    ///
    /// Any earlier ticket becomes stale.
    pub fn begin_load(&mut self) -> SnapshotTicket {
        self.epoch += 1;
        self.pending = Some(self.epoch);
        SnapshotTicket {
            channel: self.channel.clone(),
            epoch: self.epoch,
        }
    }

    /// Switch to another channel, discarding the old channel's records
    ///
    /// Returns the ticket for the new channel's snapshot, or None when the
    /// channel is already active.
    pub fn switch_to(&mut self, channel: &str, buffer: &LogBuffer) -> Option<SnapshotTicket> {
        if channel == self.channel {
            return None;
        }
        debug!(from = %self.channel, to = %channel, "switching channel");
        self.channel = channel.to_string();
        buffer.clear();
        Some(self.begin_load())
    }

    /// Whether a ticket still refers to the current request
    pub fn is_current(&self, ticket: &SnapshotTicket) -> bool {
        ticket.epoch == self.epoch && ticket.channel == self.channel
    }

    /// Apply a finished snapshot request to the buffer, if it is still current
    pub fn complete<E>(
        &mut self,
        ticket: &SnapshotTicket,
        result: Result<Vec<LogRecord>, E>,
        buffer: &LogBuffer,
    ) -> SnapshotOutcome<E> {
        if !self.is_current(ticket) {
            debug!(
                channel = %ticket.channel,
                epoch = ticket.epoch,
                current = self.epoch,
                "discarding stale snapshot"
            );
            return SnapshotOutcome::Stale;
        }

        self.pending = None;
        match result {
            Ok(records) => SnapshotOutcome::Applied(buffer.replace_all(records)),
            Err(e) => SnapshotOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFilter;
    use chrono::DateTime;
    use livetail_types::LogLevel;

    fn record(id: &str, source: &str) -> LogRecord {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        LogRecord::new(id, ts, LogLevel::Info, source, "m")
    }

    fn ids(buffer: &LogBuffer) -> Vec<String> {
        buffer.snapshot().iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_current_snapshot_replaces_buffer() {
        let buffer = LogBuffer::new(10);
        let mut session = ChannelSession::new("system");
        let ticket = session.begin_load();
        assert!(session.is_loading());

        buffer.push(record("live", "system"));
        let outcome: SnapshotOutcome<()> =
            session.complete(&ticket, Ok(vec![record("a", "system"), record("b", "system")]), &buffer);

        assert_eq!(outcome, SnapshotOutcome::Applied(2));
        assert_eq!(ids(&buffer), vec!["a", "b"]);
        assert!(!session.is_loading());
    }

    #[test]
    fn test_stale_snapshot_after_switch_is_ignored() {
        let buffer = LogBuffer::new(10);
        let mut session = ChannelSession::new("auth");
        let old = session.begin_load();

        let new = session.switch_to("api", &buffer).unwrap();
        buffer.push(record("api-live", "api"));

        let stale: Vec<LogRecord> = (0..100).map(|i| record(&i.to_string(), "auth")).collect();
        let outcome: SnapshotOutcome<()> = session.complete(&old, Ok(stale), &buffer);
        assert_eq!(outcome, SnapshotOutcome::Stale);
        assert_eq!(ids(&buffer), vec!["api-live"]);
        assert!(session.is_loading());

        let outcome: SnapshotOutcome<()> = session.complete(&new, Ok(vec![record("h1", "api")]), &buffer);
        assert_eq!(outcome, SnapshotOutcome::Applied(1));
        assert_eq!(ids(&buffer), vec!["h1"]);
    }

    #[test]
    fn test_switch_back_does_not_revive_old_ticket() {
        let buffer = LogBuffer::new(10);
        let mut session = ChannelSession::new("auth");
        let first = session.begin_load();
        session.switch_to("api", &buffer);
        session.switch_to("auth", &buffer);
        assert!(!session.is_current(&first));
    }

    #[test]
    fn test_failed_snapshot_leaves_buffer() {
        let buffer = LogBuffer::new(10);
        let mut session = ChannelSession::new("system");
        buffer.push(record("kept", "system"));
        let ticket = session.begin_load();
        let outcome = session.complete(&ticket, Err("boom"), &buffer);
        assert_eq!(outcome, SnapshotOutcome::Failed("boom"));
        assert_eq!(ids(&buffer), vec!["kept"]);
        assert!(!session.is_loading());
    }

    #[test]
    fn test_switch_to_same_channel_is_noop() {
        let buffer = LogBuffer::new(10);
        buffer.push(record("kept", "system"));
        let mut session = ChannelSession::new("system");
        assert!(session.switch_to("system", &buffer).is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_capacity_filter_and_switch_scenario() {
        let buffer = LogBuffer::new(3);
        let mut session = ChannelSession::new("auth");
        let auth_ticket = session.begin_load();

        for id in ["1", "2", "3", "4"] {
            buffer.push(record(id, "auth"));
        }
        assert_eq!(ids(&buffer), vec!["2", "3", "4"]);

        let view = LogFilter::everything().apply(&buffer.snapshot());
        let view_ids: Vec<&str> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(view_ids, vec!["2", "3", "4"]);

        session.switch_to("system", &buffer);
        let stale: Vec<LogRecord> = (0..100).map(|i| record(&format!("h{}", i), "auth")).collect();
        let outcome: SnapshotOutcome<()> = session.complete(&auth_ticket, Ok(stale), &buffer);

        assert_eq!(outcome, SnapshotOutcome::Stale);
        assert!(buffer.is_empty());
    }
}
