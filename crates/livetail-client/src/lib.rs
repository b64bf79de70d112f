//! Log service client for livetail
//!
//! Covers the three endpoints the viewer talks to: the token endpoint, the
//! historical snapshot query and the live WebSocket channel.

mod auth;
mod config;
mod error;
mod snapshot;
mod stream;

pub use auth::{CachedToken, TokenProvider};
pub use config::ClientConfig;
pub use error::ClientError;
pub use snapshot::{SnapshotClient, SnapshotQuery};
pub use stream::{
    LogStream, LogStreamManager, StreamEnvelope, StreamEvent, Subscription, SubscriptionId,
};

pub use livetail_types::{LogLevel, LogRecord};
