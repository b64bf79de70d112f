//! Live log channel over WebSocket
//!
//! Each subscription runs in its own task and reports back through an
//! unbounded channel. Events carry the subscription id, so the receiver can
//! drop anything sent by a subscription it has already replaced.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use livetail_types::LogRecord;

use crate::{ClientConfig, ClientError};

pub type SubscriptionId = u64;

/// Something that happened on a live subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Handshake completed
    Open,
    /// A decoded record
    Record(LogRecord),
    /// A frame that did not decode as a record
    Malformed(String),
    /// Transport failure; always followed by `Closed`
    Error(String),
    /// The subscription ended
    Closed,
}

/// A stream event tagged with the subscription that produced it
#[derive(Debug, Clone)]
pub struct StreamEnvelope {
    pub subscription: SubscriptionId,
    pub channel: String,
    pub event: StreamEvent,
}

/// Handle to a running subscription
///
/// Cancelling (or dropping) closes the socket. No events are sent after the
/// task observes the cancellation.
pub struct Subscription {
    id: SubscriptionId,
    channel: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens live subscriptions against the configured service
#[derive(Clone)]
pub struct LogStream {
    config: ClientConfig,
}

impl LogStream {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Start a subscription to `channel`
    ///
    /// Only request construction can fail here. Handshake and later
    /// failures arrive as `StreamEvent::Error` followed by `Closed`.
    pub fn subscribe(
        &self,
        id: SubscriptionId,
        channel: &str,
        token: &str,
        events: mpsc::UnboundedSender<StreamEnvelope>,
    ) -> Result<Subscription, ClientError> {
        let url = self.config.stream_url(channel)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Transport(format!("invalid stream request: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::Config("token is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let cancel = CancellationToken::new();
        let emitter = Emitter {
            id,
            channel: channel.to_string(),
            tx: events,
        };

        debug!(id, channel, "opening live subscription");
        let task = tokio::spawn(run_subscription(request, emitter, cancel.clone()));

        Ok(Subscription {
            id,
            channel: channel.to_string(),
            cancel,
            task,
        })
    }
}

struct Emitter {
    id: SubscriptionId,
    channel: String,
    tx: mpsc::UnboundedSender<StreamEnvelope>,
}

impl Emitter {
    /// Returns false once the receiver is gone
    fn send(&self, event: StreamEvent) -> bool {
        self.tx
            .send(StreamEnvelope {
                subscription: self.id,
                channel: self.channel.clone(),
                event,
            })
            .is_ok()
    }
}

enum Step {
    Cancelled,
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

async fn run_subscription(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    emitter: Emitter,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect_async(request) => result,
    };

    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(channel = %emitter.channel, error = %e, "live handshake failed");
            emitter.send(StreamEvent::Error(e.to_string()));
            emitter.send(StreamEvent::Closed);
            return;
        }
    };

    if !emitter.send(StreamEvent::Open) {
        return;
    }

    loop {
        let step = tokio::select! {
            _ = cancel.cancelled() => Step::Cancelled,
            frame = ws.next() => Step::Frame(frame),
        };

        let keep_going = match step {
            Step::Cancelled => {
                debug!(id = emitter.id, "live subscription cancelled");
                let _ = ws.close(None).await;
                return;
            }
            Step::Frame(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<LogRecord>(&text) {
                    Ok(record) => emitter.send(StreamEvent::Record(record)),
                    Err(e) => {
                        warn!(channel = %emitter.channel, error = %e, "malformed live record");
                        emitter.send(StreamEvent::Malformed(e.to_string()))
                    }
                }
            }
            Step::Frame(Some(Ok(Message::Close(frame)))) => {
                debug!(id = emitter.id, ?frame, "server closed live subscription");
                emitter.send(StreamEvent::Closed);
                return;
            }
            // Ping/pong is answered by tungstenite; binary frames carry nothing we read
            Step::Frame(Some(Ok(_))) => true,
            Step::Frame(Some(Err(e))) => {
                warn!(channel = %emitter.channel, error = %e, "live subscription failed");
                emitter.send(StreamEvent::Error(e.to_string()));
                emitter.send(StreamEvent::Closed);
                return;
            }
            Step::Frame(None) => {
                emitter.send(StreamEvent::Closed);
                return;
            }
        };

        if !keep_going {
            // Receiver dropped
            let _ = ws.close(None).await;
            return;
        }
    }
}

/// Keeps at most one live subscription open
pub struct LogStreamManager {
    stream: LogStream,
    events: mpsc::UnboundedSender<StreamEnvelope>,
    current: Option<Subscription>,
    next_id: SubscriptionId,
}

impl LogStreamManager {
    pub fn new(config: &ClientConfig, events: mpsc::UnboundedSender<StreamEnvelope>) -> Self {
        Self {
            stream: LogStream::new(config),
            events,
            current: None,
            next_id: 1,
        }
    }

    /// Subscribe to `channel`, replacing any other subscription
    ///
    /// Connecting to the channel that is already running returns the existing
    /// subscription id without reconnecting.
    pub fn connect(&mut self, channel: &str, token: &str) -> Result<SubscriptionId, ClientError> {
        if let Some(current) = &self.current {
            if current.channel() == channel && !current.is_finished() {
                return Ok(current.id());
            }
        }

        self.disconnect();

        let id = self.next_id;
        self.next_id += 1;
        let subscription = self.stream.subscribe(id, channel, token, self.events.clone())?;
        self.current = Some(subscription);
        Ok(id)
    }

    /// Close the current subscription, if any
    pub fn disconnect(&mut self) {
        if let Some(subscription) = self.current.take() {
            debug!(id = subscription.id(), channel = subscription.channel(), "disconnecting");
            subscription.cancel();
        }
    }

    /// Whether events from `id` should still be applied
    pub fn is_current(&self, id: SubscriptionId) -> bool {
        self.current.as_ref().is_some_and(|s| s.id() == id)
    }

    pub fn current(&self) -> Option<&Subscription> {
        self.current.as_ref()
    }

    /// Check if a subscription task is still running
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|s| !s.is_finished())
    }
}

impl Drop for LogStreamManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}
