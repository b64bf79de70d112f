use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use livetail_client::{ClientConfig, LogLevel, LogStreamManager, StreamEnvelope, StreamEvent};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// What the test server saw during each handshake
#[derive(Debug, Clone)]
struct Handshake {
    uri: String,
    authorization: Option<String>,
}

/// Serve every connection with `frames`, optionally closing afterwards
async fn spawn_server(frames: Vec<Message>, close: bool) -> (String, Arc<Mutex<Vec<Handshake>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handshakes = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let handshakes = Arc::clone(&handshakes);
            let frames = frames.clone();
            tokio::spawn(async move {
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    handshakes.lock().push(Handshake {
                        uri: req.uri().to_string(),
                        authorization: req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                    });
                    Ok(resp)
                };
                let mut ws = accept_hdr_async(tcp, callback).await.unwrap();
                for frame in frames {
                    ws.send(frame).await.unwrap();
                }
                if close {
                    let _ = ws.close(None).await;
                }
                // Drain until the client goes away
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    (format!("http://{}", addr), seen)
}

fn record_frame(id: &str, level: &str, message: &str) -> Message {
    Message::Text(
        json!({
            "id": id,
            "timestamp": 1_705_314_600_000_i64,
            "level": level,
            "source": "auth",
            "message": message,
        })
        .to_string(),
    )
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<StreamEnvelope>) -> StreamEnvelope {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for stream event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_stream_delivers_records_in_order() {
    let frames = vec![
        record_frame("1", "info", "user logged in"),
        Message::Text("{not json".to_string()),
        record_frame("2", "error", "login failed"),
    ];
    let (base_url, seen) = spawn_server(frames, true).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = ClientConfig {
        base_url,
        ..Default::default()
    };
    let mut manager = LogStreamManager::new(&config, tx);
    let id = manager.connect("auth", "tok-1").unwrap();

    let mut events = Vec::new();
    loop {
        let envelope = next_event(&mut rx).await;
        assert_eq!(envelope.subscription, id);
        assert_eq!(envelope.channel, "auth");
        let done = envelope.event == StreamEvent::Closed;
        events.push(envelope.event);
        if done {
            break;
        }
    }

    assert_eq!(events.len(), 5);
    assert_eq!(events[0], StreamEvent::Open);
    match &events[1] {
        StreamEvent::Record(record) => {
            assert_eq!(record.id, "1");
            assert_eq!(record.level, LogLevel::Info);
        }
        other => panic!("expected record, got {:?}", other),
    }
    assert!(matches!(events[2], StreamEvent::Malformed(_)));
    match &events[3] {
        StreamEvent::Record(record) => assert_eq!(record.message, "login failed"),
        other => panic!("expected record, got {:?}", other),
    }

    let handshakes = seen.lock().clone();
    assert_eq!(handshakes.len(), 1);
    assert_eq!(handshakes[0].uri, "/ws/logs?channel=auth");
    assert_eq!(handshakes[0].authorization.as_deref(), Some("Bearer tok-1"));
}

#[tokio::test]
async fn test_connect_is_idempotent_per_channel() {
    let (base_url, seen) = spawn_server(Vec::new(), false).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = ClientConfig {
        base_url,
        ..Default::default()
    };
    let mut manager = LogStreamManager::new(&config, tx);

    let first = manager.connect("auth", "tok").unwrap();
    assert_eq!(next_event(&mut rx).await.event, StreamEvent::Open);

    let again = manager.connect("auth", "tok").unwrap();
    assert_eq!(first, again);
    assert!(manager.is_running());

    let other = manager.connect("api", "tok").unwrap();
    assert_ne!(first, other);
    assert!(!manager.is_current(first));

    let opened = next_event(&mut rx).await;
    assert_eq!(opened.subscription, other);
    assert_eq!(opened.event, StreamEvent::Open);

    let uris: Vec<String> = seen.lock().iter().map(|h| h.uri.clone()).collect();
    assert_eq!(uris, vec!["/ws/logs?channel=auth", "/ws/logs?channel=api"]);
}

#[tokio::test]
async fn test_disconnect_stops_events() {
    let (base_url, _seen) = spawn_server(Vec::new(), false).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = ClientConfig {
        base_url,
        ..Default::default()
    };
    let mut manager = LogStreamManager::new(&config, tx);
    manager.connect("auth", "tok").unwrap();
    assert_eq!(next_event(&mut rx).await.event, StreamEvent::Open);

    manager.disconnect();
    assert!(manager.current().is_none());

    // A cancelled subscription closes quietly
    let quiet = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(quiet.is_err(), "unexpected event after disconnect: {:?}", quiet);
}
