use livetail_client::{ClientConfig, ClientError, LogLevel, SnapshotClient, SnapshotQuery, TokenProvider};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.uri(),
        api_key: Some("admin-key".to_string()),
        ..Default::default()
    }
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/api/logs/token"))
        .and(header("authorization", "Bearer admin-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-1"})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn record(id: &str, level: &str) -> serde_json::Value {
    json!({
        "id": id,
        "timestamp": "2024-01-15T10:30:00.000Z",
        "level": level,
        "source": "auth",
        "message": format!("message {}", id),
    })
}

#[tokio::test]
async fn test_snapshot_sends_query_and_bearer() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .and(query_param("source", "auth"))
        .and(query_param("level", "error"))
        .and(query_param("query", "login"))
        .and(query_param("limit", "100"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([record("1", "error"), record("2", "error")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server);
    let tokens = TokenProvider::new(&config).unwrap();
    let client = SnapshotClient::new(&config, tokens).unwrap();

    let query = SnapshotQuery::new("auth", 100)
        .with_level(Some(LogLevel::Error))
        .with_query("login");
    let records = client.fetch(&query).await.unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn test_token_is_fetched_once() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"logs": [record("1", "info")]})))
        .expect(3)
        .mount(&server)
        .await;

    let config = config(&server);
    let tokens = TokenProvider::new(&config).unwrap();
    let client = SnapshotClient::new(&config, tokens.clone()).unwrap();

    for _ in 0..3 {
        let records = client.fetch(&SnapshotQuery::new("auth", 100)).await.unwrap();
        assert_eq!(records.len(), 1);
    }
    assert_eq!(tokens.token().await.unwrap(), "tok-1");
}

#[tokio::test]
async fn test_token_failure_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/logs/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    // Snapshot endpoint must never be reached without a token
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server);
    let tokens = TokenProvider::new(&config).unwrap();
    let client = SnapshotClient::new(&config, tokens).unwrap();

    let err = client.fetch(&SnapshotQuery::new("auth", 100)).await.unwrap_err();
    assert!(err.is_auth(), "expected auth error, got {:?}", err);
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let config = config(&server);
    let client = SnapshotClient::new(&config, TokenProvider::new(&config).unwrap()).unwrap();

    match client.fetch(&SnapshotQuery::new("auth", 100)).await.unwrap_err() {
        ClientError::Http { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_token_is_refetched() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = config(&server);
    let client = SnapshotClient::new(&config, TokenProvider::new(&config).unwrap()).unwrap();

    for _ in 0..2 {
        let err = client.fetch(&SnapshotQuery::new("auth", 100)).await.unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 401, .. }));
    }
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            record("1", "info"),
            record("2", "verbose"),
            {"id": "3"},
            record("4", "warning"),
        ])))
        .mount(&server)
        .await;

    let config = config(&server);
    let client = SnapshotClient::new(&config, TokenProvider::new(&config).unwrap()).unwrap();

    let records = client.fetch(&SnapshotQuery::new("auth", 100)).await.unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "4"]);
    assert_eq!(records[1].level, LogLevel::Warning);
}

#[tokio::test]
async fn test_unexpected_body_is_snapshot_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entries": []})))
        .mount(&server)
        .await;

    let config = config(&server);
    let client = SnapshotClient::new(&config, TokenProvider::new(&config).unwrap()).unwrap();

    let err = client.fetch(&SnapshotQuery::new("auth", 100)).await.unwrap_err();
    assert!(matches!(err, ClientError::Snapshot(_)));
}
