use claw_runtime::error::TransportError;
use claw_runtime::platform::{ShutdownReason, Watchdog, shutdown, start_heartbeat};
use claw_runtime::ports::{HeartbeatPayload, HeartbeatStatus, PROTOCOL_VERSION, RegisterPayload};
use claw_runtime::transport::RuntimeEventClient;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AGENT: &str = "agent-7";
const HEARTBEAT_PATH: &str = "/agent/agent-7/heartbeat";

fn client(server: &MockServer) -> RuntimeEventClient {
    RuntimeEventClient::new(&server.uri(), AGENT, Some("rt-token".into()))
}

async fn bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

fn register_payload() -> RegisterPayload {
    RegisterPayload {
        runtime_id: "host-1".into(),
        environment: None,
        runtime_version: "0.1.0".into(),
    }
}

#[tokio::test]
async fn heartbeat_posts_versioned_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .and(header("authorization", "Bearer rt-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .heartbeat(HeartbeatPayload {
            memory_size: Some(3),
            ..HeartbeatPayload::with_status(HeartbeatStatus::Running)
        })
        .await
        .unwrap();

    let sent = bodies(&server).await;
    assert_eq!(sent[0]["protocolVersion"], json!(PROTOCOL_VERSION));
    assert_eq!(sent[0]["type"], json!("heartbeat"));
    assert!(sent[0]["timestamp"].is_string());
    assert_eq!(
        sent[0]["payload"],
        json!({ "status": "running", "memorySize": 3 })
    );
    server.verify().await;
}

#[tokio::test]
async fn rejected_token_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client(&server)
        .heartbeat(HeartbeatPayload::with_status(HeartbeatStatus::Idle))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Unauthorized));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client(&server)
        .heartbeat(HeartbeatPayload::with_status(HeartbeatStatus::Idle))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Status(502)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn register_detects_unsupported_protocol() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "unsupported_protocol" })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .register(register_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::UnsupportedProtocol));

    let sent = bodies(&server).await;
    assert_eq!(sent[0]["type"], json!("register"));
    assert_eq!(sent[0]["payload"]["runtimeId"], json!("host-1"));
}

#[tokio::test]
async fn register_tolerates_plain_text_ack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    client(&server).register(register_payload()).await.unwrap();
}

#[tokio::test]
async fn heartbeat_task_delivers_until_stopped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let task = start_heartbeat(
        client(&server),
        Duration::from_millis(20),
        || HeartbeatPayload::with_status(HeartbeatStatus::Idle),
        None,
    );
    for _ in 0..100 {
        if bodies(&server).await.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.stop().await;

    let sent = bodies(&server).await;
    assert!(sent.len() >= 2);
    assert!(sent.iter().all(|body| body["payload"]["status"] == json!("idle")));
}

#[tokio::test]
async fn heartbeat_unauthorized_requests_fatal_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (handle, mut signal) = shutdown::channel();
    let task = start_heartbeat(
        client(&server),
        Duration::from_millis(10),
        || HeartbeatPayload::with_status(HeartbeatStatus::Running),
        Some(handle),
    );

    let reason = tokio::time::timeout(Duration::from_secs(5), signal.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reason, ShutdownReason::Fatal(ref msg) if msg.starts_with("heartbeat")));
    assert_eq!(reason.exit_code(), 1);
    task.stop().await;
}

#[tokio::test]
async fn crash_report_with_auto_exit_signals_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (handle, mut signal) = shutdown::channel();
    let watchdog = Watchdog::new(client(&server), true, Some(handle));
    watchdog
        .report_crash(&anyhow::anyhow!("disk full"))
        .await
        .unwrap();

    let sent = bodies(&server).await;
    assert_eq!(sent[0]["type"], json!("watchdog"));
    assert_eq!(sent[0]["payload"]["status"], json!("crashed"));
    assert_eq!(sent[0]["payload"]["error"]["message"], json!("disk full"));
    assert_eq!(
        signal.recv().await,
        Some(ShutdownReason::Fatal("disk full".into()))
    );
    server.verify().await;
}
