use crate::support::MissionBuilder;
use claw_runtime::adapters::MockControlPlane;
use claw_runtime::core::{InMemoryProposalStore, ProposalStore, RuntimeService};
use claw_runtime::platform::{ShutdownReason, shutdown};
use claw_runtime::transport::{AppState, run_gateway_with_listener};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "admin-token";

struct ApiTestServer {
    port: u16,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    client: reqwest::Client,
}

impl ApiTestServer {
    async fn start(state: AppState) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral listener should bind");
        let port = listener
            .local_addr()
            .expect("listener should expose local address")
            .port();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let handle = tokio::spawn(async move {
            run_gateway_with_listener(listener, state, async move { stop.cancelled().await })
                .await
        });

        let server = Self {
            port,
            cancel,
            handle,
            client: reqwest::Client::new(),
        };
        server.wait_until_ready().await;
        server
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    async fn wait_until_ready(&self) {
        for _ in 0..80 {
            let probe = self
                .client
                .get(self.url("/health"))
                .bearer_auth(TOKEN)
                .send()
                .await;
            if matches!(probe, Ok(resp) if resp.status() == StatusCode::OK) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("runtime API did not become ready on port {}", self.port);
    }

    async fn call(&self, method: reqwest::Method, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .request(method, self.url(path))
            .bearer_auth(TOKEN)
            .send()
            .await
            .expect("request should complete");
        let status = response.status();
        (status, response.json().await.expect("body should be json"))
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.handle
            .await
            .expect("server task should join")
            .expect("server should stop cleanly");
    }
}

fn service(store: &Arc<InMemoryProposalStore>) -> Arc<RuntimeService> {
    let (agent, _) = MissionBuilder::new("api", 1)
        .proposals(store.clone())
        .build(Arc::new(MockControlPlane::new()));
    Arc::new(RuntimeService::new(Arc::new(agent), store.clone()))
}

#[tokio::test]
async fn bearer_is_required_on_every_route() {
    let store = Arc::new(InMemoryProposalStore::default());
    let state = AppState::new(service(&store)).with_auth_token(Some(TOKEN.into()));
    let server = ApiTestServer::start(state).await;

    for (method, route) in [
        (reqwest::Method::GET, "/health"),
        (reqwest::Method::GET, "/status"),
        (reqwest::Method::POST, "/run"),
        (reqwest::Method::GET, "/nowhere"),
    ] {
        let response = server
            .client
            .request(method, server.url(route))
            .bearer_auth("wrong")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{route}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], json!("UNAUTHORIZED"));
    }

    let (status, body) = server.call(reqwest::Method::GET, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], json!(false));

    server.stop().await;
}

#[tokio::test]
async fn run_and_approve_over_http() {
    let store = Arc::new(InMemoryProposalStore::default());
    let service = service(&store);
    let state = AppState::new(Arc::clone(&service)).with_auth_token(Some(TOKEN.into()));
    let server = ApiTestServer::start(state).await;

    let (status, _) = server.call(reqwest::Method::POST, "/run").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut pending = Vec::new();
    for _ in 0..100 {
        let (_, body) = server.call(reqwest::Method::GET, "/proposals").await;
        pending = body["data"]["proposals"].as_array().cloned().unwrap_or_default();
        if !pending.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], json!("step-api-1"));

    let (status, body) = server.call(reqwest::Method::GET, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["running"], json!(true));
    assert_eq!(body["data"]["missionId"], json!("api"));

    let (status, _) = server.call(reqwest::Method::POST, "/run").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server.call(reqwest::Method::POST, "/approve/step-api-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("approved"));

    for _ in 0..100 {
        if !service.status().running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!service.status().running);

    let (status, _) = server.call(reqwest::Method::POST, "/approve/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn reject_with_reason_over_http() {
    let store = Arc::new(InMemoryProposalStore::default());
    let server = ApiTestServer::start(
        AppState::new(service(&store)).with_auth_token(Some(TOKEN.into())),
    )
    .await;
    server.call(reqwest::Method::POST, "/run").await;
    for _ in 0..100 {
        if !store.list().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = server
        .client
        .post(server.url("/reject/step-api-1"))
        .bearer_auth(TOKEN)
        .json(&json!({ "reason": "wrong window" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], json!("rejected"));
    assert_eq!(body["data"]["decisionReason"], json!("wrong window"));

    let response = server
        .client
        .post(server.url("/reject/step-api-1"))
        .bearer_auth(TOKEN)
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_route_signals_the_host() {
    let store = Arc::new(InMemoryProposalStore::default());
    let (handle, mut signal) = shutdown::channel();
    let server = ApiTestServer::start(AppState::new(service(&store)).with_shutdown(handle)).await;

    let (status, body) = server.call(reqwest::Method::POST, "/shutdown").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "data": { "status": "shutting-down" } }));
    assert_eq!(signal.recv().await, Some(ShutdownReason::Requested));

    server.stop().await;
}
