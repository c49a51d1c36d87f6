use crate::support::MissionBuilder;
use claw_runtime::adapters::HttpControlPlane;
use claw_runtime::error::{AgentError, ControlPlaneError};
use claw_runtime::ports::{ControlPlaneDecision, ControlPlanePort, StepProposal, StepResult};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proposal() -> StepProposal {
    StepProposal {
        mission_id: "m-1".into(),
        step_id: "step-m-1-1".into(),
        action: "echo".into(),
        payload: json!({ "n": 1 }),
    }
}

#[tokio::test]
async fn propose_posts_camel_case_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/steps/propose"))
        .and(header("authorization", "Bearer cp-key"))
        .and(body_json(json!({
            "missionId": "m-1",
            "stepId": "step-m-1-1",
            "action": "echo",
            "payload": { "n": 1 }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "approved": false, "reason": "policy" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let control_plane =
        HttpControlPlane::new(&format!("{}/api/", server.uri()), Some("cp-key".into()));
    let decision = control_plane.propose_step(&proposal()).await.unwrap();

    assert_eq!(decision, ControlPlaneDecision::deny("policy"));
    server.verify().await;
}

#[tokio::test]
async fn report_accepts_empty_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/steps/report"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let control_plane = HttpControlPlane::new(&server.uri(), None);
    control_plane
        .report_result(&StepResult {
            mission_id: "m-1".into(),
            step_id: "step-m-1-1".into(),
            success: false,
            output: None,
            error: Some("No handler registered for action: echo".into()),
        })
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["success"], json!(false));
    assert!(body.get("output").is_none());
}

#[tokio::test]
async fn server_error_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/steps/propose"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .mount(&server)
        .await;

    let control_plane = HttpControlPlane::new(&server.uri(), None);
    let err = control_plane.propose_step(&proposal()).await.unwrap_err();

    match err.downcast_ref::<ControlPlaneError>() {
        Some(ControlPlaneError::Status { status, body, .. }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "db down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_decision_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/steps/propose"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let control_plane = HttpControlPlane::new(&server.uri(), None);
    let err = control_plane.propose_step(&proposal()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ControlPlaneError>(),
        Some(ControlPlaneError::Decode { .. })
    ));
}

#[tokio::test]
async fn unreachable_control_plane_ends_the_mission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/steps/propose"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (agent, calls) =
        MissionBuilder::new("down", 2).build(Arc::new(HttpControlPlane::new(&server.uri(), None)));
    let err = agent.run().await.unwrap_err();

    assert!(matches!(err, AgentError::ControlPlane(_)));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn full_mission_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/steps/propose"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "approved": true })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/steps/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&server)
        .await;

    let (agent, calls) =
        MissionBuilder::new("http", 2).build(Arc::new(HttpControlPlane::new(&server.uri(), None)));
    let summary = agent.run().await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(calls.lock().unwrap().len(), 2);
    server.verify().await;
}
