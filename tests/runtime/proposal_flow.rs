use crate::support::MissionBuilder;
use claw_runtime::adapters::MockControlPlane;
use claw_runtime::core::{
    AutoDecision, InMemoryProposalStore, ProposalStatus, ProposalStore, ProposalStoreOptions,
    RuntimeService, StepStatus,
};
use std::sync::Arc;
use std::time::Duration;

async fn wait_for_pending(store: &InMemoryProposalStore, id: &str) {
    while store
        .get(id)
        .is_none_or(|proposal| proposal.status != ProposalStatus::Pending)
    {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn operator_decisions_drive_the_mission() {
    let store = Arc::new(InMemoryProposalStore::default());
    let (agent, calls) = MissionBuilder::new("ops", 2)
        .proposals(store.clone())
        .build(Arc::new(MockControlPlane::new()));
    let service = Arc::new(RuntimeService::new(Arc::new(agent), store.clone()));

    let run = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run().await })
    };

    wait_for_pending(&store, "step-ops-1").await;
    assert!(service.status().running);
    service.reject_proposal("step-ops-1", Some("not today".into()));

    wait_for_pending(&store, "step-ops-2").await;
    service.approve_proposal("step-ops-2");

    let summary = run.await.unwrap().unwrap().unwrap();
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(calls.lock().unwrap().len(), 1);

    let proposals = service.list_proposals();
    assert_eq!(proposals.len(), 2);
    assert_eq!(proposals[0].status, ProposalStatus::Rejected);
    assert_eq!(proposals[0].decision_reason.as_deref(), Some("not today"));
    assert_eq!(proposals[1].status, ProposalStatus::Approved);
    assert!(!service.status().running);
}

#[tokio::test]
async fn store_decision_outranks_control_plane_approval() {
    let store = Arc::new(InMemoryProposalStore::default());
    let (agent, calls) = MissionBuilder::new("veto", 1)
        .proposals(store.clone())
        .build(Arc::new(MockControlPlane::new()));
    let agent = Arc::new(agent);

    let run = {
        let agent = Arc::clone(&agent);
        tokio::spawn(async move { agent.run().await })
    };
    wait_for_pending(&store, "step-veto-1").await;
    store.reject("step-veto-1", None);

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.rejected, 1);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(agent.history()[0].status, StepStatus::Rejected);
}

#[tokio::test(start_paused = true)]
async fn unattended_proposals_expire_into_rejections() {
    let store = Arc::new(InMemoryProposalStore::new(ProposalStoreOptions {
        timeout: Some(Duration::from_millis(200)),
        ..ProposalStoreOptions::default()
    }));
    let (agent, calls) = MissionBuilder::new("idle", 2)
        .proposals(store.clone())
        .build(Arc::new(MockControlPlane::new()));

    let summary = agent.run().await.unwrap();

    assert_eq!(summary.rejected, 2);
    assert!(calls.lock().unwrap().is_empty());
    assert!(
        store
            .list()
            .iter()
            .all(|p| p.status == ProposalStatus::Expired)
    );
    assert_eq!(store.armed_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn auto_approval_runs_steps_without_an_operator() {
    let store = Arc::new(InMemoryProposalStore::new(ProposalStoreOptions {
        timeout: Some(Duration::from_millis(50)),
        auto_decision: Some(AutoDecision::Approve),
        ..ProposalStoreOptions::default()
    }));
    let (agent, calls) = MissionBuilder::new("auto", 3)
        .proposals(store.clone())
        .build(Arc::new(MockControlPlane::reject_all()));

    let summary = agent.run().await.unwrap();

    assert_eq!(summary.completed, 3);
    assert_eq!(calls.lock().unwrap().len(), 3);
    assert!(
        store
            .list()
            .iter()
            .all(|p| p.decision_reason.as_deref() == Some("auto-approved"))
    );
}
