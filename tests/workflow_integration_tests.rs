// End-to-end workflow runs against a mocked RepoFlow HTTP backend

use governor::Quota;
use repoflow::workflow::{FailureKind, StagePayload, StageUpdate};
use repoflow::{
    Artifact, HttpBackend, PollerConfig, RateLimitedHttpClient, WorkflowController, WorkflowEvent,
    WorkflowStage,
};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn controller_for(server: &MockServer) -> WorkflowController {
    let client = RateLimitedHttpClient::new(
        &server.uri(),
        Quota::per_second(NonZeroU32::new(1000).unwrap()),
        "repoflow-integration-test",
    )
    .unwrap();
    WorkflowController::new(
        Arc::new(HttpBackend::new(client)),
        PollerConfig {
            interval: Duration::from_millis(20),
            probe_immediately: true,
        },
    )
}

async fn wait_for(rx: &mut UnboundedReceiver<StageUpdate>, stage: WorkflowStage) -> StageUpdate {
    loop {
        let update = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for stage")
            .expect("update channel closed");
        if update.stage == stage {
            return update;
        }
    }
}

/// Reports not ready on the first call and ready afterwards
async fn mount_readiness(server: &MockServer, endpoint: &str) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isReady": false })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isReady": true })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_workflow_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receive-repo"))
        .and(body_json(json!({ "repoUrl": "https://github.com/acme/app" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "err": false, "message": "Repository cloned" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_readiness(&server, "/api/check-workspaces").await;
    Mock::given(method("POST"))
        .and(path("/api/get-workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "frontend", "description": "React client" },
            { "name": "backend", "description": "FastAPI server" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/select-workspace"))
        .and(body_json(json!({ "name": "backend", "description": "FastAPI server" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "err": false, "message": "Workspace selected" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_readiness(&server, "/api/check-rag-ready").await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({ "query": "What does the backend do?" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "response": "It serves the API." })),
        )
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (mut rx, _subscription) = controller.updates();

    controller.dispatch(WorkflowEvent::Submit {
        raw: "  https://github.com/acme/app\n".to_string(),
    });
    let update = wait_for(&mut rx, WorkflowStage::SelectingArtifact).await;
    let StagePayload::Artifacts(artifacts) = update.payload else {
        panic!("listing missing from update");
    };
    assert_eq!(artifacts.len(), 2);

    let backend = Artifact::new("backend", "FastAPI server");
    assert!(controller
        .dispatch(WorkflowEvent::Select { artifact: backend })
        .accepted);
    wait_for(&mut rx, WorkflowStage::SessionActive).await;

    let answer = controller.ask("What does the backend do?").await.unwrap();
    assert_eq!(answer, "It serves the API.");
    assert_eq!(controller.live_polls(), 0);

    controller.dispose();
}

#[tokio::test]
async fn test_malformed_readiness_fails_workflow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receive-repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "err": false })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/check-workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (mut rx, _subscription) = controller.updates();

    controller.dispatch(WorkflowEvent::Submit {
        raw: "https://github.com/acme/app".to_string(),
    });
    let update = wait_for(&mut rx, WorkflowStage::Failed).await;

    match update.payload {
        StagePayload::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::Unreachable);
            assert!(failure.reason.contains("isReady"), "{}", failure.reason);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(controller.live_polls(), 0);
}

#[tokio::test]
async fn test_rejected_repository_reports_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/receive-repo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "err": true, "message": "Repository is private" })),
        )
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let (mut rx, _subscription) = controller.updates();

    controller.dispatch(WorkflowEvent::Submit {
        raw: "https://github.com/acme/private".to_string(),
    });
    wait_for(&mut rx, WorkflowStage::Failed).await;

    let failure = controller.last_failure().unwrap();
    assert_eq!(failure.kind, FailureKind::Rejected);
    assert_eq!(failure.reason, "Repository is private");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_unreachable_backend_fails_submission() {
    let client = RateLimitedHttpClient::new(
        "http://127.0.0.1:9",
        Quota::per_second(NonZeroU32::new(10).unwrap()),
        "repoflow-integration-test",
    )
    .unwrap();
    let controller =
        WorkflowController::new(Arc::new(HttpBackend::new(client)), PollerConfig::default());
    let (mut rx, _subscription) = controller.updates();

    controller.dispatch(WorkflowEvent::Submit {
        raw: "https://github.com/acme/app".to_string(),
    });
    wait_for(&mut rx, WorkflowStage::Failed).await;

    assert_eq!(
        controller.last_failure().map(|f| f.kind),
        Some(FailureKind::Unreachable)
    );
}
