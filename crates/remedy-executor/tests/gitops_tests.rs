//! GitOps executor against a mock application API

use remedy_executor::builtin::GitOpsExecutor;
use remedy_executor::Executor;
use pretty_assertions::assert_eq;
use remedy_model::{Action, ExecutionStatus};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(server: &MockServer) -> GitOpsExecutor {
    GitOpsExecutor::from_settings(&json!({
        "base_url": server.uri(),
        "token": "argo-token",
    }))
    .unwrap()
}

#[tokio::test]
async fn test_sync_posts_to_application() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/applications/checkout/sync"))
        .and(header("authorization", "Bearer argo-token"))
        .and(body_partial_json(json!({"prune": true, "revision": "abc123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"operationState": {"phase": "Running"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let action = Action::new("gitops", "sync")
        .with_param("application", "checkout")
        .with_param("prune", true)
        .with_param("revision", "abc123");
    let outcome = executor(&server).execute(&action).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(outcome.output.as_deref(), Some("sync of checkout started (Running)"));
}

#[tokio::test]
async fn test_status_pending_until_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"sync": {"status": "OutOfSync"}, "health": {"status": "Progressing"}}
        })))
        .mount(&server)
        .await;

    let outcome = executor(&server)
        .execute(&Action::new("gitops", "status checkout"))
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Pending);
    assert_eq!(
        outcome.output.as_deref(),
        Some("checkout: sync=OutOfSync health=Progressing")
    );
}

#[tokio::test]
async fn test_status_success_when_synced_and_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/applications/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"sync": {"status": "Synced"}, "health": {"status": "Healthy"}}
        })))
        .mount(&server)
        .await;

    let outcome = executor(&server)
        .execute(&Action::new("gitops", "health").with_param("app", "checkout"))
        .await
        .unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_permission_denied_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/applications/checkout/sync"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "permission denied",
            "code": 7,
            "message": "permission denied: applications, sync",
        })))
        .mount(&server)
        .await;

    let outcome = executor(&server)
        .execute(&Action::new("gitops", "sync checkout"))
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failure);
    assert_eq!(
        outcome.error.as_deref(),
        Some("403: permission denied: applications, sync")
    );
}

#[tokio::test]
async fn test_rollback_is_pending() {
    let server = MockServer::start().await;
    let outcome = executor(&server)
        .execute(&Action::new("gitops", "rollback checkout"))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Pending);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_is_failure() {
    let executor = GitOpsExecutor::from_settings(&json!({
        "base_url": "http://127.0.0.1:9",
        "token": "t",
        "timeout_secs": 2,
    }))
    .unwrap();

    let outcome = executor
        .execute(&Action::new("gitops", "sync checkout"))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Failure);
}

#[tokio::test]
async fn test_application_cannot_escape_its_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/applications/other/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    for action in [
        Action::new("gitops", "sync").with_param("app", "web/../other"),
        Action::new("gitops", "sync web/../other"),
        Action::new("gitops", "status").with_param("application", ".."),
    ] {
        let outcome = executor(&server).execute(&action).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert!(outcome.error.unwrap().starts_with("invalid parameter: application"));
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test]
fn test_base_url_must_be_a_url() {
    let err = GitOpsExecutor::from_settings(&json!({"base_url": "argo", "token": "t"})).unwrap_err();
    assert!(err.to_string().contains("argo"));
}
