//! Cluster executor against a mock Kubernetes API

use remedy_executor::builtin::ClusterExecutor;
use remedy_executor::Executor;
use pretty_assertions::assert_eq;
use remedy_model::{Action, ExecutionStatus};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor(server: &MockServer) -> ClusterExecutor {
    ClusterExecutor::from_settings(&json!({
        "api_url": server.uri(),
        "token": "sa-token",
    }))
    .unwrap()
}

fn pod_action(command: &str) -> Action {
    Action::new("cluster", command)
        .with_param("name", "web-7d9f")
        .with_param("namespace", "prod")
}

#[tokio::test]
async fn test_delete_pod_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/prod/pods/web-7d9f"))
        .and(header("authorization", "Bearer sa-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Pod"})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = executor(&server).execute(&pod_action("delete pod")).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(outcome.output.as_deref(), Some("deleted pod prod/web-7d9f"));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_not_found_is_failure_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/prod/pods/web-7d9f"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "kind": "Status",
            "status": "Failure",
            "message": "pods \"web-7d9f\" not found",
            "reason": "NotFound",
            "code": 404,
        })))
        .mount(&server)
        .await;

    let outcome = executor(&server).execute(&pod_action("Delete-Pod")).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failure);
    assert_eq!(
        outcome.error.as_deref(),
        Some("404 NotFound: pods \"web-7d9f\" not found")
    );
}

#[tokio::test]
async fn test_logs_pass_container_and_tail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/prod/pods/web-7d9f/log"))
        .and(query_param("container", "app"))
        .and(query_param("tailLines", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_string("panic: nil map\n"))
        .expect(1)
        .mount(&server)
        .await;

    let action = pod_action("read logs")
        .with_param("container", "app")
        .with_param("tail_lines", 50);
    let outcome = executor(&server).execute(&action).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(outcome.output.as_deref(), Some("panic: nil map\n"));
}

#[tokio::test]
async fn test_rollout_restart_patches_template() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/apis/apps/v1/namespaces/prod/deployments/web"))
        .and(header("content-type", "application/strategic-merge-patch+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Deployment"})))
        .expect(1)
        .mount(&server)
        .await;

    let action = Action::new("cluster", "rollout restart deployment")
        .with_param("name", "web")
        .with_param("namespace", "prod");
    let outcome = executor(&server).execute(&action).await.unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(outcome.output.as_deref(), Some("restarted deployment prod/web"));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let stamp = &body["spec"]["template"]["metadata"]["annotations"]["kubectl.kubernetes.io/restartedAt"];
    assert!(stamp.is_string());
}

#[tokio::test]
async fn test_missing_name_fails_without_request() {
    let server = MockServer::start().await;
    let action = Action::new("cluster", "delete pod");

    let outcome = executor(&server).execute(&action).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failure);
    assert!(outcome.error.unwrap().contains("name"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_command_is_failure() {
    let server = MockServer::start().await;
    let outcome = executor(&server)
        .execute(&pod_action("scale deployment"))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Failure);
}

#[tokio::test]
async fn test_namespace_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/default/pods/solo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let action = Action::new("cluster", "get pod").with_param("name", "solo");
    let outcome = executor(&server).execute(&action).await.unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_kubeconfig_supplies_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/prod/pods/web-7d9f"))
        .and(header("authorization", "Bearer from-kubeconfig"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let kubeconfig = dir.path().join("config");
    std::fs::write(
        &kubeconfig,
        format!(
            "current-context: test\ncontexts:\n  - name: test\n    context:\n      cluster: c\n      user: u\nclusters:\n  - name: c\n    cluster:\n      server: {}\nusers:\n  - name: u\n    user:\n      token: from-kubeconfig\n",
            server.uri()
        ),
    )
    .unwrap();

    let executor = ClusterExecutor::from_settings(&json!({"kubeconfig": kubeconfig})).unwrap();
    let outcome = executor.execute(&pod_action("describe pod")).await.unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_name_cannot_escape_namespace() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/kube-system/pods/coredns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Pod"})))
        .expect(0)
        .mount(&server)
        .await;

    let action = Action::new("cluster", "delete pod")
        .with_param("name", "x/../../../kube-system/pods/coredns")
        .with_param("namespace", "prod");
    let outcome = executor(&server).execute(&action).await.unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Failure);
    assert!(outcome.error.unwrap().starts_with("invalid parameter: name"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_namespace_is_rejected() {
    let server = MockServer::start().await;

    for namespace in ["..", "prod/../kube-system", "Prod", "prod?x=1"] {
        let action = Action::new("cluster", "get pod")
            .with_param("name", "web")
            .with_param("namespace", namespace);
        let outcome = executor(&server).execute(&action).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Failure, "{namespace}");
        assert!(outcome.error.unwrap().starts_with("invalid parameter: namespace"));
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_name_in_command_does_not_change_verb() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/prod/pods/log-shipper"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Pod"})))
        .expect(1)
        .mount(&server)
        .await;

    let action = Action::new("cluster", "delete pod log-shipper")
        .with_param("name", "log-shipper")
        .with_param("namespace", "prod");
    let outcome = executor(&server).execute(&action).await.unwrap();

    assert_eq!(outcome.output.as_deref(), Some("deleted pod prod/log-shipper"));
}
