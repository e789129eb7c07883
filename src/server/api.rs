use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::binds::BindResolver;
use crate::errors::OrchestratorError;
use crate::models::{ContainerRequest, RepositoryName};
use crate::orchestrator::ContainerOrchestrator;
use crate::reaper::DeadContainerReaper;

pub const SERVER_NAME: &str = "Docker-CI-CD";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub resolver: BindResolver,
    pub orchestrator: ContainerOrchestrator,
    pub reaper: Arc<DeadContainerReaper>,
    pub image: String,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// Push notification body. Only `repository.name` is read.
#[derive(Debug, Default, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub repository: Option<PushRepository>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushRepository {
    #[serde(default)]
    pub name: Option<String>,
}

/// Extract a non-empty repository name, or `None` for malformed JSON and
/// missing or blank names.
pub fn parse_repository_name(body: &[u8]) -> Option<RepositoryName> {
    let payload: PushPayload = serde_json::from_slice(body).ok()?;
    payload
        .repository
        .and_then(|r| r.name)
        .and_then(RepositoryName::new)
}

// ── Error handling ────────────────────────────────────────────────────

pub enum WebhookError {
    InvalidPayload,
    Launch(OrchestratorError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::InvalidPayload => {
                (StatusCode::BAD_REQUEST, "Invalid Body or JSON Format").into_response()
            }
            WebhookError::Launch(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Container launch failed: {}", e),
            )
                .into_response(),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn webhook_router() -> Router<SharedState> {
    Router::new().route("/", post(receive_push).fallback(method_not_allowed))
}

/// Full router: webhook route plus the fixed response headers and request
/// tracing.
pub fn build_router(state: SharedState) -> Router {
    webhook_router()
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(SERVER_NAME),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn receive_push(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<String, WebhookError> {
    let Some(name) = parse_repository_name(&body) else {
        warn!(bytes = body.len(), "rejected push with invalid body");
        return Err(WebhookError::InvalidPayload);
    };

    let Some(bind) = state.resolver.resolve(name.as_str()) else {
        warn!(repository = %name, "Repository Flagged: no bind configured");
        return Ok(format!("Repository Flagged: {}", name));
    };

    if let Err(e) = state.reaper.sweep().await {
        warn!(error = %e, "pre-launch sweep failed to list containers");
    }

    let request = ContainerRequest::new(name.clone(), state.image.clone(), bind);
    let launch = state
        .orchestrator
        .ensure_running(&request)
        .await
        .map_err(WebhookError::Launch)?;
    info!(
        repository = %name,
        container = %launch.container_id,
        origin = ?launch.origin,
        "push handled"
    );

    Ok(format!("Docker Container Created With Name: {}", name))
}

async fn method_not_allowed(method: Method) -> impl IntoResponse {
    warn!(%method, "unsupported request method");
    (
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {} not allowed", method),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindEntry, default_command};
    use crate::engine::{ContainerState, InMemoryEngine};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    const IMAGE: &str = "ghcr.io/nottimisreal/alpinewithgit";

    fn test_app(engine: Arc<InMemoryEngine>) -> Router {
        let state = Arc::new(AppState {
            resolver: BindResolver::new(vec![BindEntry {
                name: "site-a".into(),
                bind: "/srv/site-a".into(),
            }]),
            orchestrator: ContainerOrchestrator::new(engine.clone(), default_command()),
            reaper: Arc::new(DeadContainerReaper::new(engine)),
            image: IMAGE.into(),
        });
        build_router(state)
    }

    fn engine_with_image() -> Arc<InMemoryEngine> {
        let engine = Arc::new(InMemoryEngine::new());
        engine.add_image(IMAGE);
        engine
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn wait_for_starts(engine: &InMemoryEngine, expected: usize) {
        for _ in 0..100 {
            if engine.calls().start >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("start was not issued");
    }

    #[test]
    fn test_parse_repository_name() {
        assert_eq!(
            parse_repository_name(br#"{"repository":{"name":"site-a"}}"#)
                .unwrap()
                .as_str(),
            "site-a"
        );
        assert!(parse_repository_name(b"{}").is_none());
        assert!(parse_repository_name(br#"{"repository":{}}"#).is_none());
        assert!(parse_repository_name(br#"{"repository":{"name":""}}"#).is_none());
        assert!(parse_repository_name(br#"{"repository":{"name":"  "}}"#).is_none());
        assert_eq!(
            parse_repository_name(br#"{"repository":{"name":" site-a "}}"#)
                .unwrap()
                .as_str(),
            " site-a "
        );
        assert!(parse_repository_name(br#"{"repositry":{"name":"site-a"}}"#).is_none());
        assert!(parse_repository_name(b"not json").is_none());
    }

    #[tokio::test]
    async fn test_push_for_managed_repo_creates_and_starts() {
        let engine = engine_with_image();
        let app = test_app(engine.clone());

        let response = app
            .oneshot(post(r#"{"repository":{"name":"site-a"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response.into_body()).await,
            "Docker Container Created With Name: site-a"
        );

        wait_for_starts(&engine, 1).await;
        let calls = engine.calls();
        assert_eq!(calls.create, 1);
        assert_eq!(calls.pull, 0);
        let spec = engine.spec_of("site-a").unwrap();
        assert_eq!(spec.binds, vec!["/srv/site-a".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_object_is_bad_request() {
        let engine = engine_with_image();
        let app = test_app(engine.clone());

        let response = app.oneshot(post("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_text(response.into_body()).await,
            "Invalid Body or JSON Format"
        );
        assert_eq!(engine.calls(), Default::default());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let engine = engine_with_image();
        let app = test_app(engine.clone());

        let response = app.oneshot(post("{\"repository\":")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(engine.calls().create, 0);
    }

    #[tokio::test]
    async fn test_unmanaged_repo_is_flagged_without_launch() {
        let engine = engine_with_image();
        let app = test_app(engine.clone());

        let response = app
            .oneshot(post(r#"{"repository":{"name":"site-z"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response.into_body()).await;
        assert!(text.contains("Repository Flagged"));
        assert!(text.contains("site-z"));
        assert_eq!(engine.calls().create, 0);
        assert!(engine.containers().is_empty());
    }

    #[tokio::test]
    async fn test_padded_name_does_not_match_bind() {
        let engine = engine_with_image();
        let app = test_app(engine.clone());

        let response = app
            .oneshot(post(r#"{"repository":{"name":" site-a "}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response.into_body()).await,
            "Repository Flagged:  site-a "
        );
        assert_eq!(engine.calls().create, 0);
        assert!(engine.containers().is_empty());
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let engine = engine_with_image();
        let app = test_app(engine.clone());

        let request = Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_text(response.into_body()).await, "Method GET not allowed");
        assert_eq!(engine.calls(), Default::default());
    }

    #[tokio::test]
    async fn test_responses_carry_fixed_headers() {
        let app = test_app(engine_with_image());

        let response = app.oneshot(post("{}")).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::SERVER], SERVER_NAME);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html");
        assert_eq!(headers[header::ACCEPT], "application/json");
    }

    #[tokio::test]
    async fn test_push_sweeps_exited_containers_first() {
        let engine = engine_with_image();
        engine.insert_container("site-a", ContainerState::Exited);
        let app = test_app(engine.clone());

        let response = app
            .oneshot(post(r#"{"repository":{"name":"site-a"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let calls = engine.calls();
        assert_eq!(calls.remove, 1);
        assert_eq!(calls.create, 1);
        assert_eq!(engine.containers().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_server_error() {
        let engine = engine_with_image();
        engine.fail_creates("daemon unavailable");
        let app = test_app(engine.clone());

        let response = app
            .oneshot(post(r#"{"repository":{"name":"site-a"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(response.into_body()).await;
        assert!(text.contains("site-a"));
    }
}
