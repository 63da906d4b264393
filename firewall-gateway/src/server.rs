//! HTTP host adapter: exposes the operation registry over a small REST
//! surface.
//!
//! `POST /operations/:name` always answers 200 with a structured
//! `{content, isError}` result; failures never become HTTP faults.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::resolve_credential;
use crate::error::GatewayError;
use crate::registry::{OperationDescriptor, OperationRegistry, ToolResult};
use crate::session::SessionHost;

#[derive(Clone)]
pub struct AppState {
    pub host: Arc<SessionHost>,
    pub registry: Arc<OperationRegistry>,
    /// Token used when a request carries no `Authorization: Bearer` header
    pub fallback_token: Option<String>,
}

impl AppState {
    fn credential(&self, headers: &HeaderMap) -> Option<String> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        resolve_credential(header, self.fallback_token.as_deref())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/operations", get(list_operations))
        .route("/operations/:name", post(call_operation))
        .route("/session", delete(end_session))
        .with_state(state)
}

/// Bind `listen_addr` and serve until the process stops
pub async fn serve(listen_addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("Firewall gateway listening on http://{}", listen_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "operations": state.registry.len(),
        "sessions": state.host.session_count().await,
    }))
}

async fn list_operations(State(state): State<AppState>) -> Json<Vec<OperationDescriptor>> {
    Json(state.registry.descriptors())
}

async fn call_operation(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ToolResult> {
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(input) => input,
            Err(e) => {
                return Json(ToolResult::failure(&GatewayError::validation(format!(
                    "request body is not valid JSON: {e}"
                ))))
            }
        }
    };

    let credential = state.credential(&headers);
    let result = state
        .host
        .dispatch(&state.registry, credential.as_deref(), &name, input)
        .await;
    Json(result)
}

async fn end_session(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let ended = match state.credential(&headers) {
        Some(credential) => state.host.end(&credential).await,
        None => false,
    };
    Json(json!({ "ended": ended }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(base_url: &str, fallback_token: Option<&str>) -> AppState {
        AppState {
            host: Arc::new(SessionHost::new(ProviderConfig::with_base_url(base_url))),
            registry: Arc::new(OperationRegistry::with_builtin_operations()),
            fallback_token: fallback_token.map(str::to_string),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_op(name: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/operations/{name}"));
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn mount_identity(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [],
                "result": {"id": "user-1", "email": "user@example.com"}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_health_and_operation_listing() {
        let app = router(state("http://127.0.0.1:1", None));
        let (status, body) = send(
            app.clone(),
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["operations"], 16);

        let (_, body) = send(
            app,
            Request::builder().uri("/operations").body(Body::empty()).unwrap(),
        )
        .await;
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 16);
        assert!(listed.iter().all(|d| d["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_call_without_credential_is_authentication_required() {
        let app = router(state("http://127.0.0.1:1", None));
        let (status, body) = send(app, post_op("list_accounts", None, "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isError"], true);
        let text = body["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("AuthenticationRequired"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_validation_failure() {
        let app = router(state("http://127.0.0.1:1", None));
        let (status, body) = send(app, post_op("get_zone", None, "{not json")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isError"], true);
        assert!(body["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("ValidationError"));
    }

    #[tokio::test]
    async fn test_header_credential_reaches_provider() {
        let server = MockServer::start().await;
        mount_identity(&server, "header-token").await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .and(header("authorization", "Bearer header-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [],
                "result": [{"id": "0123456789abcdef0123456789abcdef", "name": "Main", "type": "standard"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), Some("fallback-token")));
        let (_, body) = send(app, post_op("list_accounts", Some("header-token"), "{}")).await;
        assert_eq!(body["isError"], false);
        assert!(body["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Found 1 account(s)"));
    }

    #[tokio::test]
    async fn test_fallback_token_used_without_header() {
        let server = MockServer::start().await;
        mount_identity(&server, "fallback-token").await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .and(header("authorization", "Bearer fallback-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [], "result": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), Some("Bearer fallback-token")));
        let (_, body) = send(app, post_op("list_accounts", None, "")).await;
        assert_eq!(body["isError"], false);
    }

    #[tokio::test]
    async fn test_end_session() {
        let server = MockServer::start().await;
        mount_identity(&server, "t").await;
        Mock::given(method("GET"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [], "result": []
            })))
            .mount(&server)
            .await;

        let app = router(state(&server.uri(), None));
        send(app.clone(), post_op("list_accounts", Some("t"), "")).await;

        let end = || {
            Request::builder()
                .method(Method::DELETE)
                .uri("/session")
                .header("authorization", "Bearer t")
                .body(Body::empty())
                .unwrap()
        };
        let (_, body) = send(app.clone(), end()).await;
        assert_eq!(body["ended"], true);
        let (_, body) = send(app, end()).await;
        assert_eq!(body["ended"], false);
    }
}
