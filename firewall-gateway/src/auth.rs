//! Identity Validator: exchanges a bearer credential for an [`Identity`].
//!
//! Runs once per session establishment. The credential is handed to the
//! per-session client and never logged.

use tracing::{info, warn};

use crate::client::ApiClient;
use crate::config::ProviderConfig;
use crate::error::{GatewayError, Result};
use crate::models::Identity;

pub struct IdentityValidator {
    provider: ProviderConfig,
}

impl IdentityValidator {
    pub fn new(provider: ProviderConfig) -> Self {
        Self { provider }
    }

    /// Validate `credential` against the provider's whoami endpoint
    pub async fn validate(&self, credential: &str) -> Result<Identity> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(GatewayError::authentication("no API token supplied"));
        }

        let client = ApiClient::new(credential, &self.provider);
        let user = match client.get_user_info().await {
            Ok(user) => user,
            Err(e) => {
                warn!("Credential rejected: {} ({})", e, e.kind());
                return Err(GatewayError::authentication(format!(
                    "API token could not be validated: {e}"
                )));
            }
        };

        if user.id.is_empty() {
            return Err(GatewayError::authentication(
                "identity endpoint returned no user id",
            ));
        }

        info!("Validated identity {}", user.id);
        Ok(Identity::new(user.id, user.email, credential))
    }
}

/// Pick the credential for a request: the `Authorization: Bearer` header
/// wins, otherwise the fallback token (with or without a `Bearer ` prefix).
pub fn resolve_credential(authorization: Option<&str>, fallback: Option<&str>) -> Option<String> {
    authorization
        .and_then(bearer_token)
        .or_else(|| fallback.and_then(strip_optional_bearer))
}

fn bearer_token(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    non_empty(token)
}

fn strip_optional_bearer(raw: &str) -> Option<String> {
    let raw = raw.trim();
    match raw.split_once(char::is_whitespace) {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => non_empty(token),
        _ => non_empty(raw),
    }
}

fn non_empty(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_header_takes_priority() {
        let token = resolve_credential(Some("Bearer from-header"), Some("from-env"));
        assert_eq!(token.as_deref(), Some("from-header"));
    }

    #[test]
    fn test_fallback_with_and_without_prefix() {
        assert_eq!(resolve_credential(None, Some("raw-token")).as_deref(), Some("raw-token"));
        assert_eq!(
            resolve_credential(None, Some("Bearer prefixed-token")).as_deref(),
            Some("prefixed-token")
        );
    }

    #[test]
    fn test_non_bearer_header_falls_back() {
        let token = resolve_credential(Some("Basic dXNlcjpwYXNz"), Some("env-token"));
        assert_eq!(token.as_deref(), Some("env-token"));
    }

    #[test]
    fn test_empty_inputs_yield_none() {
        assert!(resolve_credential(None, None).is_none());
        assert!(resolve_credential(Some("Bearer   "), Some("  ")).is_none());
        assert!(resolve_credential(Some("Bearer"), None).is_none());
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert_eq!(resolve_credential(Some("bearer tok"), None).as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_validate_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer good-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [],
                "result": {"id": "7c5dae5552338874e5053f2534d2767a", "email": "ops@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let validator = IdentityValidator::new(ProviderConfig::with_base_url(&server.uri()));
        let identity = validator.validate("good-token").await.unwrap();
        assert_eq!(identity.id, "7c5dae5552338874e5053f2534d2767a");
        assert_eq!(identity.email, "ops@example.com");
        assert_eq!(identity.credential(), "good-token");
    }

    #[tokio::test]
    async fn test_validate_rejected_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "errors": [{"code": 9109, "message": "Invalid access token"}],
                "messages": []
            })))
            .mount(&server)
            .await;

        let validator = IdentityValidator::new(ProviderConfig::with_base_url(&server.uri()));
        let err = validator.validate("bad-token").await.unwrap_err();
        assert_eq!(err.kind(), "AuthenticationError");
        assert!(!err.to_string().contains("bad-token"));
    }

    #[tokio::test]
    async fn test_validate_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"nope\":"))
            .mount(&server)
            .await;

        let validator = IdentityValidator::new(ProviderConfig::with_base_url(&server.uri()));
        let err = validator.validate("token").await.unwrap_err();
        assert_eq!(err.kind(), "AuthenticationError");
    }

    #[tokio::test]
    async fn test_validate_empty_credential_makes_no_call() {
        let validator =
            IdentityValidator::new(ProviderConfig::with_base_url("http://127.0.0.1:1"));
        let err = validator.validate("   ").await.unwrap_err();
        assert_eq!(err, GatewayError::authentication("no API token supplied"));
    }
}
