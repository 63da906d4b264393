//! Error taxonomy shared by every gateway component.
//!
//! Any variant carrying provider or transport text is built through a
//! constructor that sanitizes it, so `Display` output is always safe to
//! hand back to the caller.

use thiserror::Error;

use crate::sanitize::sanitize;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Input contract violation, raised before any side effect.
    #[error("{0}")]
    Validation(String),

    /// Credential missing or rejected by the identity endpoint.
    #[error("{0}")]
    Authentication(String),

    /// The operation needs an authenticated session and none exists.
    #[error("this operation requires an authenticated session; supply a valid API token")]
    AuthenticationRequired,

    /// Provider returned a failed envelope or a GraphQL error list.
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    /// Provider response contradicts the requested mutation.
    #[error("{0}")]
    Consistency(String),

    /// Network or parse failure.
    #[error("{0}")]
    Transport(String),
}

impl GatewayError {
    pub fn validation(message: impl AsRef<str>) -> Self {
        Self::Validation(sanitize(message.as_ref()))
    }

    pub fn authentication(message: impl AsRef<str>) -> Self {
        Self::Authentication(sanitize(message.as_ref()))
    }

    pub fn api(status: Option<u16>, message: impl AsRef<str>) -> Self {
        Self::Api {
            status,
            message: sanitize(message.as_ref()),
        }
    }

    pub fn consistency(message: impl AsRef<str>) -> Self {
        Self::Consistency(sanitize(message.as_ref()))
    }

    pub fn transport(message: impl AsRef<str>) -> Self {
        Self::Transport(sanitize(message.as_ref()))
    }

    /// True when the provider reported the addressed resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: Some(404), .. })
    }

    /// Short name of the error kind, used in boundary output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Authentication(_) => "AuthenticationError",
            Self::AuthenticationRequired => "AuthenticationRequired",
            Self::Api { .. } => "ApiError",
            Self::Consistency(_) => "ConsistencyError",
            Self::Transport(_) => "TransportError",
        }
    }

    /// Prefix the message with what the caller was doing, keeping the kind.
    pub fn context(self, what: &str) -> Self {
        match self {
            Self::Validation(m) => Self::validation(format!("{what}: {m}")),
            Self::Authentication(m) => Self::authentication(format!("{what}: {m}")),
            Self::AuthenticationRequired => Self::AuthenticationRequired,
            Self::Api { status, message } => Self::api(status, format!("{what}: {message}")),
            Self::Consistency(m) => Self::consistency(format!("{what}: {m}")),
            Self::Transport(m) => Self::transport(format!("{what}: {m}")),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let summary = if err.is_timeout() {
            "request to provider timed out"
        } else if err.is_connect() {
            "could not connect to provider"
        } else if err.is_decode() {
            "malformed response from provider"
        } else {
            "network request to provider failed"
        };
        Self::transport(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_message_is_sanitized() {
        let err = GatewayError::api(Some(400), "bad token Bearer abc.def for admin@example.com");
        let text = err.to_string();
        assert!(text.contains("Bearer [REDACTED]"));
        assert!(text.contains("[REDACTED_EMAIL]"));
        assert!(!text.contains("abc.def"));
    }

    #[test]
    fn test_not_found_is_structured() {
        assert!(GatewayError::api(Some(404), "whatever wording").is_not_found());
        assert!(!GatewayError::api(Some(400), "404 not found").is_not_found());
        assert!(!GatewayError::transport("not found").is_not_found());
    }

    #[test]
    fn test_context_keeps_kind_and_status() {
        let err = GatewayError::api(Some(404), "missing").context("adding rule");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), "ApiError");
        assert_eq!(err.to_string(), "adding rule: missing");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(GatewayError::validation("x").kind(), "ValidationError");
        assert_eq!(GatewayError::authentication("x").kind(), "AuthenticationError");
        assert_eq!(GatewayError::AuthenticationRequired.kind(), "AuthenticationRequired");
        assert_eq!(GatewayError::consistency("x").kind(), "ConsistencyError");
        assert_eq!(GatewayError::transport("x").kind(), "TransportError");
    }
}
