//! Error Sanitizer: redacts credentials, identifiers, emails and IPs from
//! any message before it leaves the gateway.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length (in characters) of a sanitized message, excluding the marker.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Appended when a message is cut at [`MAX_MESSAGE_CHARS`].
pub const TRUNCATION_MARKER: &str = "...[truncated]";

static BEARER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("bearer pattern is valid")
});

static HEX_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-fA-F]{32,}").expect("hex pattern is valid"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email pattern is valid")
});

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 pattern is valid")
});

/// Redact sensitive substrings and bound the message length.
///
/// Runs bearer tokens, 32+ char hex runs, emails and IPv4 addresses through
/// redaction in that order, then truncates. Truncation always runs last so a
/// redaction marker is never the only thing cut off.
pub fn sanitize(message: &str) -> String {
    let redacted = BEARER_TOKEN.replace_all(message, "Bearer [REDACTED]");
    let redacted = HEX_RUN.replace_all(&redacted, "[REDACTED_ID]");
    let redacted = EMAIL.replace_all(&redacted, "[REDACTED_EMAIL]");
    let redacted = IPV4.replace_all(&redacted, "[REDACTED_IP]");
    truncate(&redacted)
}

fn truncate(message: &str) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &message[..cut]),
        None => message.to_string(),
    }
}
