//! Provider resource identifiers.
//!
//! Zone, account, ruleset and rule IDs are 32-char lowercase hex. A
//! [`ResourceId`] can only be built from a string of that shape, and it is
//! the only thing the API client accepts when building a request path.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// JSON-schema pattern for identifier fields.
pub const ID_PATTERN: &str = "^[0-9a-f]{32}$";

pub const ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Validate `raw` as an identifier. `field` names it in the error.
    pub fn parse(field: &str, raw: &str) -> Result<Self> {
        if is_valid_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(GatewayError::validation(format!(
                "{field} must be a 32-character lowercase hex identifier"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form for insertion into a URL path.
    pub fn path_segment(&self) -> Cow<'_, str> {
        encode_segment(&self.0)
    }
}

pub fn is_valid_id(raw: &str) -> bool {
    raw.len() == ID_LEN && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Percent-encode any value placed in a path segment.
pub fn encode_segment(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

impl FromStr for ResourceId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse("identifier", s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse("identifier", &value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
