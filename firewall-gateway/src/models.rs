//! Provider data model: identities, accounts, zones, rulesets, rules and
//! security events, plus the typed values used to create and patch rules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validated caller identity. Lives for one session, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    credential: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            credential: credential.into(),
        }
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// Provider response envelope: `{success, errors, messages, result, result_info}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZonePlan {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub account: AccountRef,
    #[serde(default)]
    pub plan: Option<ZonePlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub version: String,
    /// Evaluation order; never reordered.
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_parameters: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub rule_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Request-processing phase that selects a ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    FirewallCustom,
    FirewallManaged,
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FirewallCustom => "http_request_firewall_custom",
            Self::FirewallManaged => "http_request_firewall_managed",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Phase {
    fn from(name: &str) -> Self {
        match name {
            "http_request_firewall_custom" => Self::FirewallCustom,
            "http_request_firewall_managed" => Self::FirewallManaged,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a custom firewall rule may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block,
    Challenge,
    JsChallenge,
    ManagedChallenge,
    Log,
    Skip,
}

impl RuleAction {
    pub const ALL: [&'static str; 6] = [
        "block",
        "challenge",
        "js_challenge",
        "managed_challenge",
        "log",
        "skip",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Challenge => "challenge",
            Self::JsChallenge => "js_challenge",
            Self::ManagedChallenge => "managed_challenge",
            Self::Log => "log",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body for appending a rule to a ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    pub description: String,
    pub expression: String,
    pub action: RuleAction,
    pub enabled: bool,
}

/// Partial rule update. `None` means "leave unchanged" and is never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RulePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn action(mut self, action: RuleAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.expression.is_none()
            && self.action.is_none()
            && self.enabled.is_none()
    }
}

/// Body for creating an empty zone-level ruleset in a phase.
#[derive(Debug, Clone, Serialize)]
pub struct NewRuleset {
    pub name: String,
    pub description: String,
    pub kind: String,
    pub phase: String,
    pub rules: Vec<NewRule>,
}

impl NewRuleset {
    pub fn zone_entry_point(phase: &Phase) -> Self {
        Self {
            name: "default".to_string(),
            description: String::new(),
            kind: "zone".to_string(),
            phase: phase.as_str().to_string(),
            rules: Vec::new(),
        }
    }
}

/// A firewall event as reported by the analytics API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub client_asn: String,
    #[serde(default)]
    pub client_country_name: String,
    #[serde(rename = "clientIP", default)]
    pub client_ip: String,
    #[serde(default)]
    pub client_request_path: String,
    #[serde(default)]
    pub client_request_query: String,
    pub datetime: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

/// One row of a count-ranked grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSummary {
    pub by_action: Vec<GroupCount>,
    pub by_source: Vec<GroupCount>,
    pub by_country: Vec<GroupCount>,
}
