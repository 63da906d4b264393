//! Analytics Aggregator: security-event queries over the provider's
//! GraphQL analytics API.
//!
//! Every query takes an explicit `[start, end)` window; only
//! [`TimeWindow::from_minutes`] reads the clock. Grouped results are
//! reshaped into count-ranked [`GroupCount`] lists.

use std::collections::HashMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::ApiClient;
use crate::error::{GatewayError, Result};
use crate::ids::ResourceId;
use crate::models::{EventsSummary, GroupCount, RuleAction, SecurityEvent};

pub const MIN_WINDOW_MINUTES: u32 = 1;
pub const MAX_WINDOW_MINUTES: u32 = 1440;

/// Cap on each list of the events summary
pub const SUMMARY_GROUP_LIMIT: usize = 20;

const SECURITY_EVENTS_QUERY: &str = r#"query SecurityEvents($zoneTag: string, $filter: ZoneFirewallEventsAdaptiveFilter_InputObject, $limit: uint64) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      firewallEventsAdaptive(filter: $filter, limit: $limit, orderBy: [datetime_DESC]) {
        action
        clientAsn
        clientCountryName
        clientIP
        clientRequestPath
        clientRequestQuery
        datetime
        source
        userAgent
        ruleId
      }
    }
  }
}"#;

const EVENTS_SUMMARY_QUERY: &str = r#"query SecurityEventsSummary($zoneTag: string, $filter: ZoneFirewallEventsAdaptiveGroupsFilter_InputObject) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      byAction: firewallEventsAdaptiveGroups(filter: $filter, limit: 20, orderBy: [count_DESC]) {
        count
        dimensions { action }
      }
      bySource: firewallEventsAdaptiveGroups(filter: $filter, limit: 20, orderBy: [count_DESC]) {
        count
        dimensions { source }
      }
      byCountry: firewallEventsAdaptiveGroups(filter: $filter, limit: 20, orderBy: [count_DESC]) {
        count
        dimensions { clientCountryName }
      }
    }
  }
}"#;

const TOP_PATHS_QUERY: &str = r#"query TopAttackedPaths($zoneTag: string, $filter: ZoneFirewallEventsAdaptiveGroupsFilter_InputObject, $limit: uint64) {
  viewer {
    zones(filter: { zoneTag: $zoneTag }) {
      topPaths: firewallEventsAdaptiveGroups(filter: $filter, limit: $limit, orderBy: [count_DESC]) {
        count
        dimensions { clientRequestPath }
      }
    }
  }
}"#;

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    #[serde(rename = "startTime")]
    pub start: DateTime<Utc>,
    #[serde(rename = "endTime")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(GatewayError::validation(
                "time window start must be before its end",
            ));
        }
        Ok(Self { start, end })
    }

    /// `[now - minutes, now)`, with `minutes` clamped to the supported range
    pub fn from_minutes(minutes: u32) -> Self {
        Self::from_minutes_ending_at(minutes, Utc::now())
    }

    pub fn from_minutes_ending_at(minutes: u32, end: DateTime<Utc>) -> Self {
        let minutes = minutes.clamp(MIN_WINDOW_MINUTES, MAX_WINDOW_MINUTES);
        Self {
            start: end - Duration::minutes(i64::from(minutes)),
            end,
        }
    }

    pub fn start_iso(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn end_iso(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn filter(&self) -> serde_json::Value {
        json!({
            "datetime_geq": self.start_iso(),
            "datetime_lt": self.end_iso(),
        })
    }
}

#[derive(Deserialize)]
struct ViewerData<Z> {
    viewer: Viewer<Z>,
}

#[derive(Deserialize)]
struct Viewer<Z> {
    #[serde(default = "Vec::new")]
    zones: Vec<Z>,
}

#[derive(Deserialize)]
struct EventsZone {
    #[serde(rename = "firewallEventsAdaptive", default)]
    events: Vec<SecurityEvent>,
}

#[derive(Deserialize)]
struct SummaryZone {
    #[serde(rename = "byAction", default)]
    by_action: Vec<Group>,
    #[serde(rename = "bySource", default)]
    by_source: Vec<Group>,
    #[serde(rename = "byCountry", default)]
    by_country: Vec<Group>,
}

#[derive(Deserialize)]
struct TopPathsZone {
    #[serde(rename = "topPaths", default)]
    top_paths: Vec<Group>,
}

#[derive(Deserialize)]
struct Group {
    count: u64,
    #[serde(default)]
    dimensions: serde_json::Map<String, serde_json::Value>,
}

/// Pull one dimension out of each group, rank by count, keep `limit`
fn rank_groups(groups: Vec<Group>, dimension: &str, limit: usize) -> Vec<GroupCount> {
    let mut ranked: Vec<GroupCount> = groups
        .into_iter()
        .map(|g| GroupCount {
            value: match g.dimensions.get(dimension) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
            count: g.count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

pub struct AnalyticsAggregator<'a> {
    client: &'a ApiClient,
}

impl<'a> AnalyticsAggregator<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Raw events in the window, most recent first, at most `limit`
    pub async fn get_security_events(
        &self,
        zone_id: &ResourceId,
        window: &TimeWindow,
        limit: u32,
    ) -> Result<Vec<SecurityEvent>> {
        let data: ViewerData<EventsZone> = self
            .client
            .graphql_call(
                SECURITY_EVENTS_QUERY,
                json!({
                    "zoneTag": zone_id.as_str(),
                    "filter": window.filter(),
                    "limit": limit,
                }),
            )
            .await?;

        let mut events: Vec<SecurityEvent> = data
            .viewer
            .zones
            .into_iter()
            .flat_map(|z| z.events)
            .collect();
        events.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        events.truncate(limit as usize);
        Ok(events)
    }

    /// Event counts grouped by action, source and country in one request
    pub async fn get_security_events_summary(
        &self,
        zone_id: &ResourceId,
        window: &TimeWindow,
    ) -> Result<EventsSummary> {
        let data: ViewerData<SummaryZone> = self
            .client
            .graphql_call(
                EVENTS_SUMMARY_QUERY,
                json!({
                    "zoneTag": zone_id.as_str(),
                    "filter": window.filter(),
                }),
            )
            .await?;

        let Some(zone) = data.viewer.zones.into_iter().next() else {
            return Ok(EventsSummary::default());
        };

        Ok(EventsSummary {
            by_action: rank_groups(zone.by_action, "action", SUMMARY_GROUP_LIMIT),
            by_source: rank_groups(zone.by_source, "source", SUMMARY_GROUP_LIMIT),
            by_country: rank_groups(zone.by_country, "clientCountryName", SUMMARY_GROUP_LIMIT),
        })
    }

    pub async fn get_top_attacked_paths(
        &self,
        zone_id: &ResourceId,
        window: &TimeWindow,
        limit: u32,
    ) -> Result<Vec<GroupCount>> {
        let data: ViewerData<TopPathsZone> = self
            .client
            .graphql_call(
                TOP_PATHS_QUERY,
                json!({
                    "zoneTag": zone_id.as_str(),
                    "filter": window.filter(),
                    "limit": limit,
                }),
            )
            .await?;

        let groups = data
            .viewer
            .zones
            .into_iter()
            .flat_map(|z| z.top_paths)
            .collect();
        Ok(rank_groups(groups, "clientRequestPath", limit as usize))
    }
}

// --- Rule suggestion ---

/// Hits from one source before it is worth a rule
pub const SUGGESTION_MIN_HITS: u64 = 3;
const SUGGESTION_MAX_IPS: usize = 10;
const SUGGESTION_MAX_PATHS: usize = 5;
const SUGGESTION_MAX_ASNS: usize = 3;
const SUGGESTION_MAX_PATH_LEN: usize = 256;

/// Event actions that do not indicate hostile traffic
const BENIGN_ACTIONS: [&str; 2] = ["allow", "skip"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionEvidence {
    pub events_analyzed: usize,
    pub hostile_events: usize,
    pub top_ips: Vec<GroupCount>,
    pub top_paths: Vec<GroupCount>,
    pub top_asns: Vec<GroupCount>,
}

/// A proposed custom rule; nothing is created until the caller submits it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSuggestion {
    pub description: String,
    pub expression: String,
    pub action: RuleAction,
    pub enabled: bool,
    pub evidence: SuggestionEvidence,
}

fn count_by<'e>(
    events: &[&'e SecurityEvent],
    key: impl Fn(&'e SecurityEvent) -> &'e str,
    limit: usize,
) -> Vec<GroupCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events {
        let value = key(*event);
        if !value.is_empty() {
            *counts.entry(value).or_default() += 1;
        }
    }
    let mut ranked: Vec<GroupCount> = counts
        .into_iter()
        .filter(|(_, count)| *count >= SUGGESTION_MIN_HITS)
        .map(|(value, count)| GroupCount {
            value: value.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    ranked.truncate(limit);
    ranked
}

fn quote_rule_string(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Propose a rule matching the most active hostile IPs and paths.
/// `None` when no source reaches [`SUGGESTION_MIN_HITS`].
pub fn suggest_rule(
    events: &[SecurityEvent],
    window: &TimeWindow,
    action: RuleAction,
) -> Option<RuleSuggestion> {
    let hostile: Vec<&SecurityEvent> = events
        .iter()
        .filter(|e| !BENIGN_ACTIONS.contains(&e.action.as_str()))
        .collect();

    let top_ips = count_by(&hostile, |e| e.client_ip.as_str(), SUGGESTION_MAX_IPS);
    let top_paths: Vec<GroupCount> = count_by(
        &hostile,
        |e| e.client_request_path.as_str(),
        SUGGESTION_MAX_PATHS + 1,
    )
    .into_iter()
    .filter(|g| g.value != "/" && g.value.len() <= SUGGESTION_MAX_PATH_LEN)
    .take(SUGGESTION_MAX_PATHS)
    .collect();
    let top_asns = count_by(&hostile, |e| e.client_asn.as_str(), SUGGESTION_MAX_ASNS);

    let mut clauses = Vec::new();
    if !top_ips.is_empty() {
        let ips: Vec<&str> = top_ips.iter().map(|g| g.value.as_str()).collect();
        clauses.push(format!("(ip.src in {{{}}})", ips.join(" ")));
    }
    if !top_paths.is_empty() {
        let paths: Vec<String> = top_paths.iter().map(|g| quote_rule_string(&g.value)).collect();
        clauses.push(format!("(http.request.uri.path in {{{}}})", paths.join(" ")));
    }
    if clauses.is_empty() {
        return None;
    }

    Some(RuleSuggestion {
        description: format!(
            "Suggested from {} security events between {} and {}",
            hostile.len(),
            window.start_iso(),
            window.end_iso()
        ),
        expression: clauses.join(" or "),
        action,
        enabled: true,
        evidence: SuggestionEvidence {
            events_analyzed: events.len(),
            hostile_events: hostile.len(),
            top_ips,
            top_paths,
            top_asns,
        },
    })
}
