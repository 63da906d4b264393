//! Stateful fake of the provider's identity, rulesets and analytics APIs

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use firewall_gateway::config::ProviderConfig;
use firewall_gateway::{OperationRegistry, SessionHost, ToolResult};

pub const TOKEN: &str = "integration-test-token";
pub const ZONE: &str = "0123456789abcdef0123456789abcdef";

const CUSTOM_PHASE: &str = "http_request_firewall_custom";

#[derive(Default)]
struct ProviderState {
    next_id: u64,
    /// zone id -> custom-phase entry-point ruleset
    rulesets: HashMap<String, Value>,
    /// GraphQL `data` returned for every analytics query
    graphql_data: Option<Value>,
}

impl ProviderState {
    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:032x}", self.next_id)
    }
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<ProviderState>>,
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true, "errors": [], "messages": [], "result": result
    }))
}

fn fail(status: u16, code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "success": false,
        "errors": [{"code": code, "message": message}],
        "messages": [],
        "result": null
    }))
}

impl FakeProvider {
    pub fn set_graphql_data(&self, data: Value) {
        self.state.lock().unwrap().graphql_data = Some(data);
    }

    pub fn ruleset_count(&self) -> usize {
        self.state.lock().unwrap().rulesets.len()
    }

    fn handle_rulesets(&self, method: &str, zone: &str, rest: &[&str], body: &[u8]) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        match (method, rest) {
            ("GET", ["phases", CUSTOM_PHASE, "entrypoint"]) => match state.rulesets.get(zone) {
                Some(ruleset) => ok(ruleset.clone()),
                None => fail(404, 10003, "Could not find entrypoint ruleset in the http_request_firewall_custom phase"),
            },
            ("POST", []) => {
                if state.rulesets.contains_key(zone) {
                    return fail(400, 20217, "a ruleset for this phase already exists");
                }
                let request: Value = serde_json::from_slice(body).unwrap_or_default();
                let id = state.fresh_id();
                let ruleset = json!({
                    "id": id,
                    "name": request["name"],
                    "kind": request["kind"],
                    "phase": request["phase"],
                    "version": "1",
                    "rules": [],
                });
                state.rulesets.insert(zone.to_string(), ruleset.clone());
                ok(ruleset)
            }
            ("POST", [ruleset_id, "rules"]) => {
                let request: Value = serde_json::from_slice(body).unwrap_or_default();
                let rule_id = state.fresh_id();
                let Some(ruleset) = state.rulesets.get_mut(zone).filter(|r| r["id"] == *ruleset_id) else {
                    return fail(404, 10003, "ruleset not found");
                };
                let mut rule = request;
                rule["id"] = json!(rule_id);
                rule["version"] = json!("1");
                ruleset["rules"].as_array_mut().unwrap().push(rule);
                ok(ruleset.clone())
            }
            ("PATCH", [ruleset_id, "rules", rule_id]) => {
                let patch: Value = serde_json::from_slice(body).unwrap_or_default();
                let Some(ruleset) = state.rulesets.get_mut(zone).filter(|r| r["id"] == *ruleset_id) else {
                    return fail(404, 10003, "ruleset not found");
                };
                let rules = ruleset["rules"].as_array_mut().unwrap();
                let Some(rule) = rules.iter_mut().find(|r| r["id"] == *rule_id) else {
                    return fail(404, 10003, "rule not found");
                };
                for (key, value) in patch.as_object().cloned().unwrap_or_default() {
                    rule[key.as_str()] = value;
                }
                ok(ruleset.clone())
            }
            ("DELETE", [ruleset_id, "rules", rule_id]) => {
                let Some(ruleset) = state.rulesets.get_mut(zone).filter(|r| r["id"] == *ruleset_id) else {
                    return fail(404, 10003, "ruleset not found");
                };
                let rules = ruleset["rules"].as_array_mut().unwrap();
                let before = rules.len();
                rules.retain(|r| r["id"] != *rule_id);
                if rules.len() == before {
                    return fail(404, 10003, &format!("could not find rule {rule_id}"));
                }
                ok(ruleset.clone())
            }
            _ => fail(405, 10000, "unsupported request"),
        }
    }
}

impl Respond for FakeProvider {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some(format!("Bearer {TOKEN}").as_str());
        if !authorized {
            return fail(401, 10000, "Authentication error");
        }

        let method = request.method.as_str();
        let segments: Vec<&str> = request.url.path().trim_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            ("GET", ["user"]) => ok(json!({"id": "user-1", "email": "ops@example.com"})),
            ("POST", ["graphql"]) => {
                let data = self
                    .state
                    .lock()
                    .unwrap()
                    .graphql_data
                    .clone()
                    .unwrap_or_else(|| json!({"viewer": {"zones": []}}));
                ResponseTemplate::new(200).set_body_json(json!({"data": data, "errors": null}))
            }
            (_, ["zones", zone, "rulesets", rest @ ..]) => {
                self.handle_rulesets(method, zone, rest, &request.body)
            }
            _ => fail(404, 7003, "Could not route to the requested path"),
        }
    }
}

pub struct Harness {
    pub server: MockServer,
    pub provider: FakeProvider,
    pub host: SessionHost,
    pub registry: OperationRegistry,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let provider = FakeProvider::default();
        Mock::given(any())
            .respond_with(provider.clone())
            .mount(&server)
            .await;
        let host = SessionHost::new(ProviderConfig::with_base_url(&server.uri()));
        Self {
            server,
            provider,
            host,
            registry: OperationRegistry::with_builtin_operations(),
        }
    }

    pub async fn call(&self, operation: &str, input: Value) -> ToolResult {
        self.host
            .dispatch(&self.registry, Some(TOKEN), operation, input)
            .await
    }

    /// Requests received so far as `"METHOD /path"`
    pub async fn requests(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| format!("{} {}", r.method.as_str(), r.url.path()))
            .collect()
    }
}

/// The JSON payload that follows the summary line of a successful result
pub fn payload(result: &ToolResult) -> Value {
    let text = result.joined_text();
    let (_, body) = text
        .split_once("\n\n")
        .unwrap_or_else(|| panic!("result has no payload: {text}"));
    serde_json::from_str(body).unwrap()
}
