//! API Gateway Client: one credential, typed REST and GraphQL primitives,
//! and thin business methods over the provider API.
//!
//! The credential is fixed at construction. One client is built per session,
//! so two sessions never share a credential or any mutable state.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{GatewayError, Result};
use crate::ids::{encode_segment, ResourceId};
use crate::models::{
    Account, Envelope, Identity, NewRule, NewRuleset, Phase, RulePatch, Ruleset, UserInfo, Zone,
};
use crate::sanitize::sanitize;

/// Page size requested from list endpoints
const LIST_PAGE_SIZE: &str = "50";

/// Query string and body for a REST call
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| GatewayError::transport(format!("failed to encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorMessage>>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    #[serde(default)]
    message: String,
}

/// Provider API client bound to a single credential
pub struct ApiClient {
    http: reqwest::Client,
    credential: String,
    api_base_url: String,
    graphql_url: String,
}

impl ApiClient {
    pub fn new(credential: impl Into<String>, provider: &ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            credential: credential.into(),
            api_base_url: provider.api_base_url.trim_end_matches('/').to_string(),
            graphql_url: provider.graphql_url.clone(),
        }
    }

    pub fn for_identity(identity: &Identity, provider: &ProviderConfig) -> Self {
        Self::new(identity.credential(), provider)
    }

    /// Perform a REST call and return the parsed envelope.
    ///
    /// Fails with `Api` when the envelope reports `success = false` or the
    /// HTTP status is not 2xx; the HTTP status is kept on the error.
    pub async fn rest_call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Envelope<T>> {
        let url = format!("{}{}", self.api_base_url, endpoint);
        let start = std::time::Instant::now();

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(AUTHORIZATION, format!("Bearer {}", self.credential))
            .header(CONTENT_TYPE, "application/json");
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(
            "{} {} -> {} in {}ms",
            method,
            sanitize(endpoint),
            status.as_u16(),
            start.elapsed().as_millis()
        );

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(GatewayError::api(
                    Some(status.as_u16()),
                    format!("provider returned HTTP {}", status.as_u16()),
                ));
            }
            Err(e) => {
                return Err(GatewayError::transport(format!(
                    "malformed response from provider: {e}"
                )));
            }
        };

        if !envelope.success || !status.is_success() {
            let message = if envelope.errors.is_empty() {
                format!("provider returned HTTP {}", status.as_u16())
            } else {
                envelope
                    .errors
                    .iter()
                    .map(|e| match e.code {
                        Some(code) => format!("{} (code {code})", e.message),
                        None => e.message.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(GatewayError::api(Some(status.as_u16()), message));
        }

        Ok(envelope)
    }

    /// REST call that unwraps the envelope's `result`
    async fn rest_result<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.rest_call(method, endpoint, options)
            .await?
            .result
            .ok_or_else(|| GatewayError::transport("provider response carried no result"))
    }

    /// POST a GraphQL query. Parameters travel only in `variables`.
    pub async fn graphql_call<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let start = std::time::Instant::now();
        let response = self
            .http
            .post(&self.graphql_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.credential))
            .header(CONTENT_TYPE, "application/json")
            .json(&GraphqlRequest { query, variables })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(
            "POST graphql -> {} in {}ms",
            status.as_u16(),
            start.elapsed().as_millis()
        );

        let parsed: GraphqlResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(GatewayError::api(
                    Some(status.as_u16()),
                    format!("GraphQL endpoint returned HTTP {}", status.as_u16()),
                ));
            }
            Err(e) => {
                return Err(GatewayError::transport(format!(
                    "malformed GraphQL response: {e}"
                )));
            }
        };

        if let Some(errors) = parsed.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GatewayError::api(Some(status.as_u16()), message));
        }

        parsed
            .data
            .ok_or_else(|| GatewayError::transport("GraphQL response carried no data"))
    }

    // --- Business methods ---

    pub async fn get_user_info(&self) -> Result<UserInfo> {
        self.rest_result(Method::GET, "/user", RequestOptions::new())
            .await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.rest_result(
            Method::GET,
            "/accounts",
            RequestOptions::new().query("per_page", LIST_PAGE_SIZE),
        )
        .await
    }

    pub async fn list_zones(&self, account_id: Option<&ResourceId>) -> Result<Vec<Zone>> {
        let mut options = RequestOptions::new().query("per_page", LIST_PAGE_SIZE);
        if let Some(account_id) = account_id {
            options = options.query("account.id", account_id.as_str());
        }
        self.rest_result(Method::GET, "/zones", options).await
    }

    pub async fn get_zone(&self, zone_id: &ResourceId) -> Result<Zone> {
        let endpoint = format!("/zones/{}", zone_id.path_segment());
        self.rest_result(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    /// List a zone's rulesets, optionally keeping only one phase
    pub async fn list_rulesets(
        &self,
        zone_id: &ResourceId,
        phase: Option<&Phase>,
    ) -> Result<Vec<Ruleset>> {
        let endpoint = format!("/zones/{}/rulesets", zone_id.path_segment());
        let rulesets: Vec<Ruleset> = self
            .rest_result(Method::GET, &endpoint, RequestOptions::new())
            .await?;
        Ok(match phase {
            Some(phase) => rulesets
                .into_iter()
                .filter(|r| r.phase == phase.as_str())
                .collect(),
            None => rulesets,
        })
    }

    pub async fn get_ruleset(&self, zone_id: &ResourceId, ruleset_id: &ResourceId) -> Result<Ruleset> {
        let endpoint = format!(
            "/zones/{}/rulesets/{}",
            zone_id.path_segment(),
            ruleset_id.path_segment()
        );
        self.rest_result(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    pub async fn get_entry_point_ruleset(&self, zone_id: &ResourceId, phase: &Phase) -> Result<Ruleset> {
        let endpoint = format!(
            "/zones/{}/rulesets/phases/{}/entrypoint",
            zone_id.path_segment(),
            encode_segment(phase.as_str())
        );
        self.rest_result(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    /// Entry-point lookup that reports absence as `None` instead of an error
    pub async fn find_entry_point_ruleset(
        &self,
        zone_id: &ResourceId,
        phase: &Phase,
    ) -> Result<Option<Ruleset>> {
        match self.get_entry_point_ruleset(zone_id, phase).await {
            Ok(ruleset) => Ok(Some(ruleset)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_account_rulesets(&self, account_id: &ResourceId) -> Result<Vec<Ruleset>> {
        let endpoint = format!("/accounts/{}/rulesets", account_id.path_segment());
        self.rest_result(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    pub async fn get_account_ruleset(
        &self,
        account_id: &ResourceId,
        ruleset_id: &ResourceId,
    ) -> Result<Ruleset> {
        let endpoint = format!(
            "/accounts/{}/rulesets/{}",
            account_id.path_segment(),
            ruleset_id.path_segment()
        );
        self.rest_result(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    pub async fn create_ruleset(&self, zone_id: &ResourceId, ruleset: &NewRuleset) -> Result<Ruleset> {
        let endpoint = format!("/zones/{}/rulesets", zone_id.path_segment());
        self.rest_result(Method::POST, &endpoint, RequestOptions::new().json(ruleset)?)
            .await
    }

    /// Append a rule; the provider returns the whole updated ruleset
    pub async fn add_rule(
        &self,
        zone_id: &ResourceId,
        ruleset_id: &ResourceId,
        rule: &NewRule,
    ) -> Result<Ruleset> {
        let endpoint = format!(
            "/zones/{}/rulesets/{}/rules",
            zone_id.path_segment(),
            ruleset_id.path_segment()
        );
        self.rest_result(Method::POST, &endpoint, RequestOptions::new().json(rule)?)
            .await
    }

    pub async fn update_rule(
        &self,
        zone_id: &ResourceId,
        ruleset_id: &ResourceId,
        rule_id: &ResourceId,
        patch: &RulePatch,
    ) -> Result<Ruleset> {
        let endpoint = format!(
            "/zones/{}/rulesets/{}/rules/{}",
            zone_id.path_segment(),
            ruleset_id.path_segment(),
            rule_id.path_segment()
        );
        self.rest_result(Method::PATCH, &endpoint, RequestOptions::new().json(patch)?)
            .await
    }

    pub async fn delete_rule(
        &self,
        zone_id: &ResourceId,
        ruleset_id: &ResourceId,
        rule_id: &ResourceId,
    ) -> Result<Ruleset> {
        let endpoint = format!(
            "/zones/{}/rulesets/{}/rules/{}",
            zone_id.path_segment(),
            ruleset_id.path_segment(),
            rule_id.path_segment()
        );
        self.rest_result(Method::DELETE, &endpoint, RequestOptions::new())
            .await
    }
}
