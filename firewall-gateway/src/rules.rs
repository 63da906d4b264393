//! Rule Manager: create, update, delete and toggle custom firewall rules.
//!
//! Custom rules live in the zone's entry-point ruleset for the
//! `http_request_firewall_custom` phase. That ruleset is created on first
//! use: look it up, create it if absent, then append. The two steps are not
//! retried; a failure after the ruleset was created is reported as such.

use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::{GatewayError, Result};
use crate::ids::ResourceId;
use crate::models::{NewRule, NewRuleset, Phase, Rule, RulePatch, Ruleset};

pub struct RuleManager<'a> {
    client: &'a ApiClient,
}

impl<'a> RuleManager<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// The zone's custom-rule ruleset, if one exists
    pub async fn custom_ruleset(&self, zone_id: &ResourceId) -> Result<Option<Ruleset>> {
        self.client
            .find_entry_point_ruleset(zone_id, &Phase::FirewallCustom)
            .await
    }

    /// Append a rule to the custom ruleset, creating the ruleset first if
    /// the zone has none. Returns the appended rule (last in the sequence).
    pub async fn create_custom_rule(&self, zone_id: &ResourceId, rule: &NewRule) -> Result<Rule> {
        let (ruleset, created) = match self.custom_ruleset(zone_id).await? {
            Some(ruleset) => (ruleset, false),
            None => {
                info!("Zone {} has no custom ruleset, creating one", zone_id);
                let ruleset = self
                    .client
                    .create_ruleset(zone_id, &NewRuleset::zone_entry_point(&Phase::FirewallCustom))
                    .await
                    .map_err(|e| e.context("creating custom firewall ruleset"))?;
                (ruleset, true)
            }
        };

        let ruleset_id = ResourceId::parse("ruleset id returned by provider", &ruleset.id)?;

        let updated = match self.client.add_rule(zone_id, &ruleset_id, rule).await {
            Ok(updated) => updated,
            Err(e) if created => {
                warn!("Rule append failed after creating ruleset {}: {}", ruleset_id, e);
                return Err(e.context("custom ruleset was created but adding the rule failed"));
            }
            Err(e) => return Err(e),
        };

        updated
            .rules
            .last()
            .cloned()
            .ok_or_else(|| GatewayError::consistency("created rule not found in response"))
    }

    /// Apply a partial update. Only the fields set on `patch` are sent.
    pub async fn update_custom_rule(
        &self,
        zone_id: &ResourceId,
        ruleset_id: &ResourceId,
        rule_id: &ResourceId,
        patch: &RulePatch,
    ) -> Result<Rule> {
        if patch.is_empty() {
            return Err(GatewayError::validation(
                "at least one of description, expression, action or enabled must be supplied",
            ));
        }

        let updated = self
            .client
            .update_rule(zone_id, ruleset_id, rule_id, patch)
            .await?;

        updated
            .rules
            .into_iter()
            .find(|r| r.id == rule_id.as_str())
            .ok_or_else(|| GatewayError::consistency("updated rule not found in response"))
    }

    /// Delete a rule. A second delete of the same rule fails with the
    /// provider's not-found error.
    pub async fn delete_custom_rule(
        &self,
        zone_id: &ResourceId,
        ruleset_id: &ResourceId,
        rule_id: &ResourceId,
    ) -> Result<Ruleset> {
        self.client.delete_rule(zone_id, ruleset_id, rule_id).await
    }

    pub async fn toggle_rule(
        &self,
        zone_id: &ResourceId,
        ruleset_id: &ResourceId,
        rule_id: &ResourceId,
        enabled: bool,
    ) -> Result<Rule> {
        self.update_custom_rule(zone_id, ruleset_id, rule_id, &RulePatch::new().enabled(enabled))
            .await
    }
}
