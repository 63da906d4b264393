//! Ruleset inspection: custom and managed entry points, single rulesets,
//! zone and account listings.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::contract::{FieldSpec, InputContract};
use crate::error::Result;
use crate::ids::ResourceId;
use crate::models::Phase;
use crate::registry::{typed_input, Effects, Operation, OperationRegistry, ToolResult};
use crate::session::SessionContext;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ZoneInput {
    zone_id: ResourceId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RulesetInput {
    zone_id: ResourceId,
    ruleset_id: ResourceId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AccountInput {
    account_id: ResourceId,
}

/// Entry-point ruleset for `phase`; a zone without one yields an empty listing
async fn list_phase(ctx: &SessionContext, zone_id: &ResourceId, phase: Phase) -> Result<ToolResult> {
    let Some(ruleset) = ctx.client().find_entry_point_ruleset(zone_id, &phase).await? else {
        return Ok(ToolResult::json(
            format!("No {phase} ruleset exists for this zone yet"),
            &json!({"rules": []}),
        ));
    };
    Ok(ToolResult::json(
        format!("Ruleset {} holds {} rule(s)", ruleset.id, ruleset.rules.len()),
        &ruleset,
    ))
}

async fn list_custom_rules(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: ZoneInput = typed_input(input)?;
    list_phase(&ctx, &input.zone_id, Phase::FirewallCustom).await
}

async fn list_managed_rulesets(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: ZoneInput = typed_input(input)?;
    list_phase(&ctx, &input.zone_id, Phase::FirewallManaged).await
}

async fn get_ruleset(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: RulesetInput = typed_input(input)?;
    let ruleset = ctx
        .client()
        .get_ruleset(&input.zone_id, &input.ruleset_id)
        .await?;
    Ok(ToolResult::json(
        format!("Ruleset {} ({})", ruleset.name, ruleset.phase),
        &ruleset,
    ))
}

async fn list_all_rulesets(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: ZoneInput = typed_input(input)?;
    let rulesets = ctx.client().list_rulesets(&input.zone_id, None).await?;
    Ok(ToolResult::json(
        format!("Found {} ruleset(s)", rulesets.len()),
        &rulesets,
    ))
}

async fn list_account_rulesets(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: AccountInput = typed_input(input)?;
    let rulesets = ctx.client().list_account_rulesets(&input.account_id).await?;
    Ok(ToolResult::json(
        format!("Found {} account-level ruleset(s)", rulesets.len()),
        &rulesets,
    ))
}

pub fn register_operations(reg: &mut OperationRegistry) {
    let zone_only = || InputContract::new(vec![FieldSpec::id("zoneId", "Zone identifier")]);

    reg.register(Operation {
        name: "list_custom_rules",
        description: "List the custom firewall rules of a zone",
        contract: zone_only(),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(list_custom_rules(ctx, input)),
    });

    reg.register(Operation {
        name: "list_managed_rulesets",
        description: "Show the managed firewall ruleset deployment of a zone",
        contract: zone_only(),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(list_managed_rulesets(ctx, input)),
    });

    reg.register(Operation {
        name: "get_ruleset",
        description: "Get a single ruleset with all of its rules",
        contract: InputContract::new(vec![
            FieldSpec::id("zoneId", "Zone identifier"),
            FieldSpec::id("rulesetId", "Ruleset identifier"),
        ]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(get_ruleset(ctx, input)),
    });

    reg.register(Operation {
        name: "list_all_rulesets",
        description: "List every ruleset of a zone across all phases",
        contract: zone_only(),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(list_all_rulesets(ctx, input)),
    });

    reg.register(Operation {
        name: "list_account_rulesets",
        description: "List the account-level rulesets",
        contract: InputContract::new(vec![FieldSpec::id("accountId", "Account identifier")]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(list_account_rulesets(ctx, input)),
    });
}
