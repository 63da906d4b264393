//! Custom firewall rule mutations: create, update, delete, toggle.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::contract::{FieldSpec, InputContract};
use crate::error::Result;
use crate::ids::ResourceId;
use crate::models::{NewRule, RuleAction, RulePatch};
use crate::registry::{typed_input, Effects, Operation, OperationRegistry, ToolResult};
use crate::session::SessionContext;

pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_EXPRESSION_LEN: usize = 4096;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateInput {
    zone_id: ResourceId,
    description: String,
    expression: String,
    action: RuleAction,
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateInput {
    zone_id: ResourceId,
    ruleset_id: ResourceId,
    rule_id: ResourceId,
    description: Option<String>,
    expression: Option<String>,
    action: Option<RuleAction>,
    enabled: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RuleRefInput {
    zone_id: ResourceId,
    ruleset_id: ResourceId,
    rule_id: ResourceId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ToggleInput {
    zone_id: ResourceId,
    ruleset_id: ResourceId,
    rule_id: ResourceId,
    enabled: bool,
}

async fn create_custom_rule(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: CreateInput = typed_input(input)?;
    let rule = NewRule {
        description: input.description,
        expression: input.expression,
        action: input.action,
        enabled: input.enabled,
    };
    let created = ctx.rules().create_custom_rule(&input.zone_id, &rule).await?;
    Ok(ToolResult::json(
        format!("Created custom rule {}", created.id),
        &created,
    ))
}

async fn update_custom_rule(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: UpdateInput = typed_input(input)?;
    let patch = RulePatch {
        description: input.description,
        expression: input.expression,
        action: input.action,
        enabled: input.enabled,
    };
    let updated = ctx
        .rules()
        .update_custom_rule(&input.zone_id, &input.ruleset_id, &input.rule_id, &patch)
        .await?;
    Ok(ToolResult::json(
        format!("Updated custom rule {}", updated.id),
        &updated,
    ))
}

async fn delete_custom_rule(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: RuleRefInput = typed_input(input)?;
    let remaining = ctx
        .rules()
        .delete_custom_rule(&input.zone_id, &input.ruleset_id, &input.rule_id)
        .await?;
    Ok(ToolResult::json(
        format!("Deleted custom rule {}", input.rule_id),
        &json!({
            "rulesetId": remaining.id,
            "remainingRules": remaining.rules.len(),
        }),
    ))
}

async fn toggle_rule(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: ToggleInput = typed_input(input)?;
    let rule = ctx
        .rules()
        .toggle_rule(&input.zone_id, &input.ruleset_id, &input.rule_id, input.enabled)
        .await?;
    let state = if rule.enabled { "enabled" } else { "disabled" };
    Ok(ToolResult::json(format!("Rule {} is now {state}", rule.id), &rule))
}

fn rule_ref_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::id("zoneId", "Zone identifier"),
        FieldSpec::id("rulesetId", "Ruleset holding the rule"),
        FieldSpec::id("ruleId", "Rule identifier"),
    ]
}

pub fn register_operations(reg: &mut OperationRegistry) {
    reg.register(Operation {
        name: "create_custom_rule",
        description: "Create a custom firewall rule, creating the zone's custom ruleset if needed",
        contract: InputContract::new(vec![
            FieldSpec::id("zoneId", "Zone identifier"),
            FieldSpec::string("description", "Human-readable rule description")
                .max_length(MAX_DESCRIPTION_LEN),
            FieldSpec::string("expression", "Rule filter expression")
                .max_length(MAX_EXPRESSION_LEN),
            FieldSpec::string("action", "Action taken when the expression matches")
                .one_of(&RuleAction::ALL),
            FieldSpec::boolean("enabled", "Whether the rule is active").default(json!(true)),
        ]),
        effects: Effects::write(false, false),
        handler: |ctx, input| Box::pin(create_custom_rule(ctx, input)),
    });

    let mut update_fields = rule_ref_fields();
    update_fields.extend([
        FieldSpec::string("description", "New description")
            .max_length(MAX_DESCRIPTION_LEN)
            .optional(),
        FieldSpec::string("expression", "New filter expression")
            .max_length(MAX_EXPRESSION_LEN)
            .optional(),
        FieldSpec::string("action", "New action")
            .one_of(&RuleAction::ALL)
            .optional(),
        FieldSpec::boolean("enabled", "New enabled state").optional(),
    ]);
    reg.register(Operation {
        name: "update_custom_rule",
        description: "Update selected fields of a custom firewall rule",
        contract: InputContract::new(update_fields),
        effects: Effects::write(false, true),
        handler: |ctx, input| Box::pin(update_custom_rule(ctx, input)),
    });

    reg.register(Operation {
        name: "delete_custom_rule",
        description: "Delete a custom firewall rule",
        contract: InputContract::new(rule_ref_fields()),
        effects: Effects::write(true, false),
        handler: |ctx, input| Box::pin(delete_custom_rule(ctx, input)),
    });

    let mut toggle_fields = rule_ref_fields();
    toggle_fields.push(FieldSpec::boolean("enabled", "Enable (true) or disable (false) the rule"));
    reg.register(Operation {
        name: "toggle_rule",
        description: "Enable or disable a custom firewall rule",
        contract: InputContract::new(toggle_fields),
        effects: Effects::write(false, true),
        handler: |ctx, input| Box::pin(toggle_rule(ctx, input)),
    });
}
