//! Security analytics: events, summaries, top paths, rule suggestions.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::analytics::{suggest_rule, TimeWindow, MAX_WINDOW_MINUTES, MIN_WINDOW_MINUTES};
use crate::contract::{FieldSpec, InputContract};
use crate::error::Result;
use crate::ids::ResourceId;
use crate::models::RuleAction;
use crate::registry::{typed_input, Effects, Operation, OperationRegistry, ToolResult};
use crate::session::SessionContext;

/// Events read when proposing a rule
pub const SUGGESTION_SAMPLE_SIZE: u32 = 1000;

const SUGGESTION_ACTIONS: &[&str] = &["block", "challenge", "log"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EventsInput {
    zone_id: ResourceId,
    minutes: u32,
    limit: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SummaryInput {
    zone_id: ResourceId,
    minutes: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SuggestInput {
    zone_id: ResourceId,
    minutes: u32,
    action_type: RuleAction,
}

async fn get_security_events(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: EventsInput = typed_input(input)?;
    let window = TimeWindow::from_minutes(input.minutes);
    let events = ctx
        .analytics()
        .get_security_events(&input.zone_id, &window, input.limit)
        .await?;
    Ok(ToolResult::json(
        format!(
            "{} security event(s) between {} and {}",
            events.len(),
            window.start_iso(),
            window.end_iso()
        ),
        &events,
    ))
}

async fn get_attack_summary(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: SummaryInput = typed_input(input)?;
    let window = TimeWindow::from_minutes(input.minutes);
    let summary = ctx
        .analytics()
        .get_security_events_summary(&input.zone_id, &window)
        .await?;
    Ok(ToolResult::json(
        format!(
            "Security event summary for the last {} minute(s)",
            input.minutes
        ),
        &json!({"window": window, "summary": summary}),
    ))
}

async fn get_top_attacked_paths(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: EventsInput = typed_input(input)?;
    let window = TimeWindow::from_minutes(input.minutes);
    let paths = ctx
        .analytics()
        .get_top_attacked_paths(&input.zone_id, &window, input.limit)
        .await?;
    Ok(ToolResult::json(
        format!("Top {} attacked path(s)", paths.len()),
        &paths,
    ))
}

async fn suggest_rule_from_events(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: SuggestInput = typed_input(input)?;
    let window = TimeWindow::from_minutes(input.minutes);
    let events = ctx
        .analytics()
        .get_security_events(&input.zone_id, &window, SUGGESTION_SAMPLE_SIZE)
        .await?;

    match suggest_rule(&events, &window, input.action_type) {
        Some(suggestion) => Ok(ToolResult::json(
            "Suggested custom rule (not created; pass it to create_custom_rule to apply)",
            &suggestion,
        )),
        None => Ok(ToolResult::text(format!(
            "No suggestion: {} event(s) in the last {} minute(s) show no repeated hostile source",
            events.len(),
            input.minutes
        ))),
    }
}

fn minutes_field() -> FieldSpec {
    FieldSpec::integer("minutes", "Look-back window in minutes")
        .range(i64::from(MIN_WINDOW_MINUTES), i64::from(MAX_WINDOW_MINUTES))
        .default(json!(60))
}

pub fn register_operations(reg: &mut OperationRegistry) {
    reg.register(Operation {
        name: "get_security_events",
        description: "List recent firewall security events, most recent first",
        contract: InputContract::new(vec![
            FieldSpec::id("zoneId", "Zone identifier"),
            minutes_field(),
            FieldSpec::integer("limit", "Maximum number of events")
                .range(1, 1000)
                .default(json!(100)),
        ]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(get_security_events(ctx, input)),
    });

    reg.register(Operation {
        name: "get_attack_summary",
        description: "Summarize security events by action, source and country",
        contract: InputContract::new(vec![
            FieldSpec::id("zoneId", "Zone identifier"),
            minutes_field(),
        ]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(get_attack_summary(ctx, input)),
    });

    reg.register(Operation {
        name: "get_top_attacked_paths",
        description: "Rank the request paths that drew the most security events",
        contract: InputContract::new(vec![
            FieldSpec::id("zoneId", "Zone identifier"),
            minutes_field(),
            FieldSpec::integer("limit", "Maximum number of paths")
                .range(1, 100)
                .default(json!(10)),
        ]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(get_top_attacked_paths(ctx, input)),
    });

    reg.register(Operation {
        name: "suggest_rule_from_events",
        description: "Propose a custom rule from recent hostile traffic without creating it",
        contract: InputContract::new(vec![
            FieldSpec::id("zoneId", "Zone identifier"),
            minutes_field(),
            FieldSpec::string("actionType", "Action for the proposed rule")
                .one_of(SUGGESTION_ACTIONS)
                .default(json!("block")),
        ]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(suggest_rule_from_events(ctx, input)),
    });
}
