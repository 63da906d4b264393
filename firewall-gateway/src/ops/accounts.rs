//! Account and zone discovery: list_accounts, list_zones, get_zone

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::contract::{FieldSpec, InputContract};
use crate::error::Result;
use crate::ids::ResourceId;
use crate::registry::{typed_input, Effects, Operation, OperationRegistry, ToolResult};
use crate::session::SessionContext;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListZonesInput {
    account_id: Option<ResourceId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ZoneInput {
    zone_id: ResourceId,
}

async fn list_accounts(ctx: Arc<SessionContext>, _input: Value) -> Result<ToolResult> {
    let accounts = ctx.client().list_accounts().await?;
    Ok(ToolResult::json(
        format!("Found {} account(s)", accounts.len()),
        &accounts,
    ))
}

async fn list_zones(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: ListZonesInput = typed_input(input)?;
    let zones = ctx.client().list_zones(input.account_id.as_ref()).await?;
    Ok(ToolResult::json(format!("Found {} zone(s)", zones.len()), &zones))
}

async fn get_zone(ctx: Arc<SessionContext>, input: Value) -> Result<ToolResult> {
    let input: ZoneInput = typed_input(input)?;
    let zone = ctx.client().get_zone(&input.zone_id).await?;
    Ok(ToolResult::json(format!("Zone {} ({})", zone.name, zone.status), &zone))
}

pub fn register_operations(reg: &mut OperationRegistry) {
    reg.register(Operation {
        name: "list_accounts",
        description: "List the accounts the authenticated token can access",
        contract: InputContract::empty(),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(list_accounts(ctx, input)),
    });

    reg.register(Operation {
        name: "list_zones",
        description: "List zones, optionally restricted to one account",
        contract: InputContract::new(vec![FieldSpec::id(
            "accountId",
            "Only list zones belonging to this account",
        )
        .optional()]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(list_zones(ctx, input)),
    });

    reg.register(Operation {
        name: "get_zone",
        description: "Get details for a single zone",
        contract: InputContract::new(vec![FieldSpec::id("zoneId", "Zone identifier")]),
        effects: Effects::read_only(),
        handler: |ctx, input| Box::pin(get_zone(ctx, input)),
    });
}
