//! Built-in operations, grouped by namespace.
//!
//! Each submodule exposes `register_operations(reg)`; handlers receive the
//! session context and an input object already validated against their
//! contract.

pub mod accounts;
pub mod analytics;
pub mod custom_rules;
pub mod rulesets;

use crate::registry::OperationRegistry;

/// Register every built-in operation with the registry.
pub fn register_all(reg: &mut OperationRegistry) {
    accounts::register_operations(reg);
    rulesets::register_operations(reg);
    custom_rules::register_operations(reg);
    analytics::register_operations(reg);
}
