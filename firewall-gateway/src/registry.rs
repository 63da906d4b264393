//! Operation Registry: named, input-validated operations callable by the
//! tool-calling layer.
//!
//! Input is validated against the operation's contract before the handler
//! runs. Every failure comes back as a structured [`ToolResult`] with
//! `is_error` set, never as a transport-level fault.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::contract::InputContract;
use crate::error::{GatewayError, Result};
use crate::sanitize::sanitize;
use crate::session::SessionContext;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>>;

/// Receives the session and the validated, defaults-filled input
pub type Handler = fn(Arc<SessionContext>, Value) -> HandlerFuture;

/// Declared side effects of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Effects {
    #[serde(rename = "readOnlyHint")]
    pub read_only: bool,
    #[serde(rename = "destructiveHint")]
    pub destructive: bool,
    #[serde(rename = "idempotentHint")]
    pub idempotent: bool,
}

impl Effects {
    pub const fn read_only() -> Self {
        Self {
            read_only: true,
            destructive: false,
            idempotent: true,
        }
    }

    pub const fn write(destructive: bool, idempotent: bool) -> Self {
        Self {
            read_only: false,
            destructive,
            idempotent,
        }
    }
}

pub struct Operation {
    pub name: &'static str,
    pub description: &'static str,
    pub contract: InputContract,
    pub effects: Effects,
    pub handler: Handler,
}

/// Public description of an operation, as published to the protocol layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: Effects,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Structured operation result: text content plus an error flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text".into(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    /// A summary line followed by the pretty-printed payload
    pub fn json<T: Serialize>(summary: impl AsRef<str>, payload: &T) -> Self {
        let body = serde_json::to_string_pretty(payload)
            .unwrap_or_else(|e| format!("<unserializable result: {e}>"));
        Self::text(format!("{}\n\n{}", summary.as_ref(), body))
    }

    pub fn failure(err: &GatewayError) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text".into(),
                text: format!("{}: {}", err.kind(), sanitize(&err.to_string())),
            }],
            is_error: true,
        }
    }

    /// All text blocks joined, for logging and assertions
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Deserialize validated input into a handler's typed input struct
pub fn typed_input<T: serde::de::DeserializeOwned>(input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| GatewayError::validation(format!("invalid input: {e}")))
}

/// In-memory operation registry
pub struct OperationRegistry {
    operations: HashMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Registry with every built-in firewall operation
    pub fn with_builtin_operations() -> Self {
        let mut reg = Self::new();
        crate::ops::register_all(&mut reg);
        info!("Registered {} operations", reg.len());
        reg
    }

    /// Register an operation, replacing any with the same name
    pub fn register(&mut self, operation: Operation) {
        info!("Registered operation: {}", operation.name);
        self.operations.insert(operation.name.to_string(), operation);
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Descriptors for every operation, sorted by name
    pub fn descriptors(&self) -> Vec<OperationDescriptor> {
        let mut descriptors: Vec<OperationDescriptor> = self
            .operations
            .values()
            .map(|op| OperationDescriptor {
                name: op.name.to_string(),
                description: op.description.to_string(),
                input_schema: op.contract.json_schema(),
                annotations: op.effects,
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Validate input, check the session, run the handler.
    pub async fn call(
        &self,
        name: &str,
        session: Option<Arc<SessionContext>>,
        input: Value,
    ) -> ToolResult {
        let Some(operation) = self.operations.get(name) else {
            return ToolResult::failure(&GatewayError::validation(format!(
                "unknown operation: {name}"
            )));
        };

        let input = match operation.contract.validate(&input) {
            Ok(input) => input,
            Err(e) => {
                warn!("Rejected input for {}: {}", name, e);
                return ToolResult::failure(&e);
            }
        };

        let Some(session) = session else {
            return ToolResult::failure(&GatewayError::AuthenticationRequired);
        };

        info!("Dispatching {} (session {})", name, session.id());
        match (operation.handler)(session, input).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Operation {} failed: {} ({})", name, e, e.kind());
                ToolResult::failure(&e)
            }
        }
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
