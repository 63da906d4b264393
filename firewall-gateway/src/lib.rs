//! Firewall gateway: exposes a cloud provider's firewall rules and
//! security analytics as named, input-validated operations for an AI
//! tool-calling client.
//!
//! Each authenticated identity gets its own [`session::SessionContext`]
//! holding a dedicated [`client::ApiClient`]; the
//! [`registry::OperationRegistry`] validates input before any handler runs
//! and turns every failure into a structured result.

pub mod analytics;
pub mod auth;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod ids;
pub mod models;
pub mod ops;
pub mod registry;
pub mod rules;
pub mod sanitize;
pub mod server;
pub mod session;

pub use error::{GatewayError, Result};
pub use ids::ResourceId;
pub use registry::{OperationRegistry, ToolResult};
pub use session::{SessionContext, SessionHost};
