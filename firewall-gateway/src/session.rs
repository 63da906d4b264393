//! Session isolation.
//!
//! A [`SessionContext`] pairs one validated [`Identity`] with the
//! [`ApiClient`] built from its credential. The [`SessionHost`] creates one
//! context per credential (validated once), serializes calls within a
//! session, and shares nothing mutable between sessions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::AnalyticsAggregator;
use crate::auth::IdentityValidator;
use crate::client::ApiClient;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::Identity;
use crate::registry::{OperationRegistry, ToolResult};
use crate::rules::RuleManager;

/// Everything an operation handler may touch for one identity
pub struct SessionContext {
    id: Uuid,
    identity: Identity,
    client: ApiClient,
}

impl SessionContext {
    pub fn new(identity: Identity, provider: &ProviderConfig) -> Self {
        let client = ApiClient::for_identity(&identity, provider);
        Self {
            id: Uuid::new_v4(),
            identity,
            client,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn rules(&self) -> RuleManager<'_> {
        RuleManager::new(&self.client)
    }

    pub fn analytics(&self) -> AnalyticsAggregator<'_> {
        AnalyticsAggregator::new(&self.client)
    }
}

/// An established session; `turn` serializes its operations
pub struct Session {
    context: Arc<SessionContext>,
    turn: Mutex<()>,
}

impl Session {
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }
}

/// Session map keyed by the SHA-256 digest of the credential
pub struct SessionHost {
    validator: IdentityValidator,
    provider: ProviderConfig,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

fn credential_key(credential: &str) -> String {
    let digest = Sha256::digest(credential.trim().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl SessionHost {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            validator: IdentityValidator::new(provider.clone()),
            provider,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Existing session for `credential`, or validate and create one
    pub async fn establish(&self, credential: &str) -> Result<Arc<Session>> {
        let key = credential_key(credential);
        if let Some(session) = self.sessions.read().await.get(&key) {
            return Ok(session.clone());
        }

        let identity = self.validator.validate(credential).await?;
        let context = Arc::new(SessionContext::new(identity, &self.provider));

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(key)
            .or_insert_with(|| {
                info!(
                    "Session {} established for identity {}",
                    context.id(),
                    context.identity().id
                );
                Arc::new(Session {
                    context: context.clone(),
                    turn: Mutex::new(()),
                })
            })
            .clone();
        Ok(session)
    }

    /// Drop the session for `credential`. Returns whether one existed.
    pub async fn end(&self, credential: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .await
            .remove(&credential_key(credential));
        if let Some(session) = &removed {
            info!("Session {} ended", session.context.id());
        }
        removed.is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Run an operation on behalf of whoever holds `credential`.
    ///
    /// A missing or rejected credential does not fail the call here; the
    /// registry answers identity-requiring operations with
    /// `AuthenticationRequired`.
    pub async fn dispatch(
        &self,
        registry: &OperationRegistry,
        credential: Option<&str>,
        operation: &str,
        input: Value,
    ) -> ToolResult {
        let session = match credential {
            Some(credential) => match self.establish(credential).await {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Proceeding unauthenticated: {}", e);
                    None
                }
            },
            None => None,
        };

        match session {
            Some(session) => {
                let _turn = session.turn.lock().await;
                registry
                    .call(operation, Some(session.context.clone()), input)
                    .await
            }
            None => registry.call(operation, None, input).await,
        }
    }
}
