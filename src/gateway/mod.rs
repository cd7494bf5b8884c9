//! The remote data gateway: table queries, auth and change feeds behind one
//! object-safe trait.

mod http;
mod memory;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::auth::{Session, SignUpOutcome, User};
use crate::error::{Error, Result};
use crate::postgrest::Query;
use crate::realtime::{ChangeFilter, ChangeStream};

pub use http::SupabaseGateway;
pub use memory::MemoryGateway;

/// Operations the client needs from the hosted backend
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Rows matching the query, ordered and limited as requested
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Exact number of rows matching the query's filters
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Insert one row and return it as stored (with generated columns)
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Apply `patch` to every row matching the query's filters
    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>>;

    /// Delete every row matching the query's filters
    async fn delete(&self, query: &Query) -> Result<()>;

    async fn current_session(&self) -> Result<Option<Session>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome>;

    async fn sign_in_anonymously(&self) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// Observes the signed-in user
    fn watch_auth(&self) -> watch::Receiver<Option<User>>;

    /// Subscribe to row changes
    async fn subscribe(&self, filter: ChangeFilter) -> Result<ChangeStream>;

    /// Invoke a server-side function
    async fn invoke_function(&self, name: &str, body: Value) -> Result<Value>;
}

/// The possibly-absent gateway shared by every accessor.
///
/// An unconfigured remote is a normal state: reads come back empty and the
/// application runs on built-in data.
#[derive(Clone, Default)]
pub struct Remote {
    gateway: Option<Arc<dyn Gateway>>,
}

impl Remote {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    pub fn unconfigured() -> Self {
        Self { gateway: None }
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn gateway(&self) -> Result<&Arc<dyn Gateway>> {
        self.gateway.as_ref().ok_or(Error::NotConfigured)
    }

    /// Id of the signed-in user, if any
    pub async fn current_user_id(&self) -> Result<Option<String>> {
        let session = self.gateway()?.current_session().await?;
        Ok(session.map(|s| s.user.id))
    }

    /// Id of the signed-in user, or `NotAuthenticated`
    pub async fn require_user_id(&self) -> Result<String> {
        self.current_user_id().await?.ok_or(Error::NotAuthenticated)
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_remote_reports_not_configured() {
        let remote = Remote::unconfigured();
        assert!(!remote.is_configured());
        assert!(matches!(remote.current_user_id().await, Err(Error::NotConfigured)));
    }

    #[tokio::test]
    async fn require_user_id_needs_a_session() {
        let remote = Remote::new(Arc::new(MemoryGateway::new()));
        assert!(matches!(
            remote.require_user_id().await,
            Err(Error::NotAuthenticated)
        ));
    }
}
