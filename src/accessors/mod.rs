//! One accessor per entity, translating screen requests into gateway
//! queries and rows into view models.
//!
//! Public reads never fail: when the backend is unconfigured or a query
//! errors they log the cause and return an empty value. The `fetch_*`
//! variants return the error instead, for callers that need to react to it.
//! Writes return a [`WriteOutcome`](crate::models::WriteOutcome).

mod applications;
mod chat;
mod favorites;
mod notifications;
mod pets;
mod profiles;

pub use applications::Applications;
pub use chat::{Chats, VOLUNTEER_NAME};
pub use favorites::Favorites;
pub use notifications::{NotificationSubscription, Notifications};
pub use pets::Pets;
pub use profiles::Profiles;

use crate::error::{Error, Result};
use crate::models::WriteOutcome;

/// Collapses a failed read into the empty value
pub(crate) fn soft<T: Default>(what: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(Error::NotConfigured) => {
            log::debug!("{}: backend not configured", what);
            T::default()
        }
        Err(e) => {
            log::warn!("{} failed: {}", what, e);
            T::default()
        }
    }
}

/// Collapses a failed write into an unsuccessful outcome
pub(crate) fn outcome(what: &str, result: Result<WriteOutcome>) -> WriteOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{} failed: {}", what, e);
            WriteOutcome::failed(e.user_message())
        }
    }
}

/// Rows from `select` carry their id as a string
pub(crate) fn row_id(row: &serde_json::Value) -> Option<String> {
    row.get("id").and_then(|v| v.as_str()).map(str::to_string)
}
