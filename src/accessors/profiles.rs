use serde_json::{Map, Value};

use crate::accessors::{outcome, soft};
use crate::error::Result;
use crate::gateway::Remote;
use crate::models::{
    decode_rows, AdminStats, ApplicationStatus, PetStatus, ProfileUpdate, UserProfile, UserRow,
    UserStats, WriteOutcome,
};
use crate::postgrest::Query;

/// Persisted user profiles and dashboard counters
#[derive(Debug, Clone)]
pub struct Profiles {
    remote: Remote,
}

impl Profiles {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    /// Profile row of the signed-in user. `None` when nobody is signed in or
    /// the row has not been created yet.
    pub async fn fetch_current(&self) -> Result<Option<UserProfile>> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(None),
        };
        let rows = self
            .remote
            .gateway()?
            .select(&Query::table("users").eq("id", &user_id).limit(1))
            .await?;
        Ok(decode_rows::<UserRow>("users", rows)
            .into_iter()
            .next()
            .map(UserProfile::from))
    }

    pub async fn current(&self) -> Option<UserProfile> {
        soft("get profile", self.fetch_current().await)
    }

    /// Updates the provided, non-empty fields only
    pub async fn update(&self, changes: &ProfileUpdate) -> WriteOutcome {
        outcome("update profile", self.try_update(changes).await)
    }

    async fn try_update(&self, changes: &ProfileUpdate) -> Result<WriteOutcome> {
        let user_id = self.remote.require_user_id().await?;

        let mut patch = Map::new();
        let fields = [("name", &changes.name), ("avatar_url", &changes.avatar_url)];
        for (column, value) in fields {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                patch.insert(column.to_string(), Value::String(value.to_string()));
            }
        }
        if patch.is_empty() {
            return Ok(WriteOutcome::with_id(user_id));
        }

        self.remote
            .gateway()?
            .update(&Query::table("users").eq("id", &user_id), Value::Object(patch))
            .await?;
        Ok(WriteOutcome::with_id(user_id))
    }

    /// Counters shown on the profile screen
    pub async fn fetch_stats(&self) -> Result<UserStats> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(UserStats::default()),
        };
        let gateway = self.remote.gateway()?;
        let mine = |table: &str| Query::table(table).eq("user_id", &user_id);
        let favorites = mine("favorites");
        let pending = mine("applications").eq("status", ApplicationStatus::Pending.as_str());
        let approved = mine("applications").eq("status", ApplicationStatus::Approved.as_str());

        let (favorites_count, pending_applications_count, adopted_count) = tokio::try_join!(
            gateway.count(&favorites),
            gateway.count(&pending),
            gateway.count(&approved),
        )?;

        Ok(UserStats {
            favorites_count,
            pending_applications_count,
            adopted_count,
        })
    }

    pub async fn stats(&self) -> UserStats {
        soft("get profile stats", self.fetch_stats().await)
    }

    /// Site-wide counters for the admin dashboard
    pub async fn fetch_admin_stats(&self) -> Result<AdminStats> {
        let gateway = self.remote.gateway()?;

        let pets = Query::table("pets");
        let applications = Query::table("applications");
        let pending = Query::table("applications").eq("status", ApplicationStatus::Pending.as_str());
        let adopted = Query::table("pets").eq("status", PetStatus::Adopted.as_str());
        let users = Query::table("users");

        let (total_pets, total_applications, pending_applications, adopted_pets, total_users) = tokio::try_join!(
            gateway.count(&pets),
            gateway.count(&applications),
            gateway.count(&pending),
            gateway.count(&adopted),
            gateway.count(&users),
        )?;

        Ok(AdminStats {
            total_pets,
            total_applications,
            pending_applications,
            adopted_pets,
            total_users,
        })
    }

    pub async fn admin_stats(&self) -> AdminStats {
        soft("get admin stats", self.fetch_admin_stats().await)
    }
}
