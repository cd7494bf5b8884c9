use serde_json::{json, Value};

use crate::accessors::{outcome, soft, Pets};
use crate::error::Result;
use crate::gateway::Remote;
use crate::models::{Pet, WriteOutcome};
use crate::postgrest::Query;

/// The signed-in user's favorite pets
#[derive(Debug, Clone)]
pub struct Favorites {
    remote: Remote,
    pets: Pets,
}

fn pair_query(user_id: &str, pet_id: &str) -> Query {
    Query::table("favorites")
        .eq("user_id", user_id)
        .eq("pet_id", pet_id)
}

impl Favorites {
    pub fn new(remote: Remote) -> Self {
        Self {
            pets: Pets::new(remote.clone()),
            remote,
        }
    }

    /// Favorite pet ids; empty when nobody is signed in
    pub async fn fetch_ids(&self) -> Result<Vec<String>> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => {
                log::debug!("no signed-in user, no favorites");
                return Ok(Vec::new());
            }
        };

        let rows = self
            .remote
            .gateway()?
            .select(&Query::table("favorites").select("pet_id").eq("user_id", &user_id))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("pet_id").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    pub async fn ids(&self) -> Vec<String> {
        soft("list favorite ids", self.fetch_ids().await)
    }

    /// Favorite pets with full details
    pub async fn pets(&self) -> Vec<Pet> {
        let ids = self.ids().await;
        self.pets.by_ids(&ids).await
    }

    async fn insert(&self, user_id: &str, pet_id: &str) -> Result<()> {
        let row = json!({ "user_id": user_id, "pet_id": pet_id });
        match self.remote.gateway()?.insert("favorites", row).await {
            Ok(_) => Ok(()),
            // Already a favorite
            Err(e) if e.is_unique_violation() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn add(&self, pet_id: &str) -> WriteOutcome {
        outcome("add favorite", self.try_add(pet_id).await)
    }

    async fn try_add(&self, pet_id: &str) -> Result<WriteOutcome> {
        let user_id = self.remote.require_user_id().await?;
        self.insert(&user_id, pet_id).await?;
        Ok(WriteOutcome::ok())
    }

    pub async fn remove(&self, pet_id: &str) -> WriteOutcome {
        outcome("remove favorite", self.try_remove(pet_id).await)
    }

    async fn try_remove(&self, pet_id: &str) -> Result<WriteOutcome> {
        let user_id = self.remote.require_user_id().await?;
        self.remote
            .gateway()?
            .delete(&pair_query(&user_id, pet_id))
            .await?;
        Ok(WriteOutcome::ok())
    }

    /// Flips membership and returns the resulting state as recorded by the
    /// backend. Reads first, then inserts or deletes; two concurrent toggles
    /// from the same user may both apply.
    pub async fn toggle(&self, pet_id: &str) -> Result<bool> {
        let user_id = self.remote.require_user_id().await?;
        let gateway = self.remote.gateway()?;

        let existing = gateway
            .select(&pair_query(&user_id, pet_id).select("id").limit(1))
            .await?;
        if existing.is_empty() {
            self.insert(&user_id, pet_id).await?;
            Ok(true)
        } else {
            gateway.delete(&pair_query(&user_id, pet_id)).await?;
            Ok(false)
        }
    }

    pub async fn is_favorite(&self, pet_id: &str) -> bool {
        soft("check favorite", self.try_is_favorite(pet_id).await)
    }

    async fn try_is_favorite(&self, pet_id: &str) -> Result<bool> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(false),
        };
        let count = self
            .remote
            .gateway()?
            .count(&pair_query(&user_id, pet_id))
            .await?;
        Ok(count > 0)
    }
}
