use serde_json::json;

use crate::accessors::{outcome, row_id, soft};
use crate::error::{Error, Result};
use crate::gateway::Remote;
use crate::models::{decode_rows, Pet, PetDraft, PetPatch, PetRow, PetStatus, PetType, WriteOutcome};
use crate::postgrest::{escape_like, Filter, Query, SortOrder};

/// Pet catalog
#[derive(Debug, Clone)]
pub struct Pets {
    remote: Remote,
}

impl Pets {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    fn available_query() -> Query {
        Query::table("pets")
            .eq("status", PetStatus::Available.as_str())
            .order("created_at", SortOrder::Descending)
    }

    async fn fetch(&self, query: Query) -> Result<Vec<Pet>> {
        let rows = self.remote.gateway()?.select(&query).await?;
        Ok(decode_rows::<PetRow>("pets", rows)
            .into_iter()
            .map(Pet::from)
            .collect())
    }

    /// Available pets, newest first
    pub async fn fetch_available(&self) -> Result<Vec<Pet>> {
        self.fetch(Self::available_query()).await
    }

    pub async fn available(&self) -> Vec<Pet> {
        soft("list available pets", self.fetch_available().await)
    }

    pub async fn by_id(&self, id: &str) -> Option<Pet> {
        let pets = soft(
            "get pet",
            self.fetch(Query::table("pets").eq("id", id).limit(1)).await,
        );
        pets.into_iter().next()
    }

    pub async fn by_type(&self, pet_type: PetType) -> Vec<Pet> {
        soft(
            "list pets by type",
            self.fetch(Self::available_query().eq("type", pet_type.as_str()))
                .await,
        )
    }

    /// Case-insensitive substring search on name or breed. Wildcards in
    /// `term` match literally; `*` is reserved on the wire and dropped.
    pub async fn search(&self, term: &str) -> Vec<Pet> {
        let term: String = term
            .chars()
            .filter(|c| !matches!(c, ',' | '(' | ')' | '*'))
            .collect();
        let term = term.trim();
        if term.is_empty() {
            return self.available().await;
        }

        let pattern = format!("%{}%", escape_like(term));
        let query = Self::available_query().or(vec![
            Filter::ILike("name".to_string(), pattern.clone()),
            Filter::ILike("breed".to_string(), pattern),
        ]);
        soft("search pets", self.fetch(query).await)
    }

    pub async fn featured(&self) -> Vec<Pet> {
        soft(
            "list featured pets",
            self.fetch(Self::available_query().eq("is_featured", true)).await,
        )
    }

    pub async fn newest(&self) -> Vec<Pet> {
        soft(
            "list new pets",
            self.fetch(Self::available_query().eq("is_new", true)).await,
        )
    }

    /// Pets with the given ids, whatever their status
    pub async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Pet>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch(Query::table("pets").in_list("id", ids)).await
    }

    pub async fn by_ids(&self, ids: &[String]) -> Vec<Pet> {
        soft("list pets by id", self.fetch_by_ids(ids).await)
    }

    /// Every pet regardless of status, for the admin dashboard
    pub async fn fetch_all(&self) -> Result<Vec<Pet>> {
        self.fetch(Query::table("pets").order("created_at", SortOrder::Descending))
            .await
    }

    pub async fn all(&self) -> Vec<Pet> {
        soft("list all pets", self.fetch_all().await)
    }

    pub async fn create(&self, draft: &PetDraft) -> WriteOutcome {
        outcome("create pet", self.try_create(draft).await)
    }

    async fn try_create(&self, draft: &PetDraft) -> Result<WriteOutcome> {
        let row = serde_json::to_value(draft)?;
        let stored = self.remote.gateway()?.insert("pets", row).await?;
        log::info!("created pet {}", draft.name);
        Ok(match row_id(&stored) {
            Some(id) => WriteOutcome::with_id(id),
            None => WriteOutcome::ok(),
        })
    }

    /// Partial update; only the fields set on `patch` change
    pub async fn update(&self, id: &str, patch: &PetPatch) -> WriteOutcome {
        outcome("update pet", self.try_update(id, patch).await)
    }

    async fn try_update(&self, id: &str, patch: &PetPatch) -> Result<WriteOutcome> {
        let patch = serde_json::to_value(patch)?;
        if patch.as_object().map_or(true, |m| m.is_empty()) {
            return Ok(WriteOutcome::with_id(id));
        }
        let rows = self
            .remote
            .gateway()?
            .update(&Query::table("pets").eq("id", id), with_updated_at(patch))
            .await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("pet {}", id)));
        }
        Ok(WriteOutcome::with_id(id))
    }

    pub async fn delete(&self, id: &str) -> WriteOutcome {
        outcome("delete pet", self.try_delete(id).await)
    }

    async fn try_delete(&self, id: &str) -> Result<WriteOutcome> {
        self.remote
            .gateway()?
            .delete(&Query::table("pets").eq("id", id))
            .await?;
        log::info!("deleted pet {}", id);
        Ok(WriteOutcome::with_id(id))
    }

    /// Moves a pet through its adoption lifecycle
    pub async fn set_status(&self, id: &str, status: PetStatus) -> Result<()> {
        let rows = self
            .remote
            .gateway()?
            .update(
                &Query::table("pets").eq("id", id),
                with_updated_at(json!({ "status": status.as_str() })),
            )
            .await?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("pet {}", id)));
        }
        Ok(())
    }
}

fn with_updated_at(mut patch: serde_json::Value) -> serde_json::Value {
    if let Some(fields) = patch.as_object_mut() {
        fields.insert(
            "updated_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
    }
    patch
}
