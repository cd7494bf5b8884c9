use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::accessors::{outcome, row_id, soft, Pets};
use crate::error::{Error, Result};
use crate::gateway::Remote;
use crate::models::{
    decode_rows, Application, ApplicationDetail, ApplicationForm, ApplicationRow,
    ApplicationStatus, Pet, PetStatus, WriteOutcome,
};
use crate::postgrest::{Query, SortOrder};

/// Adoption applications
#[derive(Debug, Clone)]
pub struct Applications {
    remote: Remote,
    pets: Pets,
}

impl Applications {
    pub fn new(remote: Remote) -> Self {
        Self {
            pets: Pets::new(remote.clone()),
            remote,
        }
    }

    /// Files an application for the signed-in user.
    ///
    /// Without a backend the application is not stored and a synthetic
    /// `demo-<millis>` id comes back so the wizard can finish.
    pub async fn submit(&self, pet_id: &str, form: &ApplicationForm) -> WriteOutcome {
        if !self.remote.is_configured() {
            let id = format!("demo-{}", Utc::now().timestamp_millis());
            log::debug!("backend not configured, returning {}", id);
            return WriteOutcome::with_id(id);
        }
        match self.try_submit(pet_id, form).await {
            Err(Error::NotAuthenticated) => WriteOutcome::failed("請先登入"),
            result => outcome("submit application", result),
        }
    }

    async fn try_submit(&self, pet_id: &str, form: &ApplicationForm) -> Result<WriteOutcome> {
        let user_id = self.remote.require_user_id().await?;
        let row = json!({
            "user_id": user_id,
            "pet_id": pet_id,
            "status": ApplicationStatus::Pending.as_str(),
            "form_data": serde_json::to_value(form)?,
        });
        let stored = self
            .remote
            .gateway()?
            .insert("applications", row)
            .await?;
        log::info!("application submitted for pet {}", pet_id);
        Ok(match row_id(&stored) {
            Some(id) => WriteOutcome::with_id(id),
            None => WriteOutcome::ok(),
        })
    }

    /// Resolves the linked pets of `rows` with one batch query
    async fn attach_pets(&self, rows: Vec<ApplicationRow>) -> Result<Vec<Application>> {
        let mut pet_ids: Vec<String> = rows.iter().map(|r| r.pet_id.clone()).collect();
        pet_ids.sort();
        pet_ids.dedup();

        let pets: HashMap<String, Pet> = self
            .pets
            .fetch_by_ids(&pet_ids)
            .await?
            .into_iter()
            .map(|pet| (pet.id.clone(), pet))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let pet = pets.get(&row.pet_id);
                row.into_application(pet)
            })
            .collect())
    }

    async fn fetch(&self, query: Query) -> Result<Vec<Application>> {
        let rows = self.remote.gateway()?.select(&query).await?;
        self.attach_pets(decode_rows("applications", rows)).await
    }

    /// The signed-in user's applications, newest first
    pub async fn fetch_mine(&self) -> Result<Vec<Application>> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        self.fetch(
            Query::table("applications")
                .eq("user_id", &user_id)
                .order("created_at", SortOrder::Descending),
        )
        .await
    }

    pub async fn mine(&self) -> Vec<Application> {
        soft("list my applications", self.fetch_mine().await)
    }

    /// One application with the applicant's answers
    pub async fn by_id(&self, id: &str) -> Option<ApplicationDetail> {
        soft("get application", self.fetch_by_id(id).await)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<ApplicationDetail>> {
        let rows = self
            .remote
            .gateway()?
            .select(&Query::table("applications").eq("id", id).limit(1))
            .await?;
        let row = match decode_rows::<ApplicationRow>("applications", rows)
            .into_iter()
            .next()
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let form_data = match serde_json::from_value::<ApplicationForm>(row.form_data.clone()) {
            Ok(form) => Some(form),
            Err(e) => {
                log::warn!("application {} has unreadable form data: {}", row.id, e);
                None
            }
        };
        let application = self
            .attach_pets(vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("application {}", id)))?;

        Ok(Some(ApplicationDetail {
            application,
            form_data,
        }))
    }

    /// Whether the signed-in user has a pending or approved application for
    /// the pet
    pub async fn has_active(&self, pet_id: &str) -> bool {
        soft("check active application", self.try_has_active(pet_id).await)
    }

    async fn try_has_active(&self, pet_id: &str) -> Result<bool> {
        let user_id = match self.remote.current_user_id().await? {
            Some(id) => id,
            None => return Ok(false),
        };
        let active = ApplicationStatus::active_values();
        let count = self
            .remote
            .gateway()?
            .count(
                &Query::table("applications")
                    .eq("user_id", &user_id)
                    .eq("pet_id", pet_id)
                    .in_list("status", &active),
            )
            .await?;
        Ok(count > 0)
    }

    /// Every application, for the admin dashboard
    pub async fn fetch_all(&self) -> Result<Vec<Application>> {
        self.fetch(Query::table("applications").order("created_at", SortOrder::Descending))
            .await
    }

    pub async fn all(&self) -> Vec<Application> {
        soft("list all applications", self.fetch_all().await)
    }

    /// Records a review decision.
    ///
    /// Approval also marks the linked pet adopted. If that second write
    /// fails the decision still stands; the outcome succeeds and carries a
    /// warning.
    pub async fn update_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        reviewer_notes: Option<&str>,
    ) -> WriteOutcome {
        outcome(
            "update application status",
            self.try_update_status(id, status, reviewer_notes).await,
        )
    }

    async fn try_update_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        reviewer_notes: Option<&str>,
    ) -> Result<WriteOutcome> {
        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(status.as_str()));
        patch.insert("reviewed_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(notes) = reviewer_notes {
            patch.insert("reviewer_notes".to_string(), json!(notes));
        }

        let rows = self
            .remote
            .gateway()?
            .update(&Query::table("applications").eq("id", id), Value::Object(patch))
            .await?;
        let pet_id = match rows.first().and_then(|row| row.get("pet_id")).and_then(Value::as_str) {
            Some(pet_id) => pet_id.to_string(),
            None => return Err(Error::NotFound(format!("application {}", id))),
        };
        log::info!("application {} is now {}", id, status.as_str());

        let mut result = WriteOutcome::with_id(id);
        if status == ApplicationStatus::Approved {
            if let Err(e) = self.pets.set_status(&pet_id, PetStatus::Adopted).await {
                log::warn!(
                    "application {} approved but pet {} was not marked adopted: {}",
                    id,
                    pet_id,
                    e
                );
                result.warning = Some(format!("寵物狀態更新失敗：{}", e.user_message()));
            }
        }
        Ok(result)
    }

    pub async fn delete(&self, id: &str) -> WriteOutcome {
        outcome("delete application", self.try_delete(id).await)
    }

    async fn try_delete(&self, id: &str) -> Result<WriteOutcome> {
        self.remote
            .gateway()?
            .delete(&Query::table("applications").eq("id", id))
            .await?;
        Ok(WriteOutcome::with_id(id))
    }
}
