//! Admin dashboard: catalog and application management

use crate::accessors::{Applications, Pets, Profiles};
use crate::config::AdminFetchPolicy;
use crate::error::Result;
use crate::models::{
    AdminStats, Application, ApplicationDetail, ApplicationStatus, Pet, PetDraft, PetPatch, Role,
    UserProfile, WriteOutcome,
};

const FORBIDDEN: &str = "權限不足";

/// Applies the fetch policy to one dataset
fn settle<T: Default>(policy: AdminFetchPolicy, what: &str, result: Result<T>) -> Result<T> {
    match (result, policy) {
        (Ok(value), _) => Ok(value),
        (Err(e), AdminFetchPolicy::DegradeToEmpty) => {
            log::warn!("admin {} unavailable, showing empty: {}", what, e);
            Ok(T::default())
        }
        (Err(e), AdminFetchPolicy::Strict) => {
            log::error!("admin {} failed: {}", what, e);
            Err(e)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminDashboard {
    profiles: Profiles,
    pets: Pets,
    applications: Applications,
    policy: AdminFetchPolicy,
    admin: Option<UserProfile>,
    stats: AdminStats,
    pet_list: Vec<Pet>,
    application_list: Vec<Application>,
}

impl AdminDashboard {
    pub fn new(profiles: Profiles, pets: Pets, applications: Applications, policy: AdminFetchPolicy) -> Self {
        Self {
            profiles,
            pets,
            applications,
            policy,
            admin: None,
            stats: AdminStats::default(),
            pet_list: Vec::new(),
            application_list: Vec::new(),
        }
    }

    /// Fetches the profile, stats, pets and applications together.
    ///
    /// Under [`AdminFetchPolicy::Strict`] the first failure is returned and
    /// nothing is replaced.
    pub async fn load(&mut self) -> Result<()> {
        let (admin, stats, pets, applications) = tokio::join!(
            self.profiles.fetch_current(),
            self.profiles.fetch_admin_stats(),
            self.pets.fetch_all(),
            self.applications.fetch_all(),
        );
        let admin = settle(self.policy, "profile", admin)?;
        let stats = settle(self.policy, "stats", stats)?;
        let pets = settle(self.policy, "pets", pets)?;
        let applications = settle(self.policy, "applications", applications)?;

        self.admin = admin;
        self.stats = stats;
        self.pet_list = pets;
        self.application_list = applications;
        Ok(())
    }

    /// Only profiles with the admin role see the dashboard
    pub fn is_authorized(&self) -> bool {
        self.admin.as_ref().map_or(false, |p| p.role == Role::Admin)
    }

    pub fn admin(&self) -> Option<&UserProfile> {
        self.admin.as_ref()
    }

    pub fn stats(&self) -> &AdminStats {
        &self.stats
    }

    pub fn pets(&self) -> &[Pet] {
        &self.pet_list
    }

    pub fn applications(&self) -> &[Application] {
        &self.application_list
    }

    pub async fn application_detail(&self, id: &str) -> Option<ApplicationDetail> {
        if !self.is_authorized() {
            return None;
        }
        self.applications.by_id(id).await
    }

    pub async fn approve(&mut self, id: &str, notes: Option<&str>) -> WriteOutcome {
        self.review(id, ApplicationStatus::Approved, notes).await
    }

    pub async fn reject(&mut self, id: &str, notes: Option<&str>) -> WriteOutcome {
        self.review(id, ApplicationStatus::Rejected, notes).await
    }

    async fn review(&mut self, id: &str, status: ApplicationStatus, notes: Option<&str>) -> WriteOutcome {
        if !self.is_authorized() {
            return WriteOutcome::failed(FORBIDDEN);
        }
        let outcome = self.applications.update_status(id, status, notes).await;
        if outcome.success {
            self.reload_applications().await;
        }
        outcome
    }

    /// Creates a pet when `id` is `None`, otherwise replaces its fields
    pub async fn save_pet(&mut self, id: Option<&str>, draft: PetDraft) -> WriteOutcome {
        if !self.is_authorized() {
            return WriteOutcome::failed(FORBIDDEN);
        }
        let outcome = match id {
            Some(id) => self.pets.update(id, &PetPatch::from(draft)).await,
            None => self.pets.create(&draft).await,
        };
        if outcome.success {
            self.reload_pets().await;
        }
        outcome
    }

    pub async fn delete_pet(&mut self, id: &str) -> WriteOutcome {
        if !self.is_authorized() {
            return WriteOutcome::failed(FORBIDDEN);
        }
        let outcome = self.pets.delete(id).await;
        if outcome.success {
            self.reload_pets().await;
        }
        outcome
    }

    // A failed reload keeps the previous lists; the write already happened.

    async fn reload_applications(&mut self) {
        let (stats, applications) =
            tokio::join!(self.profiles.fetch_admin_stats(), self.applications.fetch_all());
        if let Ok(stats) = settle(self.policy, "stats", stats) {
            self.stats = stats;
        }
        if let Ok(applications) = settle(self.policy, "applications", applications) {
            self.application_list = applications;
        }
    }

    async fn reload_pets(&mut self) {
        let (stats, pets) = tokio::join!(self.profiles.fetch_admin_stats(), self.pets.fetch_all());
        if let Ok(stats) = settle(self.policy, "stats", stats) {
            self.stats = stats;
        }
        if let Ok(pets) = settle(self.policy, "pets", pets) {
            self.pet_list = pets;
        }
    }
}
