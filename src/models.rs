//! Typed view models and the row shapes they are mapped from.
//!
//! Rows arrive from the backend as loosely-typed JSON. Each entity has one
//! row struct (`*Row`) that mirrors the table, and one pure conversion into
//! the view model the screens consume. A row that fails to decode is skipped
//! by the accessor that fetched it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timefmt::{parse_timestamp, relative_day_label};

/// Species tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetType {
    Dog,
    Cat,
    Rabbit,
    Bird,
}

impl PetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetType::Dog => "dog",
            PetType::Cat => "cat",
            PetType::Rabbit => "rabbit",
            PetType::Bird => "bird",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "公")]
    Male,
    #[serde(rename = "母")]
    Female,
    #[serde(rename = "未知")]
    Unknown,
}

/// Adoption lifecycle of a pet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetStatus {
    #[default]
    Available,
    Pending,
    Adopted,
}

impl PetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetStatus::Available => "available",
            PetStatus::Pending => "pending",
            PetStatus::Adopted => "adopted",
        }
    }
}

/// An adoptable animal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: PetType,
    pub breed: String,
    pub age: String,
    pub gender: Gender,
    pub weight: String,
    pub location: String,
    pub description: Vec<String>,
    pub images: Vec<String>,
    pub health_status: Vec<String>,
    pub traits: Vec<String>,
    pub is_featured: bool,
    pub is_new: bool,
    pub status: PetStatus,
}

/// Row of the `pets` table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PetRow {
    id: String,
    name: String,
    #[serde(rename = "type")]
    pet_type: PetType,
    #[serde(default)]
    breed: Option<String>,
    #[serde(default)]
    age: Option<String>,
    gender: Gender,
    #[serde(default)]
    weight: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<Vec<String>>,
    #[serde(default)]
    images: Option<Vec<String>>,
    #[serde(default)]
    health_status: Option<Vec<String>>,
    #[serde(default)]
    traits: Option<Vec<String>>,
    #[serde(default)]
    is_featured: Option<bool>,
    #[serde(default)]
    is_new: Option<bool>,
    #[serde(default)]
    status: Option<PetStatus>,
}

impl From<PetRow> for Pet {
    fn from(row: PetRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            pet_type: row.pet_type,
            breed: row.breed.unwrap_or_default(),
            age: row.age.unwrap_or_default(),
            gender: row.gender,
            weight: row.weight.unwrap_or_default(),
            location: row.location.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            images: row.images.unwrap_or_default(),
            health_status: row.health_status.unwrap_or_default(),
            traits: row.traits.unwrap_or_default(),
            is_featured: row.is_featured.unwrap_or(false),
            is_new: row.is_new.unwrap_or(false),
            status: row.status.unwrap_or_default(),
        }
    }
}

/// A new pet, as the admin dashboard creates it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: PetType,
    pub breed: String,
    pub age: String,
    pub gender: Gender,
    pub weight: String,
    pub location: String,
    pub description: Vec<String>,
    pub images: Vec<String>,
    pub health_status: Vec<String>,
    pub traits: Vec<String>,
    pub is_featured: bool,
    pub is_new: bool,
    pub status: PetStatus,
}

/// Partial pet update; only fields that are set are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub pet_type: Option<PetType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_status: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PetStatus>,
}

impl From<&Pet> for PetDraft {
    fn from(pet: &Pet) -> Self {
        Self {
            name: pet.name.clone(),
            pet_type: pet.pet_type,
            breed: pet.breed.clone(),
            age: pet.age.clone(),
            gender: pet.gender,
            weight: pet.weight.clone(),
            location: pet.location.clone(),
            description: pet.description.clone(),
            images: pet.images.clone(),
            health_status: pet.health_status.clone(),
            traits: pet.traits.clone(),
            is_featured: pet.is_featured,
            is_new: pet.is_new,
            status: pet.status,
        }
    }
}

/// Every field of the draft, for saving an edited pet
impl From<PetDraft> for PetPatch {
    fn from(draft: PetDraft) -> Self {
        Self {
            name: Some(draft.name),
            pet_type: Some(draft.pet_type),
            breed: Some(draft.breed),
            age: Some(draft.age),
            gender: Some(draft.gender),
            weight: Some(draft.weight),
            location: Some(draft.location),
            description: Some(draft.description),
            images: Some(draft.images),
            health_status: Some(draft.health_status),
            traits: Some(draft.traits),
            is_featured: Some(draft.is_featured),
            is_new: Some(draft.is_new),
            status: Some(draft.status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "審核中")]
    Pending,
    #[serde(rename = "已通過")]
    Approved,
    #[serde(rename = "未通過")]
    Rejected,
    #[serde(rename = "已取消")]
    Cancelled,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Cancelled,
    ];

    /// Statuses that count as an open application, as stored
    pub fn active_values() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|status| status.is_active())
            .map(ApplicationStatus::as_str)
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "審核中",
            ApplicationStatus::Approved => "已通過",
            ApplicationStatus::Rejected => "未通過",
            ApplicationStatus::Cancelled => "已取消",
        }
    }

    /// Pending and approved applications block a new one for the same pet
    pub fn is_active(&self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "none")]
    FirstPet,
    #[serde(rename = "some")]
    HasKeptPets,
    #[serde(rename = "expert")]
    Expert,
}

/// Daily companion-time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanionTime {
    /// Up to two hours
    #[serde(rename = "2")]
    UpToTwo,
    #[serde(rename = "4")]
    TwoToFour,
    #[serde(rename = "8")]
    FourToEight,
    #[serde(rename = "all")]
    AllDay,
}

/// Applicant answers, stored as the application's `form_data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub job: String,
    pub experience: Option<ExperienceLevel>,
    pub environment: String,
    pub companion_time: Option<CompanionTime>,
    pub reason: String,
    pub commitment: bool,
    pub followup: bool,
}

/// An adoption request with its pet's display fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub pet_id: String,
    pub user_id: String,
    pub pet_name: String,
    pub pet_breed: String,
    pub status: ApplicationStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub reviewer_notes: Option<String>,
}

/// An application together with the submitted answers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub form_data: Option<ApplicationForm>,
}

/// Row of the `applications` table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApplicationRow {
    pub id: String,
    pub user_id: String,
    pub pet_id: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub form_data: Value,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ApplicationRow {
    /// Builds the view model; `pet` is the linked pet when it still exists
    pub fn into_application(self, pet: Option<&Pet>) -> Application {
        let unknown = || "Unknown".to_string();
        Application {
            pet_name: pet.map(|p| p.name.clone()).unwrap_or_else(unknown),
            pet_breed: pet.map(|p| p.breed.clone()).unwrap_or_else(unknown),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            id: self.id,
            pet_id: self.pet_id,
            user_id: self.user_id,
            status: self.status,
            reviewer_notes: self.reviewer_notes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Volunteer,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Volunteer => "volunteer",
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    /// Relative day label, e.g. `今天`
    pub timestamp: String,
    pub created_at: Option<DateTime<Utc>>,
    pub image: Option<String>,
}

/// Row of the `messages` table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub sender: Sender,
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MessageRow {
    pub fn into_message<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Message {
        let created_at = self.created_at.as_deref().and_then(parse_timestamp);
        Message {
            timestamp: created_at
                .map(|at| relative_day_label(&at, now))
                .unwrap_or_default(),
            created_at,
            id: self.id,
            sender: self.sender,
            text: self.text,
            image: self.image_url,
        }
    }
}

/// A user's conversation about one pet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub pet: Pet,
    pub volunteer_name: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message: Option<String>,
}

/// Row of the `chat_sessions` table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatSessionRow {
    pub id: String,
    pub pet_id: String,
    #[serde(default)]
    pub volunteer_name: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ApplicationUpdate,
    NewPet,
    Message,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub is_read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row of the `notifications` table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NotificationRow {
    id: String,
    #[serde(rename = "type")]
    kind: NotificationType,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    is_read: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            title: row.title.unwrap_or_default(),
            body: row.body.unwrap_or_default(),
            data: row.data,
            is_read: row.is_read.unwrap_or(false),
            created_at: row.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Persisted profile row, distinct from the auth session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub badge: String,
    pub role: Role,
}

/// Row of the `users` table
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserRow {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    badge: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            avatar_url: row.avatar_url.unwrap_or_default(),
            badge: row.badge.unwrap_or_default(),
            role: row.role.unwrap_or_default(),
        }
    }
}

/// Partial profile update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub favorites_count: u64,
    pub pending_applications_count: u64,
    pub adopted_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_pets: u64,
    pub total_applications: u64,
    pub pending_applications: u64,
    pub adopted_pets: u64,
    pub total_users: u64,
}

/// Result of a write. Writes never fail across the accessor boundary;
/// callers inspect `success` and show `error` to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A secondary effect that failed after the primary write succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl WriteOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Decodes a batch of rows, skipping (and logging) rows that do not fit
pub(crate) fn decode_rows<R: serde::de::DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<R> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(row) => Some(row),
            Err(e) => {
                log::warn!("skipping malformed {} row: {}", table, e);
                None
            }
        })
        .collect()
}
