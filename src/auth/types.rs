//! Types for authentication

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::Session;

/// A user as GoTrue reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    /// Metadata supplied at sign-up (`name`, `avatar_url`)
    #[serde(default)]
    pub user_metadata: Map<String, Value>,

    #[serde(default)]
    pub app_metadata: Map<String, Value>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub is_anonymous: bool,

    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// Creates a bare user with an id and optional email
    pub fn new(id: &str, email: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            email: email.map(str::to_string),
            phone: None,
            user_metadata: Map::new(),
            app_metadata: Map::new(),
            role: Some("authenticated".to_string()),
            is_anonymous: false,
            created_at: None,
        }
    }

    /// Non-empty string metadata value
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Email and password credentials
#[derive(Debug, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body for `/signup`
#[derive(Debug, Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: &'a Value,
}

/// Result of a sign-up
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The account is active and signed in
    SignedIn(Session),

    /// The account exists but the email must be confirmed first
    ConfirmationRequired(User),
}

impl SignUpOutcome {
    /// Reads a `/signup` response, which is a session when the project
    /// auto-confirms and a bare user otherwise.
    pub fn from_response(value: Value) -> serde_json::Result<Self> {
        if value.get("access_token").is_some() {
            return serde_json::from_value(value).map(SignUpOutcome::SignedIn);
        }
        let user = match value.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ => value,
        };
        serde_json::from_value(user).map(SignUpOutcome::ConfirmationRequired)
    }
}
