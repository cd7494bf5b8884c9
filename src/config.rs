//! Configuration for the adoption client

use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the backend URL
pub const URL_ENV: &str = "SUPABASE_URL";

/// Environment variable holding the public (anon) key
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
}

impl BackendConfig {
    /// Creates a new configuration, validating the URL.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url_str)?;
        if anon_key.is_empty() {
            return Err(Error::Config("anon_key cannot be empty".to_string()));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
        })
    }

    /// Reads the backend settings from the environment (and `.env` if present).
    ///
    /// Returns `Ok(None)` when either variable is missing or empty, which puts
    /// the client in fallback mode. A value that is present but malformed is
    /// still an error.
    pub fn from_env() -> Result<Option<Self>> {
        dotenvy::dotenv().ok();

        let url = std::env::var(URL_ENV).unwrap_or_default();
        let key = std::env::var(ANON_KEY_ENV).unwrap_or_default();
        if url.trim().is_empty() || key.trim().is_empty() {
            log::info!("{} or {} not set, backend disabled", URL_ENV, ANON_KEY_ENV);
            return Ok(None);
        }

        Self::new(url.trim(), key.trim()).map(Some)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

/// What the admin dashboard does when its data cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminFetchPolicy {
    /// Report the dashboard as unavailable
    #[default]
    Strict,
    /// Render whatever loaded, with empty lists and zeroed stats for the rest
    DegradeToEmpty,
}

/// Configuration options for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whether to refresh an expired session before using it
    pub auto_refresh_token: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// Edge Function that produces volunteer replies
    pub volunteer_function: String,

    /// Admin dashboard behavior on fetch failure
    pub admin_fetch_policy: AdminFetchPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            volunteer_function: "volunteer-reply".to_string(),
            admin_fetch_policy: AdminFetchPolicy::Strict,
        }
    }
}

impl ClientOptions {
    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the volunteer reply function name
    pub fn with_volunteer_function(mut self, value: &str) -> Self {
        self.volunteer_function = value.to_string();
        self
    }

    /// Set the admin dashboard fetch policy
    pub fn with_admin_fetch_policy(mut self, value: AdminFetchPolicy) -> Self {
        self.admin_fetch_policy = value;
        self
    }
}
