//! Pet Adoption Client Library
//!
//! Headless core of a pet adoption app backed by a hosted Supabase project:
//! catalog browsing, favorites, adoption applications, volunteer chat,
//! notifications, profiles and an admin dashboard.
//!
//! Without backend settings the client still works. Reads come back empty,
//! and the [`app::App`] orchestrator switches to the built-in catalog in
//! [`mock`].

pub mod auth;
pub mod postgrest;
pub mod realtime;
pub mod functions;
pub mod error;
pub mod config;
pub mod fetch;
pub mod gateway;
pub mod models;
pub mod timefmt;
pub mod accessors;
pub mod session;
pub mod volunteer;
pub mod mock;
pub mod app;
pub mod screens;

use std::fmt;
use std::sync::Arc;

use crate::accessors::{Applications, Chats, Favorites, Notifications, Pets, Profiles};
use crate::app::App;
use crate::config::{BackendConfig, ClientOptions};
use crate::error::Result;
use crate::gateway::{Gateway, Remote, SupabaseGateway};
use crate::screens::{AdminDashboard, Landing};
use crate::session::SessionAdapter;
use crate::volunteer::{FunctionsVolunteer, VolunteerResponder};

/// The main entry point: hands out accessors, screens and the orchestrator,
/// all sharing one gateway
#[derive(Clone)]
pub struct AdoptionClient {
    remote: Remote,
    options: ClientOptions,
    volunteer: Arc<dyn VolunteerResponder>,
}

impl AdoptionClient {
    /// Create a client for a hosted backend
    ///
    /// # Example
    ///
    /// ```
    /// use pet_adoption_client::{AdoptionClient, config::BackendConfig};
    ///
    /// let config = BackendConfig::new("https://your-project-url.supabase.co", "your-anon-key").unwrap();
    /// let client = AdoptionClient::new(&config);
    /// assert!(client.is_configured());
    /// ```
    pub fn new(config: &BackendConfig) -> Self {
        Self::new_with_options(config, ClientOptions::default())
    }

    /// Create a client for a hosted backend with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use pet_adoption_client::{AdoptionClient, config::{BackendConfig, ClientOptions}};
    ///
    /// let config = BackendConfig::new("https://your-project-url.supabase.co", "your-anon-key").unwrap();
    /// let options = ClientOptions::default().with_volunteer_function("volunteer-reply");
    /// let client = AdoptionClient::new_with_options(&config, options);
    /// ```
    pub fn new_with_options(config: &BackendConfig, options: ClientOptions) -> Self {
        let gateway = SupabaseGateway::new_with_options(config, options.clone());
        Self::with_gateway(Arc::new(gateway), options)
    }

    /// Create a client from `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    ///
    /// Missing settings give an unconfigured client; malformed ones are an
    /// error.
    pub fn from_env() -> Result<Self> {
        Ok(match BackendConfig::from_env()? {
            Some(config) => Self::new(&config),
            None => Self::unconfigured(),
        })
    }

    /// Create a client over any gateway, e.g. [`gateway::MemoryGateway`]
    pub fn with_gateway(gateway: Arc<dyn Gateway>, options: ClientOptions) -> Self {
        let remote = Remote::new(gateway);
        Self::assemble(remote, options)
    }

    /// A client with no backend
    ///
    /// # Example
    ///
    /// ```
    /// use pet_adoption_client::AdoptionClient;
    ///
    /// let client = AdoptionClient::unconfigured();
    /// assert!(!client.is_configured());
    /// ```
    pub fn unconfigured() -> Self {
        Self::assemble(Remote::unconfigured(), ClientOptions::default())
    }

    fn assemble(remote: Remote, options: ClientOptions) -> Self {
        let volunteer = Arc::new(FunctionsVolunteer::new(
            remote.clone(),
            &options.volunteer_function,
        ));
        Self {
            remote,
            options,
            volunteer,
        }
    }

    /// Replace the volunteer reply source
    pub fn with_volunteer(mut self, volunteer: Arc<dyn VolunteerResponder>) -> Self {
        self.volunteer = volunteer;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.remote.is_configured()
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn pets(&self) -> Pets {
        Pets::new(self.remote.clone())
    }

    pub fn favorites(&self) -> Favorites {
        Favorites::new(self.remote.clone())
    }

    pub fn applications(&self) -> Applications {
        Applications::new(self.remote.clone())
    }

    pub fn chats(&self) -> Chats {
        Chats::new(self.remote.clone())
    }

    pub fn notifications(&self) -> Notifications {
        Notifications::new(self.remote.clone())
    }

    pub fn profiles(&self) -> Profiles {
        Profiles::new(self.remote.clone())
    }

    pub fn session(&self) -> SessionAdapter {
        SessionAdapter::new(self.remote.clone())
    }

    pub fn volunteer(&self) -> &dyn VolunteerResponder {
        self.volunteer.as_ref()
    }

    pub fn landing(&self) -> Landing {
        Landing::new(self.session())
    }

    /// Dashboard honoring the configured admin fetch policy
    pub fn admin_dashboard(&self) -> AdminDashboard {
        AdminDashboard::new(
            self.profiles(),
            self.pets(),
            self.applications(),
            self.options.admin_fetch_policy,
        )
    }

    /// A fresh orchestrator in the checking-session phase
    pub fn app(&self) -> App {
        App::new(self)
    }
}

impl fmt::Debug for AdoptionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdoptionClient")
            .field("remote", &self.remote)
            .field("options", &self.options)
            .finish()
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::AdoptionClient;
    pub use crate::app::{App, AppState, DataMode, Screen};
    pub use crate::config::{AdminFetchPolicy, BackendConfig, ClientOptions};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::session::{AuthOutcome, AuthUser};
}
