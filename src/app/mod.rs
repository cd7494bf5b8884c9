//! Root orchestrator: session state, navigation and the login data load

mod state;

pub use state::*;

use crate::accessors::{Favorites, Pets};
use crate::error::Result;
use crate::models::Pet;
use crate::session::SessionAdapter;
use crate::AdoptionClient;

/// Fetches the catalog and favorite ids for one login.
///
/// Detached from [`App`] so a view layer can run it on its own task; the
/// resulting action is ignored if the state has moved on by the time it is
/// applied.
#[derive(Debug, Clone)]
pub struct DataLoader {
    epoch: u64,
    pets: Pets,
    favorites: Favorites,
}

impl DataLoader {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub async fn run(self) -> Action {
        let (pets, favorite_ids) =
            tokio::join!(self.pets.fetch_available(), self.favorites.fetch_ids());
        Action::DataLoaded {
            epoch: self.epoch,
            result: LoadResult {
                pets: pets.map_err(|e| e.to_string()),
                favorite_ids: favorite_ids.map_err(|e| e.to_string()),
            },
        }
    }
}

/// Drives [`AppState`] from user actions and backend results
#[derive(Debug)]
pub struct App {
    session: SessionAdapter,
    pets: Pets,
    favorites: Favorites,
    state: AppState,
}

impl App {
    pub fn new(client: &AdoptionClient) -> Self {
        Self {
            session: client.session(),
            pets: client.pets(),
            favorites: client.favorites(),
            state: AppState::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn apply(&mut self, action: Action) -> std::result::Result<(), TransitionError> {
        self.state.apply(action)
    }

    /// Checks for an existing session and, when there is one, loads data
    pub async fn start(&mut self) -> Result<()> {
        let user = self.session.check_session().await;
        self.apply(Action::SessionChecked(user))?;
        self.load_data().await
    }

    /// Called by the landing screen after a successful sign-in
    pub async fn login_succeeded(&mut self) -> Result<()> {
        let user = self
            .session
            .check_session()
            .await
            .ok_or(TransitionError::NotSignedIn)?;
        self.apply(Action::LoggedIn(user))?;
        self.load_data().await
    }

    /// The load the current state is waiting for
    pub fn loader(&self) -> Option<DataLoader> {
        self.state.pending_load().map(|epoch| DataLoader {
            epoch,
            pets: self.pets.clone(),
            favorites: self.favorites.clone(),
        })
    }

    /// Runs the pending load, if any, and applies its result
    pub async fn load_data(&mut self) -> Result<()> {
        let loader = match self.loader() {
            Some(loader) => loader,
            None => return Ok(()),
        };
        let action = loader.run().await;
        self.apply(action)?;
        log::info!(
            "loaded {} pets in {:?} mode",
            self.state.pets.len(),
            self.state.mode
        );
        Ok(())
    }

    /// Switches screens; `pet` becomes the selected pet when given
    pub fn navigate(&mut self, screen: Screen, pet: Option<Pet>) -> Result<()> {
        self.apply(Action::Navigate { screen, pet })?;
        Ok(())
    }

    /// Toggles a favorite and returns the resulting membership.
    ///
    /// In live mode the local set follows what the backend recorded and is
    /// left untouched when the call fails. In fallback mode the flip is
    /// local only.
    pub async fn toggle_favorite(&mut self, pet_id: &str) -> Result<bool> {
        match self.state.mode {
            DataMode::Live => {
                self.state.require_ready()?;
                let is_favorite = self.favorites.toggle(pet_id).await.map_err(|e| {
                    log::error!("toggle favorite {} failed: {}", pet_id, e);
                    e
                })?;
                self.apply(Action::FavoriteConfirmed {
                    pet_id: pet_id.to_string(),
                    is_favorite,
                })?;
                Ok(is_favorite)
            }
            DataMode::Fallback => {
                self.apply(Action::FavoriteFlipped(pet_id.to_string()))?;
                Ok(self.state.is_favorite(pet_id))
            }
        }
    }

    /// Signs out and returns to the landing screen
    pub async fn sign_out(&mut self) {
        self.session.sign_out().await;
        // Always valid
        let _ = self.apply(Action::SignedOut);
    }
}
