//! Application state and its transition function.
//!
//! Every change to the orchestrator's state goes through [`AppState::apply`],
//! so the session and navigation rules can be exercised without a backend
//! or a view layer.

use serde::Serialize;
use thiserror::Error;

use crate::mock;
use crate::models::Pet;
use crate::session::AuthUser;

/// Named screens of the signed-in app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Home,
    Favorites,
    ChatList,
    PetDetail,
    AdoptionForm,
    Chat,
    Profile,
    AdminDashboard,
}

impl Screen {
    /// Screens that show one pet and need it selected first
    pub fn needs_pet(&self) -> bool {
        matches!(self, Screen::PetDetail | Screen::AdoptionForm | Screen::Chat)
    }
}

/// Where mutations go once data is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    /// Confirmed by the backend
    Live,
    /// Applied to local state only
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    CheckingAuth,
    SignedOut,
    /// Signed in, waiting for the load started at `epoch`
    Loading { epoch: u64 },
    Ready,
}

/// Result of the login data fetch
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub pets: Result<Vec<Pet>, String>,
    pub favorite_ids: Result<Vec<String>, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Startup session check finished
    SessionChecked(Option<AuthUser>),
    /// Sign-in, sign-up or demo login established a session
    LoggedIn(AuthUser),
    /// The login load finished. A non-empty catalog with both fetches
    /// succeeding goes live; anything else installs the built-in catalog.
    DataLoaded { epoch: u64, result: LoadResult },
    Navigate { screen: Screen, pet: Option<Pet> },
    /// The view scrolled
    Scrolled(u32),
    /// Membership as recorded by the backend
    FavoriteConfirmed { pet_id: String, is_favorite: bool },
    /// Local-only flip in fallback mode
    FavoriteFlipped(String),
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("no signed-in user")]
    NotSignedIn,

    #[error("data is still loading")]
    NotReady,

    #[error("{0:?} needs a selected pet")]
    MissingPet(Screen),

    /// A load finished after the state moved on
    #[error("load {epoch} was superseded")]
    Stale { epoch: u64 },

    #[error("{0} is not valid in phase {1:?}")]
    Unexpected(&'static str, Phase),
}

/// Everything the orchestrator tracks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub phase: Phase,
    pub user: Option<AuthUser>,
    pub screen: Screen,
    pub selected_pet: Option<Pet>,
    pub pets: Vec<Pet>,
    /// Favorite pet ids in the order they were added
    pub favorite_ids: Vec<String>,
    pub mode: DataMode,
    pub scroll_offset: u32,
    /// Bumped on every login and sign-out; loads carry the value they
    /// started with
    pub epoch: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            phase: Phase::CheckingAuth,
            user: None,
            screen: Screen::Home,
            selected_pet: None,
            pets: Vec::new(),
            favorite_ids: Vec::new(),
            mode: DataMode::Live,
            scroll_offset: 0,
            epoch: 0,
        }
    }
}

impl AppState {
    pub fn is_favorite(&self, pet_id: &str) -> bool {
        self.favorite_ids.iter().any(|id| id == pet_id)
    }

    /// Catalog entries that are favorites, in catalog order
    pub fn favorite_pets(&self) -> Vec<&Pet> {
        self.pets.iter().filter(|p| self.is_favorite(&p.id)).collect()
    }

    /// The load a signed-in state is waiting for
    pub fn pending_load(&self) -> Option<u64> {
        match self.phase {
            Phase::Loading { epoch } => Some(epoch),
            _ => None,
        }
    }

    fn start_loading(&mut self, user: AuthUser) {
        self.epoch += 1;
        self.user = Some(user);
        self.phase = Phase::Loading { epoch: self.epoch };
    }

    fn set_favorite(&mut self, pet_id: &str, is_favorite: bool) {
        let present = self.is_favorite(pet_id);
        if is_favorite && !present {
            self.favorite_ids.push(pet_id.to_string());
        } else if !is_favorite && present {
            self.favorite_ids.retain(|id| id != pet_id);
        }
    }

    fn use_fallback(&mut self) {
        self.pets = mock::pets();
        self.favorite_ids = mock::default_favorite_ids();
        self.mode = DataMode::Fallback;
    }

    fn check_epoch(&self, epoch: u64) -> Result<(), TransitionError> {
        if self.pending_load() == Some(epoch) {
            Ok(())
        } else {
            Err(TransitionError::Stale { epoch })
        }
    }

    /// Applies one action
    pub fn apply(&mut self, action: Action) -> Result<(), TransitionError> {
        match action {
            Action::SessionChecked(user) => {
                if self.phase != Phase::CheckingAuth {
                    return Err(TransitionError::Unexpected("session check", self.phase));
                }
                match user {
                    Some(user) => self.start_loading(user),
                    None => self.phase = Phase::SignedOut,
                }
            }
            Action::LoggedIn(user) => match self.phase {
                Phase::CheckingAuth | Phase::SignedOut => self.start_loading(user),
                phase => return Err(TransitionError::Unexpected("login", phase)),
            },
            Action::DataLoaded { epoch, result } => {
                self.check_epoch(epoch)?;
                match (result.pets, result.favorite_ids) {
                    (Ok(pets), Ok(favorite_ids)) if !pets.is_empty() => {
                        self.pets = pets;
                        self.favorite_ids = favorite_ids;
                        self.mode = DataMode::Live;
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        log::warn!("login load failed, using built-in data: {}", e);
                        self.use_fallback();
                    }
                    _ => {
                        log::info!("catalog is empty, using built-in data");
                        self.use_fallback();
                    }
                }
                self.phase = Phase::Ready;
            }
            Action::Navigate { screen, pet } => {
                self.require_ready()?;
                if let Some(pet) = pet {
                    self.selected_pet = Some(pet);
                }
                if screen.needs_pet() && self.selected_pet.is_none() {
                    return Err(TransitionError::MissingPet(screen));
                }
                self.screen = screen;
                self.scroll_offset = 0;
            }
            Action::Scrolled(offset) => self.scroll_offset = offset,
            Action::FavoriteConfirmed {
                pet_id,
                is_favorite,
            } => {
                self.require_ready()?;
                self.set_favorite(&pet_id, is_favorite);
            }
            Action::FavoriteFlipped(pet_id) => {
                self.require_ready()?;
                let present = self.is_favorite(&pet_id);
                self.set_favorite(&pet_id, !present);
            }
            Action::SignedOut => {
                let epoch = self.epoch + 1;
                *self = AppState {
                    phase: Phase::SignedOut,
                    epoch,
                    ..AppState::default()
                };
            }
        }
        Ok(())
    }

    /// Ok once data is loaded
    pub fn require_ready(&self) -> Result<(), TransitionError> {
        match self.phase {
            Phase::Ready => Ok(()),
            Phase::Loading { .. } => Err(TransitionError::NotReady),
            _ => Err(TransitionError::NotSignedIn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            id: "u1".into(),
            email: "momo@example.com".into(),
            name: "momo".into(),
            avatar_url: String::new(),
            is_anonymous: false,
        }
    }

    fn loaded(result: LoadResult) -> AppState {
        let mut state = AppState::default();
        state.apply(Action::SessionChecked(Some(user()))).unwrap();
        let epoch = state.pending_load().unwrap();
        state.apply(Action::DataLoaded { epoch, result }).unwrap();
        state
    }

    fn ready(mode: DataMode) -> AppState {
        let pets = match mode {
            DataMode::Live => mock::pets(),
            DataMode::Fallback => Vec::new(),
        };
        loaded(LoadResult {
            pets: Ok(pets),
            favorite_ids: Ok(vec!["2".into()]),
        })
    }

    #[test]
    fn startup_without_session_signs_out() {
        let mut state = AppState::default();
        state.apply(Action::SessionChecked(None)).unwrap();
        assert_eq!(state.phase, Phase::SignedOut);
        assert!(matches!(
            state.apply(Action::SessionChecked(None)),
            Err(TransitionError::Unexpected(..))
        ));
    }

    #[test]
    fn login_starts_a_load() {
        let mut state = AppState::default();
        state.apply(Action::SessionChecked(None)).unwrap();
        state.apply(Action::LoggedIn(user())).unwrap();
        assert_eq!(state.phase, Phase::Loading { epoch: 1 });
        assert_eq!(state.user.as_ref().map(|u| u.id.as_str()), Some("u1"));
    }

    #[test]
    fn live_load_installs_catalog() {
        let state = ready(DataMode::Live);
        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(state.mode, DataMode::Live);
        assert_eq!(state.favorite_ids, ["2"]);
    }

    #[test]
    fn empty_catalog_falls_back() {
        let state = ready(DataMode::Fallback);
        assert_eq!(state.mode, DataMode::Fallback);
        assert_eq!(state.pets.len(), 6);
        assert_eq!(state.favorite_ids, ["1", "4"]);
    }

    #[test]
    fn failed_fetch_falls_back() {
        let state = loaded(LoadResult {
            pets: Err("connection refused".into()),
            favorite_ids: Ok(vec!["2".into()]),
        });
        assert_eq!(state.mode, DataMode::Fallback);
        assert_eq!(state.favorite_ids, ["1", "4"]);

        let state = loaded(LoadResult {
            pets: Ok(mock::pets()),
            favorite_ids: Err("timeout".into()),
        });
        assert_eq!(state.mode, DataMode::Fallback);
    }

    #[test]
    fn load_after_sign_out_is_ignored() {
        let mut state = AppState::default();
        state.apply(Action::SessionChecked(Some(user()))).unwrap();
        let epoch = state.pending_load().unwrap();
        state.apply(Action::SignedOut).unwrap();

        let late = Action::DataLoaded {
            epoch,
            result: LoadResult {
                pets: Ok(mock::pets()),
                favorite_ids: Ok(Vec::new()),
            },
        };
        assert_eq!(state.apply(late), Err(TransitionError::Stale { epoch }));
        assert_eq!(state.phase, Phase::SignedOut);
        assert!(state.pets.is_empty());
    }

    #[test]
    fn detail_screens_need_a_pet() {
        let mut state = ready(DataMode::Fallback);
        assert_eq!(
            state.apply(Action::Navigate {
                screen: Screen::Chat,
                pet: None
            }),
            Err(TransitionError::MissingPet(Screen::Chat))
        );

        let pet = state.pets[2].clone();
        state
            .apply(Action::Navigate {
                screen: Screen::PetDetail,
                pet: Some(pet.clone()),
            })
            .unwrap();
        state.apply(Action::Scrolled(480)).unwrap();
        state
            .apply(Action::Navigate {
                screen: Screen::Home,
                pet: None,
            })
            .unwrap();
        assert_eq!(state.scroll_offset, 0);

        // Selection survives navigating away
        state
            .apply(Action::Navigate {
                screen: Screen::AdoptionForm,
                pet: None,
            })
            .unwrap();
        assert_eq!(state.selected_pet, Some(pet));
    }

    #[test]
    fn confirmed_favorite_follows_the_backend() {
        let mut state = ready(DataMode::Live);
        state
            .apply(Action::FavoriteConfirmed {
                pet_id: "2".into(),
                is_favorite: true,
            })
            .unwrap();
        assert_eq!(state.favorite_ids, ["2"]);
        state
            .apply(Action::FavoriteConfirmed {
                pet_id: "2".into(),
                is_favorite: false,
            })
            .unwrap();
        assert!(state.favorite_ids.is_empty());
    }

    #[test]
    fn fallback_flips_locally() {
        let mut state = ready(DataMode::Fallback);
        state.apply(Action::FavoriteFlipped("1".into())).unwrap();
        state.apply(Action::FavoriteFlipped("3".into())).unwrap();
        assert_eq!(state.favorite_ids, ["4", "3"]);
        let names: Vec<&str> = state.favorite_pets().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Coco", "Oreo"]);
    }

    #[test]
    fn sign_out_forgets_everything() {
        let mut state = ready(DataMode::Live);
        let pet = state.pets[0].clone();
        state
            .apply(Action::Navigate {
                screen: Screen::PetDetail,
                pet: Some(pet),
            })
            .unwrap();
        state.apply(Action::SignedOut).unwrap();
        assert_eq!(state.phase, Phase::SignedOut);
        assert_eq!(state.screen, Screen::Home);
        assert!(state.selected_pet.is_none());
        assert!(state.user.is_none());
        assert_eq!(state.epoch, 2);
    }
}
