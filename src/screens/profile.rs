//! Profile screen data

use crate::accessors::{Applications, Profiles};
use crate::models::{Application, ApplicationStatus, Role, UserProfile, UserStats};
use crate::session::AuthUser;

pub const NEW_ADOPTER_BADGE: &str = "新進領養人";

/// Display profile for a signed-in user without a profile row yet
pub fn profile_from_session(user: &AuthUser) -> UserProfile {
    UserProfile {
        id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        avatar_url: user.avatar_url.clone(),
        badge: NEW_ADOPTER_BADGE.to_string(),
        role: Role::User,
    }
}

/// Backend counts, with zeroes filled in from what is known locally
pub fn display_stats(stats: UserStats, local_favorites: usize, applications: &[Application]) -> UserStats {
    let count = |status: ApplicationStatus| applications.iter().filter(|a| a.status == status).count() as u64;
    let or_local = |remote: u64, local: u64| if remote == 0 { local } else { remote };
    UserStats {
        favorites_count: or_local(stats.favorites_count, local_favorites as u64),
        pending_applications_count: or_local(
            stats.pending_applications_count,
            count(ApplicationStatus::Pending),
        ),
        adopted_count: or_local(stats.adopted_count, count(ApplicationStatus::Approved)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    /// `None` only when nobody is signed in
    pub profile: Option<UserProfile>,
    pub stats: UserStats,
    pub applications: Vec<Application>,
}

impl ProfileView {
    /// Loads the profile row, stats and the user's applications together.
    /// `favorite_ids` are the favorites held by the app state.
    pub async fn load(
        profiles: &Profiles,
        applications: &Applications,
        user: Option<&AuthUser>,
        favorite_ids: &[String],
    ) -> Self {
        let (profile, stats, applications) =
            tokio::join!(profiles.current(), profiles.stats(), applications.mine());
        let profile = profile.or_else(|| user.map(profile_from_session));
        let stats = display_stats(stats, favorite_ids.len(), &applications);
        Self {
            profile,
            stats,
            applications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Remote;

    fn application(status: ApplicationStatus) -> Application {
        Application {
            id: "a".into(),
            pet_id: "1".into(),
            user_id: "u".into(),
            pet_name: "Lucky".into(),
            pet_breed: "黃金獵犬".into(),
            status,
            created_at: None,
            reviewer_notes: None,
        }
    }

    #[test]
    fn zero_counts_fall_back_to_local_data() {
        let apps = [
            application(ApplicationStatus::Pending),
            application(ApplicationStatus::Pending),
            application(ApplicationStatus::Approved),
        ];
        let stats = UserStats {
            favorites_count: 0,
            pending_applications_count: 5,
            adopted_count: 0,
        };
        let shown = display_stats(stats, 2, &apps);
        assert_eq!(shown.favorites_count, 2);
        assert_eq!(shown.pending_applications_count, 5);
        assert_eq!(shown.adopted_count, 1);
    }

    #[tokio::test]
    async fn session_user_stands_in_for_missing_profile() {
        let remote = Remote::unconfigured();
        let user = AuthUser {
            id: "u1".into(),
            email: "ming@example.com".into(),
            name: "ming".into(),
            avatar_url: String::new(),
            is_anonymous: false,
        };
        let view = ProfileView::load(
            &Profiles::new(remote.clone()),
            &Applications::new(remote),
            Some(&user),
            &["1".to_string(), "4".to_string()],
        )
        .await;

        let profile = view.profile.unwrap();
        assert_eq!(profile.badge, NEW_ADOPTER_BADGE);
        assert_eq!(profile.name, "ming");
        assert_eq!(view.stats.favorites_count, 2);
    }
}
