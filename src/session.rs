//! Auth session adapter.
//!
//! Wraps the gateway's auth API and normalizes every signed-in identity into
//! an [`AuthUser`]. Nothing here returns an error: failures come back as
//! [`AuthOutcome::Failed`] with a message that can be shown in a form.

use serde::Serialize;
use serde_json::json;

use crate::auth::{SignUpOutcome, User};
use crate::error::Error;
use crate::gateway::Remote;
use crate::realtime::SubscriptionHandle;

/// Shown when an auth action runs without a backend
pub const NOT_CONFIGURED_MESSAGE: &str = "Supabase 尚未配置";

/// Shown after a sign-up that still needs email confirmation
pub const CONFIRM_EMAIL_MESSAGE: &str = "請檢查您的電子郵件以確認帳號";

/// Generated avatar for a display name
pub fn default_avatar_url(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=f97316&color=fff&size=200",
        urlencoding::encode(name)
    )
}

/// The signed-in identity as the screens see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub is_anonymous: bool,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        let email = user.email.clone().unwrap_or_default();
        let name = user
            .metadata_str("name")
            .map(str::to_string)
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());
        let avatar_url = user
            .metadata_str("avatar_url")
            .map(str::to_string)
            .unwrap_or_else(|| default_avatar_url(&name));

        Self {
            id: user.id.clone(),
            email,
            name,
            avatar_url,
            is_anonymous: user.is_anonymous,
        }
    }
}

/// Result of a sign-in, sign-up or demo login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    SignedIn(AuthUser),
    /// The account exists but is not signed in yet
    PendingConfirmation(String),
    Failed(String),
}

impl AuthOutcome {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthOutcome::SignedIn(_))
    }

    /// Message to show next to the form, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            AuthOutcome::SignedIn(_) => None,
            AuthOutcome::PendingConfirmation(msg) | AuthOutcome::Failed(msg) => Some(msg),
        }
    }
}

fn failed(action: &str, error: Error) -> AuthOutcome {
    match error {
        Error::NotConfigured => AuthOutcome::Failed(NOT_CONFIGURED_MESSAGE.to_string()),
        e => {
            log::error!("{} error: {}", action, e);
            AuthOutcome::Failed(e.user_message())
        }
    }
}

/// Session operations used by the landing screen and the orchestrator
#[derive(Debug, Clone)]
pub struct SessionAdapter {
    remote: Remote,
}

impl SessionAdapter {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    /// The current identity, or `None` when signed out or unconfigured
    pub async fn check_session(&self) -> Option<AuthUser> {
        let gateway = self.remote.gateway().ok()?;
        match gateway.current_session().await {
            Ok(session) => session.map(|s| AuthUser::from(&s.user)),
            Err(e) => {
                log::warn!("session check failed: {}", e);
                None
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        let gateway = match self.remote.gateway() {
            Ok(gateway) => gateway,
            Err(e) => return failed("sign in", e),
        };
        match gateway.sign_in_with_password(email, password).await {
            Ok(session) => AuthOutcome::SignedIn(AuthUser::from(&session.user)),
            Err(e) => failed("sign in", e),
        }
    }

    /// Registers an account with a display name and generated avatar
    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> AuthOutcome {
        let gateway = match self.remote.gateway() {
            Ok(gateway) => gateway,
            Err(e) => return failed("sign up", e),
        };
        let metadata = json!({
            "name": name,
            "avatar_url": default_avatar_url(name),
        });
        match gateway.sign_up(email, password, metadata).await {
            Ok(SignUpOutcome::SignedIn(session)) => {
                AuthOutcome::SignedIn(AuthUser::from(&session.user))
            }
            Ok(SignUpOutcome::ConfirmationRequired(user)) => {
                log::info!("sign-up for {} awaits email confirmation", user.id);
                AuthOutcome::PendingConfirmation(CONFIRM_EMAIL_MESSAGE.to_string())
            }
            Err(e) => failed("sign up", e),
        }
    }

    /// Guest login through an anonymous session
    pub async fn anonymous_login(&self) -> AuthOutcome {
        let gateway = match self.remote.gateway() {
            Ok(gateway) => gateway,
            Err(e) => return failed("anonymous sign in", e),
        };
        match gateway.sign_in_anonymously().await {
            Ok(session) => {
                log::info!("anonymous user signed in: {}", session.user.id);
                AuthOutcome::SignedIn(AuthUser::from(&session.user))
            }
            Err(e) => failed("anonymous sign in", e),
        }
    }

    pub async fn sign_out(&self) {
        if let Ok(gateway) = self.remote.gateway() {
            if let Err(e) = gateway.sign_out().await {
                log::warn!("sign out failed: {}", e);
            }
        }
    }

    /// Calls `callback` with the current identity and again on every change.
    ///
    /// Must be called inside a tokio runtime. Without a backend the callback
    /// receives `None` once and the handle is inert.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(Option<AuthUser>) + Send + 'static,
    {
        let gateway = match self.remote.gateway() {
            Ok(gateway) => gateway,
            Err(_) => {
                callback(None);
                return SubscriptionHandle::inert();
            }
        };

        let mut receiver = gateway.watch_auth();
        let task = tokio::spawn(async move {
            loop {
                let user = receiver.borrow_and_update().as_ref().map(AuthUser::from);
                callback(user);
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        });
        let abort = task.abort_handle();
        SubscriptionHandle::new(move || abort.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn name_falls_back_to_email_local_part() {
        let user = User::new("u1", Some("momo@example.com"));
        let auth_user = AuthUser::from(&user);
        assert_eq!(auth_user.name, "momo");
        assert_eq!(
            auth_user.avatar_url,
            "https://ui-avatars.com/api/?name=momo&background=f97316&color=fff&size=200"
        );
    }

    #[test]
    fn anonymous_user_is_called_user() {
        let user = User::new("u1", None);
        assert_eq!(AuthUser::from(&user).name, "User");
    }

    #[test]
    fn metadata_wins_over_email() {
        let mut user = User::new("u1", Some("momo@example.com"));
        user.user_metadata.insert("name".into(), json!("小明 王"));
        let auth_user = AuthUser::from(&user);
        assert_eq!(auth_user.name, "小明 王");
        assert!(auth_user.avatar_url.contains("%E5%B0%8F%E6%98%8E%20%E7%8E%8B"));
    }

    #[tokio::test]
    async fn unconfigured_actions_fail_softly() {
        let adapter = SessionAdapter::new(Remote::unconfigured());
        assert_eq!(adapter.check_session().await, None);
        assert_eq!(
            adapter.sign_in("a@b.c", "secret").await,
            AuthOutcome::Failed(NOT_CONFIGURED_MESSAGE.to_string())
        );
        assert_eq!(
            adapter.anonymous_login().await.message(),
            Some(NOT_CONFIGURED_MESSAGE)
        );
        adapter.sign_out().await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = adapter.on_change(move |user| sink.lock().unwrap().push(user));
        assert!(handle.is_closed());
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn sign_up_can_await_confirmation() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.require_email_confirmation(true);
        let adapter = SessionAdapter::new(Remote::new(gateway));

        let outcome = adapter.sign_up("new@example.com", "secret1", "New").await;
        assert_eq!(
            outcome,
            AuthOutcome::PendingConfirmation(CONFIRM_EMAIL_MESSAGE.to_string())
        );
        assert_eq!(adapter.check_session().await, None);
    }

    #[tokio::test]
    async fn wrong_password_reports_backend_message() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.add_account("momo@example.com", "secret1", json!({}));
        let adapter = SessionAdapter::new(Remote::new(gateway));

        assert_eq!(
            adapter.sign_in("momo@example.com", "nope").await,
            AuthOutcome::Failed("Invalid login credentials".to_string())
        );
        assert!(adapter.sign_in("momo@example.com", "secret1").await.is_signed_in());
    }

    #[tokio::test]
    async fn on_change_reports_current_then_updates() {
        let gateway = Arc::new(MemoryGateway::new());
        let adapter = SessionAdapter::new(Remote::new(gateway.clone()));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut handle = adapter.on_change(move |user: Option<AuthUser>| {
            sink.lock().unwrap().push(user.map(|u| u.is_anonymous));
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(adapter.anonymous_login().await.is_signed_in());
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.close();

        assert_eq!(*seen.lock().unwrap(), vec![None, Some(true)]);
    }
}
