//! Welcome, login and registration forms

use crate::session::{AuthOutcome, SessionAdapter};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Checks the login form before anything is sent
pub fn validate_login(email: &str, password: &str) -> Result<(), &'static str> {
    if email.is_empty() || password.is_empty() {
        return Err("請填寫所有欄位");
    }
    Ok(())
}

/// Checks the registration form before anything is sent
pub fn validate_register(email: &str, password: &str, name: &str) -> Result<(), &'static str> {
    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Err("請填寫所有欄位");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("密碼至少需要 6 個字元");
    }
    Ok(())
}

fn with_default_message(outcome: AuthOutcome, default: &str) -> AuthOutcome {
    match outcome {
        AuthOutcome::Failed(msg) if msg.is_empty() => AuthOutcome::Failed(default.to_string()),
        other => other,
    }
}

/// The landing screen's actions. A [`AuthOutcome::SignedIn`] result means
/// the caller should hand over to [`App::login_succeeded`](crate::app::App::login_succeeded).
#[derive(Debug, Clone)]
pub struct Landing {
    session: SessionAdapter,
}

impl Landing {
    pub fn new(session: SessionAdapter) -> Self {
        Self { session }
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        if let Err(msg) = validate_login(email, password) {
            return AuthOutcome::Failed(msg.to_string());
        }
        with_default_message(self.session.sign_in(email, password).await, "登入失敗")
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> AuthOutcome {
        if let Err(msg) = validate_register(email, password, name) {
            return AuthOutcome::Failed(msg.to_string());
        }
        with_default_message(self.session.sign_up(email, password, name).await, "註冊失敗")
    }

    /// Guest mode
    pub async fn demo_login(&self) -> AuthOutcome {
        with_default_message(self.session.anonymous_login().await, "訪客模式啟動失敗")
    }
}
