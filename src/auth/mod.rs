//! Authentication through the GoTrue API

mod session;
mod types;

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use session::*;
pub use types::*;

/// Client for authentication, holding the current session
pub struct AuthClient {
    /// The base URL for the project
    url: String,

    /// The anonymous API key for the project
    key: String,

    /// HTTP client used for requests
    client: Client,

    /// Client options
    options: ClientOptions,

    /// The current session
    session: Arc<RwLock<Option<Session>>>,

    /// Publishes the signed-in user whenever the session changes
    user_tx: watch::Sender<Option<User>>,

    /// Held while a refresh token is being exchanged
    refresh_lock: Mutex<()>,
}

impl AuthClient {
    /// Create a new auth client
    pub(crate) fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            url: url.to_string(),
            key: key.to_string(),
            client,
            options,
            session: Arc::new(RwLock::new(None)),
            user_tx,
            refresh_lock: Mutex::new(()),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        Fetch::post(&self.client, &self.auth_url(path))
            .header("apikey", &self.key)
            .timeout(self.options.request_timeout)
            .json(body)?
            .execute_value()
            .await
    }

    async fn store(&self, session: Option<Session>) {
        let user = session.as_ref().map(|s| s.user.clone());
        *self.session.write().await = session;
        self.user_tx.send_replace(user);
    }

    /// Sign in a user with email and password
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let value = self
            .post("/token?grant_type=password", &Credentials { email, password })
            .await?;
        let session: Session = serde_json::from_value(value)?;
        log::info!("signed in as {}", session.user.id);
        self.store(Some(session.clone())).await;
        Ok(session)
    }

    /// Register a new user; `metadata` is stored as the user's metadata
    pub async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome> {
        let request = SignUpRequest {
            email,
            password,
            data: &metadata,
        };
        let value = self.post("/signup", &request).await?;
        let outcome = SignUpOutcome::from_response(value)?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.store(Some(session.clone())).await;
        }
        Ok(outcome)
    }

    /// Create a guest identity
    pub async fn sign_in_anonymously(&self) -> Result<Session> {
        let value = self.post("/signup", &json!({ "data": {} })).await?;
        let session: Session = serde_json::from_value(value)?;
        log::info!("signed in anonymously as {}", session.user.id);
        self.store(Some(session.clone())).await;
        Ok(session)
    }

    /// Exchange the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session> {
        let _guard = self.refresh_lock.lock().await;
        let refresh_token = match self.session.read().await.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => return Err(Error::NotAuthenticated),
        };
        self.refresh_with(&refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<Session> {
        let value = self
            .post(
                "/token?grant_type=refresh_token",
                &json!({ "refresh_token": refresh_token }),
            )
            .await?;
        let session: Session = serde_json::from_value(value)?;
        self.store(Some(session.clone())).await;
        Ok(session)
    }

    /// Sign out the current user.
    ///
    /// The local session is cleared even when the server call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let session = self.session.read().await.clone();
        self.store(None).await;

        let session = match session {
            Some(session) => session,
            None => return Ok(()),
        };

        let result = Fetch::post(&self.client, &self.auth_url("/logout"))
            .api_auth(&self.key, &session.access_token)
            .timeout(self.options.request_timeout)
            .execute_empty()
            .await;
        if let Err(e) = result {
            log::warn!("remote sign-out failed: {}", e);
        }
        Ok(())
    }

    /// The current session, refreshed first when it has expired.
    ///
    /// Concurrent callers share one refresh: whoever waits on the lock
    /// re-reads the session and finds the renewed one.
    pub async fn current_session(&self) -> Result<Option<Session>> {
        let session = self.session.read().await.clone();
        match session {
            Some(session) if self.options.auto_refresh_token && session.is_expired() => {
                let _guard = self.refresh_lock.lock().await;
                let refresh_token = match self.session.read().await.as_ref() {
                    Some(stored) if !stored.is_expired() => return Ok(Some(stored.clone())),
                    Some(stored) => stored.refresh_token.clone(),
                    None => return Ok(None),
                };
                match self.refresh_with(&refresh_token).await {
                    Ok(session) => Ok(Some(session)),
                    Err(e) => {
                        log::warn!("session refresh failed, signing out locally: {}", e);
                        self.clear_if_current(&refresh_token).await;
                        Ok(None)
                    }
                }
            }
            other => Ok(other),
        }
    }

    /// Drops the session unless it was replaced since `refresh_token` was read
    async fn clear_if_current(&self, refresh_token: &str) {
        let current = matches!(
            self.session.read().await.as_ref(),
            Some(session) if session.refresh_token == refresh_token
        );
        if current {
            self.store(None).await;
        }
    }

    /// Bearer token for data requests: the session's token, else the anon key
    pub async fn bearer_token(&self) -> String {
        match self.current_session().await {
            Ok(Some(session)) => session.access_token,
            _ => self.key.clone(),
        }
    }

    /// Install a session obtained elsewhere
    pub async fn set_session(&self, session: Session) {
        self.store(Some(session)).await;
    }

    /// Receiver that observes the signed-in user
    pub fn watch(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_body(id: &str, token: &str) -> Value {
        json!({
            "access_token": token,
            "refresh_token": "refresh",
            "expires_in": 3600,
            "expires_at": session::now_secs() + 3600,
            "token_type": "bearer",
            "user": { "id": id, "email": "amy@example.com", "user_metadata": { "name": "Amy" } }
        })
    }

    fn client(server: &MockServer) -> AuthClient {
        AuthClient::new(&server.uri(), "anon", Client::new(), ClientOptions::default())
    }

    #[tokio::test]
    async fn test_sign_in_stores_session_and_notifies() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({ "email": "amy@example.com", "password": "secret1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("u1", "at")))
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        let rx = auth.watch();
        let session = auth
            .sign_in_with_password("amy@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(auth.bearer_token().await, "at");
        assert_eq!(rx.borrow().as_ref().map(|u| u.id.clone()), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn test_sign_in_failure_surfaces_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        let err = auth
            .sign_in_with_password("amy@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_keeps_signed_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u2",
                "email": "bo@example.com",
                "user_metadata": { "name": "Bo" }
            })))
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        let outcome = auth
            .sign_up("bo@example.com", "secret1", json!({ "name": "Bo" }))
            .await
            .unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(_)));
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "old-refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("u1", "fresh")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        let stale = Session {
            expires_at: Some(1),
            ..Session::new("stale", "old-refresh", User::new("u1", None), 3600)
        };
        auth.set_session(stale).await;

        let session = auth.current_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("u1", "fresh")))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Already Used"
            })))
            .expect(0)
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        let stale = Session {
            expires_at: Some(1),
            ..Session::new("stale", "old-refresh", User::new("u1", None), 3600)
        };
        auth.set_session(stale).await;

        let (a, b) = tokio::join!(auth.current_session(), auth.current_session());
        assert_eq!(a.unwrap().map(|s| s.access_token), Some("fresh".to_string()));
        assert_eq!(b.unwrap().map(|s| s.access_token), Some("fresh".to_string()));
        assert_eq!(auth.bearer_token().await, "fresh");
        assert!(auth.watch().borrow().is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_a_newer_sign_in() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token"
            })))
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        auth.set_session(Session::new("newer", "other-refresh", User::new("u2", None), 3600))
            .await;
        auth.clear_if_current("old-refresh").await;
        assert_eq!(auth.bearer_token().await, "newer");

        auth.set_session(Session {
            expires_at: Some(1),
            ..Session::new("stale", "old-refresh", User::new("u1", None), 3600)
        })
        .await;
        assert!(auth.current_session().await.unwrap().is_none());
        assert!(auth.watch().borrow().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_server_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let auth = client(&mock_server);
        auth.set_session(Session::new("at", "rt", User::new("u1", None), 3600))
            .await;
        auth.sign_out().await.unwrap();
        assert!(auth.current_session().await.unwrap().is_none());
        assert!(auth.watch().borrow().is_none());
    }
}
