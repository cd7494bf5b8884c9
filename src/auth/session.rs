//! Session management for authentication

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::User;
use crate::error::Result;

/// Seconds before expiry at which a session already counts as expired
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Session data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    pub refresh_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: i64,

    /// Expiry as a unix timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,

    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

/// Reads the `exp` claim of an access token.
///
/// The signature is not checked; the server validates tokens, the client
/// only needs to know when to refresh.
pub fn token_expiry(token: &str) -> Result<Option<i64>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims.exp)
}

impl Session {
    /// Create a new session that expires `expires_in` seconds from now
    pub fn new(access_token: &str, refresh_token: &str, user: User, expires_in: i64) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: default_token_type(),
            expires_in,
            expires_at: Some(now_secs() + expires_in),
            user,
        }
    }

    /// Expiry timestamp, from the response or else from the token itself
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| token_expiry(&self.access_token).ok().flatten())
    }

    /// Whether the session is expired at `now` (unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expiry() {
            Some(expiry) => now + EXPIRY_MARGIN_SECS >= expiry,
            None => false,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn jwt(exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({ "sub": "u1", "aud": "authenticated", "exp": exp }),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    #[test]
    fn expiry_prefers_expires_at() {
        let session = Session {
            expires_at: Some(100),
            ..Session::new(&jwt(500), "rt", User::new("u1", None), 3600)
        };
        assert_eq!(session.expiry(), Some(100));
        assert!(session.is_expired_at(95));
        assert!(!session.is_expired_at(50));
    }

    #[test]
    fn expiry_falls_back_to_token_claim() {
        let session = Session {
            expires_at: None,
            ..Session::new(&jwt(2_000), "rt", User::new("u1", None), 0)
        };
        assert_eq!(session.expiry(), Some(2_000));
        assert!(session.is_expired_at(1_995));
    }

    #[test]
    fn opaque_token_never_expires() {
        let session = Session {
            expires_at: None,
            ..Session::new("not-a-jwt", "rt", User::new("u1", None), 0)
        };
        assert_eq!(session.expiry(), None);
        assert!(!session.is_expired());
    }
}
