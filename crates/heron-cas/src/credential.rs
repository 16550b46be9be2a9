//! Signed, time-bounded session credentials.
//!
//! A credential binds a CAS user id to the instant it was issued. It travels
//! as a cookie value of the form `base64url(payload).base64url(tag)` where
//! `payload` is JSON `{"uid": .., "iat": ..}` and `tag` is HMAC-SHA256 of the
//! encoded payload under the application secret.

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use heron_types::UserId;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Default session timeout (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default age after which a live credential is silently reissued.
pub const DEFAULT_REISSUE_AFTER: Duration = Duration::from_secs(60);

/// Authenticated session: who, and since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub user: UserId,
    pub issued_at: DateTime<Utc>,
}

impl SessionCredential {
    pub fn new(user: UserId, issued_at: DateTime<Utc>) -> Self {
        Self { user, issued_at }
    }

    /// Age at `now`. A credential from the future has age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.issued_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// How a credential of a given age should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Younger than the reissue threshold.
    Fresh,
    /// Still valid, but old enough to be refreshed.
    Reissue,
    /// At or past the timeout.
    Expired,
}

/// Sliding-expiration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    timeout: Duration,
    reissue_after: Duration,
}

impl SessionTimings {
    /// Fails unless `reissue_after < timeout`.
    pub fn new(timeout: Duration, reissue_after: Duration) -> AuthResult<Self> {
        if reissue_after >= timeout {
            return Err(AuthError::InvalidTimings {
                reissue_secs: reissue_after.as_secs(),
                timeout_secs: timeout.as_secs(),
            });
        }
        Ok(Self {
            timeout,
            reissue_after,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn reissue_after(&self) -> Duration {
        self.reissue_after
    }

    pub fn freshness(&self, credential: &SessionCredential, now: DateTime<Utc>) -> Freshness {
        let age = credential.age(now);
        if age >= self.timeout {
            Freshness::Expired
        } else if age >= self.reissue_after {
            Freshness::Reissue
        } else {
            Freshness::Fresh
        }
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            reissue_after: DEFAULT_REISSUE_AFTER,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Payload {
    uid: String,
    iat: i64,
}

/// Signs and verifies credential cookies with the application secret.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl SessionSigner {
    /// Creates a signer. An empty secret is a startup error.
    pub fn new(secret: impl AsRef<[u8]>) -> AuthResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length; the only failure mode is unreachable.
        <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
    }

    /// Encodes and signs a credential.
    pub fn sign(&self, credential: &SessionCredential) -> String {
        let payload = Payload {
            uid: credential.user.as_str().to_string(),
            iat: credential.issued_at.timestamp(),
        };
        // Serializing a struct of a string and an integer cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        let body = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(body.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{body}.{tag}")
    }

    /// Verifies a cookie value. Anything tampered, truncated or signed with
    /// another key yields `None`.
    pub fn verify(&self, token: &str) -> Option<SessionCredential> {
        let (body, tag) = token.split_once('.')?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac();
        mac.update(body.as_bytes());
        if mac.verify_slice(&tag).is_err() {
            debug!("session credential signature mismatch");
            return None;
        }

        let json = URL_SAFE_NO_PAD.decode(body).ok()?;
        let payload: Payload = serde_json::from_slice(&json).ok()?;
        let issued_at = DateTime::from_timestamp(payload.iat, 0)?;
        if payload.uid.is_empty() {
            return None;
        }

        Some(SessionCredential::new(UserId::new(payload.uid), issued_at))
    }
}

impl fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}
