//! Session token verification.
//!
//! The identity provider's session is presented as a bearer token of the form
//! `<claims>.<signature>`, both parts base64url without padding:
//!
//! - `claims` is JSON `{"sub": "<subject id>", "exp": <unix seconds>}`
//! - `signature` is HMAC-SHA256 over the encoded claims, keyed with the
//!   shared session secret
//!
//! A verified token yields the provider's subject identifier; mapping it to a
//! local user happens in the [`CurrentUser`](crate::middleware::CurrentUser)
//! extractor.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use shopfloor_core::ExternalUserId;

type HmacSha256 = Hmac<Sha256>;

/// Why a request could not be tied to a user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// No bearer token on the request.
    #[error("missing session token")]
    MissingToken,

    /// The token is not `<claims>.<signature>` with valid encodings.
    #[error("malformed session token")]
    Malformed,

    /// The signature does not match the claims.
    #[error("invalid session signature")]
    BadSignature,

    /// The token's `exp` is in the past.
    #[error("session expired")]
    Expired,

    /// The token is valid but no local user has its subject.
    #[error("user not found")]
    UnknownPrincipal,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Verifies (and, for tooling and tests, issues) session tokens.
#[derive(Clone)]
pub struct SessionVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionVerifier {
    /// Create a verifier for the given shared secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Result<HmacSha256, IdentityError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| IdentityError::BadSignature)
    }

    /// Issue a token for `subject` valid for `ttl` from `now`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if the claims cannot be encoded.
    pub fn issue(
        &self,
        subject: &ExternalUserId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, IdentityError> {
        let claims = Claims {
            sub: subject.as_str().to_owned(),
            exp: (now + ttl).timestamp(),
        };
        let json = serde_json::to_vec(&claims).map_err(|_| IdentityError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Verify `token` at time `now` and return its subject.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `BadSignature` or `Expired`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ExternalUserId, IdentityError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(IdentityError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| IdentityError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| IdentityError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| IdentityError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| IdentityError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(IdentityError::Expired);
        }

        ExternalUserId::parse(&claims.sub).map_err(|_| IdentityError::Malformed)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
