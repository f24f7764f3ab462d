use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::error::TokenError;

/// Registered JWT claims the cache cares about. NumericDate may carry a
/// fractional part, which is dropped.
#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub iat: Option<f64>,
    pub exp: Option<f64>,
}

/// One issued credential. Immutable: a refresh produces a new `Token`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    raw: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Parse `iat` and `exp` from the credential's own claims.
    ///
    /// The signature is not verified; the token is opaque to the cache and
    /// only meaningful to the API that receives it.
    pub fn new(raw: impl Into<String>) -> Result<Self, TokenError> {
        let raw = raw.into();
        let claims = decode_jwt_claims(&raw)?;

        let iat = claims
            .iat
            .ok_or_else(|| TokenError::MalformedCredential("missing 'iat' claim".to_owned()))?;
        let exp = claims
            .exp
            .ok_or_else(|| TokenError::MalformedCredential("missing 'exp' claim".to_owned()))?;

        let issued_at = timestamp(iat, "iat")?;
        let expires_at = timestamp(exp, "exp")?;
        if expires_at <= issued_at {
            return Err(TokenError::MalformedCredential(format!(
                "'exp' ({}) is not after 'iat' ({})",
                exp, iat
            )));
        }

        Ok(Self { raw, issued_at, expires_at })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn into_raw(self) -> String {
        self.raw
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Time since issue, evaluated now. Never negative, even when the
    /// issuer's clock runs ahead of ours.
    pub fn age(&self) -> TimeDelta {
        (Utc::now() - self.issued_at).max(TimeDelta::zero())
    }

    /// Time left until `exp`, evaluated now. Negative once expired.
    pub fn time_until_expiry(&self) -> TimeDelta {
        self.expires_at - Utc::now()
    }

    pub fn is_expired(&self, threshold: TimeDelta) -> bool {
        self.time_until_expiry() - threshold < TimeDelta::zero()
    }
}

// keep the credential out of logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("raw", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn timestamp(secs: f64, claim: &str) -> Result<DateTime<Utc>, TokenError> {
    if !secs.is_finite() {
        return Err(TokenError::MalformedCredential(format!("'{}' claim is not a number", claim)));
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0).ok_or_else(|| {
        TokenError::MalformedCredential(format!("'{}' claim out of range: {}", claim, secs))
    })
}

fn decode_jwt_claims(token_string: &str) -> Result<JwtClaims, TokenError> {
    let mut parts = token_string.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(TokenError::MalformedCredential("invalid JWT format".to_owned())),
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::MalformedCredential(format!("base64 decode error: {}", e)))?;

    serde_json::from_slice::<JwtClaims>(&decoded)
        .map_err(|e| TokenError::MalformedCredential(format!("invalid JWT payload: {}", e)))
}
