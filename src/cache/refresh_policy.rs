use std::time::Duration;

use chrono::TimeDelta;

use crate::cache::token::Token;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_EXPIRATION_THRESHOLD: Duration = Duration::from_secs(20 * 60);

/// Why a cached token is not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Empty,
    NearExpiry,
    MaxAge,
}

impl RefreshReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshReason::Empty => "empty",
            RefreshReason::NearExpiry => "near_expiry",
            RefreshReason::MaxAge => "max_age",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshDecision {
    Reuse(Token),
    /// `current` is handed back so a failed fetch can fall back to it.
    Fetch { reason: RefreshReason, current: Option<Token> },
}

/// Freshness rules for a cached token.
///
/// A token is reused only while it is further than `expiration_threshold`
/// from expiry and no older than `max_age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    max_age: TimeDelta,
    expiration_threshold: TimeDelta,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE, DEFAULT_EXPIRATION_THRESHOLD)
    }
}

impl RefreshPolicy {
    pub fn new(max_age: Duration, expiration_threshold: Duration) -> Self {
        Self {
            max_age: to_delta(max_age),
            expiration_threshold: to_delta(expiration_threshold),
        }
    }

    pub fn max_age(&self) -> TimeDelta {
        self.max_age
    }

    pub fn expiration_threshold(&self) -> TimeDelta {
        self.expiration_threshold
    }

    pub fn decide(&self, current: Option<Token>) -> RefreshDecision {
        let reason = match &current {
            None => RefreshReason::Empty,
            Some(token) if token.time_until_expiry() <= self.expiration_threshold => {
                RefreshReason::NearExpiry
            }
            Some(token) if token.age() > self.max_age => RefreshReason::MaxAge,
            Some(token) => return RefreshDecision::Reuse(token.clone()),
        };
        RefreshDecision::Fetch { reason, current }
    }
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
