/// Sources module
///
/// The token fetching seam and its client-credentials implementation.
use std::future::Future;

use crate::cache::token::Token;
use crate::error::TokenError;

pub mod client_credentials;

pub use client_credentials::{build_client, ClientCredentialsFetcher, TokenRequest};

/// Obtains a fresh token from somewhere. The only part of the crate doing I/O.
///
/// Implementations hold no mutable state and may be called concurrently.
pub trait FetchToken: Send + Sync {
    fn fetch_token(&self) -> impl Future<Output = Result<Token, TokenError>> + Send;
}
