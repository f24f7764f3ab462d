use thiserror::Error;

/// Errors produced while obtaining, parsing and caching a token.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Claims missing from the credential, or `exp <= iat`.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// Token endpoint answered with status >= 400.
    #[error("token endpoint responded with {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    /// Successful response without an `access_token` field.
    #[error("token endpoint response has no 'access_token' field: {body}")]
    MalformedResponse { body: String },

    /// Timeout, connection or TLS failure below HTTP.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Nothing cached and the fetch failed.
    #[error("no token available: {0}")]
    TokenUnavailable(#[source] Box<TokenError>),

    #[error("token service is shut down")]
    ServiceClosed,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl TokenError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::MalformedCredential(_) => "malformed_credential",
            TokenError::TokenEndpoint { .. } => "endpoint",
            TokenError::MalformedResponse { .. } => "malformed_response",
            TokenError::Transport(_) => "transport",
            TokenError::TokenUnavailable(_) => "unavailable",
            TokenError::ServiceClosed => "closed",
            TokenError::Configuration(_) => "configuration",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, TokenError::Transport(_))
    }
}
