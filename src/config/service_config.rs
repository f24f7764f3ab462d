use std::env;
use std::fmt;

use http::Uri;

use crate::error::TokenError;

pub const ENV_AUDIENCE: &str = "AUTH0_AUDIENCE";
pub const ENV_CLIENT_ID: &str = "AUTH0_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AUTH0_CLIENT_SECRET";
pub const ENV_TENANT: &str = "AUTH0_TENANT";

const TOKEN_PATH: &str = "/oauth/token";

/// ================================
/// Client identity for one audience
/// ================================
///
/// Validated on construction and immutable afterwards; the `with_*`
/// methods return a validated copy.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    audience: String,
    client_id: String,
    client_secret: String,
    tenant: String,
}

impl ServiceConfig {
    pub fn new(
        audience: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let config = Self {
            audience: audience.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant: tenant.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read all four values from `AUTH0_*` environment variables.
    pub fn from_env() -> Result<Self, TokenError> {
        Self::new(
            required_env(ENV_AUDIENCE)?,
            required_env(ENV_CLIENT_ID)?,
            required_env(ENV_CLIENT_SECRET)?,
            required_env(ENV_TENANT)?,
        )
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// The tenant URL itself when it carries a path, otherwise the tenant
    /// root plus `/oauth/token`.
    pub fn token_endpoint(&self) -> String {
        let tenant = self.tenant.trim_end_matches('/');
        match tenant.parse::<Uri>() {
            Ok(uri) if uri.path() != "/" && !uri.path().is_empty() => tenant.to_owned(),
            _ => format!("{}{}", tenant, TOKEN_PATH),
        }
    }

    pub fn with_audience(&self, audience: impl Into<String>) -> Result<Self, TokenError> {
        Self { audience: audience.into(), ..self.clone() }.validated()
    }

    pub fn with_client_id(&self, client_id: impl Into<String>) -> Result<Self, TokenError> {
        Self { client_id: client_id.into(), ..self.clone() }.validated()
    }

    pub fn with_client_secret(&self, client_secret: impl Into<String>) -> Result<Self, TokenError> {
        Self { client_secret: client_secret.into(), ..self.clone() }.validated()
    }

    pub fn with_tenant(&self, tenant: impl Into<String>) -> Result<Self, TokenError> {
        Self { tenant: tenant.into(), ..self.clone() }.validated()
    }

    fn validated(self) -> Result<Self, TokenError> {
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), TokenError> {
        not_blank("audience", &self.audience)?;
        not_blank("client_id", &self.client_id)?;
        not_blank("client_secret", &self.client_secret)?;
        not_blank("tenant", &self.tenant)?;
        secure_url("audience", &self.audience)?;
        secure_url("tenant", &self.tenant)?;
        Ok(())
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("audience", &self.audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant", &self.tenant)
            .finish()
    }
}

fn required_env(key: &str) -> Result<String, TokenError> {
    env::var(key).map_err(|e| TokenError::Configuration(format!("{}: {}", key, e)))
}

fn not_blank(field: &str, value: &str) -> Result<(), TokenError> {
    if value.trim().is_empty() {
        return Err(TokenError::Configuration(format!("'{}' must not be blank", field)));
    }
    Ok(())
}

fn secure_url(field: &str, value: &str) -> Result<(), TokenError> {
    let uri = value
        .parse::<Uri>()
        .map_err(|e| TokenError::Configuration(format!("'{}' is not a valid URL: {}", field, e)))?;
    if uri.scheme_str() != Some("https") {
        return Err(TokenError::Configuration(format!("'{}' must use https: {}", field, value)));
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(TokenError::Configuration(format!("'{}' has no host: {}", field, value)));
    }
    Ok(())
}
