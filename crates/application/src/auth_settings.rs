use rpcguard_core::{AppError, AppResult};
use rpcguard_domain::DEFAULT_API_KEY_VALIDITY_DAYS;

/// Audience reserved for tokens that authorize RPC calls.
pub const DEFAULT_TOKEN_AUDIENCE: &str = "rpc_auth";

/// Metadata entry that carries the caller credential.
pub const DEFAULT_METADATA_KEY: &str = "service-authorization";

/// Minimum length of the pre-shared token verification key.
pub const MIN_TOKEN_SECRET_LENGTH: usize = 32;

/// Explicit authorization configuration threaded into the services.
#[derive(Clone)]
pub struct AuthSettings {
    token_secret: String,
    token_audience: String,
    metadata_key: String,
    default_key_validity_days: u32,
}

impl AuthSettings {
    /// Creates settings with defaults for everything except the verification key.
    pub fn new(token_secret: impl Into<String>) -> AppResult<Self> {
        let token_secret = token_secret.into();
        if token_secret.len() < MIN_TOKEN_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "token verification key must be at least {MIN_TOKEN_SECRET_LENGTH} characters"
            )));
        }

        Ok(Self {
            token_secret,
            token_audience: DEFAULT_TOKEN_AUDIENCE.to_owned(),
            metadata_key: DEFAULT_METADATA_KEY.to_owned(),
            default_key_validity_days: DEFAULT_API_KEY_VALIDITY_DAYS,
        })
    }

    /// Overrides the reserved token audience.
    pub fn with_token_audience(mut self, audience: impl Into<String>) -> AppResult<Self> {
        let audience = audience.into();
        if audience.trim().is_empty() {
            return Err(AppError::Validation(
                "token audience must not be empty".to_owned(),
            ));
        }

        self.token_audience = audience;
        Ok(self)
    }

    /// Overrides the metadata entry name. Entry names are case-insensitive.
    pub fn with_metadata_key(mut self, metadata_key: impl Into<String>) -> AppResult<Self> {
        let metadata_key = metadata_key.into().trim().to_ascii_lowercase();
        if metadata_key.is_empty() {
            return Err(AppError::Validation(
                "metadata key must not be empty".to_owned(),
            ));
        }

        self.metadata_key = metadata_key;
        Ok(self)
    }

    /// Overrides the default validity horizon for issued keys.
    pub fn with_default_key_validity_days(mut self, days: u32) -> AppResult<Self> {
        if days == 0 {
            return Err(AppError::Validation(
                "default api key validity must be at least one day".to_owned(),
            ));
        }

        self.default_key_validity_days = days;
        Ok(self)
    }

    /// Returns the pre-shared token verification key.
    #[must_use]
    pub fn token_secret(&self) -> &[u8] {
        self.token_secret.as_bytes()
    }

    /// Returns the audience tokens must carry.
    #[must_use]
    pub fn token_audience(&self) -> &str {
        self.token_audience.as_str()
    }

    /// Returns the metadata entry name carrying credentials.
    #[must_use]
    pub fn metadata_key(&self) -> &str {
        self.metadata_key.as_str()
    }

    /// Returns the default validity horizon in days.
    #[must_use]
    pub fn default_key_validity_days(&self) -> u32 {
        self.default_key_validity_days
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AuthSettings")
            .field("token_secret", &"<redacted>")
            .field("token_audience", &self.token_audience)
            .field("metadata_key", &self.metadata_key)
            .field("default_key_validity_days", &self.default_key_validity_days)
            .finish()
    }
}
