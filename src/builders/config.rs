//! Configuration Builder
//!
//! Fluent builders for engine and scene configuration.

use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

use crate::core::SceneRegistry;
use crate::error::{ConfigurationError, JwtAuthError};
use crate::types::{
    JwtAuthConfig, KeyPairSettings, LoginType, SceneSettings, SigningAlgorithm,
    DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_STORE_TIMEOUT_MS,
};

/// Scene settings builder.
///
/// Unset fields are inherited from the base settings.
#[derive(Default)]
pub struct SceneSettingsBuilder {
    settings: SceneSettings,
}

impl SceneSettingsBuilder {
    /// Create new scene settings builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set signing algorithm.
    pub fn algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.settings.algorithm = Some(algorithm.as_str().to_string());
        self
    }

    /// Set base64-encoded shared secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.settings.secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set private key (PEM or base64 PEM).
    pub fn private_key(mut self, key: impl Into<String>) -> Self {
        let keys = self.settings.keys.get_or_insert_with(KeyPairSettings::default);
        keys.private = Some(SecretString::new(key.into()));
        self
    }

    /// Set public key (PEM or base64 PEM).
    pub fn public_key(mut self, key: impl Into<String>) -> Self {
        let keys = self.settings.keys.get_or_insert_with(KeyPairSettings::default);
        keys.public = Some(SecretString::new(key.into()));
        self
    }

    /// Set token lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.settings.ttl = Some(ttl.as_secs());
        self
    }

    /// Set login type.
    pub fn login_type(mut self, login_type: LoginType) -> Self {
        self.settings.login_type = Some(login_type);
        self
    }

    /// Set subject claim used by single-point login.
    pub fn subject_claim_key(mut self, key: impl Into<String>) -> Self {
        self.settings.subject_claim_key = Some(key.into());
        self
    }

    /// Enable or disable revocation records.
    pub fn blacklist_enabled(mut self, enabled: bool) -> Self {
        self.settings.blacklist_enabled = Some(enabled);
        self
    }

    /// Set revocation store key prefix.
    pub fn blacklist_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.blacklist_key_prefix = Some(prefix.into());
        self
    }

    /// Set allowed clock skew.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.settings.leeway = Some(leeway.as_secs());
        self
    }

    /// Set response header carrying refreshed tokens.
    pub fn refreshed_token_key(mut self, key: impl Into<String>) -> Self {
        self.settings.refreshed_token_key = Some(key.into());
        self
    }

    /// Build the scene settings.
    pub fn build(self) -> SceneSettings {
        self.settings
    }
}

/// Engine configuration builder.
pub struct JwtAuthConfigBuilder {
    base: SceneSettingsBuilder,
    scenes: HashMap<String, SceneSettings>,
    supported_algorithms: Option<Vec<String>>,
    store_timeout: Duration,
    refresh_threshold: Duration,
}

impl Default for JwtAuthConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtAuthConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            base: SceneSettingsBuilder::new(),
            scenes: HashMap::new(),
            supported_algorithms: None,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            refresh_threshold: Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS),
        }
    }

    /// Edit base settings inherited by every scene.
    pub fn base(mut self, edit: impl FnOnce(SceneSettingsBuilder) -> SceneSettingsBuilder) -> Self {
        self.base = edit(self.base);
        self
    }

    /// Set base signing algorithm.
    pub fn algorithm(self, algorithm: SigningAlgorithm) -> Self {
        self.base(|b| b.algorithm(algorithm))
    }

    /// Set base shared secret.
    pub fn secret(self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.base(|b| b.secret(secret))
    }

    /// Set base token lifetime.
    pub fn ttl(self, ttl: Duration) -> Self {
        self.base(|b| b.ttl(ttl))
    }

    /// Set base login type.
    pub fn login_type(self, login_type: LoginType) -> Self {
        self.base(|b| b.login_type(login_type))
    }

    /// Set base revocation store key prefix.
    pub fn blacklist_key_prefix(self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.base(|b| b.blacklist_key_prefix(prefix))
    }

    /// Add a scene.
    pub fn scene(mut self, name: impl Into<String>, settings: SceneSettings) -> Self {
        self.scenes.insert(name.into(), settings);
        self
    }

    /// Restrict the algorithms scenes may use.
    pub fn supported_algorithms(mut self, algorithms: &[SigningAlgorithm]) -> Self {
        self.supported_algorithms = Some(
            algorithms
                .iter()
                .map(|alg| alg.as_str().to_string())
                .collect(),
        );
        self
    }

    /// Set revocation store call timeout.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set remaining validity below which tokens are refreshed on validation.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Build the configuration, resolving every scene once to fail fast.
    pub fn build(self) -> Result<JwtAuthConfig, JwtAuthError> {
        if self.store_timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "store timeout must be positive".to_string(),
            }
            .into());
        }

        let config = JwtAuthConfig {
            base: self.base.build(),
            scenes: self.scenes,
            supported_algorithms: self.supported_algorithms,
            store_timeout_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            refresh_threshold_secs: self.refresh_threshold.as_secs(),
        };

        SceneRegistry::from_config(&config)?;
        Ok(config)
    }
}

/// Create a new configuration builder.
pub fn jwt_auth_config() -> JwtAuthConfigBuilder {
    JwtAuthConfigBuilder::new()
}

/// Create a new scene settings builder.
pub fn scene_settings() -> SceneSettingsBuilder {
    SceneSettingsBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_success() {
        let config = JwtAuthConfigBuilder::new()
            .algorithm(SigningAlgorithm::HS256)
            .secret("c2VjcmV0")
            .ttl(Duration::from_secs(7200))
            .scene(
                "admin",
                scene_settings().ttl(Duration::from_secs(3600)).build(),
            )
            .scene(
                "app",
                scene_settings()
                    .login_type(LoginType::SinglePoint)
                    .subject_claim_key("uid")
                    .build(),
            )
            .build()
            .unwrap();

        assert_eq!(config.scenes.len(), 2);
        assert_eq!(config.base.ttl, Some(7200));
        assert_eq!(config.scenes["admin"].ttl, Some(3600));
        assert_eq!(config.store_timeout_ms, DEFAULT_STORE_TIMEOUT_MS);
    }

    #[test]
    fn test_builder_missing_ttl() {
        let result = JwtAuthConfigBuilder::new()
            .algorithm(SigningAlgorithm::HS256)
            .secret("c2VjcmV0")
            .scene("admin", scene_settings().build())
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_builder_zero_store_timeout() {
        let result = jwt_auth_config()
            .algorithm(SigningAlgorithm::HS256)
            .secret("c2VjcmV0")
            .ttl(Duration::from_secs(60))
            .store_timeout(Duration::ZERO)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_scene_key_pair() {
        let settings = scene_settings()
            .algorithm(SigningAlgorithm::RS256)
            .public_key("cHVibGlj")
            .build();

        let keys = settings.keys.unwrap();
        assert!(keys.private.is_none());
        assert!(keys.public.is_some());
    }
}
