//! Configuration Types
//!
//! Base configuration and per-scene overrides as accepted from the host process.

use secrecy::SecretString;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigurationError, JwtAuthResult};
use crate::types::LoginType;

/// Name of the scene used when none is selected.
pub const DEFAULT_SCENE: &str = "default";
/// Default revocation store key prefix.
pub const DEFAULT_BLACKLIST_KEY_PREFIX: &str = "jwt_blacklist";
/// Default subject claim for single-point login.
pub const DEFAULT_SUBJECT_CLAIM_KEY: &str = "uid";
/// Default response header for refreshed tokens.
pub const DEFAULT_REFRESHED_TOKEN_KEY: &str = "X-Refreshed-Token";
/// Default bound on a single revocation store call.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
/// Tokens with less remaining validity are refreshed automatically.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 600;

/// Asymmetric key pair, base64-encoded PEM or PEM text.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeyPairSettings {
    /// Private key (signing).
    pub private: Option<SecretString>,
    /// Public key (verification).
    pub public: Option<SecretString>,
}

/// Settings shared by the base configuration and scene overrides.
///
/// Every field is optional; a scene inherits whatever it leaves unset.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    #[serde(alias = "alg")]
    pub algorithm: Option<String>,
    /// Base64-encoded shared secret for HMAC algorithms.
    pub secret: Option<SecretString>,
    pub keys: Option<KeyPairSettings>,
    /// Token lifetime in seconds.
    pub ttl: Option<u64>,
    pub login_type: Option<LoginType>,
    #[serde(alias = "sso_key")]
    pub subject_claim_key: Option<String>,
    pub blacklist_enabled: Option<bool>,
    #[serde(alias = "blacklist_prefix")]
    pub blacklist_key_prefix: Option<String>,
    /// Allowed clock skew in seconds.
    pub leeway: Option<u64>,
    pub refreshed_token_key: Option<String>,
}

impl SceneSettings {
    /// Overlay these settings on `base`; set fields win.
    pub fn merged_over(&self, base: &SceneSettings) -> SceneSettings {
        SceneSettings {
            algorithm: self.algorithm.clone().or_else(|| base.algorithm.clone()),
            secret: self.secret.clone().or_else(|| base.secret.clone()),
            keys: self.keys.clone().or_else(|| base.keys.clone()),
            ttl: self.ttl.or(base.ttl),
            login_type: self.login_type.or(base.login_type),
            subject_claim_key: self
                .subject_claim_key
                .clone()
                .or_else(|| base.subject_claim_key.clone()),
            blacklist_enabled: self.blacklist_enabled.or(base.blacklist_enabled),
            blacklist_key_prefix: self
                .blacklist_key_prefix
                .clone()
                .or_else(|| base.blacklist_key_prefix.clone()),
            leeway: self.leeway.or(base.leeway),
            refreshed_token_key: self
                .refreshed_token_key
                .clone()
                .or_else(|| base.refreshed_token_key.clone()),
        }
    }
}

/// Engine configuration: base settings plus named scenes.
///
/// Base settings sit at the top level of the document next to `scenes`
/// (or `scene`) and the engine-wide keys.
#[derive(Clone, Debug)]
pub struct JwtAuthConfig {
    /// Base settings inherited by every scene.
    pub base: SceneSettings,
    /// Per-scene overrides.
    pub scenes: HashMap<String, SceneSettings>,
    /// Algorithms scenes may use; the full table when unset.
    pub supported_algorithms: Option<Vec<String>>,
    /// Bound on a single revocation store call.
    pub store_timeout_ms: u64,
    /// Remaining validity below which tokens are refreshed on validation.
    pub refresh_threshold_secs: u64,
}

impl Default for JwtAuthConfig {
    fn default() -> Self {
        Self {
            base: SceneSettings::default(),
            scenes: HashMap::new(),
            supported_algorithms: None,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
        }
    }
}

impl<'de> Deserialize<'de> for JwtAuthConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut document = Map::<String, Value>::deserialize(deserializer)?;
        let mut config = JwtAuthConfig::default();

        if let Some(scenes) = document.remove("scenes").or_else(|| document.remove("scene")) {
            config.scenes = serde_json::from_value(scenes).map_err(D::Error::custom)?;
        }
        if let Some(algorithms) = document.remove("supported_algorithms") {
            config.supported_algorithms =
                serde_json::from_value(algorithms).map_err(D::Error::custom)?;
        }
        if let Some(timeout) = document.remove("store_timeout_ms") {
            config.store_timeout_ms = serde_json::from_value(timeout).map_err(D::Error::custom)?;
        }
        if let Some(threshold) = document.remove("refresh_threshold_secs") {
            config.refresh_threshold_secs =
                serde_json::from_value(threshold).map_err(D::Error::custom)?;
        }

        config.base = serde_json::from_value(Value::Object(document)).map_err(D::Error::custom)?;
        Ok(config)
    }
}

impl JwtAuthConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> JwtAuthResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConfigurationError::InvalidConfig {
                message: e.to_string(),
            }
            .into()
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
