//! Scene Types
//!
//! Resolved, immutable per-scene configuration and signing material.

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigurationError, JwtAuthError, JwtAuthResult};
use crate::types::SceneSettings;

/// Revocation policy of a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginType {
    /// Many concurrent sessions per subject, each revocable by `jti`.
    #[serde(rename = "multi-point", alias = "mpop")]
    MultiPoint,
    /// A new token supersedes every earlier token of the same subject.
    #[serde(rename = "single-point", alias = "sso")]
    SinglePoint,
}

impl LoginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiPoint => "multi-point",
            Self::SinglePoint => "single-point",
        }
    }
}

impl Default for LoginType {
    fn default() -> Self {
        Self::MultiPoint
    }
}

/// Key family of an algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlgorithmFamily {
    /// Shared secret (HMAC).
    Symmetric,
    /// Private key signs, public key verifies (RSA, ECDSA).
    Asymmetric,
}

/// Signing algorithm identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
}

impl SigningAlgorithm {
    /// Default algorithm table.
    pub const ALL: [SigningAlgorithm; 9] = [
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::ES256,
        Self::ES384,
        Self::ES512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => AlgorithmFamily::Symmetric,
            _ => AlgorithmFamily::Asymmetric,
        }
    }

    /// Codec algorithm, `None` when the codec cannot handle it.
    pub fn to_jwt(&self) -> Option<Algorithm> {
        match self {
            Self::HS256 => Some(Algorithm::HS256),
            Self::HS384 => Some(Algorithm::HS384),
            Self::HS512 => Some(Algorithm::HS512),
            Self::RS256 => Some(Algorithm::RS256),
            Self::RS384 => Some(Algorithm::RS384),
            Self::RS512 => Some(Algorithm::RS512),
            Self::ES256 => Some(Algorithm::ES256),
            Self::ES384 => Some(Algorithm::ES384),
            Self::ES512 => None,
        }
    }

    fn is_ecdsa(&self) -> bool {
        matches!(self, Self::ES256 | Self::ES384 | Self::ES512)
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == upper)
            .ok_or_else(|| {
                ConfigurationError::UnsupportedAlgorithm {
                    algorithm: s.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded signing and verification keys.
#[derive(Clone)]
pub struct SigningKeys {
    encoding: Option<EncodingKey>,
    decoding: Option<DecodingKey>,
}

impl SigningKeys {
    /// Decode key material for an algorithm from merged scene settings.
    pub fn from_settings(
        scene: &str,
        algorithm: SigningAlgorithm,
        settings: &SceneSettings,
    ) -> JwtAuthResult<Self> {
        let invalid = |message: String| ConfigurationError::InvalidKey {
            scene: scene.to_string(),
            message,
        };

        match algorithm.family() {
            AlgorithmFamily::Symmetric => {
                let secret = settings.secret.as_ref().ok_or_else(|| {
                    ConfigurationError::MissingKeyMaterial {
                        scene: scene.to_string(),
                        field: "secret".to_string(),
                    }
                })?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(secret.expose_secret().trim())
                    .map_err(|e| invalid(format!("secret is not base64: {}", e)))?;
                if bytes.is_empty() {
                    return Err(invalid("secret is empty".to_string()).into());
                }
                Ok(Self {
                    encoding: Some(EncodingKey::from_secret(&bytes)),
                    decoding: Some(DecodingKey::from_secret(&bytes)),
                })
            }
            AlgorithmFamily::Asymmetric => {
                let keys = settings.keys.as_ref();
                let private = keys.and_then(|k| k.private.as_ref());
                let public = keys.and_then(|k| k.public.as_ref());

                if private.is_none() && public.is_none() {
                    return Err(ConfigurationError::MissingKeyMaterial {
                        scene: scene.to_string(),
                        field: "keys".to_string(),
                    }
                    .into());
                }

                let encoding = match private {
                    Some(pem) => {
                        let bytes = pem_bytes(pem.expose_secret()).map_err(&invalid)?;
                        let key = if algorithm.is_ecdsa() {
                            EncodingKey::from_ec_pem(&bytes)
                        } else {
                            EncodingKey::from_rsa_pem(&bytes)
                        };
                        Some(key.map_err(|e| invalid(format!("private key: {}", e)))?)
                    }
                    None => None,
                };

                let decoding = match public {
                    Some(pem) => {
                        let bytes = pem_bytes(pem.expose_secret()).map_err(&invalid)?;
                        let key = if algorithm.is_ecdsa() {
                            DecodingKey::from_ec_pem(&bytes)
                        } else {
                            DecodingKey::from_rsa_pem(&bytes)
                        };
                        Some(key.map_err(|e| invalid(format!("public key: {}", e)))?)
                    }
                    None => None,
                };

                Ok(Self { encoding, decoding })
            }
        }
    }

    pub fn can_sign(&self) -> bool {
        self.encoding.is_some()
    }

    pub fn can_verify(&self) -> bool {
        self.decoding.is_some()
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("encoding", &self.encoding.as_ref().map(|_| "[REDACTED]"))
            .field("decoding", &self.decoding.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Accepts PEM text directly or base64-encoded PEM.
fn pem_bytes(raw: &str) -> Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(trimmed.as_bytes().to_vec());
    }
    base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| format!("key is neither PEM nor base64: {}", e))
}

/// Immutable configuration of one scene.
#[derive(Clone, Debug)]
pub struct SceneConfig {
    /// Scene name.
    pub name: String,
    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,
    /// Key material decoded at startup.
    pub keys: SigningKeys,
    /// Token time-to-live in seconds.
    pub ttl: u64,
    /// Revocation policy.
    pub login_type: LoginType,
    /// Claim naming the subject in single-point mode.
    pub subject_claim_key: String,
    /// Whether revocation records are written and checked.
    pub blacklist_enabled: bool,
    /// Revocation store key prefix.
    pub blacklist_key_prefix: String,
    /// Allowed clock skew in seconds.
    pub leeway: u64,
    /// Response header carrying an automatically refreshed token.
    pub refreshed_token_key: String,
}

impl SceneConfig {
    pub fn is_single_point(&self) -> bool {
        self.login_type == LoginType::SinglePoint
    }

    /// Codec algorithm for this scene.
    pub fn jwt_algorithm(&self) -> JwtAuthResult<Algorithm> {
        self.algorithm.to_jwt().ok_or_else(|| {
            ConfigurationError::UnsupportedAlgorithm {
                algorithm: self.algorithm.to_string(),
            }
            .into()
        })
    }

    /// Key used to sign tokens.
    pub fn encoding_key(&self) -> JwtAuthResult<&EncodingKey> {
        self.keys.encoding.as_ref().ok_or_else(|| {
            ConfigurationError::MissingKeyMaterial {
                scene: self.name.clone(),
                field: "keys.private".to_string(),
            }
            .into()
        })
    }

    /// Key used to verify tokens.
    pub fn decoding_key(&self) -> JwtAuthResult<&DecodingKey> {
        self.keys.decoding.as_ref().ok_or_else(|| {
            ConfigurationError::MissingKeyMaterial {
                scene: self.name.clone(),
                field: "keys.public".to_string(),
            }
            .into()
        })
    }
}
