//! Token Codec
//!
//! Claim-set to compact JWS serialization and signature verification,
//! delegated to `jsonwebtoken`.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::error::{JwtAuthError, TokenError};
use crate::types::ClaimSet;

/// Token codec interface (for dependency injection).
pub trait TokenCodec: Send + Sync {
    /// Sign a claim set.
    fn build(
        &self,
        claims: &ClaimSet,
        algorithm: Algorithm,
        key: &EncodingKey,
    ) -> Result<String, JwtAuthError>;

    /// Decode the payload without verifying the signature.
    fn parse(&self, token: &str) -> Result<ClaimSet, JwtAuthError>;

    /// Verify the signature. Temporal claims are not checked here.
    fn verify(
        &self,
        token: &str,
        algorithm: Algorithm,
        key: &DecodingKey,
    ) -> Result<(), JwtAuthError>;
}

/// Codec backed by `jsonwebtoken`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWebTokenCodec;

impl JsonWebTokenCodec {
    pub fn new() -> Self {
        Self
    }

    fn signature_only(algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation
    }
}

impl TokenCodec for JsonWebTokenCodec {
    fn build(
        &self,
        claims: &ClaimSet,
        algorithm: Algorithm,
        key: &EncodingKey,
    ) -> Result<String, JwtAuthError> {
        encode(&Header::new(algorithm), claims, key).map_err(|e| {
            TokenError::Malformed {
                message: format!("failed to sign claims: {}", e),
            }
            .into()
        })
    }

    fn parse(&self, token: &str) -> Result<ClaimSet, JwtAuthError> {
        let mut validation = Self::signature_only(Algorithm::HS256);
        validation.insecure_disable_signature_validation();

        decode::<ClaimSet>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                TokenError::Malformed {
                    message: e.to_string(),
                }
                .into()
            })
    }

    fn verify(
        &self,
        token: &str,
        algorithm: Algorithm,
        key: &DecodingKey,
    ) -> Result<(), JwtAuthError> {
        let validation = Self::signature_only(algorithm);

        match decode::<ClaimSet>(token, key, &validation) {
            Ok(_) => Ok(()),
            Err(e) => match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => Err(TokenError::Malformed {
                    message: e.to_string(),
                }
                .into()),
                _ => Err(TokenError::SignatureInvalid.into()),
            },
        }
    }
}

/// Mock codec for testing: tokens are the claim JSON, verification is scripted.
#[derive(Default)]
pub struct MockTokenCodec {
    build_history: Mutex<Vec<ClaimSet>>,
    verify_history: Mutex<Vec<String>>,
    reject_signatures: Mutex<bool>,
}

impl MockTokenCodec {
    /// Create new mock codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every signature check fail.
    pub fn set_reject_signatures(&self, reject: bool) -> &Self {
        *self.reject_signatures.lock() = reject;
        self
    }

    /// Get build history.
    pub fn get_build_history(&self) -> Vec<ClaimSet> {
        self.build_history.lock().clone()
    }

    /// Get verify history.
    pub fn get_verify_history(&self) -> Vec<String> {
        self.verify_history.lock().clone()
    }
}

impl TokenCodec for MockTokenCodec {
    fn build(
        &self,
        claims: &ClaimSet,
        _algorithm: Algorithm,
        _key: &EncodingKey,
    ) -> Result<String, JwtAuthError> {
        self.build_history.lock().push(claims.clone());
        serde_json::to_string(claims).map_err(|e| {
            TokenError::Malformed {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn parse(&self, token: &str) -> Result<ClaimSet, JwtAuthError> {
        serde_json::from_str(token).map_err(|e| {
            TokenError::Malformed {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn verify(
        &self,
        token: &str,
        _algorithm: Algorithm,
        _key: &DecodingKey,
    ) -> Result<(), JwtAuthError> {
        self.verify_history.lock().push(token.to_string());
        if *self.reject_signatures.lock() {
            return Err(TokenError::SignatureInvalid.into());
        }
        Ok(())
    }
}
