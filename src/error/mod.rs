//! JWT Auth Error Types
//!
//! Error hierarchy for scene resolution, token validation and the revocation store.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the token engine.
#[derive(Error, Debug)]
pub enum JwtAuthError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authentication failed: {0}")]
    Token(#[from] TokenError),

    #[error("Revocation store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl JwtAuthError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "JWT_CONFIG",
            Self::Token(_) => "JWT_AUTH",
            Self::Store(_) => "JWT_STORE",
        }
    }

    /// Specific failure reason, stable across releases.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration(e) => match e {
                ConfigurationError::UnknownScene { .. } => "unknown_scene",
                ConfigurationError::MissingKeyMaterial { .. } => "missing_key_material",
                ConfigurationError::InvalidKey { .. } => "invalid_key",
                ConfigurationError::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
                ConfigurationError::MissingRequired { .. } => "missing_required",
                ConfigurationError::InvalidConfig { .. } => "invalid_config",
                ConfigurationError::InvalidSceneName { .. } => "invalid_scene_name",
            },
            Self::Token(e) => match e {
                TokenError::MissingToken => "missing_token",
                TokenError::MissingSubjectClaim { .. } => "missing_subject_claim",
                TokenError::Malformed { .. } => "malformed_token",
                TokenError::SignatureInvalid => "signature_invalid",
                TokenError::Expired => "token_expired",
                TokenError::NotYetValid => "token_not_yet_valid",
                TokenError::Revoked => "token_revoked",
                TokenError::SceneMismatch { .. } => "scene_mismatch",
            },
            Self::Store(_) => "revocation_store_unavailable",
        }
    }

    /// Check if the error should be reported to the caller as "authentication failed".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// Check if the revocation store could not be reached.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Check if error is retryable by the caller.
    ///
    /// The engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("The jwt scene [{scene}] not found")]
    UnknownScene { scene: String },

    #[error("Scene [{scene}] is missing key material: {field}")]
    MissingKeyMaterial { scene: String, field: String },

    #[error("Scene [{scene}] has an invalid key: {message}")]
    InvalidKey { scene: String, message: String },

    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid scene name: {scene:?}")]
    InvalidSceneName { scene: String },
}

/// Token validation error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("A token is required")]
    MissingToken,

    #[error("There is no {claim} key in the claims")]
    MissingSubjectClaim { claim: String },

    #[error("Malformed token: {message}")]
    Malformed { message: String },

    #[error("Token signature does not verify")]
    SignatureInvalid,

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Token has been blacked out")]
    Revoked,

    #[error("Token scene [{actual}] does not match [{expected}]")]
    SceneMismatch { expected: String, actual: String },
}

/// Revocation store error.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Store operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Corrupted revocation record under {key}: {message}")]
    CorruptedRecord { key: String, message: String },

    #[error("Operation not supported by store: {operation}")]
    Unsupported { operation: String },
}

impl StoreError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Short label for telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout { .. } => "timeout",
            Self::CorruptedRecord { .. } => "corrupted_record",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// Result type for token engine operations.
pub type JwtAuthResult<T> = Result<T, JwtAuthError>;

/// Get user-friendly error message.
pub fn get_user_message(error: &JwtAuthError) -> String {
    match error {
        JwtAuthError::Token(TokenError::Expired) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        JwtAuthError::Token(TokenError::Revoked) => {
            "Your session is no longer valid. Please sign in again.".to_string()
        }
        JwtAuthError::Token(TokenError::MissingToken) => {
            "Authentication is required to access this resource.".to_string()
        }
        JwtAuthError::Token(_) => "Token authentication does not pass.".to_string(),
        JwtAuthError::Store(_) => {
            "The authentication service is temporarily unavailable. Please try again later."
                .to_string()
        }
        JwtAuthError::Configuration(_) => {
            "The authentication service is misconfigured.".to_string()
        }
    }
}
