//! Scene-Aware JWT Auth Module
//!
//! JWT issuance, validation, refresh and revocation partitioned by scene.
//!
//! # Features
//!
//! - Independent scenes (e.g. `admin`, `app`) with their own keys, lifetime and policy
//! - HMAC, RSA and ECDSA signing algorithms
//! - Multi-point login (concurrent sessions) and single-point login (newest session wins)
//! - Logout through a key/value revocation store with per-record expiry
//! - Automatic refresh of tokens close to expiry
//! - Bearer extraction and scene-bound request authentication
//!
//! # Example
//!
//! ```rust,ignore
//! use jwt_scene_auth::{jwt_auth_config, scene_settings, JwtAuth, LoginType, SigningAlgorithm};
//! use jwt_scene_auth::{ClaimSet, IssueOptions, RequestContext, ValidateOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Scenes inherit unset fields from the base settings
//!     let config = jwt_auth_config()
//!         .algorithm(SigningAlgorithm::HS256)
//!         .secret("c2VjcmV0LWtleS1mb3Itand0")
//!         .ttl(Duration::from_secs(7200))
//!         .scene("admin", scene_settings().ttl(Duration::from_secs(3600)).build())
//!         .scene(
//!             "app",
//!             scene_settings()
//!                 .login_type(LoginType::SinglePoint)
//!                 .subject_claim_key("uid")
//!                 .build(),
//!         )
//!         .build()?;
//!
//!     let auth = JwtAuth::new(config)?;
//!
//!     // Issue a token for the app scene
//!     let issued = auth
//!         .issue("app", ClaimSet::new().with("uid", 1), IssueOptions::new())
//!         .await?;
//!
//!     // Validate it within a request
//!     let mut ctx = RequestContext::for_scene("app");
//!     let claims = auth
//!         .validate(&issued.bearer(), &mut ctx, ValidateOptions::new())
//!         .await?;
//!     println!("uid = {:?}", claims.get("uid"));
//!
//!     // Revoke it
//!     auth.logout(&issued.token, "app").await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The module is organized into several sub-modules:
//!
//! - `types`: claims, scene configuration, options and request context
//! - `error`: error hierarchy with stable failure reasons
//! - `core`: clock, token codec and scene registry
//! - `token`: revocation store, blacklist, issuer, validator and refresh
//! - `builders`: fluent builders for configuration
//! - `middleware`: bearer extraction and request authentication
//! - `telemetry`: logging setup and metrics
//! - `client`: high-level engine combining all functionality

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod middleware;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{create_jwt_auth, JwtAuth};

// Re-export builders
pub use builders::{jwt_auth_config, scene_settings, JwtAuthConfigBuilder, SceneSettingsBuilder};

// Re-export errors
pub use error::{
    get_user_message, ConfigurationError, JwtAuthError, JwtAuthResult, StoreError, TokenError,
};

// Re-export types
pub use types::{
    // Claims
    ClaimSet, CLAIM_EXP, CLAIM_IAT, CLAIM_JTI, CLAIM_NBF, RESERVED_CLAIMS, SCENE_CLAIM,
    // Config
    JwtAuthConfig, KeyPairSettings, SceneSettings, DEFAULT_BLACKLIST_KEY_PREFIX,
    DEFAULT_REFRESHED_TOKEN_KEY, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_SCENE,
    DEFAULT_STORE_TIMEOUT_MS, DEFAULT_SUBJECT_CLAIM_KEY,
    // Scene
    AlgorithmFamily, LoginType, SceneConfig, SigningAlgorithm, SigningKeys,
    // Options
    IssueOptions, IssuedToken, ValidateOptions, BEARER_PREFIX,
    // Context
    RequestContext,
};

// Re-export core components
pub use core::{
    // Clock
    Clock, MockClock, SystemClock,
    // Codec
    JsonWebTokenCodec, MockTokenCodec, TokenCodec,
    // Registry
    SceneRegistry, SharedSceneRegistry,
};

// Re-export token lifecycle
pub use token::{
    // Store
    create_in_memory_revocation_store, create_mock_revocation_store, InMemoryRevocationStore,
    MockRevocationStore, RevocationStore,
    // Blacklist
    Blacklist, RevocationRecord,
    // Issuance, validation, refresh
    generate_unique_id, RefreshCoordinator, TokenIssuer, TokenValidator,
};

// Re-export middleware
pub use middleware::{extract_bearer_token, strip_bearer, AuthMode, BearerAuthenticator};

// Re-export telemetry
pub use telemetry::{
    // Metrics
    create_in_memory_metrics, no_op_metrics, InMemoryMetrics, JwtMetrics, MetricEntry,
    MetricLabels, NoOpMetrics,
    // Logging
    init_logging, log_rejection, LogFormat, LogLevel, LoggingConfig,
};
