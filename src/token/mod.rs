//! Token Lifecycle
//!
//! Issuance, validation, refresh and revocation.
//!
//! This module provides:
//!
//! - **Revocation Store**: key/value backends with per-key expiry
//! - **Blacklist**: logout records, single-point supersession and scene clearing
//! - **Token Issuer**: reserved claims, signing, supersession on issue
//! - **Token Validator**: signature, temporal, revocation and scene checks
//! - **Refresh Coordinator**: explicit and near-expiry reissuance

pub mod blacklist;
pub mod issuer;
pub mod refresh;
pub mod store;
pub mod validator;

// Revocation Store
pub use store::{
    create_in_memory_revocation_store, create_mock_revocation_store, InMemoryRevocationStore,
    MockRevocationStore, RevocationStore, PURGE_INTERVAL,
};

// Blacklist
pub use blacklist::{Blacklist, RevocationRecord, INDEX_KEY};

// Issuer
pub use issuer::{generate_unique_id, TokenIssuer};

// Validator
pub use validator::TokenValidator;

// Refresh
pub use refresh::RefreshCoordinator;
