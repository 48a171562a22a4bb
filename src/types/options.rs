//! Operation Options
//!
//! Per-call options for issuance and validation, and the issued token value.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

use crate::types::ClaimSet;

/// Authorization scheme prefix.
pub const BEARER_PREFIX: &str = "Bearer";

/// Options for `issue`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IssueOptions {
    /// Skip the single-point supersession write.
    pub suppress_revocation_on_issue: bool,
}

impl IssueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress_revocation_on_issue(mut self, suppress: bool) -> Self {
        self.suppress_revocation_on_issue = suppress;
        self
    }
}

/// Options for `validate`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Scene to validate against; the context scene when unset.
    pub scene: Option<String>,
    /// Check revocation records.
    pub enforce_revocation: bool,
    /// Reject tokens minted by another scene.
    pub enforce_scene_binding: bool,
    /// Reissue near-expiry tokens into the request context.
    pub auto_refresh: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            scene: None,
            enforce_revocation: true,
            enforce_scene_binding: false,
            auto_refresh: true,
        }
    }
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }

    pub fn enforce_revocation(mut self, enforce: bool) -> Self {
        self.enforce_revocation = enforce;
        self
    }

    pub fn enforce_scene_binding(mut self, enforce: bool) -> Self {
        self.enforce_scene_binding = enforce;
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }
}

/// A freshly signed token. Owned by the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct IssuedToken {
    /// Compact serialization, without scheme prefix.
    pub token: String,
    /// Claims signed into the token.
    pub claims: ClaimSet,
    /// Scene that minted the token.
    pub scene: String,
}

impl IssuedToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("{} {}", BEARER_PREFIX, self.token)
    }

    /// Expiry of the token.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims
            .expires_at()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn into_string(self) -> String {
        self.token
    }
}

impl fmt::Display for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CLAIM_EXP;

    #[test]
    fn test_validate_defaults() {
        let options = ValidateOptions::default();
        assert!(options.enforce_revocation);
        assert!(!options.enforce_scene_binding);
        assert!(options.auto_refresh);
        assert!(options.scene.is_none());
    }

    #[test]
    fn test_issued_token_bearer() {
        let issued = IssuedToken {
            token: "a.b.c".to_string(),
            claims: ClaimSet::new().with(CLAIM_EXP, 1_700_000_000i64),
            scene: "default".to_string(),
        };

        assert_eq!(issued.bearer(), "Bearer a.b.c");
        assert_eq!(issued.to_string(), "a.b.c");
        assert_eq!(issued.expires_at().unwrap().timestamp(), 1_700_000_000);
    }
}
