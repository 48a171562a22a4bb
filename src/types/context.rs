//! Request Context
//!
//! Per-request state: selected scene, parsed claims and refreshed tokens.
//! Owned by one request and never shared across concurrent requests.

use std::collections::HashMap;

use crate::types::{ClaimSet, DEFAULT_SCENE};

/// Request-scoped state passed into every engine call.
#[derive(Clone, Debug)]
pub struct RequestContext {
    scene: String,
    bearer_token: Option<String>,
    claims: HashMap<String, ClaimSet>,
    refreshed_tokens: HashMap<String, String>,
}

impl RequestContext {
    /// Create a context targeting the default scene.
    pub fn new() -> Self {
        Self::for_scene(DEFAULT_SCENE)
    }

    /// Create a context targeting a scene.
    pub fn for_scene(scene: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            bearer_token: None,
            claims: HashMap::new(),
            refreshed_tokens: HashMap::new(),
        }
    }

    /// Current scene.
    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Select the current scene.
    pub fn set_scene(&mut self, scene: impl Into<String>) -> &mut Self {
        self.scene = scene.into();
        self
    }

    /// Token taken from the request's `Authorization` header.
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn set_bearer_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Claims parsed for a scene during this request.
    pub fn claims(&self, scene: &str) -> Option<&ClaimSet> {
        self.claims.get(scene)
    }

    /// Claims parsed for the current scene.
    pub fn current_claims(&self) -> Option<&ClaimSet> {
        self.claims.get(&self.scene)
    }

    pub fn set_claims(&mut self, scene: impl Into<String>, claims: ClaimSet) {
        self.claims.insert(scene.into(), claims);
    }

    /// Token reissued automatically while validating under a scene.
    pub fn refreshed_token(&self, scene: &str) -> Option<&str> {
        self.refreshed_tokens.get(scene).map(String::as_str)
    }

    pub fn set_refreshed_token(&mut self, scene: impl Into<String>, token: impl Into<String>) {
        self.refreshed_tokens.insert(scene.into(), token.into());
    }

    /// Take every refreshed token, leaving none behind.
    pub fn take_refreshed_tokens(&mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.refreshed_tokens)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scene() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.scene(), "default");
        assert!(ctx.current_claims().is_none());
        assert!(ctx.bearer_token().is_none());
    }

    #[test]
    fn test_claims_are_scoped_by_scene() {
        let mut ctx = RequestContext::for_scene("admin");
        ctx.set_claims("admin", ClaimSet::new().with("uid", 7));

        assert!(ctx.current_claims().is_some());
        ctx.set_scene("app");
        assert!(ctx.current_claims().is_none());
        assert!(ctx.claims("admin").is_some());
    }

    #[test]
    fn test_take_refreshed_tokens() {
        let mut ctx = RequestContext::new();
        ctx.set_refreshed_token("default", "a.b.c");
        assert_eq!(ctx.refreshed_token("default"), Some("a.b.c"));

        let taken = ctx.take_refreshed_tokens();
        assert_eq!(taken.len(), 1);
        assert!(ctx.refreshed_token("default").is_none());
    }
}
