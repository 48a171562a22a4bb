//! HTTP Boundary
//!
//! Bearer token extraction and request authentication on top of [`JwtAuth`].
//!
//! Two modes are provided:
//!
//! - **General**: validate against whatever scene the request context selects
//! - **Scene-bound**: select a fixed scene and reject tokens minted elsewhere

use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::HeaderMap;
use std::sync::Arc;
use tracing::warn;

use crate::client::JwtAuth;
use crate::core::{JsonWebTokenCodec, TokenCodec};
use crate::error::{JwtAuthResult, TokenError};
use crate::token::{InMemoryRevocationStore, RevocationStore};
use crate::types::{ClaimSet, RequestContext, ValidateOptions, BEARER_PREFIX, DEFAULT_SCENE};

/// Strip an optional `Bearer ` scheme prefix. `None` when no token remains.
pub fn strip_bearer(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let token = match trimmed.get(..BEARER_PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => {
            let rest = &trimmed[BEARER_PREFIX.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest.trim_start()
            } else {
                trimmed
            }
        }
        _ => trimmed,
    };
    (!token.is_empty()).then_some(token)
}

/// Bearer token of an `Authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(strip_bearer)
}

/// How the authenticator picks and enforces the scene.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthMode {
    /// Validate against the context scene.
    General,
    /// Force a scene and require tokens minted by it.
    SceneBound(String),
}

/// Authenticates requests from their headers.
pub struct BearerAuthenticator<
    S: RevocationStore = InMemoryRevocationStore,
    C: TokenCodec = JsonWebTokenCodec,
> {
    auth: Arc<JwtAuth<S, C>>,
    mode: AuthMode,
}

impl<S: RevocationStore, C: TokenCodec> BearerAuthenticator<S, C> {
    /// Validate against the scene already selected in the context.
    pub fn general(auth: Arc<JwtAuth<S, C>>) -> Self {
        Self {
            auth,
            mode: AuthMode::General,
        }
    }

    /// Select `scene` and enforce scene binding.
    pub fn scene_bound(auth: Arc<JwtAuth<S, C>>, scene: impl Into<String>) -> Self {
        Self {
            auth,
            mode: AuthMode::SceneBound(scene.into()),
        }
    }

    /// Scene-bound to the `default` scene.
    pub fn default_scene(auth: Arc<JwtAuth<S, C>>) -> Self {
        Self::scene_bound(auth, DEFAULT_SCENE)
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    /// Authenticate a request.
    ///
    /// The bearer token is recorded in the context; validated claims and any
    /// automatically refreshed token end up there too.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        ctx: &mut RequestContext,
    ) -> JwtAuthResult<ClaimSet> {
        let token = extract_bearer_token(headers)
            .ok_or(TokenError::MissingToken)?
            .to_string();
        ctx.set_bearer_token(token.clone());

        let options = match &self.mode {
            AuthMode::General => ValidateOptions::new(),
            AuthMode::SceneBound(scene) => {
                ctx.set_scene(scene.clone());
                ValidateOptions::new().enforce_scene_binding(true)
            }
        };

        self.auth.validate(&token, ctx, options).await
    }

    /// Move refreshed tokens from the context onto response headers.
    ///
    /// Each scene's `refreshed_token_key` names its header. Returns the
    /// number of headers written.
    pub fn apply_refreshed_token(&self, ctx: &mut RequestContext, headers: &mut HeaderMap) -> usize {
        let registry = self.auth.registry();
        let mut written = 0;

        for (scene, token) in ctx.take_refreshed_tokens() {
            let Ok(config) = registry.resolve(&scene) else {
                continue;
            };
            let name = HeaderName::from_bytes(config.refreshed_token_key.as_bytes());
            let value = HeaderValue::from_str(&format!("{} {}", BEARER_PREFIX, token));
            match (name, value) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                    written += 1;
                }
                _ => warn!(
                    scene = %scene,
                    header = %config.refreshed_token_key,
                    "Refreshed token header is not a valid header"
                ),
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Bearer abc.def.ghi", Some("abc.def.ghi"); "with scheme")]
    #[test_case("bearer abc.def.ghi", Some("abc.def.ghi"); "lowercase scheme")]
    #[test_case("  abc.def.ghi ", Some("abc.def.ghi"); "bare token")]
    #[test_case("Bearer ", None; "scheme only")]
    #[test_case("", None; "empty")]
    #[test_case("Bearerabc", Some("Bearerabc"); "no separator")]
    fn test_strip_bearer(raw: &str, expected: Option<&str>) {
        assert_eq!(strip_bearer(raw), expected);
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer a.b.c"));
        assert_eq!(extract_bearer_token(&headers), Some("a.b.c"));
    }
}
