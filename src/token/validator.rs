//! Token Validator
//!
//! Parse, revocation check, signature and temporal checks, scene binding.

use std::sync::Arc;
use tracing::debug;

use crate::core::{Clock, SceneRegistry, TokenCodec};
use crate::error::{JwtAuthResult, TokenError};
use crate::telemetry::{log_rejection, JwtMetrics};
use crate::token::{Blacklist, RevocationStore};
use crate::types::{ClaimSet, SceneConfig, ValidateOptions};

/// Validates tokens against a resolved scene.
pub struct TokenValidator<S: RevocationStore, C: TokenCodec> {
    codec: Arc<C>,
    blacklist: Arc<Blacklist<S>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn JwtMetrics>,
}

impl<S: RevocationStore, C: TokenCodec> TokenValidator<S, C> {
    pub fn new(
        codec: Arc<C>,
        blacklist: Arc<Blacklist<S>>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn JwtMetrics>,
    ) -> Self {
        Self {
            codec,
            blacklist,
            clock,
            metrics,
        }
    }

    /// Validate `token` against `scene`.
    ///
    /// Revocation records are looked up under the scene that minted the token
    /// when it is registered, otherwise under `scene`.
    pub async fn validate(
        &self,
        registry: &SceneRegistry,
        token: &str,
        scene: &SceneConfig,
        options: &ValidateOptions,
    ) -> JwtAuthResult<ClaimSet> {
        let claims = match self.codec.parse(token) {
            Ok(claims) => claims,
            Err(error) => {
                log_rejection(&scene.name, None, &error);
                self.metrics.record_validation(&scene.name, error.reason());
                return Err(error);
            }
        };

        match self.check(registry, token, scene, &claims, options).await {
            Ok(()) => {
                self.metrics.record_validation(&scene.name, "ok");
                debug!(scene = %scene.name, jti = claims.jti().unwrap_or("-"), "Token validated");
                Ok(claims)
            }
            Err(error) => {
                log_rejection(&scene.name, claims.jti(), &error);
                self.metrics.record_validation(&scene.name, error.reason());
                Err(error)
            }
        }
    }

    async fn check(
        &self,
        registry: &SceneRegistry,
        token: &str,
        scene: &SceneConfig,
        claims: &ClaimSet,
        options: &ValidateOptions,
    ) -> JwtAuthResult<()> {
        if options.enforce_revocation && scene.blacklist_enabled {
            let owner = record_owner(registry, scene, claims);
            if self.blacklist.is_revoked(&owner, claims).await? {
                return Err(TokenError::Revoked.into());
            }
        }

        self.verify_signature(token, scene)?;
        self.check_time(scene, claims)?;

        if options.enforce_scene_binding {
            let actual = claims.scene().unwrap_or_default();
            if actual != scene.name {
                return Err(TokenError::SceneMismatch {
                    expected: scene.name.clone(),
                    actual: actual.to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Signature check only; temporal claims are ignored.
    pub fn verify_signature(&self, token: &str, scene: &SceneConfig) -> JwtAuthResult<()> {
        self.codec
            .verify(token, scene.jwt_algorithm()?, scene.decoding_key()?)
    }

    /// `nbf <= now <= exp`, widened by the scene leeway.
    fn check_time(&self, scene: &SceneConfig, claims: &ClaimSet) -> JwtAuthResult<()> {
        let now = self.clock.now().timestamp();
        let leeway = i64::try_from(scene.leeway).unwrap_or(i64::MAX);

        let expires_at = claims.expires_at().ok_or_else(|| TokenError::Malformed {
            message: "token has no exp".to_string(),
        })?;
        if now > expires_at.saturating_add(leeway) {
            return Err(TokenError::Expired.into());
        }

        if let Some(not_before) = claims.not_before() {
            if now.saturating_add(leeway) < not_before {
                return Err(TokenError::NotYetValid.into());
            }
        }

        Ok(())
    }
}

/// Scene whose revocation records cover the token.
pub(crate) fn record_owner(
    registry: &SceneRegistry,
    scene: &SceneConfig,
    claims: &ClaimSet,
) -> Arc<SceneConfig> {
    claims
        .scene()
        .filter(|minted_by| *minted_by != scene.name)
        .and_then(|minted_by| registry.resolve(minted_by).ok())
        .unwrap_or_else(|| Arc::new(scene.clone()))
}
