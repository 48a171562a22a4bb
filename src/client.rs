//! JWT Auth Client
//!
//! High-level facade that resolves scenes and drives issuance, validation,
//! refresh and logout.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::{
    Clock, JsonWebTokenCodec, SceneRegistry, SharedSceneRegistry, SystemClock, TokenCodec,
};
use crate::error::{JwtAuthResult, TokenError};
use crate::middleware::strip_bearer;
use crate::telemetry::{JwtMetrics, NoOpMetrics};
use crate::token::validator::record_owner;
use crate::token::{
    Blacklist, InMemoryRevocationStore, RefreshCoordinator, RevocationStore, TokenIssuer,
    TokenValidator,
};
use crate::types::{
    ClaimSet, IssueOptions, IssuedToken, JwtAuthConfig, RequestContext, SceneConfig,
    ValidateOptions,
};

/// Scene-aware token engine.
pub struct JwtAuth<S: RevocationStore = InMemoryRevocationStore, C: TokenCodec = JsonWebTokenCodec>
{
    registry: SharedSceneRegistry,
    codec: Arc<C>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn JwtMetrics>,
    blacklist: Arc<Blacklist<S>>,
    issuer: Arc<TokenIssuer<S, C>>,
    validator: TokenValidator<S, C>,
    refresher: RefreshCoordinator<S, C>,
}

impl JwtAuth<InMemoryRevocationStore, JsonWebTokenCodec> {
    /// Create an engine with an in-process revocation store.
    pub fn new(config: JwtAuthConfig) -> JwtAuthResult<Self> {
        Self::with_store(config, InMemoryRevocationStore::new())
    }
}

impl<S: RevocationStore> JwtAuth<S, JsonWebTokenCodec> {
    /// Create an engine over a custom revocation store.
    pub fn with_store(config: JwtAuthConfig, store: S) -> JwtAuthResult<Self> {
        Self::with_components(
            config,
            store,
            JsonWebTokenCodec::new(),
            Arc::new(SystemClock),
            Arc::new(NoOpMetrics),
        )
    }
}

impl<S: RevocationStore, C: TokenCodec> JwtAuth<S, C> {
    /// Create an engine with custom implementations.
    pub fn with_components(
        config: JwtAuthConfig,
        store: S,
        codec: C,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn JwtMetrics>,
    ) -> JwtAuthResult<Self> {
        let registry = SceneRegistry::from_config(&config)?;
        let codec = Arc::new(codec);
        let blacklist = Arc::new(Blacklist::new(
            Arc::new(store),
            clock.clone(),
            config.store_timeout(),
            metrics.clone(),
        ));
        let issuer = Arc::new(TokenIssuer::new(
            codec.clone(),
            blacklist.clone(),
            clock.clone(),
            metrics.clone(),
        ));
        let validator =
            TokenValidator::new(codec.clone(), blacklist.clone(), clock.clone(), metrics.clone());
        let refresher = RefreshCoordinator::new(
            issuer.clone(),
            clock.clone(),
            metrics.clone(),
            config.refresh_threshold_secs,
        );

        Ok(Self {
            registry: SharedSceneRegistry::new(registry),
            codec,
            clock,
            metrics,
            blacklist,
            issuer,
            validator,
            refresher,
        })
    }

    /// Current scene registry.
    pub fn registry(&self) -> Arc<SceneRegistry> {
        self.registry.snapshot()
    }

    /// Resolved configuration of a scene.
    pub fn scene(&self, name: &str) -> JwtAuthResult<Arc<SceneConfig>> {
        self.registry.resolve(name)
    }

    /// Revocation store backing this engine.
    pub fn store(&self) -> &Arc<S> {
        self.blacklist.store()
    }

    /// Replace the scene configuration atomically.
    ///
    /// Operations already running keep the registry they started with. The
    /// store timeout and refresh threshold are fixed at construction.
    pub fn reconfigure(&self, config: &JwtAuthConfig) -> JwtAuthResult<()> {
        let registry = SceneRegistry::from_config(config)?;
        let scenes = registry.len();
        self.registry.replace(registry);
        info!(scenes = scenes, "Scene registry replaced");
        Ok(())
    }

    // ========== Issuance ==========

    /// Issue a token under a scene.
    pub async fn issue(
        &self,
        scene: &str,
        claims: ClaimSet,
        options: IssueOptions,
    ) -> JwtAuthResult<IssuedToken> {
        let scene = self.registry.resolve(scene)?;
        self.issuer.issue(&scene, claims, options).await
    }

    /// Issue a token under the context scene.
    pub async fn issue_in(
        &self,
        ctx: &RequestContext,
        claims: ClaimSet,
    ) -> JwtAuthResult<IssuedToken> {
        self.issue(ctx.scene(), claims, IssueOptions::default()).await
    }

    // ========== Validation ==========

    /// Validate a token (with or without `Bearer ` prefix).
    ///
    /// Validated claims are cached in the context under the target scene. When
    /// the token is close to expiry and `auto_refresh` is set, a new token is
    /// issued and left in the context for the response.
    pub async fn validate(
        &self,
        token: &str,
        ctx: &mut RequestContext,
        options: ValidateOptions,
    ) -> JwtAuthResult<ClaimSet> {
        let token = strip_bearer(token).ok_or(TokenError::MissingToken)?;
        let registry = self.registry.snapshot();
        let scene_name = options.scene.as_deref().unwrap_or(ctx.scene()).to_string();
        let scene = registry.resolve(&scene_name)?;

        let claims = self
            .validator
            .validate(&registry, token, &scene, &options)
            .await?;
        ctx.set_claims(scene.name.clone(), claims.clone());

        if options.auto_refresh {
            if let Some(refreshed) = self.refresher.refresh_if_due(&scene, &claims).await {
                ctx.set_refreshed_token(scene.name.clone(), refreshed.into_string());
            }
        }

        Ok(claims)
    }

    /// Validate the context's bearer token.
    pub async fn validate_context(
        &self,
        ctx: &mut RequestContext,
        options: ValidateOptions,
    ) -> JwtAuthResult<ClaimSet> {
        let token = ctx
            .bearer_token()
            .map(str::to_string)
            .ok_or(TokenError::MissingToken)?;
        self.validate(&token, ctx, options).await
    }

    /// Whether a token validates, for callers that only need a yes/no.
    pub async fn check(&self, token: &str, ctx: &mut RequestContext) -> bool {
        self.validate(token, ctx, ValidateOptions::default())
            .await
            .is_ok()
    }

    // ========== Refresh ==========

    /// Validate a token and reissue its custom claims under the context scene.
    ///
    /// In single-point scenes the refreshed token supersedes the old one.
    pub async fn refresh(&self, token: &str, ctx: &mut RequestContext) -> JwtAuthResult<IssuedToken> {
        let options = ValidateOptions::new().auto_refresh(false);
        let claims = self.validate(token, ctx, options).await?;
        let scene = self.registry.resolve(ctx.scene())?;
        self.refresher.refresh(&scene, &claims, false).await
    }

    /// Refresh the context's bearer token.
    pub async fn refresh_from_context(&self, ctx: &mut RequestContext) -> JwtAuthResult<IssuedToken> {
        let token = ctx
            .bearer_token()
            .map(str::to_string)
            .ok_or(TokenError::MissingToken)?;
        self.refresh(&token, ctx).await
    }

    // ========== Logout ==========

    /// Revoke a token under a scene.
    ///
    /// Returns `false` when nothing could be revoked: the scene is unknown or
    /// keeps no records, the token does not parse or verify, or the store failed.
    pub async fn logout(&self, token: &str, scene: &str) -> bool {
        match self.try_logout(token, scene).await {
            Ok(revoked) => revoked,
            Err(error) => {
                warn!(scene = scene, reason = error.reason(), "Logout failed");
                false
            }
        }
    }

    /// Revoke the context's bearer token under the context scene.
    pub async fn logout_context(&self, ctx: &RequestContext) -> bool {
        match ctx.bearer_token() {
            Some(token) => self.logout(token, ctx.scene()).await,
            None => false,
        }
    }

    async fn try_logout(&self, token: &str, scene: &str) -> JwtAuthResult<bool> {
        let token = strip_bearer(token).ok_or(TokenError::MissingToken)?;
        let registry = self.registry.snapshot();
        let scene = registry.resolve(scene)?;

        let claims = self.codec.parse(token)?;
        self.validator.verify_signature(token, &scene)?;

        let owner = record_owner(&registry, &scene, &claims);
        let revoked = self.blacklist.add(&owner, &claims).await?;
        if revoked {
            debug!(scene = %owner.name, jti = claims.jti().unwrap_or("-"), "Logged out");
        }
        Ok(revoked)
    }

    // ========== Blacklist Maintenance ==========

    /// Delete one revocation record of a scene.
    pub async fn remove(&self, scene: &str, jti: &str) -> JwtAuthResult<bool> {
        let scene = self.registry.resolve(scene)?;
        self.blacklist.remove(&scene, jti).await
    }

    /// Delete every revocation record of a scene.
    pub async fn clear(&self, scene: &str) -> JwtAuthResult<u64> {
        let scene = self.registry.resolve(scene)?;
        let deleted = self.blacklist.clear(&scene).await?;
        info!(scene = %scene.name, deleted = deleted, "Revocation records cleared");
        Ok(deleted)
    }

    // ========== Inspection ==========

    /// Claims of a token without any verification.
    ///
    /// With no token, the claims validated earlier in this request are
    /// returned, falling back to the context's bearer token.
    pub fn parser_data(&self, token: Option<&str>, ctx: &RequestContext) -> JwtAuthResult<ClaimSet> {
        if let Some(token) = token {
            let token = strip_bearer(token).ok_or(TokenError::MissingToken)?;
            return self.codec.parse(token);
        }
        if let Some(claims) = ctx.current_claims() {
            return Ok(claims.clone());
        }
        let token = ctx
            .bearer_token()
            .and_then(strip_bearer)
            .ok_or(TokenError::MissingToken)?;
        self.codec.parse(token)
    }

    /// Seconds until the token expires, `0` once expired, `-1` without `exp`.
    pub fn token_dynamic_cache_time(&self, token: &str) -> JwtAuthResult<i64> {
        let token = strip_bearer(token).ok_or(TokenError::MissingToken)?;
        let claims = self.codec.parse(token)?;
        Ok(match claims.expires_at() {
            Some(expires_at) => {
                let now = self.clock.now().timestamp();
                expires_at.max(now) - now
            }
            None => -1,
        })
    }

    /// Token lifetime of a scene in seconds.
    pub fn ttl(&self, scene: &str) -> JwtAuthResult<u64> {
        Ok(self.registry.resolve(scene)?.ttl)
    }

    /// Metrics sink.
    pub fn metrics(&self) -> &Arc<dyn JwtMetrics> {
        &self.metrics
    }
}

/// Create an engine with an in-process revocation store.
pub fn create_jwt_auth(config: JwtAuthConfig) -> JwtAuthResult<JwtAuth> {
    JwtAuth::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{jwt_auth_config, scene_settings};
    use crate::core::MockClock;
    use crate::types::{LoginType, SigningAlgorithm};
    use std::time::Duration;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn engine() -> (JwtAuth, Arc<MockClock>) {
        let config = jwt_auth_config()
            .algorithm(SigningAlgorithm::HS256)
            .secret("c2VjcmV0LWZvci10ZXN0cw==")
            .ttl(Duration::from_secs(3600))
            .scene("admin", scene_settings().build())
            .scene(
                "app",
                scene_settings().login_type(LoginType::SinglePoint).build(),
            )
            .build()
            .unwrap();

        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let engine = JwtAuth::with_components(
            config,
            InMemoryRevocationStore::with_clock(clock.clone()),
            JsonWebTokenCodec::new(),
            clock.clone(),
            Arc::new(NoOpMetrics),
        )
        .unwrap();
        (engine, clock)
    }

    #[tokio::test]
    async fn test_unknown_scene() {
        let (engine, _) = engine();
        let error = engine
            .issue("missing", ClaimSet::new(), IssueOptions::new())
            .await
            .unwrap_err();
        assert_eq!(error.reason(), "unknown_scene");
        assert!(!engine.logout("a.b.c", "missing").await);
    }

    #[tokio::test]
    async fn test_bearer_prefix_accepted() {
        let (engine, _) = engine();
        let issued = engine
            .issue("admin", ClaimSet::new().with("uid", 1), IssueOptions::new())
            .await
            .unwrap();

        let mut ctx = RequestContext::for_scene("admin");
        assert!(engine
            .validate(&issued.bearer(), &mut ctx, ValidateOptions::new())
            .await
            .is_ok());
        assert!(ctx.current_claims().is_some());
    }

    #[tokio::test]
    async fn test_empty_token() {
        let (engine, _) = engine();
        let mut ctx = RequestContext::new();
        let error = engine
            .validate("Bearer ", &mut ctx, ValidateOptions::new())
            .await
            .unwrap_err();
        assert_eq!(error.reason(), "missing_token");
    }

    #[tokio::test]
    async fn test_dynamic_cache_time() {
        let (engine, clock) = engine();
        let issued = engine
            .issue("admin", ClaimSet::new(), IssueOptions::new())
            .await
            .unwrap();

        assert_eq!(engine.token_dynamic_cache_time(&issued.token).unwrap(), 3600);
        clock.advance_secs(4000);
        assert_eq!(engine.token_dynamic_cache_time(&issued.token).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_parser_data_prefers_context_claims() {
        let (engine, _) = engine();
        let issued = engine
            .issue("admin", ClaimSet::new().with("uid", 9), IssueOptions::new())
            .await
            .unwrap();

        let mut ctx = RequestContext::for_scene("admin");
        assert_eq!(
            engine.parser_data(None, &ctx).unwrap_err().reason(),
            "missing_token"
        );

        ctx.set_bearer_token(issued.bearer());
        assert_eq!(
            engine.parser_data(None, &ctx).unwrap().get("uid"),
            Some(&serde_json::json!(9))
        );
        assert_eq!(
            engine.parser_data(Some(&issued.token), &ctx).unwrap(),
            issued.claims
        );
    }

    #[tokio::test]
    async fn test_ttl_and_reconfigure() {
        let (engine, _) = engine();
        assert_eq!(engine.ttl("admin").unwrap(), 3600);

        let config = jwt_auth_config()
            .algorithm(SigningAlgorithm::HS256)
            .secret("c2VjcmV0LWZvci10ZXN0cw==")
            .ttl(Duration::from_secs(60))
            .build()
            .unwrap();
        engine.reconfigure(&config).unwrap();

        assert_eq!(engine.ttl("default").unwrap(), 60);
        assert!(engine.ttl("admin").is_err());
    }

    #[tokio::test]
    async fn test_logout_rejects_forged_token() {
        let (engine, _) = engine();
        let issued = engine
            .issue("admin", ClaimSet::new(), IssueOptions::new())
            .await
            .unwrap();
        let forged = format!("{}x", issued.token);

        assert!(!engine.logout(&forged, "admin").await);
        assert!(engine.logout(&issued.token, "admin").await);
    }
}
