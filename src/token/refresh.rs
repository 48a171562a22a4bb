//! Refresh Coordinator
//!
//! Reissues a validated claim set: reserved claims are stripped and the
//! remaining custom claims are signed again under the same scene.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{Clock, TokenCodec};
use crate::error::JwtAuthResult;
use crate::telemetry::JwtMetrics;
use crate::token::{RevocationStore, TokenIssuer};
use crate::types::{ClaimSet, IssueOptions, IssuedToken, SceneConfig};

/// Explicit and automatic token refresh.
pub struct RefreshCoordinator<S: RevocationStore, C: TokenCodec> {
    issuer: Arc<TokenIssuer<S, C>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn JwtMetrics>,
    threshold_secs: i64,
}

impl<S: RevocationStore, C: TokenCodec> RefreshCoordinator<S, C> {
    pub fn new(
        issuer: Arc<TokenIssuer<S, C>>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn JwtMetrics>,
        threshold_secs: u64,
    ) -> Self {
        Self {
            issuer,
            clock,
            metrics,
            threshold_secs: i64::try_from(threshold_secs).unwrap_or(i64::MAX),
        }
    }

    /// Whether the token expires within the refresh threshold.
    pub fn needs_refresh(&self, claims: &ClaimSet) -> bool {
        match claims.expires_at() {
            Some(expires_at) => expires_at - self.clock.now().timestamp() < self.threshold_secs,
            None => false,
        }
    }

    /// Reissue `claims` under `scene`.
    ///
    /// Single-point refreshes supersede the token being refreshed.
    pub async fn refresh(
        &self,
        scene: &SceneConfig,
        claims: &ClaimSet,
        automatic: bool,
    ) -> JwtAuthResult<IssuedToken> {
        let mut carried = claims.clone();
        carried.strip_reserved();

        let result = self
            .issuer
            .issue(scene, carried, IssueOptions::new().suppress_revocation_on_issue(false))
            .await;

        match &result {
            Ok(issued) => {
                self.metrics.record_refresh(&scene.name, automatic, true);
                debug!(
                    scene = %scene.name,
                    jti = issued.claims.jti().unwrap_or("-"),
                    automatic = automatic,
                    "Token refreshed"
                );
            }
            Err(error) => {
                self.metrics.record_refresh(&scene.name, automatic, false);
                warn!(scene = %scene.name, reason = error.reason(), automatic = automatic, "Token refresh failed");
            }
        }
        result
    }

    /// Refresh when close to expiry. Failures are logged and swallowed.
    pub async fn refresh_if_due(
        &self,
        scene: &SceneConfig,
        claims: &ClaimSet,
    ) -> Option<IssuedToken> {
        if !self.needs_refresh(claims) {
            return None;
        }
        self.refresh(scene, claims, true).await.ok()
    }
}
