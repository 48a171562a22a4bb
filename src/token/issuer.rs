//! Token Issuer
//!
//! Stamps reserved claims, signs, and supersedes earlier single-point tokens.

use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::core::{Clock, TokenCodec};
use crate::error::{JwtAuthResult, TokenError};
use crate::telemetry::JwtMetrics;
use crate::token::{Blacklist, RevocationStore};
use crate::types::claims::millis_to_numeric_date;
use crate::types::{
    ClaimSet, IssueOptions, IssuedToken, SceneConfig, CLAIM_EXP, CLAIM_IAT, CLAIM_JTI, CLAIM_NBF,
    SCENE_CLAIM,
};

/// Random URL-safe identifier for multi-point tokens.
pub fn generate_unique_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Signs new tokens for a resolved scene.
pub struct TokenIssuer<S: RevocationStore, C: TokenCodec> {
    codec: Arc<C>,
    blacklist: Arc<Blacklist<S>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn JwtMetrics>,
    last_issued_ms: AtomicI64,
}

impl<S: RevocationStore, C: TokenCodec> TokenIssuer<S, C> {
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
            last_issued_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Issue a token under `scene`.
    ///
    /// Caller values for reserved claims are overwritten. For single-point
    /// scenes the subject's earlier tokens are superseded unless suppressed.
    pub async fn issue(
        &self,
        scene: &SceneConfig,
        claims: ClaimSet,
        options: IssueOptions,
    ) -> JwtAuthResult<IssuedToken> {
        let jti = if scene.is_single_point() {
            let subject = claims.subject(&scene.subject_claim_key).ok_or_else(|| {
                TokenError::MissingSubjectClaim {
                    claim: scene.subject_claim_key.clone(),
                }
            })?;
            format!("{}_{}", scene.name, subject)
        } else {
            format!("{}_{}", scene.name, generate_unique_id())
        };

        let now_ms = self.clock.now_ms();
        let issued_at_ms = self.stamp(now_ms);
        let not_before = now_ms.div_euclid(1000);
        let expires_at = not_before.saturating_add(i64::try_from(scene.ttl).unwrap_or(i64::MAX));

        let mut signed = claims.custom_claims();
        signed.insert(CLAIM_JTI, jti.clone());
        signed.insert(CLAIM_IAT, millis_to_numeric_date(issued_at_ms));
        signed.insert(CLAIM_NBF, not_before);
        signed.insert(CLAIM_EXP, expires_at);
        signed.insert(SCENE_CLAIM, scene.name.clone());

        let token = self
            .codec
            .build(&signed, scene.jwt_algorithm()?, scene.encoding_key()?)?;

        // A token whose supersession write fails is dropped, never returned.
        if scene.is_single_point() && !options.suppress_revocation_on_issue {
            self.blacklist.supersede(scene, &jti, issued_at_ms).await?;
        }

        self.metrics
            .record_token_issued(&scene.name, scene.login_type.as_str());
        debug!(scene = %scene.name, jti = %jti, exp = expires_at, "Token issued");

        Ok(IssuedToken {
            token,
            claims: signed,
            scene: scene.name.clone(),
        })
    }

    /// Issued-at in milliseconds, strictly increasing within this process.
    fn stamp(&self, now_ms: i64) -> i64 {
        let mut previous = self.last_issued_ms.load(Ordering::Relaxed);
        loop {
            let next = now_ms.max(previous.saturating_add(1));
            match self.last_issued_ms.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => previous = current,
            }
        }
    }
}
