//! Scene Registry
//!
//! Resolves every configured scene once, at construction, into an immutable
//! [`SceneConfig`]. Misconfiguration fails here rather than on first use.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ConfigurationError, JwtAuthError, JwtAuthResult};
use crate::types::{
    JwtAuthConfig, SceneConfig, SceneSettings, SigningAlgorithm, SigningKeys,
    DEFAULT_BLACKLIST_KEY_PREFIX, DEFAULT_REFRESHED_TOKEN_KEY, DEFAULT_SCENE,
    DEFAULT_SUBJECT_CLAIM_KEY,
};

/// Immutable scene table.
#[derive(Debug)]
pub struct SceneRegistry {
    scenes: HashMap<String, Arc<SceneConfig>>,
    supported: BTreeSet<&'static str>,
}

impl SceneRegistry {
    /// Merge base settings with every scene override and resolve the result.
    pub fn from_config(config: &JwtAuthConfig) -> JwtAuthResult<Self> {
        let supported = supported_algorithms(config.supported_algorithms.as_deref())?;
        let mut scenes = HashMap::with_capacity(config.scenes.len() + 1);

        for (name, overrides) in &config.scenes {
            validate_scene_name(name)?;
            let merged = overrides.merged_over(&config.base);
            let scene = resolve_scene(name, &merged, &supported)?;
            debug!(
                scene = %name,
                algorithm = %scene.algorithm,
                login_type = scene.login_type.as_str(),
                "Registered scene"
            );
            scenes.insert(name.clone(), Arc::new(scene));
        }

        if !scenes.contains_key(DEFAULT_SCENE) && base_is_complete(&config.base) {
            let scene = resolve_scene(DEFAULT_SCENE, &config.base, &supported)?;
            debug!(scene = DEFAULT_SCENE, "Registered implicit default scene");
            scenes.insert(DEFAULT_SCENE.to_string(), Arc::new(scene));
        }

        if scenes.is_empty() {
            return Err(ConfigurationError::InvalidConfig {
                message: "no scene could be resolved from the configuration".to_string(),
            }
            .into());
        }

        info!(scenes = scenes.len(), "Scene registry built");
        Ok(Self { scenes, supported })
    }

    /// Look up a scene by name.
    pub fn resolve(&self, name: &str) -> JwtAuthResult<Arc<SceneConfig>> {
        self.scenes.get(name).cloned().ok_or_else(|| {
            ConfigurationError::UnknownScene {
                scene: name.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scenes.contains_key(name)
    }

    /// Registered scene names, sorted.
    pub fn scene_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scenes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Algorithms scenes are allowed to use.
    pub fn supported_algorithms(&self) -> Vec<&'static str> {
        self.supported.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// Registry handle that can be swapped atomically while requests are in flight.
///
/// Readers take an `Arc` snapshot and keep it for the whole operation.
#[derive(Debug)]
pub struct SharedSceneRegistry {
    current: RwLock<Arc<SceneRegistry>>,
}

impl SharedSceneRegistry {
    pub fn new(registry: SceneRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Current registry.
    pub fn snapshot(&self) -> Arc<SceneRegistry> {
        self.current.read().clone()
    }

    /// Replace the registry. Returns the previous one.
    pub fn replace(&self, registry: SceneRegistry) -> Arc<SceneRegistry> {
        let mut current = self.current.write();
        std::mem::replace(&mut *current, Arc::new(registry))
    }

    /// Resolve a scene against the current registry.
    pub fn resolve(&self, name: &str) -> JwtAuthResult<Arc<SceneConfig>> {
        self.snapshot().resolve(name)
    }
}

fn supported_algorithms(configured: Option<&[String]>) -> JwtAuthResult<BTreeSet<&'static str>> {
    match configured {
        None => Ok(SigningAlgorithm::ALL.iter().map(|alg| alg.as_str()).collect()),
        Some(names) => names
            .iter()
            .map(|name| name.parse::<SigningAlgorithm>().map(|alg| alg.as_str()))
            .collect(),
    }
}

fn validate_scene_name(name: &str) -> JwtAuthResult<()> {
    if name.trim().is_empty() || name.contains(':') {
        return Err(ConfigurationError::InvalidSceneName {
            scene: name.to_string(),
        }
        .into());
    }
    Ok(())
}

fn base_is_complete(base: &SceneSettings) -> bool {
    base.algorithm.is_some()
        && base.ttl.is_some()
        && (base.secret.is_some() || base.keys.is_some())
}

fn resolve_scene(
    name: &str,
    settings: &SceneSettings,
    supported: &BTreeSet<&'static str>,
) -> JwtAuthResult<SceneConfig> {
    let algorithm_name = settings
        .algorithm
        .as_deref()
        .filter(|alg| !alg.trim().is_empty())
        .ok_or_else(|| missing(name, "algorithm"))?;
    let algorithm: SigningAlgorithm = algorithm_name.parse()?;

    if !supported.contains(algorithm.as_str()) || algorithm.to_jwt().is_none() {
        return Err(ConfigurationError::UnsupportedAlgorithm {
            algorithm: algorithm.to_string(),
        }
        .into());
    }

    let ttl = settings
        .ttl
        .filter(|ttl| *ttl > 0)
        .ok_or_else(|| missing(name, "ttl"))?;

    let keys = SigningKeys::from_settings(name, algorithm, settings)?;

    Ok(SceneConfig {
        name: name.to_string(),
        algorithm,
        keys,
        ttl,
        login_type: settings.login_type.unwrap_or_default(),
        subject_claim_key: settings
            .subject_claim_key
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBJECT_CLAIM_KEY.to_string()),
        blacklist_enabled: settings.blacklist_enabled.unwrap_or(true),
        blacklist_key_prefix: settings
            .blacklist_key_prefix
            .clone()
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or_else(|| DEFAULT_BLACKLIST_KEY_PREFIX.to_string()),
        leeway: settings.leeway.unwrap_or(0),
        refreshed_token_key: settings
            .refreshed_token_key
            .clone()
            .unwrap_or_else(|| DEFAULT_REFRESHED_TOKEN_KEY.to_string()),
    })
}

fn missing(scene: &str, field: &str) -> JwtAuthError {
    ConfigurationError::MissingRequired {
        field: format!("scene.{}.{}", scene, field),
    }
    .into()
}
