//! Builders
//!
//! Fluent builder patterns for engine and scene configuration.

pub mod config;

pub use config::{jwt_auth_config, scene_settings, JwtAuthConfigBuilder, SceneSettingsBuilder};
