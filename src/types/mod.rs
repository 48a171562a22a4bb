//! JWT Auth Types
//!
//! Configuration, claim, option and context types shared by every component.

pub mod claims;
pub mod config;
pub mod context;
pub mod options;
pub mod scene;

pub use claims::*;
pub use config::*;
pub use context::*;
pub use options::*;
pub use scene::*;
