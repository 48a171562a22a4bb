//! JWT Auth Core Components
//!
//! Time source, token codec and scene registry.

pub mod clock;
pub mod codec;
pub mod registry;

pub use clock::*;
pub use codec::*;
pub use registry::*;
