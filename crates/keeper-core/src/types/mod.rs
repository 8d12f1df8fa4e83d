//! Type definitions for Keeper configuration, manifests, and install preferences

mod config_types;
mod extension_types;

pub use config_types::*;
pub use extension_types::*;
