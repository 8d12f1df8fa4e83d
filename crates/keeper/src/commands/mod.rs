//! CLI command implementations

pub mod config;
pub mod manifest;
pub mod run;
pub mod status;
pub mod version;
