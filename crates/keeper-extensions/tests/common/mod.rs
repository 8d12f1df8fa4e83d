//! Common test utilities for keeper-extensions
//!
//! This module provides shared test infrastructure including:
//! - Constants for ids, URLs and timings
//! - Bundled directory and config fixtures
//! - Recording mocks for the host, install provider and manifest fetcher
//! - Wiremock helpers for HTTP manifest endpoints

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod constants;
pub mod fixtures;
pub mod mock_server;
pub mod mocks;

pub use constants::*;
pub use fixtures::*;
pub use mock_server::*;
pub use mocks::*;
