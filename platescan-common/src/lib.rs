//! # platescan Common Library
//!
//! Shared code for the platescan service:
//! - Error types
//! - Configuration loading (TOML file + environment overrides)

pub mod config;
pub mod error;

pub use config::PlatescanConfig;
pub use error::{Error, Result};
