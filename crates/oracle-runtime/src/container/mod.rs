//! # Service Container
//!
//! Configuration and dependency injection for the oracle services.

pub mod config;
pub mod services;

pub use config::{load_config, ConfigError, RuntimeConfig};
pub use services::{Collaborators, OracleServices};
