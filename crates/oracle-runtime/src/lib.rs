//! # Oracle Runtime Library
//!
//! Exposes the runtime modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! ## Modules
//!
//! - `container/` - configuration and service wiring
//! - `adapters/` - console chat transport
//! - `runtime` - startup sequence, timers, message loop, shutdown

#![warn(missing_docs)]

pub mod adapters;
pub mod container;
pub mod runtime;

pub use container::{load_config, Collaborators, OracleServices, RuntimeConfig};
pub use runtime::{OracleRuntime, INTEGRITY_SUBJECT};
