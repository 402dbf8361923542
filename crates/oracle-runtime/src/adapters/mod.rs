//! # Runtime Adapters
//!
//! Adapters only the executable needs.

mod console;

pub use console::{parse_line, read_console, ConsoleTransport};
