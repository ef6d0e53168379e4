// ABOUTME: Library root for skipper - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod compose;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod hooks;
pub mod output;
pub mod registry;
pub mod release;
pub mod runtime;
pub mod store;
pub mod tag;
pub mod types;
pub mod vcs;
