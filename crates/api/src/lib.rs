//! # Schej API
//!
//! Application layer - inbound operations and composition root.
//!
//! This crate contains:
//! - Commands (calendar projection, availability, polls, finalization)
//! - Application context (dependency injection)
//! - Logging setup
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Exposes one async function per operation

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
