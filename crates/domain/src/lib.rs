//! # Schej Domain
//!
//! Business domain types for the calendar aggregation and availability engine.
//!
//! This crate contains:
//! - Users, calendar accounts and sub-calendar toggles
//! - The normalized interval model and query windows
//! - Polls, responses and scheduled events
//! - Error taxonomy (`SchejError`, per-source failures, finalization errors)
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other Schej crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
