//! # Schej Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite persistence for users and polls (r2d2 pool, JSON documents)
//! - Configuration loading from environment and TOML files
//! - The retrying HTTP client shared by provider adapters
//! - Calendar integrations (Google Calendar, CalDAV) and OAuth refresh
//!
//! ## Architecture
//! - Implements traits defined in `schej-core`
//! - Depends on `schej-domain` and `schej-core`
//! - Contains all "impure" code (I/O, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::*;
pub use integrations::calendar::{CalDavProvider, GoogleCalendarProvider, GoogleTokenRefresher};
