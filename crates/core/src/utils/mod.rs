//! Shared helpers for core services

pub mod keyed_locks;

pub use keyed_locks::KeyedLocks;
