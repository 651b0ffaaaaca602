//! Finalizing polls into calendar entries

pub mod service;

pub use service::SchedulingService;
