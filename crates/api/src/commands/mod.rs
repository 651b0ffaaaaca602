//! Commands - inbound operations of the engine

mod availability;
mod calendar;
mod polls;
mod scheduling;

pub use availability::*;
pub use calendar::*;
pub use polls::*;
pub use scheduling::*;
