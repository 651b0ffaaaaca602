//! User accounts and their persistence port

pub mod ports;
