//! Hardware-facing types, host interfaces and board configuration.
//!
//! The driver itself lives in the `gpioled` crate. Everything it consumes
//! from its surroundings is declared here so hosts can be swapped without
//! touching the driver.

pub mod config;
pub mod error;
pub mod host;
pub mod node;
pub mod types;
