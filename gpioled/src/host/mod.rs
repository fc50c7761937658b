//! Host implementations.
//!
//! - [`simulation`] - In-memory host for development and testing
//!
//! A host implements the collaborator traits from
//! `gpioled_common::hal::host`; the driver is generic over it.

pub mod simulation;
