//! GPIO LED Common Library
//!
//! This crate provides the shared constants, hardware-facing types, host
//! interfaces and configuration loading used by the `gpioled` driver crate.
//!
//! # Module Structure
//!
//! - [`consts`] - Registration names and the byte protocol
//! - [`hal`] - Hardware types, host collaborator traits, errors, board configuration
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use gpioled_common::prelude::*;
//!
//! let cmd = Command::try_from(LED_ON).unwrap();
//! assert_eq!(cmd.level(), Level::Low);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
