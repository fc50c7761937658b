//! # gpioled
//!
//! GPIO-backed LED character device driver.
//!
//! The driver binds to a hardware node compatible with `"alientek, gpioled"`,
//! registers a one-minor character device named `dtsplatled` and drives the
//! LED pin from single-byte writes. The LED is wired active-low.
//!
//! # Module Structure
//!
//! - [`device`] - Device resources, teardown and the shared device instance
//! - [`lifecycle`] - Attach with rollback, detach
//! - [`session`] - Open/write/release
//! - [`driver_registry`] - Platform bus: driver and device matching
//! - [`host`] - Host implementations (simulation)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           gpioled                                │
//! │  ┌──────────────┐    ┌─────────────────┐    ┌────────────────┐   │
//! │  │ PlatformBus  │───►│ DeviceLifecycle │───►│   LedDevice    │   │
//! │  │ (matching)   │    │ (attach/detach) │    │ (Arc, RwLock)  │   │
//! │  └──────────────┘    └─────────────────┘    └───────▲────────┘   │
//! │                                                     │            │
//! │                                             ┌───────┴────────┐   │
//! │                                             │ SessionHandler │   │
//! │                                             │ (open/write)   │   │
//! │                                             └────────────────┘   │
//! │                            │                                     │
//! │                            ▼                                     │
//! │                   ┌────────────────┐                             │
//! │                   │  Host traits   │ (gpioled_common::hal::host) │
//! │                   └────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod device;
pub mod driver_registry;
pub mod host;
pub mod lifecycle;
pub mod session;

// Re-export key types for convenience
pub use crate::device::{LedDevice, TeardownReport};
pub use crate::driver_registry::{BusError, LED_DRIVER, PlatformBus, PlatformDriverInfo};
pub use crate::host::simulation::SimHost;
pub use crate::lifecycle::{DeviceLifecycle, LifecyclePhase};
pub use crate::session::{Session, SessionHandler};
