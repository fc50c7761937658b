//! Prelude module for common re-exports.
//!
//! ```rust
//! use gpioled_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{BoardConfig, DriverConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{
    DEVICE_COUNT, DEVICE_NAME, DRIVER_NAME, LED_GPIO_PROPERTY, LED_OFF, LED_ON, OF_COMPATIBLE,
};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::error::LedError;
pub use crate::hal::host::{
    CharDevices, DeviceClasses, DeviceNumbers, GpioController, Host, HostError, UserBuffer,
};
pub use crate::hal::node::{GpioFlags, GpioSpec, HardwareNode, PlatformDevice, Property};
pub use crate::hal::types::{ClassHandle, Command, DeviceNumber, Level, NodeHandle, PinId};
