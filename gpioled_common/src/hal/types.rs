//! Pin levels, commands, device numbers and host handles.

use crate::consts::{LED_OFF, LED_ON, MAX_MAJOR, MINOR_BITS, MINOR_MASK};
use crate::hal::error::LedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// Physical level of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Line driven to ground.
    Low,
    /// Line driven to supply.
    High,
}

impl Level {
    /// True for [`Level::High`].
    pub fn is_high(self) -> bool {
        self == Level::High
    }

    /// Raw value as passed to a GPIO controller (0 or 1).
    pub fn as_raw(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("low"),
            Level::High => f.write_str("high"),
        }
    }
}

/// A decoded LED command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Byte `0`.
    Off,
    /// Byte `1`.
    On,
}

impl Command {
    /// Physical level the pin is driven to for this command.
    ///
    /// The LED is wired active-low: `On` drives the line low, `Off` drives it
    /// high.
    pub fn level(self) -> Level {
        match self {
            Command::On => Level::Low,
            Command::Off => Level::High,
        }
    }

    /// Wire value of the command.
    pub fn as_byte(self) -> u8 {
        match self {
            Command::On => LED_ON,
            Command::Off => LED_OFF,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = LedError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            LED_ON => Ok(Command::On),
            LED_OFF => Ok(Command::Off),
            other => Err(LedError::InvalidCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::On => f.write_str("ON"),
            Command::Off => f.write_str("OFF"),
        }
    }
}

/// A character device number: major class id plus minor instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceNumber {
    /// Major number (driver class).
    pub major: u32,
    /// Minor number (instance).
    pub minor: u32,
}

impl DeviceNumber {
    /// Build a device number. Out-of-range parts are masked the way the
    /// encoding would truncate them.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major: major & MAX_MAJOR,
            minor: minor & MINOR_MASK,
        }
    }

    /// Packed `major << MINOR_BITS | minor` form.
    pub const fn encode(self) -> u32 {
        (self.major << MINOR_BITS) | self.minor
    }

    /// Inverse of [`DeviceNumber::encode`].
    pub const fn decode(raw: u32) -> Self {
        Self {
            major: raw >> MINOR_BITS,
            minor: raw & MINOR_MASK,
        }
    }

    /// Device number `count - 1` minors further on.
    pub fn last(self, count: u32) -> Self {
        Self::new(self.major, self.minor + count.saturating_sub(1))
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Handle to a device class created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassHandle(pub u32);

/// Handle to a device node created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

/// Global GPIO number resolved from a pin reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}
