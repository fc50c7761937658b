//! Driver error taxonomy.
//!
//! Attach-time errors propagate to the platform bus, write-time errors
//! propagate to the calling session. Detach never fails outward.

use crate::hal::host::HostError;
use thiserror::Error;

/// errno values used for result codes.
pub mod errno {
    /// Operation not permitted.
    pub const EPERM: i32 = 1;
    /// No such entry.
    pub const ENOENT: i32 = 2;
    /// Bad address.
    pub const EFAULT: i32 = 14;
    /// Resource busy.
    pub const EBUSY: i32 = 16;
    /// Already exists.
    pub const EEXIST: i32 = 17;
    /// No such device.
    pub const ENODEV: i32 = 19;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// No space left.
    pub const ENOSPC: i32 = 28;
}

/// Errors reported by the LED driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedError {
    /// No dynamic device number range available
    #[error("Device number range exhausted: {0}")]
    AddressExhausted(#[source] HostError),

    /// The configured static range is already taken
    #[error("Device number range conflict: {0}")]
    AddressConflict(#[source] HostError),

    /// Registering the open/write/release table failed
    #[error("Character interface registration failed: {0}")]
    InterfaceRegistrationFailed(#[source] HostError),

    /// Creating the device class failed
    #[error("Device class creation failed: {0}")]
    ClassCreationFailed(#[source] HostError),

    /// Creating the device node failed
    #[error("Device node creation failed: {0}")]
    NodeCreationFailed(#[source] HostError),

    /// The platform device carries no hardware node
    #[error("Platform device has no hardware node")]
    MissingHardwareNode,

    /// The pin property is absent, malformed or does not resolve
    #[error("Missing or invalid pin property '{0}'")]
    MissingPinSpec(String),

    /// The pin is already claimed by another consumer
    #[error("Pin busy: {0}")]
    PinBusy(#[source] HostError),

    /// The pin could not be configured as an output
    #[error("Pin configuration failed: {0}")]
    PinConfigFailed(#[source] HostError),

    /// First byte of a write is not a recognized command
    #[error("Invalid command byte {0:#04x}")]
    InvalidCommand(u8),

    /// Copying the command byte from the caller failed
    #[error("Transfer fault while reading command byte")]
    TransferFault,

    /// Attach called on a device that is already attached
    #[error("Device already attached")]
    AlreadyAttached,

    /// The device behind a session has been detached
    #[error("No such device")]
    NoDevice,
}

impl LedError {
    /// Negative errno reported to the caller for this error.
    pub fn errno(&self) -> i32 {
        match self {
            LedError::AddressExhausted(e)
            | LedError::AddressConflict(e)
            | LedError::InterfaceRegistrationFailed(e)
            | LedError::ClassCreationFailed(e)
            | LedError::NodeCreationFailed(e)
            | LedError::PinBusy(e)
            | LedError::PinConfigFailed(e) => e.errno(),
            LedError::MissingHardwareNode
            | LedError::MissingPinSpec(_)
            | LedError::InvalidCommand(_) => -errno::EINVAL,
            LedError::TransferFault => -errno::EFAULT,
            LedError::AlreadyAttached => -errno::EBUSY,
            LedError::NoDevice => -errno::ENODEV,
        }
    }

    /// True for errors that can only come out of attach.
    pub fn is_attach_error(&self) -> bool {
        !matches!(
            self,
            LedError::InvalidCommand(_) | LedError::TransferFault | LedError::NoDevice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_error_display() {
        let err = LedError::InvalidCommand(7);
        assert!(err.to_string().contains("0x07"));

        let err = LedError::MissingPinSpec("led-gpios".to_string());
        assert!(err.to_string().contains("led-gpios"));

        let err = LedError::PinBusy(HostError::Busy("gpio3".to_string()));
        assert!(err.to_string().contains("gpio3"));
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(LedError::InvalidCommand(2).errno(), -errno::EINVAL);
        assert_eq!(LedError::TransferFault.errno(), -errno::EFAULT);
        assert_eq!(LedError::MissingHardwareNode.errno(), -errno::EINVAL);
        assert_eq!(LedError::NoDevice.errno(), -errno::ENODEV);
        assert_eq!(
            LedError::AddressConflict(HostError::Busy("240:0".to_string())).errno(),
            -errno::EBUSY
        );
        assert_eq!(
            LedError::AddressExhausted(HostError::NoSpace).errno(),
            -errno::ENOSPC
        );
    }

    #[test]
    fn test_attach_error_classification() {
        assert!(LedError::MissingHardwareNode.is_attach_error());
        assert!(LedError::PinConfigFailed(HostError::Fault).is_attach_error());
        assert!(!LedError::TransferFault.is_attach_error());
        assert!(!LedError::InvalidCommand(9).is_attach_error());
    }
}
