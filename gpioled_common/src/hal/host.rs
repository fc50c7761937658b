//! Interfaces to the host the driver runs inside.
//!
//! The driver never owns the bus, the device number allocator, the device
//! class registry or the GPIO controller. It reaches them through these
//! traits. All methods take `&self`; hosts serialize internally.
//!
//! | Trait | Acquire | Release |
//! |-------|---------|---------|
//! | [`DeviceNumbers`] | `register_region` / `alloc_region` | `unregister_region` |
//! | [`CharDevices`] | `cdev_add` | `cdev_del` |
//! | [`DeviceClasses`] | `class_create`, `device_create` | `device_destroy`, `class_destroy` |
//! | [`GpioController`] | `request`, `direction_output` | `free` |

use crate::hal::error::errno;
use crate::hal::node::GpioSpec;
use crate::hal::types::{ClassHandle, DeviceNumber, Level, NodeHandle, PinId};
use thiserror::Error;

/// Failure reported by a host operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Nothing left to allocate
    #[error("no space left")]
    NoSpace,

    /// Resource held by someone else
    #[error("busy: {0}")]
    Busy(String),

    /// Resource already exists
    #[error("already exists: {0}")]
    Exists(String),

    /// Resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Request rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bad address while copying data
    #[error("bad address")]
    Fault,
}

impl HostError {
    /// Negative errno equivalent.
    pub fn errno(&self) -> i32 {
        match self {
            HostError::NoSpace => -errno::ENOSPC,
            HostError::Busy(_) => -errno::EBUSY,
            HostError::Exists(_) => -errno::EEXIST,
            HostError::NotFound(_) => -errno::ENOENT,
            HostError::InvalidArgument(_) => -errno::EINVAL,
            HostError::Fault => -errno::EFAULT,
        }
    }
}

/// Device number range allocator.
pub trait DeviceNumbers {
    /// Register exactly the range `first .. first + count`.
    fn register_region(&self, first: DeviceNumber, count: u32, name: &str) -> Result<(), HostError>;

    /// Allocate a range on a free major, starting at `first_minor`.
    fn alloc_region(&self, first_minor: u32, count: u32, name: &str) -> Result<DeviceNumber, HostError>;

    /// Return a range obtained from either call above.
    fn unregister_region(&self, first: DeviceNumber, count: u32) -> Result<(), HostError>;
}

/// Character interface table.
pub trait CharDevices {
    /// Make the byte interface reachable under `number .. number + count`.
    fn cdev_add(&self, number: DeviceNumber, count: u32) -> Result<(), HostError>;

    /// Remove a registration made by `cdev_add`.
    fn cdev_del(&self, number: DeviceNumber) -> Result<(), HostError>;
}

/// Device class and node registry.
pub trait DeviceClasses {
    /// Create a device class.
    fn class_create(&self, name: &str) -> Result<ClassHandle, HostError>;

    /// Destroy a class. Its nodes must be gone already.
    fn class_destroy(&self, class: ClassHandle) -> Result<(), HostError>;

    /// Create the named device node bound to `number` under `class`.
    fn device_create(&self, class: ClassHandle, number: DeviceNumber, name: &str) -> Result<NodeHandle, HostError>;

    /// Destroy the node bound to `number` under `class`.
    fn device_destroy(&self, class: ClassHandle, number: DeviceNumber) -> Result<(), HostError>;
}

/// GPIO controller.
pub trait GpioController {
    /// Translate a pin reference into a global pin number.
    fn resolve(&self, spec: &GpioSpec) -> Result<PinId, HostError>;

    /// Claim exclusive ownership of a pin.
    fn request(&self, pin: PinId, label: &str) -> Result<(), HostError>;

    /// Configure a claimed pin as output, driving `initial` right away.
    fn direction_output(&self, pin: PinId, initial: Level) -> Result<(), HostError>;

    /// Drive an output pin. Register-level write, cannot fail.
    fn set_value(&self, pin: PinId, level: Level);

    /// Current level of a pin.
    fn get_value(&self, pin: PinId) -> Level;

    /// Release a claim made by `request`.
    fn free(&self, pin: PinId) -> Result<(), HostError>;
}

/// Everything the driver needs from its host.
pub trait Host: DeviceNumbers + CharDevices + DeviceClasses + GpioController + Send + Sync {}

impl<T> Host for T where T: DeviceNumbers + CharDevices + DeviceClasses + GpioController + Send + Sync {}

/// Caller-side buffer handed to a write.
///
/// Copies out of the caller's address space may fault; implementations
/// report that as [`HostError::Fault`].
pub trait UserBuffer {
    /// Bytes the caller offered.
    fn len(&self) -> usize;

    /// True when the caller offered nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the first `dst.len()` bytes into `dst`.
    fn copy_to(&mut self, dst: &mut [u8]) -> Result<(), HostError>;
}

impl UserBuffer for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_to(&mut self, dst: &mut [u8]) -> Result<(), HostError> {
        let src = self.get(..dst.len()).ok_or(HostError::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}
