//! Simulated host.
//!
//! This module provides an in-memory host for development and testing
//! without a kernel or physical hardware. It implements every collaborator
//! trait the driver needs and can be told to fail any fallible operation
//! once, which is how attach rollback is exercised.

mod chrdev;
mod class;
mod fault;
mod gpio;

pub use chrdev::{DYNAMIC_MAJOR_END, DYNAMIC_MAJOR_START, Region};
pub use class::DeviceNode;
pub use fault::HostOp;
pub use gpio::{LineFlags, LineSnapshot};

use chrdev::ChrdevTable;
use class::ClassRegistry;
use fault::FaultPlan;
use gpio::GpioBank;

use gpioled_common::hal::config::{BoardConfig, GpioChipConfig};
use gpioled_common::hal::host::{
    CharDevices, DeviceClasses, DeviceNumbers, GpioController, HostError, UserBuffer,
};
use gpioled_common::hal::node::GpioSpec;
use gpioled_common::hal::types::{ClassHandle, DeviceNumber, Level, NodeHandle, PinId};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

/// Everything the simulated host currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    /// Registered device number ranges.
    pub regions: Vec<Region>,
    /// Registered character interfaces.
    pub cdevs: Vec<DeviceNumber>,
    /// Device classes.
    pub classes: Vec<String>,
    /// Device nodes.
    pub nodes: Vec<DeviceNode>,
    /// Lines that have been claimed or driven.
    pub lines: Vec<LineSnapshot>,
}

impl HostSnapshot {
    /// True when no range, interface, class, node or pin claim is held.
    pub fn is_quiescent(&self) -> bool {
        self.regions.is_empty()
            && self.cdevs.is_empty()
            && self.classes.is_empty()
            && self.nodes.is_empty()
            && self.lines.iter().all(|l| !l.requested)
    }
}

/// In-memory host.
#[derive(Debug, Default)]
pub struct SimHost {
    chrdev: Mutex<ChrdevTable>,
    classes: Mutex<ClassRegistry>,
    gpio: Mutex<GpioBank>,
    faults: Mutex<FaultPlan>,
}

impl SimHost {
    /// Host without GPIO controllers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with the controllers of a board description.
    pub fn from_board(board: &BoardConfig) -> Self {
        let host = Self::new();
        {
            let mut gpio = host.gpio.lock();
            for chip in &board.gpio_chips {
                gpio.add_chip(chip);
            }
        }
        host
    }

    /// Builder-style controller registration.
    pub fn with_chip(self, name: &str, base: u32, ngpio: u32) -> Self {
        self.gpio.lock().add_chip(&GpioChipConfig {
            name: name.to_string(),
            base,
            ngpio,
        });
        self
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: HostOp, err: HostError) {
        self.faults.lock().arm(op, err);
    }

    /// Drop all pending injected failures.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    fn check(&self, op: HostOp) -> Result<(), HostError> {
        self.faults.lock().check(op)
    }

    /// Device number bound to the node called `name`.
    pub fn lookup_node(&self, name: &str) -> Option<DeviceNumber> {
        self.classes.lock().lookup(name)
    }

    /// Every level a pin has been driven to, oldest first.
    pub fn level_history(&self, pin: PinId) -> Vec<Level> {
        self.gpio.lock().history(pin)
    }

    /// Claim and direction flags of a pin.
    pub fn line_flags(&self, pin: PinId) -> LineFlags {
        self.gpio.lock().flags(pin)
    }

    /// Current state of everything held.
    pub fn snapshot(&self) -> HostSnapshot {
        let chrdev = self.chrdev.lock();
        let classes = self.classes.lock();
        HostSnapshot {
            regions: chrdev.regions(),
            cdevs: chrdev.cdevs(),
            classes: classes.classes(),
            nodes: classes.nodes(),
            lines: self.gpio.lock().snapshot(),
        }
    }
}

impl DeviceNumbers for SimHost {
    fn register_region(&self, first: DeviceNumber, count: u32, name: &str) -> Result<(), HostError> {
        self.check(HostOp::RegisterRegion)?;
        trace!("register_region {}+{} '{}'", first, count, name);
        self.chrdev.lock().register(first, count, name)
    }

    fn alloc_region(&self, first_minor: u32, count: u32, name: &str) -> Result<DeviceNumber, HostError> {
        self.check(HostOp::AllocRegion)?;
        trace!("alloc_region minor {}+{} '{}'", first_minor, count, name);
        self.chrdev.lock().alloc(first_minor, count, name)
    }

    fn unregister_region(&self, first: DeviceNumber, count: u32) -> Result<(), HostError> {
        self.check(HostOp::UnregisterRegion)?;
        self.chrdev.lock().unregister(first, count)
    }
}

impl CharDevices for SimHost {
    fn cdev_add(&self, number: DeviceNumber, count: u32) -> Result<(), HostError> {
        self.check(HostOp::CdevAdd)?;
        self.chrdev.lock().cdev_add(number, count)
    }

    fn cdev_del(&self, number: DeviceNumber) -> Result<(), HostError> {
        self.check(HostOp::CdevDel)?;
        self.chrdev.lock().cdev_del(number)
    }
}

impl DeviceClasses for SimHost {
    fn class_create(&self, name: &str) -> Result<ClassHandle, HostError> {
        self.check(HostOp::ClassCreate)?;
        self.classes.lock().class_create(name)
    }

    fn class_destroy(&self, class: ClassHandle) -> Result<(), HostError> {
        self.check(HostOp::ClassDestroy)?;
        self.classes.lock().class_destroy(class)
    }

    fn device_create(&self, class: ClassHandle, number: DeviceNumber, name: &str) -> Result<NodeHandle, HostError> {
        self.check(HostOp::DeviceCreate)?;
        self.classes.lock().device_create(class, number, name)
    }

    fn device_destroy(&self, class: ClassHandle, number: DeviceNumber) -> Result<(), HostError> {
        self.check(HostOp::DeviceDestroy)?;
        self.classes.lock().device_destroy(class, number)
    }
}

impl GpioController for SimHost {
    fn resolve(&self, spec: &GpioSpec) -> Result<PinId, HostError> {
        self.check(HostOp::Resolve)?;
        self.gpio.lock().resolve(spec)
    }

    fn request(&self, pin: PinId, label: &str) -> Result<(), HostError> {
        self.check(HostOp::Request)?;
        self.gpio.lock().request(pin, label)
    }

    fn direction_output(&self, pin: PinId, initial: Level) -> Result<(), HostError> {
        self.check(HostOp::DirectionOutput)?;
        self.gpio.lock().direction_output(pin, initial)
    }

    fn set_value(&self, pin: PinId, level: Level) {
        self.gpio.lock().set_value(pin, level);
    }

    fn get_value(&self, pin: PinId) -> Level {
        self.gpio.lock().get_value(pin)
    }

    fn free(&self, pin: PinId) -> Result<(), HostError> {
        self.check(HostOp::Free)?;
        self.gpio.lock().free(pin)
    }
}

/// Caller buffer whose copy always faults, as an unmapped user pointer would.
#[derive(Debug, Clone, Copy)]
pub struct FaultyBuffer {
    /// Length the caller claims to offer.
    pub len: usize,
}

impl UserBuffer for FaultyBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_to(&mut self, _dst: &mut [u8]) -> Result<(), HostError> {
        Err(HostError::Fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_board_registers_chips() {
        let board = BoardConfig {
            gpio_chips: vec![GpioChipConfig {
                name: "gpio1".to_string(),
                base: 0,
                ngpio: 32,
            }],
            ..BoardConfig::default()
        };
        let host = SimHost::from_board(&board);
        let spec = GpioSpec {
            chip: "gpio1".to_string(),
            line: 3,
            flags: Default::default(),
        };
        assert_eq!(host.resolve(&spec).unwrap(), PinId(3));
        assert!(host.snapshot().is_quiescent());
    }

    #[test]
    fn test_injected_fault_is_one_shot() {
        let host = SimHost::new();
        host.fail_next(HostOp::ClassCreate, HostError::NoSpace);
        assert_eq!(host.class_create("leds"), Err(HostError::NoSpace));
        let class = host.class_create("leds").unwrap();
        host.class_destroy(class).unwrap();
    }

    #[test]
    fn test_snapshot_tracks_holdings() {
        let host = SimHost::new().with_chip("gpio1", 0, 8);
        let number = host.alloc_region(0, 1, "led").unwrap();
        host.cdev_add(number, 1).unwrap();
        host.request(PinId(2), "led").unwrap();

        let snap = host.snapshot();
        assert!(!snap.is_quiescent());
        assert_eq!(snap.regions.len(), 1);
        assert_eq!(snap.cdevs, vec![number]);
        assert!(snap.lines[0].requested);

        host.free(PinId(2)).unwrap();
        host.cdev_del(number).unwrap();
        host.unregister_region(number, 1).unwrap();
        assert!(host.snapshot().is_quiescent());
    }

    #[test]
    fn test_snapshot_serializes() {
        let host = SimHost::new();
        let json = serde_json::to_string(&host.snapshot()).unwrap();
        assert!(json.contains("\"regions\":[]"));
    }

    #[test]
    fn test_faulty_buffer() {
        let mut buf = FaultyBuffer { len: 4 };
        let mut dst = [0u8; 1];
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.copy_to(&mut dst), Err(HostError::Fault));
    }
}
