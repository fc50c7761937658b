//! Device resources and the shared device instance.
//!
//! Resources are acquired in a fixed order and recorded in [`DeviceState`]:
//!
//! ```text
//! identity ─► interface ─► class ─► node ─► pin
//! ```
//!
//! [`DeviceState::teardown`] walks the same list backwards and releases
//! whatever is populated. Attach rollback and detach both go through it.

use gpioled_common::consts::{DEVICE_COUNT, DEVICE_NAME, MAX_MAJOR};
use gpioled_common::hal::error::LedError;
use gpioled_common::hal::host::{DeviceNumbers, GpioController, Host, HostError};
use gpioled_common::hal::types::{ClassHandle, Command, DeviceNumber, Level, NodeHandle, PinId};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Device number range owned by the device.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    number: DeviceNumber,
    count: u32,
    is_static: bool,
}

impl DeviceIdentity {
    /// Obtain the device number range.
    ///
    /// With `static_major` the exact range `(major, 0)` is registered,
    /// otherwise a range is allocated and the assigned number read back.
    ///
    /// # Errors
    /// `AddressExhausted` when the host has nothing left to hand out,
    /// `AddressConflict` when the requested range is taken or the major is
    /// not encodable (zero or above `MAX_MAJOR`).
    pub fn acquire<H: DeviceNumbers + ?Sized>(
        host: &H,
        static_major: Option<u32>,
    ) -> Result<Self, LedError> {
        let (number, is_static) = match static_major {
            Some(major) if major == 0 || major > MAX_MAJOR => {
                return Err(LedError::AddressConflict(HostError::InvalidArgument(
                    format!("major {major} outside 1..={MAX_MAJOR}"),
                )));
            }
            Some(major) => {
                let number = DeviceNumber::new(major, 0);
                host.register_region(number, DEVICE_COUNT, DEVICE_NAME)
                    .map_err(classify_region_error)?;
                (number, true)
            }
            None => {
                let number = host
                    .alloc_region(0, DEVICE_COUNT, DEVICE_NAME)
                    .map_err(classify_region_error)?;
                (number, false)
            }
        };

        Ok(Self {
            number,
            count: DEVICE_COUNT,
            is_static,
        })
    }

    /// First device number of the range.
    pub fn number(&self) -> DeviceNumber {
        self.number
    }

    /// Major number.
    pub fn major(&self) -> u32 {
        self.number.major
    }

    /// Minor number.
    pub fn minor(&self) -> u32 {
        self.number.minor
    }

    /// Number of minors in the range.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// True if the range came from a pre-configured major.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Return the range to the host. Consumes the identity.
    pub fn release<H: DeviceNumbers + ?Sized>(self, host: &H) -> Result<(), HostError> {
        host.unregister_region(self.number, self.count)
    }
}

fn classify_region_error(err: HostError) -> LedError {
    match err {
        HostError::NoSpace => LedError::AddressExhausted(err),
        other => LedError::AddressConflict(other),
    }
}

/// Exclusive claim on one GPIO line.
pub struct GpioHandle<H: GpioController> {
    host: Arc<H>,
    pin: PinId,
    label: String,
    configured: bool,
}

impl<H: GpioController> GpioHandle<H> {
    /// Claim `pin` under `label`.
    ///
    /// # Errors
    /// `PinBusy` if the host refuses the claim.
    pub fn claim(host: Arc<H>, pin: PinId, label: &str) -> Result<Self, LedError> {
        host.request(pin, label).map_err(LedError::PinBusy)?;
        trace!("Claimed {} as '{}'", pin, label);
        Ok(Self {
            host,
            pin,
            label: label.to_string(),
            configured: false,
        })
    }

    /// Configure the line as an output starting at `initial`.
    pub fn configure_output(&mut self, initial: Level) -> Result<(), LedError> {
        self.host
            .direction_output(self.pin, initial)
            .map_err(LedError::PinConfigFailed)?;
        self.configured = true;
        Ok(())
    }

    /// Drive the line high.
    pub fn set(&self) {
        self.drive(Level::High);
    }

    /// Drive the line low.
    pub fn clear(&self) {
        self.drive(Level::Low);
    }

    /// Drive the line to `level`.
    pub fn drive(&self, level: Level) {
        trace!("{} <- {}", self.pin, level);
        self.host.set_value(self.pin, level);
    }

    /// Level the line currently sits at.
    pub fn level(&self) -> Level {
        self.host.get_value(self.pin)
    }

    /// Global pin number.
    pub fn pin(&self) -> PinId {
        self.pin
    }

    /// Claim label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True once the line is an output.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Give the line back. Consumes the handle.
    pub fn release(self) -> Result<(), HostError> {
        self.host.free(self.pin)
    }
}

impl<H: GpioController> std::fmt::Debug for GpioHandle<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioHandle")
            .field("pin", &self.pin)
            .field("label", &self.label)
            .field("configured", &self.configured)
            .finish()
    }
}

/// Outcome of a teardown. Failures are recorded, never propagated.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Steps released successfully, in release order.
    pub released: Vec<&'static str>,
    /// Steps whose release failed.
    pub failed: Vec<(&'static str, HostError)>,
}

impl TeardownReport {
    /// True if every populated step was released without error.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, step: &'static str, result: Result<(), HostError>) {
        match result {
            Ok(()) => {
                debug!("Released {}", step);
                self.released.push(step);
            }
            Err(e) => {
                warn!("Failed to release {}: {}", step, e);
                self.failed.push((step, e));
            }
        }
    }
}

/// Resources held by an attached (or attaching) device.
///
/// Fields are populated in declaration order. A populated field implies
/// every field before it is populated too.
pub struct DeviceState<H: GpioController> {
    pub(crate) identity: Option<DeviceIdentity>,
    pub(crate) interface_registered: bool,
    pub(crate) class: Option<ClassHandle>,
    pub(crate) node: Option<NodeHandle>,
    pub(crate) pin: Option<GpioHandle<H>>,
}

impl<H: Host> DeviceState<H> {
    /// Empty state: nothing acquired.
    pub fn new() -> Self {
        Self {
            identity: None,
            interface_registered: false,
            class: None,
            node: None,
            pin: None,
        }
    }

    /// Number of acquisition steps currently held.
    pub fn acquired(&self) -> usize {
        self.populated().iter().take_while(|held| **held).count()
    }

    /// Check the ordering invariant.
    pub fn is_consistent(&self) -> bool {
        let populated = self.populated();
        populated.windows(2).all(|w| w[0] || !w[1])
    }

    /// True when nothing is held.
    pub fn is_empty(&self) -> bool {
        !self.populated().iter().any(|held| *held)
    }

    /// Device number range, if acquired.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Claimed pin, if any.
    pub fn pin(&self) -> Option<&GpioHandle<H>> {
        self.pin.as_ref()
    }

    /// Device node handle, if created.
    pub fn node(&self) -> Option<NodeHandle> {
        self.node
    }

    fn populated(&self) -> [bool; 5] {
        [
            self.identity.is_some(),
            self.interface_registered,
            self.class.is_some(),
            self.node.is_some(),
            self.pin.is_some(),
        ]
    }

    /// Release everything held, most recent first.
    ///
    /// A configured pin is driven to the inactive level before it is freed.
    /// Every step is attempted even when an earlier one fails; the state is
    /// empty afterwards.
    pub fn teardown(&mut self, host: &H) -> TeardownReport {
        debug_assert!(self.is_consistent());
        let mut report = TeardownReport::default();
        let number = self.identity.as_ref().map(DeviceIdentity::number);

        if let Some(pin) = self.pin.take() {
            if pin.is_configured() {
                pin.drive(Command::Off.level());
            }
            report.record("pin", pin.release());
        }

        if self.node.take().is_some() {
            if let (Some(class), Some(number)) = (self.class, number) {
                report.record("device node", host.device_destroy(class, number));
            }
        }

        if let Some(class) = self.class.take() {
            report.record("device class", host.class_destroy(class));
        }

        if std::mem::take(&mut self.interface_registered) {
            if let Some(number) = number {
                report.record("character interface", host.cdev_del(number));
            }
        }

        if let Some(identity) = self.identity.take() {
            report.record("device number range", identity.release(host));
        }

        report
    }
}

impl<H: Host> Default for DeviceState<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The attached device, shared between the lifecycle and open sessions.
pub struct LedDevice<H: Host> {
    host: Arc<H>,
    state: RwLock<DeviceState<H>>,
}

impl<H: Host> LedDevice<H> {
    pub(crate) fn new(host: Arc<H>, state: DeviceState<H>) -> Self {
        Self {
            host,
            state: RwLock::new(state),
        }
    }

    /// Drive the LED according to `command`.
    ///
    /// Writers are not serialized against each other; the last write wins.
    ///
    /// # Errors
    /// `NoDevice` once the device has been detached.
    pub fn switch(&self, command: Command) -> Result<(), LedError> {
        let state = self.state.read();
        let pin = state.pin.as_ref().ok_or(LedError::NoDevice)?;
        debug!("LED {} ({} <- {})", command, pin.pin(), command.level());
        pin.drive(command.level());
        Ok(())
    }

    /// Current pin level, `None` after detach.
    pub fn level(&self) -> Option<Level> {
        self.state.read().pin.as_ref().map(GpioHandle::level)
    }

    /// Device number, `None` after detach.
    pub fn number(&self) -> Option<DeviceNumber> {
        self.state.read().identity.as_ref().map(DeviceIdentity::number)
    }

    /// Claimed pin, `None` after detach.
    pub fn pin(&self) -> Option<PinId> {
        self.state.read().pin.as_ref().map(GpioHandle::pin)
    }

    /// True while the device holds its resources.
    pub fn is_attached(&self) -> bool {
        !self.state.read().is_empty()
    }

    /// Tear the device down. Waits for in-flight writes.
    pub(crate) fn shutdown(&self) -> TeardownReport {
        let mut state = self.state.write();
        state.teardown(&self.host)
    }
}

impl<H: Host> std::fmt::Debug for LedDevice<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LedDevice")
            .field("number", &state.identity.as_ref().map(DeviceIdentity::number))
            .field("pin", &state.pin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulation::{HostOp, SimHost};
    use gpioled_common::hal::host::{CharDevices, DeviceClasses};

    fn host() -> Arc<SimHost> {
        Arc::new(SimHost::new().with_chip("gpio1", 0, 32))
    }

    fn full_state(host: &Arc<SimHost>) -> DeviceState<SimHost> {
        let mut state = DeviceState::new();
        let identity = DeviceIdentity::acquire(host.as_ref(), None).unwrap();
        let number = identity.number();
        state.identity = Some(identity);
        host.cdev_add(number, DEVICE_COUNT).unwrap();
        state.interface_registered = true;
        let class = host.class_create(DEVICE_NAME).unwrap();
        state.class = Some(class);
        state.node = Some(host.device_create(class, number, DEVICE_NAME).unwrap());
        let mut pin = GpioHandle::claim(Arc::clone(host), PinId(3), "led-gpios").unwrap();
        pin.configure_output(Level::High).unwrap();
        pin.clear();
        state.pin = Some(pin);
        state
    }

    #[test]
    fn test_identity_static_and_dynamic() {
        let host = host();
        let fixed = DeviceIdentity::acquire(host.as_ref(), Some(240)).unwrap();
        assert_eq!(fixed.number(), DeviceNumber::new(240, 0));
        assert!(fixed.is_static());

        let dynamic = DeviceIdentity::acquire(host.as_ref(), None).unwrap();
        assert!(!dynamic.is_static());
        assert_ne!(dynamic.major(), 240);
        assert_eq!(dynamic.minor(), 0);

        fixed.release(host.as_ref()).unwrap();
        dynamic.release(host.as_ref()).unwrap();
        assert!(host.snapshot().regions.is_empty());
    }

    #[test]
    fn test_identity_conflict_and_exhaustion() {
        let host = host();
        let first = DeviceIdentity::acquire(host.as_ref(), Some(240)).unwrap();
        assert!(matches!(
            DeviceIdentity::acquire(host.as_ref(), Some(240)),
            Err(LedError::AddressConflict(_))
        ));

        host.fail_next(HostOp::AllocRegion, HostError::NoSpace);
        assert!(matches!(
            DeviceIdentity::acquire(host.as_ref(), None),
            Err(LedError::AddressExhausted(_))
        ));
        first.release(host.as_ref()).unwrap();
    }

    #[test]
    fn test_identity_rejects_unencodable_major() {
        let host = host();
        for major in [0, MAX_MAJOR + 1, MAX_MAJOR + 241] {
            assert!(matches!(
                DeviceIdentity::acquire(host.as_ref(), Some(major)),
                Err(LedError::AddressConflict(HostError::InvalidArgument(_)))
            ));
        }
        assert!(host.snapshot().regions.is_empty());

        let top = DeviceIdentity::acquire(host.as_ref(), Some(MAX_MAJOR)).unwrap();
        assert_eq!(top.major(), MAX_MAJOR);
        top.release(host.as_ref()).unwrap();
    }

    #[test]
    fn test_gpio_handle_claim_is_exclusive() {
        let host = host();
        let handle = GpioHandle::claim(Arc::clone(&host), PinId(5), "led-gpios").unwrap();
        assert!(matches!(
            GpioHandle::claim(Arc::clone(&host), PinId(5), "other"),
            Err(LedError::PinBusy(_))
        ));
        handle.release().unwrap();
        let again = GpioHandle::claim(Arc::clone(&host), PinId(5), "other").unwrap();
        again.release().unwrap();
    }

    #[test]
    fn test_gpio_handle_set_clear() {
        let host = host();
        let mut handle = GpioHandle::claim(Arc::clone(&host), PinId(1), "led-gpios").unwrap();
        handle.configure_output(Level::High).unwrap();
        assert_eq!(handle.level(), Level::High);
        handle.clear();
        assert_eq!(handle.level(), Level::Low);
        handle.set();
        assert_eq!(handle.level(), Level::High);
        handle.release().unwrap();
    }

    #[test]
    fn test_state_ordering_invariant() {
        let mut state: DeviceState<SimHost> = DeviceState::new();
        assert!(state.is_consistent());
        assert!(state.is_empty());
        state.interface_registered = true;
        assert!(!state.is_consistent());
        assert_eq!(state.acquired(), 0);
    }

    #[test]
    fn test_teardown_releases_everything_in_reverse() {
        let host = host();
        let mut state = full_state(&host);
        assert!(state.is_consistent());
        assert_eq!(state.acquired(), 5);

        let report = state.teardown(&host);
        assert!(report.is_clean());
        assert_eq!(
            report.released,
            vec![
                "pin",
                "device node",
                "device class",
                "character interface",
                "device number range"
            ]
        );
        assert!(state.is_empty());
        assert!(host.snapshot().is_quiescent());
        assert_eq!(host.level_history(PinId(3)).last(), Some(&Level::High));
    }

    #[test]
    fn test_teardown_continues_past_failures() {
        let host = host();
        let mut state = full_state(&host);
        host.fail_next(HostOp::ClassDestroy, HostError::Busy("class".to_string()));

        let report = state.teardown(&host);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "device class");
        assert_eq!(report.released.len(), 4);
        assert!(state.is_empty());
    }
}
