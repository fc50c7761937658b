//! Device lifecycle: attach and detach.
//!
//! `DeviceLifecycle` walks the acquisition chain on attach and hands out the
//! shared [`LedDevice`] on success. On any failure everything acquired so
//! far is released in reverse order before the error is returned, so an
//! attach either completes or leaves nothing behind.
//!
//! # States
//!
//! ```text
//! Unattached ──attach──► Attaching{n} ──ok──► Attached ──detach──► Detaching ──► Unattached
//!                             │
//!                             └──err (rollback)──► Unattached
//! ```

use crate::device::{DeviceIdentity, DeviceState, GpioHandle, LedDevice, TeardownReport};
use crate::session::SessionHandler;
use gpioled_common::consts::{DEVICE_COUNT, DEVICE_NAME, LED_GPIO_PROPERTY};
use gpioled_common::hal::config::DriverConfig;
use gpioled_common::hal::error::LedError;
use gpioled_common::hal::host::Host;
use gpioled_common::hal::node::PlatformDevice;
use gpioled_common::hal::types::{Command, DeviceNumber};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Acquisition steps of attach, in order.
pub const ATTACH_STEPS: [&str; 6] = [
    "device number range",
    "character interface",
    "device class",
    "device node",
    "pin claim",
    "pin output",
];

/// Where the lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// No resources held.
    Unattached,
    /// Attach in progress; `completed` steps of [`ATTACH_STEPS`] done.
    Attaching {
        /// Number of completed acquisition steps.
        completed: usize,
    },
    /// Fully attached; sessions may open.
    Attached,
    /// Detach in progress.
    Detaching,
}

/// Lifecycle of one LED device bound to one platform device.
pub struct DeviceLifecycle<H: Host> {
    host: Arc<H>,
    config: DriverConfig,
    phase: LifecyclePhase,
    device: Option<Arc<LedDevice<H>>>,
}

impl<H: Host> DeviceLifecycle<H> {
    /// Create an unattached lifecycle.
    pub fn new(host: Arc<H>, config: DriverConfig) -> Self {
        Self {
            host,
            config,
            phase: LifecyclePhase::Unattached,
            device: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// True while attached.
    pub fn is_attached(&self) -> bool {
        self.device.is_some()
    }

    /// The attached device.
    pub fn device(&self) -> Option<&Arc<LedDevice<H>>> {
        self.device.as_ref()
    }

    /// Device number of the attached device.
    pub fn number(&self) -> Option<DeviceNumber> {
        self.device.as_ref().and_then(|d| d.number())
    }

    /// Open/write/release table for the attached device.
    pub fn sessions(&self) -> Option<SessionHandler<H>> {
        self.device.as_ref().map(|d| SessionHandler::new(Arc::clone(d)))
    }

    /// Attach to `pdev`.
    ///
    /// Steps: device numbers, character interface, class, node, pin lookup
    /// and claim, output configuration, LED on.
    ///
    /// # Errors
    /// The first failing step's error, after full rollback. `AlreadyAttached`
    /// if called while attached.
    pub fn attach(&mut self, pdev: &PlatformDevice) -> Result<Arc<LedDevice<H>>, LedError> {
        if self.device.is_some() {
            warn!("Attach of {} refused: already attached", pdev.name);
            return Err(LedError::AlreadyAttached);
        }

        info!("LED probe: {}", pdev.name);
        self.phase = LifecyclePhase::Attaching { completed: 0 };
        let mut state = DeviceState::new();

        match self.acquire(pdev, &mut state) {
            Ok(()) => {
                let device = Arc::new(LedDevice::new(Arc::clone(&self.host), state));
                self.device = Some(Arc::clone(&device));
                self.phase = LifecyclePhase::Attached;
                info!("LED device {} attached", pdev.name);
                Ok(device)
            }
            Err(e) => {
                let completed = state.acquired();
                error!(
                    "Attach of {} failed after {} step(s): {}",
                    pdev.name, completed, e
                );
                let report = state.teardown(&self.host);
                if !report.is_clean() {
                    warn!("Rollback left {} step(s) unreleased", report.failed.len());
                }
                self.phase = LifecyclePhase::Unattached;
                Err(e)
            }
        }
    }

    fn advance(&mut self) {
        if let LifecyclePhase::Attaching { completed } = &mut self.phase {
            debug!("Attach step done: {}", ATTACH_STEPS[*completed]);
            *completed += 1;
        }
    }

    fn acquire(&mut self, pdev: &PlatformDevice, state: &mut DeviceState<H>) -> Result<(), LedError> {
        let host = Arc::clone(&self.host);

        // 1. Device number range
        let identity = DeviceIdentity::acquire(host.as_ref(), self.config.static_major)?;
        let number = identity.number();
        info!("major: {}, minor: {}", identity.major(), identity.minor());
        state.identity = Some(identity);
        self.advance();

        // 2. Character interface
        host.cdev_add(number, DEVICE_COUNT)
            .map_err(LedError::InterfaceRegistrationFailed)?;
        state.interface_registered = true;
        self.advance();

        // 3. Class and node
        let class = host
            .class_create(DEVICE_NAME)
            .map_err(LedError::ClassCreationFailed)?;
        state.class = Some(class);
        self.advance();

        let node = host
            .device_create(class, number, DEVICE_NAME)
            .map_err(LedError::NodeCreationFailed)?;
        state.node = Some(node);
        self.advance();

        // 4. Hardware binding
        let of_node = pdev.of_node.as_ref().ok_or(LedError::MissingHardwareNode)?;
        let spec = of_node.gpio_spec(LED_GPIO_PROPERTY, 0)?;
        if !spec.flags.is_empty() {
            debug!("{} flags {:?} ignored, driver inverts", LED_GPIO_PROPERTY, spec.flags);
        }
        let pin = host.resolve(spec).map_err(|e| {
            debug!("{} does not resolve: {}", LED_GPIO_PROPERTY, e);
            LedError::MissingPinSpec(LED_GPIO_PROPERTY.to_string())
        })?;

        let handle = state
            .pin
            .insert(GpioHandle::claim(Arc::clone(&host), pin, LED_GPIO_PROPERTY)?);
        self.advance();

        handle.configure_output(Command::Off.level())?;

        // 5. LED on as the ready state
        handle.drive(Command::On.level());
        self.advance();

        Ok(())
    }

    /// Detach. Total and infallible: every release is attempted, failures
    /// are logged and reported, never returned as errors. Sessions still
    /// open see `NoDevice` afterwards.
    pub fn detach(&mut self) -> TeardownReport {
        let Some(device) = self.device.take() else {
            warn!("Detach on unattached device ignored");
            return TeardownReport::default();
        };

        info!("LED remove");
        self.phase = LifecyclePhase::Detaching;
        let report = device.shutdown();
        for (step, err) in &report.failed {
            warn!("Detach: {} not released cleanly: {}", step, err);
        }
        self.phase = LifecyclePhase::Unattached;
        report
    }
}

impl<H: Host> Drop for DeviceLifecycle<H> {
    fn drop(&mut self) {
        if self.device.is_some() {
            self.detach();
        }
    }
}
