//! Platform bus for the LED driver.
//!
//! `PlatformBus` owns the registered driver and the devices the board
//! provides. A device that matches the driver is attached as soon as both
//! are present, and detached when either goes away. No global state: the
//! bus is built at startup and passed around by value.

use crate::device::TeardownReport;
use crate::lifecycle::DeviceLifecycle;
use crate::session::SessionHandler;
use gpioled_common::consts::{DRIVER_NAME, OF_COMPATIBLE};
use gpioled_common::hal::config::DriverConfig;
use gpioled_common::hal::error::LedError;
use gpioled_common::hal::host::Host;
use gpioled_common::hal::node::PlatformDevice;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Registration record of a platform driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformDriverInfo {
    /// Driver name, matched against node-less devices.
    pub name: &'static str,
    /// Compatible strings the driver binds to.
    pub of_match: &'static [&'static str],
}

impl PlatformDriverInfo {
    /// True if the driver should bind to `pdev`.
    pub fn matches(&self, pdev: &PlatformDevice) -> bool {
        match &pdev.of_node {
            Some(node) => {
                node.is_enabled() && self.of_match.iter().any(|c| node.is_compatible(c))
            }
            None => pdev.name == self.name,
        }
    }
}

/// The LED driver.
pub const LED_DRIVER: PlatformDriverInfo = PlatformDriverInfo {
    name: DRIVER_NAME,
    of_match: &[OF_COMPATIBLE],
};

/// Bus-level errors.
#[derive(Debug, Error)]
pub enum BusError {
    /// A driver is already registered.
    #[error("Driver '{0}' is already registered")]
    AlreadyRegistered(&'static str),

    /// No driver is registered.
    #[error("No driver registered")]
    NotRegistered,

    /// A device with the same key is already on the bus.
    #[error("Device '{0}' is already present")]
    DuplicateDevice(String),

    /// Attach of a matching device failed.
    #[error("Probe of '{device}' failed: {source}")]
    Probe {
        /// Device key.
        device: String,
        /// Attach error.
        #[source]
        source: LedError,
    },
}

/// Platform bus carrying a single LED driver.
pub struct PlatformBus<H: Host> {
    host: Arc<H>,
    config: DriverConfig,
    driver: Option<PlatformDriverInfo>,
    devices: BTreeMap<String, PlatformDevice>,
    bound: BTreeMap<String, DeviceLifecycle<H>>,
}

impl<H: Host> PlatformBus<H> {
    /// Create an empty bus.
    pub fn new(host: Arc<H>, config: DriverConfig) -> Self {
        Self {
            host,
            config,
            driver: None,
            devices: BTreeMap::new(),
            bound: BTreeMap::new(),
        }
    }

    /// Register `driver` and probe every matching device already present.
    ///
    /// Probe failures are logged; the driver stays registered. The number of
    /// devices bound is returned.
    ///
    /// # Errors
    /// `AlreadyRegistered` if a driver is registered.
    pub fn register_driver(&mut self, driver: PlatformDriverInfo) -> Result<usize, BusError> {
        if let Some(existing) = self.driver {
            return Err(BusError::AlreadyRegistered(existing.name));
        }
        info!("Registering platform driver '{}'", driver.name);
        self.driver = Some(driver);

        let keys: Vec<String> = self.devices.keys().cloned().collect();
        let mut bound = 0;
        for key in keys {
            match self.probe(&key) {
                Ok(true) => bound += 1,
                Ok(false) => {}
                Err(e) => warn!("{}", e),
            }
        }
        Ok(bound)
    }

    /// Detach every bound device and drop the driver.
    ///
    /// # Errors
    /// `NotRegistered` if no driver is registered.
    pub fn unregister_driver(&mut self) -> Result<Vec<(String, TeardownReport)>, BusError> {
        let driver = self.driver.take().ok_or(BusError::NotRegistered)?;
        info!("Unregistering platform driver '{}'", driver.name);

        let reports = std::mem::take(&mut self.bound)
            .into_iter()
            .map(|(key, mut lifecycle)| {
                let report = lifecycle.detach();
                (key, report)
            })
            .collect();
        Ok(reports)
    }

    /// Add `pdev` to the bus and probe it.
    ///
    /// Returns whether the device was bound.
    ///
    /// # Errors
    /// - `DuplicateDevice` if a device with the same key is present
    /// - `Probe` if the device matched but attach failed; the device stays
    ///   on the bus unbound
    pub fn add_device(&mut self, pdev: PlatformDevice) -> Result<bool, BusError> {
        let key = pdev.key().to_string();
        if self.devices.contains_key(&key) {
            return Err(BusError::DuplicateDevice(key));
        }
        debug!("Device '{}' added", key);
        self.devices.insert(key.clone(), pdev);
        self.probe(&key)
    }

    /// Remove the device with `key`, detaching it if bound.
    pub fn remove_device(&mut self, key: &str) -> Option<TeardownReport> {
        self.devices.remove(key)?;
        debug!("Device '{}' removed", key);
        let report = self
            .bound
            .remove(key)
            .map(|mut lifecycle| lifecycle.detach())
            .unwrap_or_default();
        Some(report)
    }

    fn probe(&mut self, key: &str) -> Result<bool, BusError> {
        let (Some(driver), Some(pdev)) = (self.driver, self.devices.get(key)) else {
            return Ok(false);
        };
        if !driver.matches(pdev) {
            debug!("Driver '{}' does not match '{}'", driver.name, key);
            return Ok(false);
        }

        let mut lifecycle = DeviceLifecycle::new(Arc::clone(&self.host), self.config.clone());
        lifecycle.attach(pdev).map_err(|source| BusError::Probe {
            device: key.to_string(),
            source,
        })?;
        self.bound.insert(key.to_string(), lifecycle);
        Ok(true)
    }

    /// Registered driver.
    pub fn driver(&self) -> Option<PlatformDriverInfo> {
        self.driver
    }

    /// Keys of the devices on the bus.
    pub fn devices(&self) -> Vec<&str> {
        self.devices.keys().map(String::as_str).collect()
    }

    /// Keys of the bound devices.
    pub fn bound_devices(&self) -> Vec<&str> {
        self.bound.keys().map(String::as_str).collect()
    }

    /// Lifecycle of a bound device.
    pub fn lifecycle(&self, key: &str) -> Option<&DeviceLifecycle<H>> {
        self.bound.get(key)
    }

    /// Session handler of a bound device.
    pub fn handler(&self, key: &str) -> Option<SessionHandler<H>> {
        self.bound.get(key).and_then(DeviceLifecycle::sessions)
    }
}
