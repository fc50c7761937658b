//! Board and driver configuration.
//!
//! This module contains the configuration types loaded from a board file:
//! - `BoardConfig` - GPIO controllers, hardware nodes and driver settings
//! - `DriverConfig` - Settings of the LED driver itself
//! - `GpioChipConfig` / `NodeConfig` / `GpioPropertyConfig` - Hardware description
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "imx6ull-board"
//!
//! [driver]
//! static_major = 240
//!
//! [[gpio_chips]]
//! name = "gpio1"
//! base = 0
//! ngpio = 32
//!
//! [[nodes]]
//! path = "/gpioled"
//! compatible = ["alientek, gpioled"]
//! led_gpios = [{ chip = "gpio1", line = 3, flags = ["active-low"] }]
//! ```

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{LED_GPIO_PROPERTY, MAX_CHIP_LINES, MAX_MAJOR};
use crate::hal::node::{GpioFlags, GpioSpec, HardwareNode, PlatformDevice, Property};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// LED driver settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    /// Pre-configured major number. When absent a major is allocated
    /// dynamically at attach time.
    #[serde(default)]
    pub static_major: Option<u32>,
}

impl DriverConfig {
    /// Validate the driver settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.static_major {
            Some(0) => Err(ConfigError::ValidationError(
                "static_major must be non-zero (omit it for dynamic allocation)".to_string(),
            )),
            Some(major) if major > MAX_MAJOR => Err(ConfigError::ValidationError(format!(
                "static_major {major} exceeds maximum {MAX_MAJOR}"
            ))),
            _ => Ok(()),
        }
    }
}

/// One GPIO controller of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpioChipConfig {
    /// Controller name referenced by pin properties.
    pub name: String,
    /// Global number of the first line.
    pub base: u32,
    /// Number of lines.
    pub ngpio: u32,
}

impl GpioChipConfig {
    /// One past the last global line number, `None` if it does not fit.
    pub fn end(&self) -> Option<u32> {
        self.base.checked_add(self.ngpio)
    }

    /// Validate the line range.
    ///
    /// `ngpio` must be in `1..=MAX_CHIP_LINES` and `base + ngpio` must fit
    /// in a global line number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ngpio == 0 {
            return Err(ConfigError::ValidationError(format!(
                "gpio chip {} has no lines",
                self.name
            )));
        }
        if self.ngpio > MAX_CHIP_LINES {
            return Err(ConfigError::ValidationError(format!(
                "gpio chip {} declares {} lines (maximum {MAX_CHIP_LINES})",
                self.name, self.ngpio
            )));
        }
        if self.end().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "gpio chip {} line range overflows (base {}, {} lines)",
                self.name, self.base, self.ngpio
            )));
        }
        Ok(())
    }
}

/// One entry of a pin property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpioPropertyConfig {
    /// Controller name.
    pub chip: String,
    /// Line offset within the controller.
    pub line: u32,
    /// Flag names (`active-low`, `active-high`, `open-drain`).
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A hardware node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Absolute node path.
    pub path: String,
    /// Compatible strings.
    pub compatible: Vec<String>,
    /// Optional status (`okay`, `disabled`).
    #[serde(default)]
    pub status: Option<String>,
    /// The `led-gpios` property. Omitted or empty means the property is absent.
    #[serde(default)]
    pub led_gpios: Vec<GpioPropertyConfig>,
}

impl NodeConfig {
    /// Build the platform device the bus would create for this node.
    pub fn to_device(&self) -> Result<PlatformDevice, ConfigError> {
        let mut properties = BTreeMap::new();
        if !self.led_gpios.is_empty() {
            let specs = self
                .led_gpios
                .iter()
                .map(|g| {
                    let flags = GpioFlags::from_names(g.flags.as_slice()).map_err(|e| {
                        ConfigError::ValidationError(format!("{}: {e}", self.path))
                    })?;
                    Ok(GpioSpec {
                        chip: g.chip.clone(),
                        line: g.line,
                        flags,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            properties.insert(LED_GPIO_PROPERTY.to_string(), Property::Gpios(specs));
        }

        Ok(PlatformDevice::from_node(HardwareNode {
            path: self.path.clone(),
            compatible: self.compatible.clone(),
            status: self.status.clone(),
            properties,
        }))
    }
}

/// Board description loaded from a board file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Shared settings.
    #[serde(default)]
    pub shared: SharedConfig,

    /// LED driver settings.
    #[serde(default)]
    pub driver: DriverConfig,

    /// GPIO controllers.
    #[serde(default)]
    pub gpio_chips: Vec<GpioChipConfig>,

    /// Hardware nodes.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Platform devices registered by name, without a hardware node.
    #[serde(default)]
    pub named_devices: Vec<String>,
}

impl BoardConfig {
    /// Validate the board description.
    ///
    /// # Validation Rules
    /// 1. Shared and driver sections are valid
    /// 2. Controller names unique, `ngpio` in `1..=MAX_CHIP_LINES`, line
    ///    ranges in bounds and disjoint
    /// 3. Node paths absolute and unique, compatible list non-empty
    /// 4. Pin flag names known
    ///
    /// Pin references to unknown controllers are not rejected here; they
    /// fail at attach time like any other unresolvable pin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.driver.validate()?;

        let mut chip_names = HashSet::new();
        for chip in &self.gpio_chips {
            if !chip_names.insert(chip.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate gpio chip name: {}",
                    chip.name
                )));
            }
            chip.validate()?;
        }

        let mut ranges: Vec<&GpioChipConfig> = self.gpio_chips.iter().collect();
        ranges.sort_by_key(|c| c.base);
        for pair in ranges.windows(2) {
            if pair[0].end().is_none_or(|end| end > pair[1].base) {
                return Err(ConfigError::ValidationError(format!(
                    "gpio chips {} and {} overlap",
                    pair[0].name, pair[1].name
                )));
            }
        }

        let mut paths = HashSet::new();
        for node in &self.nodes {
            if !node.path.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "Node path must be absolute: {}",
                    node.path
                )));
            }
            if !paths.insert(node.path.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate node path: {}",
                    node.path
                )));
            }
            if node.compatible.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Node {} has an empty compatible list",
                    node.path
                )));
            }
            node.to_device()?;
        }

        Ok(())
    }

    /// All platform devices described by the board, nodes first.
    pub fn devices(&self) -> Result<Vec<PlatformDevice>, ConfigError> {
        let mut devices = self
            .nodes
            .iter()
            .map(NodeConfig::to_device)
            .collect::<Result<Vec<_>, _>>()?;
        devices.extend(self.named_devices.iter().map(PlatformDevice::named));
        Ok(devices)
    }
}
