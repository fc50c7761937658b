//! Hardware description as seen by the driver.
//!
//! A [`PlatformDevice`] is what the bus hands to attach. It may carry a
//! [`HardwareNode`], the device-tree style description holding the
//! compatible strings and the named pin property.

use crate::hal::error::LedError;
use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    /// Flags cell of a pin reference.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GpioFlags: u32 {
        /// Line is wired active-low.
        const ACTIVE_LOW = 1 << 0;
        /// Line is open drain.
        const OPEN_DRAIN = 1 << 1;
    }
}

impl Default for GpioFlags {
    fn default() -> Self {
        GpioFlags::empty()
    }
}

impl GpioFlags {
    /// Parse flag names as written in board files (`active-low`, `open-drain`).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        names.iter().try_fold(GpioFlags::empty(), |flags, name| {
            match name.as_ref() {
                "active-low" => Ok(flags | GpioFlags::ACTIVE_LOW),
                "active-high" => Ok(flags),
                "open-drain" => Ok(flags | GpioFlags::OPEN_DRAIN),
                other => Err(format!("unknown gpio flag '{other}'")),
            }
        })
    }
}

/// A pin reference: controller, line offset and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioSpec {
    /// Name of the GPIO controller.
    pub chip: String,
    /// Line offset within the controller.
    pub line: u32,
    /// Flags cell.
    pub flags: GpioFlags,
}

/// Value of a hardware node property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    /// List of pin references.
    Gpios(Vec<GpioSpec>),
    /// String value.
    String(String),
    /// Raw cells that did not parse as anything meaningful.
    Cells(Vec<u32>),
}

/// A node of the hardware description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareNode {
    /// Full path, e.g. `/gpioled`.
    pub path: String,
    /// Compatible strings, most specific first.
    pub compatible: Vec<String>,
    /// `status` property. Absent means enabled.
    pub status: Option<String>,
    /// Remaining properties by name.
    pub properties: BTreeMap<String, Property>,
}

impl HardwareNode {
    /// Create a node with the given path and compatible list.
    pub fn new(path: impl Into<String>, compatible: &[&str]) -> Self {
        Self {
            path: path.into(),
            compatible: compatible.iter().map(|c| c.to_string()).collect(),
            status: None,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property insertion.
    pub fn with_property(mut self, name: impl Into<String>, value: Property) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// True if any compatible string equals `compatible`.
    pub fn is_compatible(&self, compatible: &str) -> bool {
        self.compatible.iter().any(|c| c == compatible)
    }

    /// True unless `status` says otherwise.
    pub fn is_enabled(&self) -> bool {
        matches!(self.status.as_deref(), None | Some("okay") | Some("ok"))
    }

    /// The `index`-th pin reference of property `name`.
    ///
    /// # Errors
    /// `LedError::MissingPinSpec` if the property is absent, is not a pin
    /// list, or has fewer than `index + 1` entries.
    pub fn gpio_spec(&self, name: &str, index: usize) -> Result<&GpioSpec, LedError> {
        match self.properties.get(name) {
            Some(Property::Gpios(specs)) => specs
                .get(index)
                .ok_or_else(|| LedError::MissingPinSpec(name.to_string())),
            _ => Err(LedError::MissingPinSpec(name.to_string())),
        }
    }
}

/// Device discovered by the bus and handed to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDevice {
    /// Device name (used for name matching without a hardware node).
    pub name: String,
    /// Hardware node the device was created from, if any.
    pub of_node: Option<HardwareNode>,
}

impl PlatformDevice {
    /// Device created from a hardware node; named after the node path.
    pub fn from_node(node: HardwareNode) -> Self {
        let name = node
            .path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("platform")
            .to_string();
        Self {
            name,
            of_node: Some(node),
        }
    }

    /// Device without a hardware node.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            of_node: None,
        }
    }

    /// Key the bus tracks bindings by: node path, or name without a node.
    pub fn key(&self) -> &str {
        self.of_node
            .as_ref()
            .map(|n| n.path.as_str())
            .unwrap_or(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{LED_GPIO_PROPERTY, OF_COMPATIBLE};

    fn led_node() -> HardwareNode {
        HardwareNode::new("/gpioled", &[OF_COMPATIBLE]).with_property(
            LED_GPIO_PROPERTY,
            Property::Gpios(vec![GpioSpec {
                chip: "gpio1".to_string(),
                line: 3,
                flags: GpioFlags::ACTIVE_LOW,
            }]),
        )
    }

    #[test]
    fn test_gpio_spec_lookup() {
        let node = led_node();
        let spec = node.gpio_spec(LED_GPIO_PROPERTY, 0).unwrap();
        assert_eq!(spec.chip, "gpio1");
        assert_eq!(spec.line, 3);
        assert!(spec.flags.contains(GpioFlags::ACTIVE_LOW));
    }

    #[test]
    fn test_gpio_spec_missing_or_malformed() {
        let node = led_node();
        assert!(matches!(
            node.gpio_spec(LED_GPIO_PROPERTY, 1),
            Err(LedError::MissingPinSpec(_))
        ));
        assert!(matches!(
            node.gpio_spec("reset-gpios", 0),
            Err(LedError::MissingPinSpec(_))
        ));

        let bad = HardwareNode::new("/gpioled", &[OF_COMPATIBLE])
            .with_property(LED_GPIO_PROPERTY, Property::Cells(vec![1, 3]));
        assert!(matches!(
            bad.gpio_spec(LED_GPIO_PROPERTY, 0),
            Err(LedError::MissingPinSpec(_))
        ));
    }

    #[test]
    fn test_node_status() {
        let mut node = led_node();
        assert!(node.is_enabled());
        node.status = Some("disabled".to_string());
        assert!(!node.is_enabled());
        assert!(node.is_compatible(OF_COMPATIBLE));
        assert!(!node.is_compatible("gpio-leds"));
    }

    #[test]
    fn test_gpio_flags_from_names() {
        let flags = GpioFlags::from_names(&["active-low", "open-drain"]).unwrap();
        assert_eq!(flags, GpioFlags::ACTIVE_LOW | GpioFlags::OPEN_DRAIN);
        assert_eq!(GpioFlags::from_names::<&str>(&[]).unwrap(), GpioFlags::empty());
        assert!(GpioFlags::from_names(&["pull-up"]).is_err());
    }

    #[test]
    fn test_platform_device_key() {
        let dev = PlatformDevice::from_node(led_node());
        assert_eq!(dev.name, "gpioled");
        assert_eq!(dev.key(), "/gpioled");
        assert_eq!(PlatformDevice::named("imx6ull-led").key(), "imx6ull-led");
    }
}
