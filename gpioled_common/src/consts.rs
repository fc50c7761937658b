//! Driver-wide constants.
//!
//! Single source of truth for registration names, the matching key and the
//! one-byte command protocol.

use static_assertions::const_assert_ne;

/// Name of the device number range, the device class and the device node.
pub const DEVICE_NAME: &str = "dtsplatled";

/// Number of minors reserved for the device.
pub const DEVICE_COUNT: u32 = 1;

/// Platform driver name. Used for matching when a device has no hardware node.
pub const DRIVER_NAME: &str = "imx6ull-led";

/// Compatible string the driver binds to.
pub const OF_COMPATIBLE: &str = "alientek, gpioled";

/// Name of the pin property in the hardware node. Also the claim label.
pub const LED_GPIO_PROPERTY: &str = "led-gpios";

/// Command byte: LED off.
pub const LED_OFF: u8 = 0;

/// Command byte: LED on.
pub const LED_ON: u8 = 1;

const_assert_ne!(LED_ON, LED_OFF);

/// Bits used by the minor part of an encoded device number.
pub const MINOR_BITS: u32 = 20;

/// Mask for the minor part of an encoded device number.
pub const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Largest major number a device can use.
pub const MAX_MAJOR: u32 = 4095;

/// Most lines a single GPIO controller may declare.
pub const MAX_CHIP_LINES: u32 = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(DEVICE_COUNT > 0);
        assert!(!DEVICE_NAME.is_empty());
        assert!(OF_COMPATIBLE.contains("gpioled"));
    }

    #[test]
    fn major_fits_above_minor_bits() {
        assert!(MAX_MAJOR <= u32::MAX >> MINOR_BITS);
    }
}
