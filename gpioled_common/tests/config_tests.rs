//! Board file loading tests.
//!
//! Load from disk, defaults for omitted sections, validation of chips,
//! nodes, pin flags and the static major bounds.

use gpioled_common::config::{ConfigError, ConfigLoader, LogLevel};
use gpioled_common::consts::{
    DEVICE_NAME, LED_GPIO_PROPERTY, MAX_CHIP_LINES, MAX_MAJOR, OF_COMPATIBLE,
};
use gpioled_common::hal::config::BoardConfig;
use gpioled_common::hal::error::LedError;
use gpioled_common::hal::node::GpioFlags;
use std::fs;
use tempfile::TempDir;

/// Write `content` as `board.toml` and load it.
fn load(content: &str) -> Result<BoardConfig, ConfigError> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("board.toml");
    fs::write(&path, content).unwrap();
    BoardConfig::load(&path)
}

const FULL: &str = r#"
named_devices = ["imx6ull-led"]

[shared]
log_level = "warn"
service_name = "imx6ull"

[driver]
static_major = 200

[[gpio_chips]]
name = "gpio1"
base = 0
ngpio = 32

[[nodes]]
path = "/gpioled"
compatible = ["alientek, gpioled"]
status = "okay"
led_gpios = [{ chip = "gpio1", line = 3, flags = ["active-low", "open-drain"] }]

[[nodes]]
path = "/soc/leds/user"
compatible = ["gpio-leds"]
"#;

#[test]
fn test_full_board() {
    let board = load(FULL).unwrap();
    board.validate().unwrap();

    assert_eq!(board.shared.log_level, LogLevel::Warn);
    assert_eq!(board.driver.static_major, Some(200));

    let devices = board.devices().unwrap();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].name, "gpioled");
    assert_eq!(devices[1].name, "user");
    assert_eq!(devices[2].key(), "imx6ull-led");
    assert!(devices[2].of_node.is_none());

    let node = devices[0].of_node.as_ref().unwrap();
    assert!(node.is_enabled());
    assert!(node.is_compatible(OF_COMPATIBLE));
    let spec = node.gpio_spec(LED_GPIO_PROPERTY, 0).unwrap();
    assert_eq!(spec.flags, GpioFlags::ACTIVE_LOW | GpioFlags::OPEN_DRAIN);
    assert!(matches!(
        node.gpio_spec(LED_GPIO_PROPERTY, 1),
        Err(LedError::MissingPinSpec(_))
    ));
}

#[test]
fn test_empty_board_uses_defaults() {
    let board = load("").unwrap();
    board.validate().unwrap();
    assert_eq!(board.shared.service_name, DEVICE_NAME);
    assert_eq!(board.shared.log_level, LogLevel::Info);
    assert_eq!(board.driver.static_major, None);
    assert!(board.devices().unwrap().is_empty());
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        BoardConfig::load(&dir.path().join("absent.toml")),
        Err(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn test_duplicate_chip_rejected() {
    let board = load(
        r#"
[[gpio_chips]]
name = "gpio1"
base = 0
ngpio = 32

[[gpio_chips]]
name = "gpio1"
base = 32
ngpio = 32
"#,
    )
    .unwrap();
    assert!(matches!(
        board.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("Duplicate gpio chip")
    ));
}

#[test]
fn test_empty_chip_rejected() {
    let board = load("[[gpio_chips]]\nname = \"gpio1\"\nbase = 0\nngpio = 0\n").unwrap();
    assert!(board.validate().is_err());
}

#[test]
fn test_chip_line_range_overflow_rejected() {
    let board = load(
        r#"
[[gpio_chips]]
name = "gpio1"
base = 4294967290
ngpio = 32

[[nodes]]
path = "/gpioled"
compatible = ["alientek, gpioled"]
led_gpios = [{ chip = "gpio1", line = 20 }]
"#,
    )
    .unwrap();
    assert!(matches!(
        board.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("overflows")
    ));
}

#[test]
fn test_chip_line_count_capped() {
    let board = load(&format!(
        "[[gpio_chips]]\nname = \"gpio1\"\nbase = 0\nngpio = {}\n",
        MAX_CHIP_LINES + 1
    ))
    .unwrap();
    assert!(matches!(
        board.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("maximum")
    ));
}

#[test]
fn test_relative_node_path_rejected() {
    let board = load(
        r#"
[[nodes]]
path = "gpioled"
compatible = ["alientek, gpioled"]
"#,
    )
    .unwrap();
    assert!(matches!(
        board.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("absolute")
    ));
}

#[test]
fn test_empty_compatible_rejected() {
    let board = load("[[nodes]]\npath = \"/gpioled\"\ncompatible = []\n").unwrap();
    assert!(matches!(
        board.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("compatible")
    ));
}

#[test]
fn test_static_major_out_of_range() {
    let board = load(&format!("[driver]\nstatic_major = {}\n", MAX_MAJOR + 1)).unwrap();
    assert!(board.validate().is_err());

    let board = load("[driver]\nstatic_major = 0\n").unwrap();
    assert!(board.validate().is_err());
}

#[test]
fn test_invalid_log_level() {
    assert!(matches!(
        load("[shared]\nlog_level = \"loud\"\nservice_name = \"x\"\n"),
        Err(ConfigError::ParseError(_))
    ));
}
