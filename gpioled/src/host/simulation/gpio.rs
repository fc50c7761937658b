//! Simulated GPIO controllers.
//!
//! The `GpioBank` manages:
//! - Controllers with a global base number and a line count
//! - Per-line claim state, direction and level
//! - A level history per line for observing transitions

use bitflags::bitflags;
use gpioled_common::hal::config::GpioChipConfig;
use gpioled_common::hal::host::HostError;
use gpioled_common::hal::node::GpioSpec;
use gpioled_common::hal::types::{Level, PinId};
use serde::Serialize;
use tracing::{debug, trace, warn};

bitflags! {
    /// State flags of a simulated line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineFlags: u8 {
        /// Line is claimed by a consumer.
        const REQUESTED = 1 << 0;
        /// Line is configured as output.
        const OUTPUT = 1 << 1;
    }
}

impl Default for LineFlags {
    fn default() -> Self {
        LineFlags::empty()
    }
}

/// State of a single line.
#[derive(Debug, Clone, Default)]
struct LineState {
    flags: LineFlags,
    level: Option<Level>,
    label: Option<String>,
    history: Vec<Level>,
}

/// One simulated controller.
#[derive(Debug, Clone)]
struct GpioChip {
    name: String,
    base: u32,
    lines: Vec<LineState>,
}

/// Snapshot of a line that has been touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    /// Global pin number.
    pub pin: PinId,
    /// Controller name.
    pub chip: String,
    /// Offset within the controller.
    pub line: u32,
    /// Claim label, if claimed.
    pub label: Option<String>,
    /// Claimed.
    pub requested: bool,
    /// Configured as output.
    pub output: bool,
    /// Current level (`None` if never driven).
    pub level: Option<Level>,
}

/// All simulated controllers.
#[derive(Debug, Default)]
pub(crate) struct GpioBank {
    chips: Vec<GpioChip>,
}

impl GpioBank {
    pub(crate) fn add_chip(&mut self, config: &GpioChipConfig) {
        if let Err(e) = config.validate() {
            warn!("Skipping gpio chip: {}", e);
            return;
        }
        debug!(
            "Adding gpio chip {} (base {}, {} lines)",
            config.name, config.base, config.ngpio
        );
        self.chips.push(GpioChip {
            name: config.name.clone(),
            base: config.base,
            lines: vec![LineState::default(); config.ngpio as usize],
        });
    }

    fn line(&self, pin: PinId) -> Option<&LineState> {
        self.chips.iter().find_map(|c| {
            pin.0
                .checked_sub(c.base)
                .and_then(|offset| c.lines.get(offset as usize))
        })
    }

    fn line_mut(&mut self, pin: PinId) -> Result<&mut LineState, HostError> {
        self.chips
            .iter_mut()
            .find_map(|c| {
                pin.0
                    .checked_sub(c.base)
                    .and_then(|offset| c.lines.get_mut(offset as usize))
            })
            .ok_or_else(|| HostError::InvalidArgument(format!("{pin} does not exist")))
    }

    pub(crate) fn resolve(&self, spec: &GpioSpec) -> Result<PinId, HostError> {
        let chip = self
            .chips
            .iter()
            .find(|c| c.name == spec.chip)
            .ok_or_else(|| HostError::NotFound(format!("gpio chip {}", spec.chip)))?;
        if spec.line as usize >= chip.lines.len() {
            return Err(HostError::InvalidArgument(format!(
                "{} has no line {}",
                spec.chip, spec.line
            )));
        }
        chip.base.checked_add(spec.line).map(PinId).ok_or_else(|| {
            HostError::InvalidArgument(format!("{} line {} overflows", spec.chip, spec.line))
        })
    }

    pub(crate) fn request(&mut self, pin: PinId, label: &str) -> Result<(), HostError> {
        let line = self.line_mut(pin)?;
        if line.flags.contains(LineFlags::REQUESTED) {
            let owner = line.label.clone().unwrap_or_default();
            return Err(HostError::Busy(format!("{pin} claimed by '{owner}'")));
        }
        line.flags.insert(LineFlags::REQUESTED);
        line.label = Some(label.to_string());
        Ok(())
    }

    pub(crate) fn direction_output(&mut self, pin: PinId, initial: Level) -> Result<(), HostError> {
        let line = self.line_mut(pin)?;
        if !line.flags.contains(LineFlags::REQUESTED) {
            return Err(HostError::InvalidArgument(format!("{pin} not requested")));
        }
        line.flags.insert(LineFlags::OUTPUT);
        line.level = Some(initial);
        line.history.push(initial);
        Ok(())
    }

    pub(crate) fn set_value(&mut self, pin: PinId, level: Level) {
        match self.line_mut(pin) {
            Ok(line) if line.flags.contains(LineFlags::OUTPUT) => {
                trace!("{} -> {}", pin, level);
                line.level = Some(level);
                line.history.push(level);
            }
            Ok(_) => warn!("set_value on {} which is not an output", pin),
            Err(e) => warn!("set_value failed: {}", e),
        }
    }

    pub(crate) fn get_value(&self, pin: PinId) -> Level {
        self.line(pin).and_then(|l| l.level).unwrap_or(Level::Low)
    }

    pub(crate) fn free(&mut self, pin: PinId) -> Result<(), HostError> {
        let line = self.line_mut(pin)?;
        if !line.flags.contains(LineFlags::REQUESTED) {
            return Err(HostError::InvalidArgument(format!("{pin} not requested")));
        }
        line.flags = LineFlags::empty();
        line.label = None;
        Ok(())
    }

    pub(crate) fn flags(&self, pin: PinId) -> LineFlags {
        self.line(pin).map(|l| l.flags).unwrap_or_default()
    }

    pub(crate) fn history(&self, pin: PinId) -> Vec<Level> {
        self.line(pin).map(|l| l.history.clone()).unwrap_or_default()
    }

    pub(crate) fn snapshot(&self) -> Vec<LineSnapshot> {
        self.chips
            .iter()
            .flat_map(|chip| {
                chip.lines
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| !l.flags.is_empty() || l.level.is_some())
                    .map(move |(offset, l)| LineSnapshot {
                        pin: PinId(chip.base + offset as u32),
                        chip: chip.name.clone(),
                        line: offset as u32,
                        label: l.label.clone(),
                        requested: l.flags.contains(LineFlags::REQUESTED),
                        output: l.flags.contains(LineFlags::OUTPUT),
                        level: l.level,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpioled_common::hal::node::GpioFlags;

    fn bank() -> GpioBank {
        let mut bank = GpioBank::default();
        bank.add_chip(&GpioChipConfig {
            name: "gpio1".to_string(),
            base: 0,
            ngpio: 32,
        });
        bank.add_chip(&GpioChipConfig {
            name: "gpio2".to_string(),
            base: 32,
            ngpio: 32,
        });
        bank
    }

    fn spec(chip: &str, line: u32) -> GpioSpec {
        GpioSpec {
            chip: chip.to_string(),
            line,
            flags: GpioFlags::empty(),
        }
    }

    #[test]
    fn test_resolve() {
        let bank = bank();
        assert_eq!(bank.resolve(&spec("gpio1", 3)).unwrap(), PinId(3));
        assert_eq!(bank.resolve(&spec("gpio2", 3)).unwrap(), PinId(35));
        assert!(matches!(
            bank.resolve(&spec("gpio9", 0)),
            Err(HostError::NotFound(_))
        ));
        assert!(matches!(
            bank.resolve(&spec("gpio1", 32)),
            Err(HostError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_out_of_range_chip_skipped() {
        let mut bank = bank();
        bank.add_chip(&GpioChipConfig {
            name: "gpio9".to_string(),
            base: u32::MAX - 5,
            ngpio: 32,
        });
        bank.add_chip(&GpioChipConfig {
            name: "huge".to_string(),
            base: 1 << 20,
            ngpio: u32::MAX >> 4,
        });
        assert!(matches!(
            bank.resolve(&spec("gpio9", 20)),
            Err(HostError::NotFound(_))
        ));
        assert!(matches!(
            bank.resolve(&spec("huge", 0)),
            Err(HostError::NotFound(_))
        ));
        assert!(bank.snapshot().is_empty());
    }

    #[test]
    fn test_request_direction_free() {
        let mut bank = bank();
        let pin = PinId(3);
        assert!(bank.direction_output(pin, Level::High).is_err());

        bank.request(pin, "led-gpios").unwrap();
        assert!(matches!(bank.request(pin, "other"), Err(HostError::Busy(_))));

        bank.direction_output(pin, Level::High).unwrap();
        assert_eq!(bank.flags(pin), LineFlags::REQUESTED | LineFlags::OUTPUT);
        bank.set_value(pin, Level::Low);
        assert_eq!(bank.get_value(pin), Level::Low);
        assert_eq!(bank.history(pin), vec![Level::High, Level::Low]);

        bank.free(pin).unwrap();
        assert!(bank.flags(pin).is_empty());
        assert!(bank.free(pin).is_err());
    }

    #[test]
    fn test_set_value_ignored_on_input() {
        let mut bank = bank();
        bank.set_value(PinId(4), Level::High);
        assert!(bank.history(PinId(4)).is_empty());
        bank.set_value(PinId(999), Level::High);
    }

    #[test]
    fn test_snapshot_lists_touched_lines() {
        let mut bank = bank();
        assert!(bank.snapshot().is_empty());
        bank.request(PinId(40), "led").unwrap();
        let snap = bank.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].chip, "gpio2");
        assert_eq!(snap[0].line, 8);
        assert!(snap[0].requested);
    }
}
