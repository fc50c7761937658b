//! Device number ranges and character interface table.

use gpioled_common::consts::MINOR_MASK;
use gpioled_common::hal::host::HostError;
use gpioled_common::hal::types::DeviceNumber;
use serde::Serialize;
use std::collections::BTreeMap;

/// Highest major handed out dynamically.
pub const DYNAMIC_MAJOR_START: u32 = 511;

/// Lowest major handed out dynamically.
pub const DYNAMIC_MAJOR_END: u32 = 234;

/// A registered device number range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    /// First device number.
    pub first: DeviceNumber,
    /// Number of minors.
    pub count: u32,
    /// Owner name.
    pub name: String,
}

impl Region {
    fn overlaps(&self, first: DeviceNumber, count: u32) -> bool {
        self.first.major == first.major
            && self.first.minor < first.minor + count
            && first.minor < self.first.minor + self.count
    }
}

/// Registered ranges and character interfaces.
#[derive(Debug, Default)]
pub(crate) struct ChrdevTable {
    regions: Vec<Region>,
    cdevs: BTreeMap<DeviceNumber, u32>,
}

impl ChrdevTable {
    pub(crate) fn register(&mut self, first: DeviceNumber, count: u32, name: &str) -> Result<(), HostError> {
        if count == 0 || first.minor.saturating_add(count - 1) > MINOR_MASK {
            return Err(HostError::InvalidArgument(format!("range {first}+{count}")));
        }
        if let Some(taken) = self.regions.iter().find(|r| r.overlaps(first, count)) {
            return Err(HostError::Busy(format!("{} held by {}", taken.first, taken.name)));
        }
        self.regions.push(Region {
            first,
            count,
            name: name.to_string(),
        });
        Ok(())
    }

    pub(crate) fn alloc(&mut self, first_minor: u32, count: u32, name: &str) -> Result<DeviceNumber, HostError> {
        let major = (DYNAMIC_MAJOR_END..=DYNAMIC_MAJOR_START)
            .rev()
            .find(|major| self.regions.iter().all(|r| r.first.major != *major))
            .ok_or(HostError::NoSpace)?;
        let first = DeviceNumber::new(major, first_minor);
        self.register(first, count, name)?;
        Ok(first)
    }

    pub(crate) fn unregister(&mut self, first: DeviceNumber, count: u32) -> Result<(), HostError> {
        let idx = self
            .regions
            .iter()
            .position(|r| r.first == first && r.count == count)
            .ok_or_else(|| HostError::NotFound(format!("range {first}+{count}")))?;
        self.regions.remove(idx);
        Ok(())
    }

    pub(crate) fn cdev_add(&mut self, number: DeviceNumber, count: u32) -> Result<(), HostError> {
        if self.cdevs.contains_key(&number) {
            return Err(HostError::Exists(format!("cdev {number}")));
        }
        self.cdevs.insert(number, count);
        Ok(())
    }

    pub(crate) fn cdev_del(&mut self, number: DeviceNumber) -> Result<(), HostError> {
        self.cdevs
            .remove(&number)
            .map(|_| ())
            .ok_or_else(|| HostError::NotFound(format!("cdev {number}")))
    }

    pub(crate) fn regions(&self) -> Vec<Region> {
        self.regions.clone()
    }

    pub(crate) fn cdevs(&self) -> Vec<DeviceNumber> {
        self.cdevs.keys().copied().collect()
    }
}
