//! One-shot fault injection for the simulated host.

use gpioled_common::hal::host::HostError;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Fallible host operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HostOp {
    /// `register_region`
    RegisterRegion,
    /// `alloc_region`
    AllocRegion,
    /// `unregister_region`
    UnregisterRegion,
    /// `cdev_add`
    CdevAdd,
    /// `cdev_del`
    CdevDel,
    /// `class_create`
    ClassCreate,
    /// `class_destroy`
    ClassDestroy,
    /// `device_create`
    DeviceCreate,
    /// `device_destroy`
    DeviceDestroy,
    /// `resolve`
    Resolve,
    /// `request`
    Request,
    /// `direction_output`
    DirectionOutput,
    /// `free`
    Free,
}

/// Pending injected failures, consumed on first use.
#[derive(Debug, Default)]
pub(crate) struct FaultPlan {
    pending: HashMap<HostOp, HostError>,
}

impl FaultPlan {
    pub(crate) fn arm(&mut self, op: HostOp, err: HostError) {
        self.pending.insert(op, err);
    }

    pub(crate) fn check(&mut self, op: HostOp) -> Result<(), HostError> {
        match self.pending.remove(&op) {
            Some(err) => {
                debug!("Injected fault on {:?}: {}", op, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}
