//! Open/write/release on the LED device.
//!
//! A write takes the first byte of the caller's buffer and switches the LED:
//! `0` turns it off, `1` turns it on. The rest of the buffer is accepted
//! and ignored.

use crate::device::LedDevice;
use gpioled_common::hal::error::LedError;
use gpioled_common::hal::host::{Host, UserBuffer};
use gpioled_common::hal::types::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// An open handle on the device.
///
/// Only a handler can create one, and [`SessionHandler::release`] consumes
/// it, so a released session cannot be written through.
pub struct Session<H: Host> {
    id: u64,
    device: Arc<LedDevice<H>>,
}

impl<H: Host> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl<H: Host> Session<H> {
    /// Session id, unique per process.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// File operations table of the device.
pub struct SessionHandler<H: Host> {
    device: Arc<LedDevice<H>>,
}

impl<H: Host> Clone for SessionHandler<H> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
        }
    }
}

impl<H: Host> SessionHandler<H> {
    /// Handler for `device`.
    pub fn new(device: Arc<LedDevice<H>>) -> Self {
        Self { device }
    }

    /// Device the handler operates on.
    pub fn device(&self) -> &Arc<LedDevice<H>> {
        &self.device
    }

    /// Open a session. Always succeeds.
    pub fn open(&self) -> Session<H> {
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        debug!("Session {} opened", id);
        Session {
            id,
            device: Arc::clone(&self.device),
        }
    }

    /// Write `buf` through `session`.
    ///
    /// Returns the full buffer length on success.
    ///
    /// # Errors
    /// - `TransferFault` if the first byte cannot be copied (including an
    ///   empty buffer)
    /// - `InvalidCommand` if the byte is neither `0` nor `1`
    /// - `NoDevice` if the device was detached
    ///
    /// The pin is untouched on every error.
    pub fn write(&self, session: &Session<H>, buf: &mut impl UserBuffer) -> Result<usize, LedError> {
        let mut byte = [0u8; 1];
        buf.copy_to(&mut byte).map_err(|e| {
            warn!("Session {}: kernel write failed: {}", session.id, e);
            LedError::TransferFault
        })?;

        let command = Command::try_from(byte[0]).inspect_err(|_| {
            warn!("Session {}: unknown command {:#04x}", session.id, byte[0]);
        })?;

        session.device.switch(command)?;
        Ok(buf.len())
    }

    /// Close `session`. Always succeeds.
    pub fn release(&self, session: Session<H>) {
        debug!("Session {} released", session.id);
    }
}
