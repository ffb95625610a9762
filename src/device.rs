// src/device.rs

//! Watchdog hardware interface.
//!
//! The Linux watchdog device is consumed only through its semantic
//! operations: configure, query, stroke, disable. The runtime talks to the
//! [`Watchdog`] trait, never to ioctls directly, which is also what makes
//! `--no-watchdog` mode and test doubles possible.
//!
//! Device semantics worth knowing:
//! - Once opened, the hardware countdown is armed. Merely closing the file
//!   does NOT stop it; the timer keeps running and will reset the board
//!   unless it was disabled first (the "magic close" write of `'V'`).
//! - The handle is opened with `O_CLOEXEC` so spawned test processes can
//!   never inherit it and stroke or disarm the watchdog themselves.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::libc::{O_CLOEXEC, c_int};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the watchdog device layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("opening watchdog device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("watchdog ioctl {op} failed: {source}")]
    Ioctl {
        op: &'static str,
        #[source]
        source: nix::Error,
    },
    #[error("writing magic-close byte: {0}")]
    Disable(#[from] std::io::Error),
}

mod ioctls {
    use nix::libc::c_int;

    // From <linux/watchdog.h>: WATCHDOG_IOCTL_BASE is 'W'.
    nix::ioctl_read!(wdioc_keepalive, b'W', 5, c_int);
    nix::ioctl_readwrite!(wdioc_settimeout, b'W', 6, c_int);
    nix::ioctl_read!(wdioc_gettimeout, b'W', 7, c_int);
}

/// The semantic operations the runtime needs from the watchdog.
pub trait Watchdog: Send {
    /// Reset the hardware countdown.
    fn stroke(&mut self) -> Result<(), DeviceError>;

    /// Permanently stop the hardware timer. Only used on an explicit
    /// shutdown flag; the default is to leave the timer armed.
    fn disable(&mut self) -> Result<(), DeviceError>;
}

/// Handle to a real `/dev/watchdog`-style device node.
///
/// Process-wide: opened once at startup, dropped (closed) once at shutdown.
pub struct WatchdogDevice {
    file: File,
}

impl WatchdogDevice {
    /// Open the device node write-only with `O_CLOEXEC`.
    ///
    /// Opening arms the hardware countdown on most drivers, so from here on
    /// the daemon is committed to stroking or being reset.
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(O_CLOEXEC)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.display().to_string(),
                source,
            })?;

        info!(path = %path.display(), "watchdog device opened");
        Ok(Self { file })
    }

    /// Ask the hardware to use `secs` as its countdown. Best effort: drivers
    /// may reject or round the value, and the caller is expected to follow
    /// up with [`Self::query_timeout`] to learn what the hardware holds.
    pub fn set_timeout(&mut self, secs: u32) -> Result<(), DeviceError> {
        let mut val = secs as c_int;
        unsafe { ioctls::wdioc_settimeout(self.file.as_raw_fd(), &mut val) }.map_err(
            |source| DeviceError::Ioctl {
                op: "WDIOC_SETTIMEOUT",
                source,
            },
        )?;
        debug!(requested_secs = secs, accepted_secs = val, "watchdog timeout set");
        Ok(())
    }

    /// Query the countdown the hardware actually holds, in seconds.
    pub fn query_timeout(&mut self) -> Result<u32, DeviceError> {
        let mut secs: c_int = 0;
        unsafe { ioctls::wdioc_gettimeout(self.file.as_raw_fd(), &mut secs) }.map_err(
            |source| DeviceError::Ioctl {
                op: "WDIOC_GETTIMEOUT",
                source,
            },
        )?;
        Ok(secs.max(0) as u32)
    }
}

impl Watchdog for WatchdogDevice {
    fn stroke(&mut self) -> Result<(), DeviceError> {
        let mut dummy: c_int = 0;
        unsafe { ioctls::wdioc_keepalive(self.file.as_raw_fd(), &mut dummy) }.map_err(
            |source| DeviceError::Ioctl {
                op: "WDIOC_KEEPALIVE",
                source,
            },
        )?;
        debug!("watchdog stroked");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DeviceError> {
        // Magic close: the driver stops the timer when it sees a 'V' before
        // the final close.
        self.file.write_all(b"V")?;
        Ok(())
    }
}

/// Stand-in for `--no-watchdog` mode: every operation is a logged no-op.
#[derive(Debug, Default)]
pub struct NullWatchdog;

impl Watchdog for NullWatchdog {
    fn stroke(&mut self) -> Result<(), DeviceError> {
        debug!("stroke skipped (no-hardware mode)");
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
