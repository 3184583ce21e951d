// SPDX-License-Identifier: GPL-3.0-only
//! Display hotplug detection
//!
//! Two interchangeable sources tell the daemon that something changed:
//! RandR output notifications from a running X server, or udev events of the
//! drm subsystem. RandR is preferred since it reports a connect only once the
//! output has a mode.

mod randr;
mod udev_monitor;

use std::os::fd::RawFd;

use crate::config::Config;
use crate::error::{Error, Result};

pub use randr::RandrSource;
pub use udev_monitor::UdevSource;

pub enum EventSource {
    Randr(RandrSource),
    Udev(UdevSource),
}

impl EventSource {
    /// Set up RandR, falling back to udev
    pub fn select(config: &Config) -> Result<Self> {
        let source = first_available(
            || RandrSource::new(config).map(Self::Randr),
            || UdevSource::new().map(Self::Udev),
        )?;
        info!("Using {} for hotplug detection", source.name());
        Ok(source)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Randr(_) => "XRandR",
            Self::Udev(_) => "udev",
        }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        match self {
            Self::Randr(source) => source.as_raw_fd(),
            Self::Udev(source) => source.as_raw_fd(),
        }
    }

    /// Consume what is readable on the descriptor
    ///
    /// Returns how many reconciliation passes the events call for.
    pub fn handle_event(&mut self) -> Result<usize> {
        match self {
            Self::Randr(source) => source.handle_event(),
            Self::Udev(source) => Ok(source.handle_event()),
        }
    }
}

/// Result of `randr`, or of `udev` when RandR cannot be set up
///
/// `udev` is only attempted after `randr` failed.
fn first_available<T>(
    randr: impl FnOnce() -> Result<T>,
    udev: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let randr = match randr() {
        Ok(source) => return Ok(source),
        Err(e) => {
            info!("XRandR unavailable: {}", e);
            e
        }
    };

    udev().map_err(|udev| Error::NoEventSource {
        randr: Box::new(randr),
        udev: Box::new(udev),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn udev_down() -> Error {
        Error::Udev(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
    }

    #[test]
    fn test_randr_preferred() {
        let udev_tried = Cell::new(false);

        let source = first_available(
            || Ok("randr"),
            || {
                udev_tried.set(true);
                Ok("udev")
            },
        );

        assert_eq!(source.unwrap(), "randr");
        assert!(!udev_tried.get());
    }

    #[test]
    fn test_falls_back_to_udev() {
        let source = first_available(|| Err(Error::RandrUnsupported), || Ok("udev"));
        assert_eq!(source.unwrap(), "udev");
    }

    #[test]
    fn test_no_source_keeps_both_errors() {
        let result = first_available::<()>(|| Err(Error::RandrUnsupported), || Err(udev_down()));

        match result {
            Err(Error::NoEventSource { randr, udev }) => {
                assert!(matches!(*randr, Error::RandrUnsupported));
                assert!(matches!(*udev, Error::Udev(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
