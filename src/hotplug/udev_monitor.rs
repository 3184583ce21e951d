// SPDX-License-Identifier: GPL-3.0-only
use std::os::fd::{AsRawFd, RawFd};

use crate::error::{Error, Result};

/// Monitors udev for DRM events
///
/// Fallback source when no X server is reachable. Only `change` events of the
/// drm subsystem count, which the kernel emits on connector hotplug.
pub struct UdevSource {
    socket: udev::MonitorSocket,
}

impl UdevSource {
    pub fn new() -> Result<Self> {
        let socket = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem("drm"))
            .and_then(|builder| builder.listen())
            .map_err(Error::Udev)?;

        Ok(Self { socket })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    /// Receive one event; returns the number of passes it calls for
    pub fn handle_event(&mut self) -> usize {
        let Some(event) = self.socket.iter().next() else {
            debug!("Poll indicated ready but no udev event available");
            return 0;
        };

        debug!(
            "udev event: type={:?}, subsystem={:?}, syspath={:?}",
            event.event_type(),
            event.subsystem(),
            event.syspath()
        );

        let passes = triggers(event.event_type());
        if passes > 0 {
            info!("Display change detected at {:?}", event.syspath());
        }
        passes
    }
}

/// Passes called for by a drm event; connector hotplug arrives as `change`
pub fn triggers(event_type: udev::EventType) -> usize {
    match event_type {
        udev::EventType::Change => 1,
        _ => 0,
    }
}
