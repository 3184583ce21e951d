// SPDX-License-Identifier: GPL-3.0-only
//! DDC/CI display inventory backed by ddc-hi
//!
//! ddc-hi walks `/dev/i2c-*` and keeps the adapters that answer with an EDID.
//! An EDID alone does not mean the monitor speaks DDC/CI, so every display is
//! asked for its brightness before its bus counts as detected. Its Linux
//! backend identifies each display by the device number of the i2c-dev node,
//! whose minor number is the adapter (bus) number.

use std::time::Duration;

use ddc_hi::{Backend, Ddc, Display};

use super::DisplayInventory;
use crate::reconcile::{self, BusId, BusSet};
use crate::sysfs::Sysfs;

/// Character device major of i2c-dev
const I2C_DEV_MAJOR: u32 = 89;

/// VCP (Virtual Control Panel) code for brightness
const BRIGHTNESS_CODE: u8 = 0x10;

/// DDC/CI needs 40ms between commands
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// A display as seen by the inventory
pub trait DdcDisplay {
    /// ddc-hi identifier
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Whether the display was found through the Linux i2c-dev backend
    fn is_i2c(&self) -> bool;

    /// Whether the display answers a DDC/CI request
    fn responds(&mut self) -> bool;
}

impl DdcDisplay for Display {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn name(&self) -> &str {
        self.info.model_name.as_deref().unwrap_or("unknown")
    }

    fn is_i2c(&self) -> bool {
        matches!(self.info.backend, Backend::I2cDevice)
    }

    fn responds(&mut self) -> bool {
        // retry once, monitors waking up may miss the first request
        for attempt in 1..=2 {
            match self.handle.get_vcp_feature(BRIGHTNESS_CODE) {
                Ok(_) => return true,
                Err(e) => {
                    debug!(
                        "DDC/CI attempt {} on '{}' failed: {}",
                        attempt, self.info.id, e
                    );
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
        false
    }
}

/// Buses of the displays that speak DDC/CI
///
/// `bound` says whether a bus already carries a ddcci client. Such a bus
/// was accepted by the driver and is not asked again, since the driver
/// holds the address and a userspace request would fail.
pub fn ddc_buses<D, F>(displays: impl IntoIterator<Item = D>, bound: F) -> BusSet
where
    D: DdcDisplay,
    F: Fn(BusId) -> bool,
{
    let mut buses = BusSet::new();

    for mut ddc_display in displays {
        if !ddc_display.is_i2c() {
            continue;
        }

        let Some(bus) = bus_from_display_id(ddc_display.id()) else {
            warn!(
                "Cannot determine i2c bus of display '{}' (id: {})",
                ddc_display.name(),
                ddc_display.id()
            );
            continue;
        };

        if bound(bus) || ddc_display.responds() {
            debug!("Detected display '{}' on i2c-{}", ddc_display.name(), bus);
            buses.insert(bus);
        } else {
            info!(
                "Display '{}' on i2c-{} does not answer DDC/CI, ignoring",
                ddc_display.name(),
                bus
            );
        }
    }

    buses
}

#[derive(Debug, Default)]
pub struct DdcHiInventory {
    sysfs: Sysfs,
}

impl DdcHiInventory {
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }
}

impl DisplayInventory for DdcHiInventory {
    fn detected_buses(&mut self) -> BusSet {
        ddc_buses(Display::enumerate(), |bus| {
            reconcile::is_attached(&self.sysfs, bus)
        })
    }
}

/// Extract the I2C bus number from a ddc-hi display id
///
/// Accepts an i2c-dev device number (`"22276"` for `/dev/i2c-4`) or a name
/// containing `i2c-<bus>` (`"/dev/i2c-4"`).
pub fn bus_from_display_id(id: &str) -> Option<BusId> {
    if let Some(pos) = id.rfind("i2c-") {
        let digits: String = id[pos + 4..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        return digits.parse().ok();
    }

    let dev: libc::dev_t = id.trim().parse().ok()?;
    if libc::major(dev) != I2C_DEV_MAJOR {
        return None;
    }
    Some(libc::minor(dev))
}
