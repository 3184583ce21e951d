// SPDX-License-Identifier: GPL-3.0-only
//! Display inventory
//!
//! Answers "which I2C buses have a DDC/CI monitor on them right now". Each
//! call enumerates again; nothing is cached between reconciliation passes.

pub mod ddc_ci;

use crate::reconcile::BusSet;

/// Source of the detected-bus set
pub trait DisplayInventory {
    /// Enumerate displays and return the buses they sit on
    fn detected_buses(&mut self) -> BusSet;
}
