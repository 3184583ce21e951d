// SPDX-License-Identifier: GPL-3.0-only
//! Sysfs layout used by the ddcci driver
//!
//! Every path is derived from a root directory so the whole pipeline can run
//! against a scratch tree. On a real system the root is `/`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::reconcile::BusId;

/// I2C address of the DDC/CI slave
pub const DDCCI_ADDRESS: &str = "0x37";

/// Line written to `new_device` to instantiate a ddcci client
pub const DDCCI_NEW_DEVICE: &str = "ddcci 0x37";

/// Suffix of I2C client directories sitting at address 0x37
pub const DDCCI_CLIENT_SUFFIX: &str = "-0037";

/// Name prefix shared by the driver, its clients and its backlight devices
pub const DDCCI_PREFIX: &str = "ddcci";

pub const DDCCI_MODULE: &str = "ddcci";
pub const DDCCI_BACKLIGHT_MODULE: &str = "ddcci_backlight";

#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Sysfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `/sys/module/<name>`, present while the module is loaded
    pub fn module_dir(&self, name: &str) -> PathBuf {
        self.root.join("sys/module").join(name)
    }

    pub fn backlight_class(&self) -> PathBuf {
        self.root.join("sys/class/backlight")
    }

    pub fn i2c_devices(&self) -> PathBuf {
        self.root.join("sys/bus/i2c/devices")
    }

    /// `/sys/bus/i2c/devices/i2c-<bus>`
    pub fn i2c_adapter(&self, bus: BusId) -> PathBuf {
        self.i2c_devices().join(format!("i2c-{bus}"))
    }

    pub fn ddcci_devices(&self) -> PathBuf {
        self.root.join("sys/bus/ddcci/devices")
    }

    /// `/sys/bus/ddcci/devices/ddcci<bus>`, present while bus is bound
    pub fn ddcci_device(&self, bus: BusId) -> PathBuf {
        self.ddcci_devices().join(format!("{DDCCI_PREFIX}{bus}"))
    }
}

/// True when `path` resolves (following symlinks) to a directory
pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// Write a value into an existing sysfs attribute
///
/// The attribute is never created; a missing file is an error.
pub fn write_attr(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).open(path)?;
    file.write_all(value.as_bytes())
}

/// Names of the entries of `dir`, or nothing if it cannot be read
pub fn entry_names(dir: &Path) -> Vec<String> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect(),
        Err(e) => {
            debug!("Cannot read {}: {}", dir.display(), e);
            Vec::new()
        }
    }
}
