// SPDX-License-Identifier: GPL-3.0-only
//! Removal of orphaned ddcci I2C clients
//!
//! A client at 0x37 named `ddcci...` without a bound driver is left behind
//! when the module goes away underneath it. It blocks a fresh `new_device`,
//! so it is deleted from its adapter.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::sysfs::{self, DDCCI_ADDRESS, DDCCI_CLIENT_SUFFIX, DDCCI_PREFIX, Sysfs};

/// All `i2c-*/*-0037` client directories
fn ddcci_clients(sysfs: &Sysfs) -> Vec<PathBuf> {
    let devices = sysfs.i2c_devices();
    let mut clients = Vec::new();

    for adapter in sysfs::entry_names(&devices) {
        if !adapter.starts_with("i2c-") {
            continue;
        }
        let adapter = devices.join(adapter);
        for client in sysfs::entry_names(&adapter) {
            if client.ends_with(DDCCI_CLIENT_SUFFIX) {
                clients.push(adapter.join(client));
            }
        }
    }

    clients.sort();
    clients
}

fn read_first_line(path: &Path) -> std::io::Result<String> {
    let mut line = String::new();
    BufReader::new(fs::File::open(path)?).read_line(&mut line)?;
    Ok(line)
}

pub fn cleanup_stale_devices(sysfs: &Sysfs) {
    for client in ddcci_clients(sysfs) {
        let name = match read_first_line(&client.join("name")) {
            Ok(name) => name,
            Err(e) => {
                debug!("Skipping {}: {}", client.display(), e);
                continue;
            }
        };

        if !name.starts_with(DDCCI_PREFIX) || sysfs::is_directory(&client.join("driver")) {
            continue;
        }

        let Some(adapter) = client.parent() else {
            continue;
        };

        info!("Cleaning up invalid ddcci i2c device: {}", client.display());
        if let Err(e) = sysfs::write_attr(&adapter.join("delete_device"), DDCCI_ADDRESS) {
            warn!("Failed to delete {}: {}", client.display(), e);
        }
    }
}
