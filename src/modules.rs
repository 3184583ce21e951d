// SPDX-License-Identifier: GPL-3.0-only
//! Kernel module state guard
//!
//! Makes sure `ddcci` and `ddcci_backlight` are loaded, and reloads both when
//! the backlight class holds a ddcci entry that no longer resolves.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::sysfs::{self, DDCCI_BACKLIGHT_MODULE, DDCCI_MODULE, DDCCI_PREFIX, Sysfs};

/// Option passed to `ddcci` to skip its internal transfer delay
pub const DDCCI_OPTIONS: &str = "delay=0";

/// Loads and unloads kernel modules by name
pub trait ModuleLoader {
    fn load(&mut self, name: &str, options: Option<&str>) -> Result<()>;

    fn unload(&mut self, name: &str) -> Result<()>;
}

/// Where kmod installs its tools; service managers often start daemons with
/// a PATH lacking the sbin directories
const TOOL_DIRS: [&str; 4] = ["/usr/sbin", "/sbin", "/usr/bin", "/bin"];

/// First `dirs` entry containing `tool`, else the bare name for a PATH lookup
pub fn find_tool(tool: &str, dirs: &[&Path]) -> PathBuf {
    dirs.iter()
        .map(|dir| dir.join(tool))
        .find(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(tool))
}

/// Module loader backed by kmod's `modprobe` and `rmmod`
#[derive(Debug, Default)]
pub struct Kmod;

impl Kmod {
    fn command(tool: &str) -> Command {
        let dirs: Vec<&Path> = TOOL_DIRS.iter().map(|dir| Path::new(*dir)).collect();
        Command::new(find_tool(tool, &dirs))
    }

    fn run(cmd: &mut Command) -> Result<()> {
        let output = cmd
            .output()
            .with_context(|| format!("failed to run {:?}", cmd.get_program()))?;
        if !output.status.success() {
            bail!(
                "{:?} exited with {}: {}",
                cmd.get_program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl ModuleLoader for Kmod {
    fn load(&mut self, name: &str, options: Option<&str>) -> Result<()> {
        let mut cmd = Self::command("modprobe");
        // -b: honour the blacklist
        cmd.arg("-b").arg(name);
        if let Some(options) = options {
            cmd.args(options.split_whitespace());
        }
        Self::run(&mut cmd)
    }

    fn unload(&mut self, name: &str) -> Result<()> {
        Self::run(Self::command("rmmod").arg(name))
    }
}

fn load(loader: &mut dyn ModuleLoader, name: &str, options: Option<&str>) {
    if let Err(e) = loader.load(name, options) {
        warn!("Failed to load module {}: {:#}", name, e);
    }
}

fn unload(loader: &mut dyn ModuleLoader, name: &str) {
    if let Err(e) = loader.unload(name) {
        warn!("Failed to unload module {}: {:#}", name, e);
    }
}

fn load_all(loader: &mut dyn ModuleLoader) {
    load(loader, DDCCI_MODULE, Some(DDCCI_OPTIONS));
    load(loader, DDCCI_BACKLIGHT_MODULE, None);
}

/// Ensure the ddcci modules are present and their backlight interfaces sane
///
/// Best effort: failures are logged, never returned.
pub fn ensure_modules(sysfs: &Sysfs, loader: &mut dyn ModuleLoader) {
    if !sysfs::is_directory(&sysfs.module_dir(DDCCI_BACKLIGHT_MODULE)) {
        info!("Loading ddcci and ddcci_backlight modules");
        load_all(loader);
        return;
    }

    let class = sysfs.backlight_class();
    for name in sysfs::entry_names(&class) {
        if !name.starts_with(DDCCI_PREFIX) {
            continue;
        }

        if !sysfs::is_directory(&class.join(&name)) {
            warn!("Invalid ddcci_backlight interface {} detected, reloading modules", name);
            unload(loader, DDCCI_BACKLIGHT_MODULE);
            unload(loader, DDCCI_MODULE);
            load_all(loader);
            // one repair per pass
            break;
        }
    }
}
