// SPDX-License-Identifier: GPL-3.0-only
//! Runtime configuration
//!
//! The command line carries a single `--daemon` switch; everything else comes
//! from the environment so the daemon can be tuned from a service unit.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::session::watch::DEFAULT_X_SERVER;
use crate::sysfs::Sysfs;

pub const ENV_LOG: &str = "DDCCI_HOTPLUGD_LOG";
pub const ENV_REPAIR: &str = "DDCCI_HOTPLUGD_REPAIR";
pub const ENV_WAIT_XSERVER: &str = "DDCCI_HOTPLUGD_WAIT_XSERVER";

#[derive(Parser, Debug, Default)]
#[command(name = "ddcci-hotplugd")]
#[command(about = "Attach ddcci drivers to I2C buses of connected monitors")]
#[command(version)]
pub struct Cli {
    /// Detach from the terminal after the initial pass
    #[arg(long)]
    pub daemon: bool,
}

/// When the module guard and stale device cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepairPolicy {
    /// Before every reconciliation
    #[default]
    EveryPass,
    /// Only before the initial reconciliation
    Startup,
}

impl FromStr for RepairPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "every-pass" | "always" => Ok(Self::EveryPass),
            "startup" => Ok(Self::Startup),
            other => Err(format!("unknown repair policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub daemonize: bool,
    pub log_enabled: bool,
    pub repair: RepairPolicy,
    /// X server binary to wait for when no session can be found
    pub wait_x_server: Option<PathBuf>,
    pub sysfs: Sysfs,
    pub proc_root: PathBuf,
    /// Problems found while reading the environment, logged once logging is up
    pub warnings: Vec<String>,
}

impl Config {
    pub fn new<F>(cli: Cli, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let log_enabled = env(ENV_LOG).as_deref() != Some("0");

        let repair = match env(ENV_REPAIR) {
            Some(value) => value.parse().unwrap_or_else(|e| {
                warnings.push(format!("{ENV_REPAIR}: {e}, using every-pass"));
                RepairPolicy::default()
            }),
            None => RepairPolicy::default(),
        };

        let wait_x_server = env(ENV_WAIT_XSERVER)
            .filter(|value| !value.is_empty() && value != "0")
            .map(|value| {
                if value == "1" {
                    PathBuf::from(DEFAULT_X_SERVER)
                } else {
                    PathBuf::from(value)
                }
            });

        Self {
            daemonize: cli.daemon,
            log_enabled,
            repair,
            wait_x_server,
            sysfs: Sysfs::default(),
            proc_root: PathBuf::from("/proc"),
            warnings,
        }
    }

    pub fn from_env(cli: Cli) -> Self {
        Self::new(cli, |key| std::env::var(key).ok())
    }
}
