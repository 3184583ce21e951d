// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use clap::Parser;

use crate::config::{Cli, Config};
use crate::daemon::Daemon;
use crate::hotplug::EventSource;
use crate::inventory::ddc_ci::DdcHiInventory;
use crate::modules::Kmod;

#[macro_use]
extern crate tracing;

mod cleanup;
mod config;
mod daemon;
mod error;
mod hotplug;
mod inventory;
mod modules;
mod reconcile;
mod session;
mod sysfs;

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=info",
        env!("CARGO_CRATE_NAME")
    )));

    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env(Cli::parse());

    // without a subscriber every diagnostic is a no-op
    if config.log_enabled {
        setup_logs();
    }
    for warning in &config.warnings {
        warn!("{}", warning);
    }

    if unsafe { libc::geteuid() } != 0 {
        warn!("This program needs privileges to load kernel modules and access i2c devices");
    }

    let inventory = DdcHiInventory::new(config.sysfs.clone());
    let mut daemon = Daemon::new(config, Box::new(Kmod), Box::new(inventory));
    daemon.pass(true);

    let mut source = EventSource::select(daemon.config())?;

    if daemon.config().daemonize {
        daemon::daemonize()?;
    }

    daemon
        .run(&mut source)
        .with_context(|| format!("{} hotplug loop stopped", source.name()))
}
