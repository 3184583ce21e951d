// SPDX-License-Identifier: GPL-3.0-only
//! Hotplug daemon main loop
//!
//! Runs one reconciliation pass at startup, then waits on the selected event
//! source and runs another pass for every relevant hotplug event. A pass is:
//! 1. module guard (load or repair ddcci modules)
//! 2. stale I2C client cleanup
//! 3. bus reconciliation

use std::os::fd::RawFd;

use crate::cleanup::cleanup_stale_devices;
use crate::config::{Config, RepairPolicy};
use crate::error::{Error, Result};
use crate::hotplug::EventSource;
use crate::inventory::DisplayInventory;
use crate::modules::{ModuleLoader, ensure_modules};
use crate::reconcile::{BusPlan, reconcile};

pub struct Daemon {
    config: Config,
    loader: Box<dyn ModuleLoader>,
    inventory: Box<dyn DisplayInventory>,
}

impl Daemon {
    pub fn new(
        config: Config,
        loader: Box<dyn ModuleLoader>,
        inventory: Box<dyn DisplayInventory>,
    ) -> Self {
        Self {
            config,
            loader,
            inventory,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One guard + cleanup + reconcile pass
    pub fn pass(&mut self, initial: bool) -> BusPlan {
        if initial || self.config.repair == RepairPolicy::EveryPass {
            ensure_modules(&self.config.sysfs, self.loader.as_mut());
            cleanup_stale_devices(&self.config.sysfs);
        }
        reconcile(&self.config.sysfs, self.inventory.as_mut())
    }

    /// Block on `source` forever, running a pass per relevant event
    ///
    /// Only returns on a broken poll or a closed source.
    pub fn run(&mut self, source: &mut EventSource) -> Result<()> {
        let fd = source.as_raw_fd();
        loop {
            wait_readable(fd, source.name())?;

            let passes = source.handle_event()?;
            for _ in 0..passes {
                self.pass(false);
            }
        }
    }
}

/// Block until `fd` is readable
fn wait_readable(fd: RawFd, name: &'static str) -> Result<()> {
    loop {
        let mut poll_fd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        // negative timeout = wait forever
        let poll_result = unsafe { libc::poll(&mut poll_fd, 1, -1) };

        if poll_result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Poll(err));
        }

        if poll_fd.revents & libc::POLLIN != 0 {
            return Ok(());
        }
        if poll_fd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
            return Err(Error::SourceClosed(name));
        }
    }
}

/// Detach from the controlling terminal, keeping stdio open
pub fn daemonize() -> Result<()> {
    // chdir to / and keep stderr for diagnostics
    if unsafe { libc::daemon(0, 1) } < 0 {
        return Err(Error::Daemonize(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cli;
    use crate::modules::tests::RecordingLoader;
    use crate::reconcile::tests::{FixedInventory, make_tree, set, written};
    use std::os::fd::AsRawFd;
    use std::sync::{Arc, Mutex};

    /// Loader whose calls survive being boxed into the daemon
    #[derive(Clone, Default)]
    struct SharedLoader(Arc<Mutex<RecordingLoader>>);

    impl ModuleLoader for SharedLoader {
        fn load(&mut self, name: &str, options: Option<&str>) -> anyhow::Result<()> {
            self.0.lock().unwrap().load(name, options)
        }

        fn unload(&mut self, name: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().unload(name)
        }
    }

    fn daemon(repair: RepairPolicy, detected: &[u32]) -> (tempfile::TempDir, Daemon, SharedLoader) {
        let (root, sysfs) = make_tree(&[1, 2, 3], &[]);
        let mut config = Config::new(Cli::default(), |_| None);
        config.sysfs = sysfs;
        config.repair = repair;
        let loader = SharedLoader::default();
        let daemon = Daemon::new(
            config,
            Box::new(loader.clone()),
            Box::new(FixedInventory(set(detected))),
        );
        (root, daemon, loader)
    }

    #[test]
    fn test_initial_pass_loads_modules_and_binds() {
        let (_root, mut daemon, loader) = daemon(RepairPolicy::EveryPass, &[2]);

        let plan = daemon.pass(true);

        assert_eq!(plan.attach, set(&[2]));
        assert_eq!(loader.0.lock().unwrap().calls.len(), 2);
        assert_eq!(written(&daemon.config().sysfs, 2, "new_device"), "ddcci 0x37");
    }

    #[test]
    fn test_every_pass_policy_repairs_on_events() {
        let (_root, mut daemon, loader) = daemon(RepairPolicy::EveryPass, &[]);
        daemon.pass(true);
        daemon.pass(false);
        assert_eq!(loader.0.lock().unwrap().calls.len(), 4);
    }

    #[test]
    fn test_startup_policy_repairs_once() {
        let (_root, mut daemon, loader) = daemon(RepairPolicy::Startup, &[]);
        daemon.pass(true);
        daemon.pass(false);
        daemon.pass(false);
        assert_eq!(loader.0.lock().unwrap().calls.len(), 2);
    }

    #[test]
    fn test_wait_readable() {
        let (reader, mut writer) = std::os::unix::net::UnixStream::pair().unwrap();
        std::io::Write::write_all(&mut writer, b"x").unwrap();
        assert!(wait_readable(reader.as_raw_fd(), "test").is_ok());
    }
}
