// SPDX-License-Identifier: GPL-3.0-only
//! X session discovery
//!
//! A daemon started by the init system has no `DISPLAY`. When running as
//! root it can borrow the session of a running X server instead:
//! - `scan`: look through `/proc` for Xorg/Xwayland and read their `-auth`
//! - `watch`: block until the X server binary is executed

pub mod scan;
pub mod watch;
pub mod xauth;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use scan::{scan_sessions, session_for_pid};
pub use watch::wait_for_exec;

/// Polls of `/proc/<pid>` after an exec event before giving up
const SETTLE_ATTEMPTS: u32 = 20;
const SETTLE_INTERVAL: Duration = Duration::from_millis(250);

/// What `DISPLAY` and `XAUTHORITY` should be to reach an X server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub display: String,
    pub xauthority: PathBuf,
}

impl Session {
    /// Export into the process environment for Xlib-style connection setup
    pub fn export(&self) {
        info!(
            "Using X session DISPLAY='{}' XAUTHORITY='{}'",
            self.display,
            self.xauthority.display()
        );
        // SAFETY: called during startup, before any other thread exists
        unsafe {
            std::env::set_var("DISPLAY", &self.display);
            std::env::set_var("XAUTHORITY", &self.xauthority);
        }
    }
}

/// Wait for `exe` to start and return the session it ends up serving
///
/// The pid reported by the exec watch is polled until it shows up as an X
/// server with a readable `-auth` file.
pub fn wait_for_session(exe: &Path, proc_root: &Path) -> Option<Session> {
    let pid = match wait_for_exec(exe) {
        Ok(pid) => pid,
        Err(e) => {
            warn!("Cannot watch {} for execution: {}", exe.display(), e);
            return None;
        }
    };

    for _ in 0..SETTLE_ATTEMPTS {
        if let Some(session) = session_for_pid(proc_root, pid) {
            return Some(session);
        }
        std::thread::sleep(SETTLE_INTERVAL);
    }

    warn!("Process {} did not turn into an X server with an auth file", pid);
    None
}
