// SPDX-License-Identifier: GPL-3.0-only

//! RandR output-change notifications
//!
//! Preferred hotplug source: the X server reports an output becoming
//! connected only once it has a mode, which is when the monitor answers on
//! DDC as well.

use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::Event;
use x11rb::protocol::randr::{self, ConnectionExt as _, NotifyMask};
use x11rb::rust_connection::RustConnection;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{self, Session};

/// RandR version that introduced output change notifications
const RANDR_MAJOR: u32 = 1;
const RANDR_MINOR: u32 = 2;

pub struct RandrSource {
    conn: RustConnection,
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Find a session to borrow when the daemon has none of its own
fn discover_session(config: &Config) -> Option<Session> {
    if let Some(session) = session::scan_sessions(&config.proc_root, 1).into_iter().next() {
        return Some(session);
    }

    let exe = config.wait_x_server.as_deref()?;
    info!("No running X server found, waiting for {} to start", exe.display());
    session::wait_for_session(exe, &config.proc_root)
}

fn connect_with_retry(attempts: u32) -> Result<(RustConnection, usize)> {
    let mut attempt = 1;
    loop {
        match x11rb::connect(None) {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < attempts => {
                debug!("X connection attempt {} failed: {}", attempt, e);
                attempt += 1;
                std::thread::sleep(Duration::from_millis(500));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Whether an output change notification means a monitor just came up
pub fn is_connect(connection: randr::Connection, mode: randr::Mode) -> bool {
    connection == randr::Connection::CONNECTED && mode != x11rb::NONE
}

impl RandrSource {
    pub fn new(config: &Config) -> Result<Self> {
        let (conn, screen) = match x11rb::connect(None) {
            Ok(conn) => conn,
            Err(e) if is_root() => {
                debug!("Cannot connect to X server as root ({}), looking for a session", e);
                let Some(session) = discover_session(config) else {
                    return Err(e.into());
                };
                session.export();
                // a server that was just executed may need a moment to listen
                let attempts = if config.wait_x_server.is_some() { 10 } else { 1 };
                connect_with_retry(attempts)?
            }
            Err(e) => return Err(e.into()),
        };

        if conn.extension_information(randr::X11_EXTENSION_NAME)?.is_none() {
            return Err(Error::RandrUnsupported);
        }
        let version = conn.randr_query_version(RANDR_MAJOR, RANDR_MINOR)?.reply()?;
        debug!("RandR version {}.{}", version.major_version, version.minor_version);

        let root = conn.setup().roots[screen].root;
        conn.randr_select_input(root, NotifyMask::OUTPUT_CHANGE)?.check()?;
        conn.flush()?;

        Ok(Self { conn })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    /// Drain all pending events; returns the number of connect notifications
    pub fn handle_event(&mut self) -> Result<usize> {
        let mut triggers = 0;

        while let Some(event) = self.conn.poll_for_event()? {
            let Event::RandrNotify(notify) = event else {
                continue;
            };
            if notify.sub_code != randr::Notify::OUTPUT_CHANGE {
                continue;
            }

            let change = notify.u.as_oc();
            debug!(
                "RandR output {} change: connection={:?} mode={}",
                change.output, change.connection, change.mode
            );
            if is_connect(change.connection, change.mode) {
                info!("Output {} connected", change.output);
                triggers += 1;
            }
        }

        Ok(triggers)
    }
}
