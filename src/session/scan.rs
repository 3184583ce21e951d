// SPDX-License-Identifier: GPL-3.0-only
//! X session discovery through `/proc`
//!
//! Looks for running Xorg/Xwayland servers and pairs the display they serve
//! with the Xauthority file passed via `-auth`.

use std::fs;
use std::path::{Path, PathBuf};

use super::{Session, xauth};

/// Executable path fragments of X servers
const X_SERVER_EXES: [&str; 2] = ["/Xorg", "/Xwayland"];

fn is_x_server(exe: &Path) -> bool {
    let exe = exe.to_string_lossy();
    X_SERVER_EXES.iter().any(|name| exe.contains(name))
}

/// Argument following `-auth` in a NUL separated command line
fn auth_argument(cmdline: &[u8]) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;

    let mut args = cmdline.split(|&b| b == 0);
    args.find(|arg| *arg == b"-auth")?;
    let path = args.next().filter(|arg| !arg.is_empty())?;
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(path)))
}

/// Session served by process `pid`, if it is an X server with `-auth`
pub fn session_for_pid(proc_root: &Path, pid: u32) -> Option<Session> {
    let dir = proc_root.join(pid.to_string());

    let exe = fs::read_link(dir.join("exe")).ok()?;
    if !is_x_server(&exe) {
        return None;
    }

    let cmdline = match fs::read(dir.join("cmdline")) {
        Ok(cmdline) => cmdline,
        Err(e) => {
            debug!("Cannot read cmdline of {}: {}", pid, e);
            return None;
        }
    };
    let Some(xauthority) = auth_argument(&cmdline) else {
        debug!("X server {} ({}) has no -auth argument", pid, exe.display());
        return None;
    };

    let x_display = xauth::display_from_file(&xauthority)?;
    debug!("X server {} serves {} with {}", pid, x_display, xauthority.display());
    Some(Session { display: x_display, xauthority })
}

/// Scan every process for X sessions, returning at most `max`
pub fn scan_sessions(proc_root: &Path, max: usize) -> Vec<Session> {
    let mut sessions = Vec::new();
    if max == 0 {
        return sessions;
    }

    let entries = match fs::read_dir(proc_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", proc_root.display(), e);
            return sessions;
        }
    };

    let mut pids: Vec<u32> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str()?.parse().ok())
        .collect();
    pids.sort_unstable();

    for pid in pids {
        if let Some(session) = session_for_pid(proc_root, pid) {
            sessions.push(session);
            if sessions.len() >= max {
                break;
            }
        }
    }

    sessions
}
