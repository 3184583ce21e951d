// SPDX-License-Identifier: GPL-3.0-only
//! Wait for an X server to be executed
//!
//! Uses a fanotify `FAN_OPEN_EXEC` mark on the server binary. The first exec
//! event is accepted as is: at notification time the process is still inside
//! `execve`, so its `/proc` entries describe the parent image. Callers verify
//! the pid afterwards (see [`super::scan::session_for_pid`]).

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Standard Xorg location on most distributions
pub const DEFAULT_X_SERVER: &str = "/usr/lib/Xorg";

/// `FAN_EVENT_METADATA_LEN`
const METADATA_LEN: usize = 24;
/// `FANOTIFY_METADATA_VERSION`
const METADATA_VERSION: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecEvent {
    pub mask: u64,
    pub fd: i32,
    pub pid: i32,
}

/// Decode the `fanotify_event_metadata` records in `buf`
///
/// Decoding stops at the first short, malformed or foreign-version record.
pub fn parse_events(buf: &[u8]) -> Vec<ExecEvent> {
    let mut events = Vec::new();
    let mut rest = buf;

    while rest.len() >= METADATA_LEN {
        let event_len = u32::from_ne_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let version = rest[4];
        if version != METADATA_VERSION || event_len < METADATA_LEN || event_len > rest.len() {
            break;
        }

        let mut mask = [0u8; 8];
        mask.copy_from_slice(&rest[8..16]);
        events.push(ExecEvent {
            mask: u64::from_ne_bytes(mask),
            fd: i32::from_ne_bytes([rest[16], rest[17], rest[18], rest[19]]),
            pid: i32::from_ne_bytes([rest[20], rest[21], rest[22], rest[23]]),
        });

        rest = &rest[event_len..];
    }

    events
}

pub struct ExecWatch {
    file: File,
    path: PathBuf,
}

impl ExecWatch {
    /// Mark `path` for exec notifications; needs CAP_SYS_ADMIN
    pub fn new(path: &Path) -> io::Result<Self> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let raw = unsafe {
            libc::fanotify_init(
                (libc::FAN_CLASS_NOTIF | libc::FAN_CLOEXEC) as libc::c_uint,
                (libc::O_RDONLY | libc::O_CLOEXEC) as libc::c_uint,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let rc = unsafe {
            libc::fanotify_mark(
                fd.as_raw_fd(),
                libc::FAN_MARK_ADD as libc::c_uint,
                libc::FAN_OPEN_EXEC as u64,
                libc::AT_FDCWD,
                c_path.as_ptr(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            file: File::from(fd),
            path: path.to_path_buf(),
        })
    }

    /// Block until the watched binary is executed and return the pid
    pub fn wait(&mut self) -> io::Result<u32> {
        info!("Waiting for {} to be executed", self.path.display());
        let mut buf = [0u8; 4096];

        loop {
            let n = match self.file.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let mut found = None;
            for event in parse_events(&buf[..n]) {
                if event.fd >= 0 {
                    // each event carries an open descriptor of the binary
                    drop(unsafe { OwnedFd::from_raw_fd(event.fd) });
                }
                let is_exec = (event.mask & libc::FAN_OPEN_EXEC as u64) != 0;
                if found.is_none() && is_exec && event.pid > 0 {
                    found = Some(event.pid as u32);
                }
            }

            if let Some(pid) = found {
                info!("{} executed by pid {}", self.path.display(), pid);
                return Ok(pid);
            }
        }
    }
}

/// One-shot helper: watch `path` and wait for the first exec
pub fn wait_for_exec(path: &Path) -> io::Result<u32> {
    ExecWatch::new(path)?.wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mask: u64, fd: i32, pid: i32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(METADATA_LEN as u32).to_ne_bytes());
        out.push(METADATA_VERSION);
        out.push(0);
        out.extend_from_slice(&(METADATA_LEN as u16).to_ne_bytes());
        out.extend_from_slice(&mask.to_ne_bytes());
        out.extend_from_slice(&fd.to_ne_bytes());
        out.extend_from_slice(&pid.to_ne_bytes());
        out
    }

    #[test]
    fn test_metadata_layout_matches_libc() {
        assert_eq!(std::mem::size_of::<libc::fanotify_event_metadata>(), METADATA_LEN);
    }

    #[test]
    fn test_parse_events() {
        let exec = libc::FAN_OPEN_EXEC as u64;
        let mut buf = record(exec, 7, 1234);
        buf.extend(record(exec, -1, 1300));

        let events = parse_events(&buf);

        assert_eq!(
            events,
            vec![
                ExecEvent {
                    mask: exec,
                    fd: 7,
                    pid: 1234,
                },
                ExecEvent {
                    mask: exec,
                    fd: -1,
                    pid: 1300,
                },
            ]
        );
    }

    #[test]
    fn test_parse_stops_on_bad_record() {
        let exec = libc::FAN_OPEN_EXEC as u64;
        let mut buf = record(exec, 3, 10);
        let mut bad = record(exec, 4, 11);
        bad[4] = 2;
        buf.extend(bad);
        assert_eq!(parse_events(&buf).len(), 1);

        let short = record(exec, 3, 10);
        assert!(parse_events(&short[..20]).is_empty());
    }
}
