// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the daemon
//!
//! Only setup and event-loop failures are errors. Everything a
//! reconciliation pass does is best effort and merely logged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Could not open a connection to the X server
    #[error("Cannot connect to X server: {0}")]
    X11Connect(#[from] x11rb::errors::ConnectError),

    /// The X connection broke while sending or receiving
    #[error("X connection error: {0}")]
    X11Connection(#[from] x11rb::errors::ConnectionError),

    /// The X server answered a request with an error
    #[error("X request failed: {0}")]
    X11Reply(#[from] x11rb::errors::ReplyError),

    /// The X server lacks the RandR extension
    #[error("X server does not support RandR")]
    RandrUnsupported,

    /// udev monitor setup failed
    #[error("udev monitor error: {0}")]
    Udev(#[source] std::io::Error),

    /// Neither hotplug source could be set up
    #[error("No hotplug event source available (RandR: {randr}; udev: {udev})")]
    NoEventSource {
        randr: Box<Error>,
        udev: Box<Error>,
    },

    /// poll(2) failed
    #[error("poll failed: {0}")]
    Poll(#[source] std::io::Error),

    /// The event descriptor hung up
    #[error("{0} event source closed")]
    SourceClosed(&'static str),

    /// daemon(3) failed
    #[error("Cannot daemonize: {0}")]
    Daemonize(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
