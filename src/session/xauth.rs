// SPDX-License-Identifier: GPL-3.0-only
//! Minimal Xauthority reader
//!
//! Each record is a big-endian `u16` family followed by four byte strings
//! (address, display number, auth name, auth data), each prefixed with a
//! big-endian `u16` length.

use std::path::Path;

/// `FamilyLocal` from Xauth.h
pub const FAMILY_LOCAL: u16 = 256;
/// `FamilyWild` from Xauth.h
pub const FAMILY_WILD: u16 = 65535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEntry {
    pub family: u16,
    pub address: Vec<u8>,
    pub number: Vec<u8>,
    pub name: Vec<u8>,
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn u16(&mut self) -> Option<u16> {
        let (head, rest) = self.buf.split_first_chunk::<2>()?;
        self.buf = rest;
        Some(u16::from_be_bytes(*head))
    }

    fn bytes(&mut self) -> Option<Vec<u8>> {
        let len = usize::from(self.u16()?);
        if self.buf.len() < len {
            return None;
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Some(head.to_vec())
    }

    fn entry(&mut self) -> Option<AuthEntry> {
        let family = self.u16()?;
        let address = self.bytes()?;
        let number = self.bytes()?;
        let name = self.bytes()?;
        // cookie
        self.bytes()?;
        Some(AuthEntry {
            family,
            address,
            number,
            name,
        })
    }
}

/// Parse all complete records; a truncated trailing record is dropped
pub fn parse(buf: &[u8]) -> Vec<AuthEntry> {
    let mut reader = Reader { buf };
    let mut entries = Vec::new();
    while let Some(entry) = reader.entry() {
        entries.push(entry);
    }
    entries
}

/// Display string (`:<number>`) of the first local or wildcard record
pub fn display_from_entries(entries: &[AuthEntry]) -> Option<String> {
    entries
        .iter()
        .find(|e| e.family == FAMILY_LOCAL || e.family == FAMILY_WILD)
        .map(|e| {
            debug!(
                "Using {} entry of {}",
                String::from_utf8_lossy(&e.name),
                String::from_utf8_lossy(&e.address)
            );
            format!(":{}", String::from_utf8_lossy(&e.number))
        })
}

pub fn display_from_file(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(buf) => display_from_entries(&parse(&buf)),
        Err(e) => {
            debug!("Cannot read Xauthority {}: {}", path.display(), e);
            None
        }
    }
}
