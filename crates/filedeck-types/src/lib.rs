//! Core types shared across filedeck
//!
//! This crate provides the session identifier, the terminal frame protocol,
//! and the file-service payload types used by both the server and the client.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod protocol;

pub use protocol::{ClientFrame, ServerFrame};

// ============================================================================
// Session Identity
// ============================================================================

/// Opaque session token assigned by the host when a terminal session starts.
///
/// Clients compare tokens only by equality and must not infer structure from
/// the token's format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// File Service Payloads
// ============================================================================

/// Whether a listed entry is a directory or a regular file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One row of a directory listing
///
/// `size` and `modified` are pre-formatted display strings; directories carry
/// `-` for size, and the `..` parent pseudo-entry carries `-` for both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: String,
    pub modified: String,
}

/// Response payload for a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirListing {
    pub path: String,
    pub items: Vec<FileEntry>,
}

/// Server resource usage snapshot
///
/// Percentages are one-decimal strings with a trailing `%`; uptime is whole
/// seconds since boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfoReport {
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    pub uptime: u64,
}
