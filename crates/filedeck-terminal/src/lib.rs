//! Server-side terminal session host
//!
//! Owns the live shell processes behind the terminal frame protocol: spawns
//! the configured shell with piped stdio, relays input lines, pumps output
//! chunks back in arrival order, and signals closure when a process exits.

pub mod host;

pub use host::{HostError, SessionEvent, ShellConfig, TerminalHost};
