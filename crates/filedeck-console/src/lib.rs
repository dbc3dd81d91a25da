//! Client-side terminal session management
//!
//! One `ConsoleSession` drives one logical shell session over a persistent
//! duplex connection: it issues the start request, binds the server-assigned
//! session id, echoes submitted commands locally, applies output frames in
//! arrival order, and silently drops traffic for stale sessions.

pub mod session;
pub mod transcript;
pub mod transport;

pub use session::{ConsoleSession, SessionState, SESSION_BANNER};
pub use transcript::{Transcript, TranscriptEntry};
pub use transport::{ChannelTransport, FrameTransport, TransportError};
