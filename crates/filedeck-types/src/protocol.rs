//! Terminal frame protocol
//!
//! JSON messages exchanged over the duplex terminal connection, adjacently
//! tagged with `type`/`data` keys so any text channel can carry them.

use serde::{Deserialize, Serialize};

use crate::SessionId;

/// Frames sent from the client to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientFrame {
    /// Request a new terminal session
    StartTerminal,
    /// One line of input for the active session
    TerminalInput {
        session_id: SessionId,
        command: String,
    },
    /// Ask the host to terminate the session
    CloseTerminal { session_id: SessionId },
}

/// Frames sent from the host to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerFrame {
    /// The requested session is live; binds all future traffic
    TerminalStarted { session_id: SessionId },
    /// Raw output text produced by the remote process, verbatim
    TerminalOutput {
        session_id: SessionId,
        chunk: String,
    },
    /// Non-fatal diagnostic tied to the session
    TerminalError { message: String },
    /// The session's process has exited or been closed
    TerminalClosed { session_id: SessionId },
}
