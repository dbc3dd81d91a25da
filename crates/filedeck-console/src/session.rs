//! The client-side terminal session state machine

use filedeck_types::{ClientFrame, ServerFrame, SessionId};

use crate::transcript::{Transcript, TranscriptEntry};
use crate::transport::FrameTransport;

/// Banner installed at the top of a fresh session transcript
pub const SESSION_BANNER: &str =
    "🚀 FileDeck Terminal - Ready!\nType commands and press Enter. Use \"exit\" to close the session.";

/// Local-only directive that resets the visible transcript
const CLEAR_DIRECTIVE: &str = "clear";

/// Lifecycle of the client-side terminal session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Starting,
    Active,
    Terminated,
}

/// Manages exactly one logical terminal session over a persistent duplex
/// connection.
///
/// Constructed once per connection with the outbound transport and driven by
/// discrete events: user submissions and inbound server frames, processed one
/// at a time by the owning task. Every method returns immediately; round-trip
/// latency to the host surfaces later as inbound frames. A transport send
/// failure means the connection is gone and terminates the session in place;
/// reconnection is the runner's concern, after which `start()` begins a fresh
/// session.
pub struct ConsoleSession<T: FrameTransport> {
    transport: T,
    state: SessionState,
    session_id: Option<SessionId>,
    transcript: Transcript,
}

impl<T: FrameTransport> ConsoleSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Uninitialized,
            session_id: None,
            transcript: Transcript::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the live session, bound from the host's acknowledgment
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        self.transcript.entries()
    }

    /// Request a new session from the host.
    ///
    /// Idempotent while a session is `Starting` or `Active`, so rapid
    /// re-entry into the terminal cannot spawn duplicates. Callable again
    /// after termination to begin a fresh session.
    pub fn start(&mut self) {
        match self.state {
            SessionState::Starting | SessionState::Active => return,
            SessionState::Uninitialized | SessionState::Terminated => {}
        }
        match self.transport.send(ClientFrame::StartTerminal) {
            Ok(()) => self.state = SessionState::Starting,
            Err(_) => self.mark_disconnected(),
        }
    }

    /// Submit one line of user input.
    ///
    /// The line is trimmed first. `clear` is intercepted in any state and
    /// resets the display without touching the remote session. Anything else
    /// is echoed into the transcript and transmitted only while the session
    /// is `Active`; early or late submissions are discarded, never queued.
    pub fn submit_command(&mut self, text: &str) {
        let command = text.trim();
        if command == CLEAR_DIRECTIVE {
            self.transcript.clear();
            return;
        }
        if command.is_empty() {
            return;
        }
        let session_id = match (self.state, &self.session_id) {
            (SessionState::Active, Some(id)) => id.clone(),
            _ => return,
        };
        // Echo lands before any output for this command can be processed.
        self.transcript
            .push(TranscriptEntry::Echo(command.to_string()));
        let frame = ClientFrame::TerminalInput {
            session_id,
            command: command.to_string(),
        };
        if self.transport.send(frame).is_err() {
            self.mark_disconnected();
        }
    }

    /// Dispatch one inbound server frame to its typed handler.
    pub fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::TerminalStarted { session_id } => self.on_session_started(session_id),
            ServerFrame::TerminalOutput { session_id, chunk } => self.on_output(session_id, chunk),
            ServerFrame::TerminalError { message } => self.on_error(message),
            ServerFrame::TerminalClosed { session_id } => self.on_session_closed(session_id),
        }
    }

    /// Explicit local teardown, used when the user leaves the console.
    ///
    /// Sends a best-effort close request for a bound session; safe in any
    /// state.
    pub fn terminate(&mut self) {
        if let Some(session_id) = self.session_id.take() {
            let _ = self.transport.send(ClientFrame::CloseTerminal { session_id });
        }
        self.state = SessionState::Terminated;
    }

    /// The connection dropped; the session is gone with it.
    pub fn mark_disconnected(&mut self) {
        self.session_id = None;
        self.state = SessionState::Terminated;
    }

    fn on_session_started(&mut self, session_id: SessionId) {
        // Acknowledgments are honored only during the handshake. A duplicate
        // or stale ack against a live session must not rebind it.
        if self.state != SessionState::Starting {
            tracing::debug!(%session_id, state = ?self.state, "ignoring session ack outside handshake");
            return;
        }
        self.session_id = Some(session_id);
        self.state = SessionState::Active;
        self.transcript.clear();
        self.transcript
            .push(TranscriptEntry::Banner(SESSION_BANNER.to_string()));
    }

    fn on_output(&mut self, session_id: SessionId, chunk: String) {
        if !self.is_current(&session_id) {
            tracing::debug!(%session_id, "dropping output frame for stale session");
            return;
        }
        self.transcript.push(TranscriptEntry::Output(chunk));
    }

    fn on_error(&mut self, message: String) {
        self.transcript.push(TranscriptEntry::Error(message));
    }

    fn on_session_closed(&mut self, session_id: SessionId) {
        if !self.is_current(&session_id) {
            tracing::debug!(%session_id, "dropping close notice for stale session");
            return;
        }
        self.session_id = None;
        self.state = SessionState::Terminated;
        self.transcript
            .push(TranscriptEntry::Notice("session closed".to_string()));
    }

    fn is_current(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }
}
