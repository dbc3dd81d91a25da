//! Behavior of the client-side terminal session state machine

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use filedeck_console::{
    ConsoleSession, FrameTransport, SessionState, TranscriptEntry, TransportError, SESSION_BANNER,
};
use filedeck_types::{ClientFrame, ServerFrame, SessionId};
use pretty_assertions::assert_eq;

/// Transport that records every frame instead of transmitting it
#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Rc<RefCell<Vec<ClientFrame>>>,
    closed: Rc<Cell<bool>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self::default()
    }

    fn sent(&self) -> Vec<ClientFrame> {
        self.sent.borrow().clone()
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

impl FrameTransport for RecordingTransport {
    fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        if self.closed.get() {
            return Err(TransportError::Closed);
        }
        self.sent.borrow_mut().push(frame);
        Ok(())
    }
}

fn started(id: &str) -> ServerFrame {
    ServerFrame::TerminalStarted {
        session_id: SessionId::new(id),
    }
}

fn output(id: &str, chunk: &str) -> ServerFrame {
    ServerFrame::TerminalOutput {
        session_id: SessionId::new(id),
        chunk: chunk.to_string(),
    }
}

fn active_session() -> (ConsoleSession<RecordingTransport>, RecordingTransport) {
    let transport = RecordingTransport::new();
    let mut session = ConsoleSession::new(transport.clone());
    session.start();
    session.handle_frame(started("t1"));
    (session, transport)
}

#[test]
fn test_start_requests_a_session_and_is_idempotent() {
    let transport = RecordingTransport::new();
    let mut session = ConsoleSession::new(transport.clone());
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.start();
    assert_eq!(session.state(), SessionState::Starting);

    // Rapid re-entry must not spawn duplicates, before or after activation.
    session.start();
    session.handle_frame(started("t1"));
    session.start();
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(transport.sent(), vec![ClientFrame::StartTerminal]);
}

#[test]
fn test_commands_before_activation_are_discarded() {
    let transport = RecordingTransport::new();
    let mut session = ConsoleSession::new(transport.clone());

    session.submit_command("ls");
    session.start();
    session.submit_command("pwd");

    assert!(session.transcript().is_empty());
    assert_eq!(transport.sent(), vec![ClientFrame::StartTerminal]);
}

#[test]
fn test_clear_is_intercepted_in_every_state() {
    // Before any session exists.
    let transport = RecordingTransport::new();
    let mut session = ConsoleSession::new(transport.clone());
    session.submit_command("clear");
    assert!(session.transcript().is_empty());
    assert!(transport.sent().is_empty());

    // While active, with content on screen.
    let (mut session, transport) = active_session();
    session.submit_command("ls");
    session.handle_frame(output("t1", "a.txt\n"));
    let frames_before = transport.sent().len();

    session.submit_command("  clear  ");
    assert!(session.transcript().is_empty());
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(transport.sent().len(), frames_before);

    // After termination.
    session.handle_frame(ServerFrame::TerminalClosed {
        session_id: SessionId::new("t1"),
    });
    session.submit_command("clear");
    assert!(session.transcript().is_empty());
}

#[test]
fn test_stale_output_is_dropped() {
    let (mut session, _transport) = active_session();
    let before = session.transcript().to_vec();

    session.handle_frame(output("t9", "should not appear"));

    assert_eq!(session.transcript(), &before[..]);
}

#[test]
fn test_echo_precedes_output_for_the_same_command() {
    let (mut session, _transport) = active_session();

    session.submit_command("ls");
    session.handle_frame(output("t1", "a.txt"));

    assert_eq!(
        session.transcript(),
        &[
            TranscriptEntry::Banner(SESSION_BANNER.to_string()),
            TranscriptEntry::Echo("ls".to_string()),
            TranscriptEntry::Output("a.txt".to_string()),
        ]
    );
}

#[test]
fn test_duplicate_ack_with_different_id_is_ignored() {
    let (mut session, _transport) = active_session();
    session.submit_command("ls");
    let before = session.transcript().to_vec();

    session.handle_frame(started("t2"));

    assert_eq!(session.session_id(), Some(&SessionId::new("t1")));
    assert_eq!(session.transcript(), &before[..]);
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn test_full_session_scenario() {
    let transport = RecordingTransport::new();
    let mut session = ConsoleSession::new(transport.clone());

    session.start();
    session.handle_frame(started("t1"));
    session.submit_command("pwd");
    session.handle_frame(output("t1", "/home\n"));

    assert_eq!(
        session.transcript(),
        &[
            TranscriptEntry::Banner(SESSION_BANNER.to_string()),
            TranscriptEntry::Echo("pwd".to_string()),
            TranscriptEntry::Output("/home\n".to_string()),
        ]
    );
    assert_eq!(
        transport.sent(),
        vec![
            ClientFrame::StartTerminal,
            ClientFrame::TerminalInput {
                session_id: SessionId::new("t1"),
                command: "pwd".to_string(),
            },
        ]
    );
}

#[test]
fn test_output_frames_apply_in_arrival_order() {
    let (mut session, _transport) = active_session();

    session.handle_frame(output("t1", "foo"));
    session.handle_frame(output("t1", "bar"));

    assert_eq!(
        &session.transcript()[1..],
        &[
            TranscriptEntry::Output("foo".to_string()),
            TranscriptEntry::Output("bar".to_string()),
        ]
    );
}

#[test]
fn test_type_ahead_needs_no_flow_control() {
    let (mut session, _transport) = active_session();

    // Output for command n may land after the echo of command n+1.
    session.submit_command("ls");
    session.submit_command("pwd");
    session.handle_frame(output("t1", "a.txt\n"));
    session.handle_frame(output("t1", "/home\n"));

    assert_eq!(
        &session.transcript()[1..],
        &[
            TranscriptEntry::Echo("ls".to_string()),
            TranscriptEntry::Echo("pwd".to_string()),
            TranscriptEntry::Output("a.txt\n".to_string()),
            TranscriptEntry::Output("/home\n".to_string()),
        ]
    );
}

#[test]
fn test_error_frames_append_without_state_change() {
    let (mut session, _transport) = active_session();

    session.handle_frame(ServerFrame::TerminalError {
        message: "Terminal connection lost".to_string(),
    });

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(
        session.transcript().last(),
        Some(&TranscriptEntry::Error(
            "Terminal connection lost".to_string()
        ))
    );

    // The session stays usable afterwards.
    session.submit_command("ls");
    assert_eq!(
        session.transcript().last(),
        Some(&TranscriptEntry::Echo("ls".to_string()))
    );
}

#[test]
fn test_closed_notice_terminates_and_allows_restart() {
    let (mut session, transport) = active_session();

    session.handle_frame(ServerFrame::TerminalClosed {
        session_id: SessionId::new("t1"),
    });
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.session_id(), None);
    assert_eq!(
        session.transcript().last(),
        Some(&TranscriptEntry::Notice("session closed".to_string()))
    );

    // Late output for the dead session has nowhere to go.
    let before = session.transcript().to_vec();
    session.handle_frame(output("t1", "late"));
    assert_eq!(session.transcript(), &before[..]);

    // A fresh start handshakes a new session from scratch.
    session.start();
    assert_eq!(session.state(), SessionState::Starting);
    session.handle_frame(started("t2"));
    assert_eq!(session.session_id(), Some(&SessionId::new("t2")));
    assert_eq!(
        session.transcript(),
        &[TranscriptEntry::Banner(SESSION_BANNER.to_string())]
    );
    assert_eq!(transport.sent().last(), Some(&ClientFrame::StartTerminal));
}

#[test]
fn test_empty_and_whitespace_input_is_ignored() {
    let (mut session, transport) = active_session();
    let frames_before = transport.sent().len();
    let before = session.transcript().to_vec();

    session.submit_command("");
    session.submit_command("   ");
    session.submit_command("\t\n");

    assert_eq!(session.transcript(), &before[..]);
    assert_eq!(transport.sent().len(), frames_before);
}

#[test]
fn test_send_failure_terminates_the_session() {
    let (mut session, transport) = active_session();

    transport.close();
    session.submit_command("ls");

    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.session_id(), None);

    // start() against a dead connection stays terminated.
    session.start();
    assert_eq!(session.state(), SessionState::Terminated);
}

#[test]
fn test_terminate_sends_best_effort_close() {
    let (mut session, transport) = active_session();

    session.terminate();

    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(
        transport.sent().last(),
        Some(&ClientFrame::CloseTerminal {
            session_id: SessionId::new("t1"),
        })
    );

    // Terminate before any id is bound sends nothing extra.
    let transport = RecordingTransport::new();
    let mut session = ConsoleSession::new(transport.clone());
    session.start();
    session.terminate();
    assert_eq!(transport.sent(), vec![ClientFrame::StartTerminal]);
}
