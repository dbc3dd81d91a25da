//! Registry of live shell sessions

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use filedeck_types::SessionId;

/// Upper bound on one pipe read; each read becomes one output frame
const READ_CHUNK_SIZE: usize = 4096;

/// Reported to the client when the child's stdin rejects a write
const CONNECTION_LOST: &str = "Terminal connection lost";

/// Errors from the session host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("maximum concurrent sessions ({0}) reached")]
    SessionLimit(usize),
    #[error("failed to launch shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: io::Error,
    },
}

/// One event from a live session's process.
///
/// `Closed` is always the final event for a session, delivered after every
/// remaining output chunk has been drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One chunk of process output, decoded lossily as UTF-8
    Output(String),
    /// Per-session failure; the session may still accept input
    Error(String),
    /// The process exited or was killed
    Closed,
}

/// Launch settings for hosted shell sessions
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the shell; inherits the server's when unset
    pub working_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "bash".to_string(),
            args: Vec::new(),
            working_dir: None,
        }
    }
}

struct SessionEntry {
    stdin: Arc<Mutex<ChildStdin>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

/// Spawns and tracks shell sessions for terminal connections.
///
/// Shared via `Arc`; every operation takes `&self`. Sessions remove
/// themselves from the registry when their process exits, so entries never
/// outlive their children.
pub struct TerminalHost {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    shell: ShellConfig,
    max_sessions: usize,
}

impl TerminalHost {
    pub fn new(shell: ShellConfig, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            shell,
            max_sessions,
        }
    }

    /// Launch a new shell session.
    ///
    /// Returns the assigned session id together with the event stream the
    /// connection handler forwards to its client. The child runs with piped
    /// stdio; stdout and stderr are pumped as separate chunk streams whose
    /// interleaving follows arrival order.
    pub async fn spawn(&self) -> Result<(SessionId, mpsc::UnboundedReceiver<SessionEvent>), HostError> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(HostError::SessionLimit(self.max_sessions));
        }

        let mut command = Command::new(&self.shell.program);
        command
            .args(&self.shell.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.shell.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| HostError::Spawn {
            shell: self.shell.program.clone(),
            source,
        })?;

        let stdin = Self::take_pipe(child.stdin.take(), &self.shell.program)?;
        let stdout = Self::take_pipe(child.stdout.take(), &self.shell.program)?;
        let stderr = Self::take_pipe(child.stderr.take(), &self.shell.program)?;

        let session_id = SessionId::new(Uuid::new_v4().to_string());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        sessions.insert(
            session_id.clone(),
            SessionEntry {
                stdin: Arc::new(Mutex::new(stdin)),
                events: event_tx.clone(),
                cancel: cancel.clone(),
            },
        );
        drop(sessions);

        let pumps = vec![
            tokio::spawn(pump_output(stdout, event_tx.clone())),
            tokio::spawn(pump_output(stderr, event_tx.clone())),
        ];
        tokio::spawn(reap_session(
            child,
            cancel,
            pumps,
            event_tx,
            Arc::clone(&self.sessions),
            session_id.clone(),
        ));

        tracing::info!(%session_id, shell = %self.shell.program, "terminal session started");
        Ok((session_id, event_rx))
    }

    /// Write one input line to a session's stdin.
    ///
    /// Unknown session ids are dropped silently, matching the client-side
    /// stale-frame rule. A failed write reports `Terminal connection lost`
    /// on the session's event stream instead of failing the call.
    pub async fn write_input(&self, session_id: &SessionId, command: &str) {
        let entry = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_id)
                .map(|entry| (Arc::clone(&entry.stdin), entry.events.clone()))
        };
        let (stdin, events) = match entry {
            Some(entry) => entry,
            None => {
                tracing::debug!(%session_id, "dropping input for unknown session");
                return;
            }
        };

        let line = format!("{}\n", command);
        let mut stdin = stdin.lock().await;
        if stdin.write_all(line.as_bytes()).await.is_err() || stdin.flush().await.is_err() {
            tracing::warn!(%session_id, "stdin write failed");
            let _ = events.send(SessionEvent::Error(CONNECTION_LOST.to_string()));
        }
    }

    /// Terminate a session's process. Unknown ids are a no-op.
    ///
    /// The final `Closed` event fires once the process is gone and its
    /// output has drained.
    pub async fn close(&self, session_id: &SessionId) {
        let cancel = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).map(|entry| entry.cancel.clone())
        };
        match cancel {
            Some(token) => token.cancel(),
            None => tracing::debug!(%session_id, "close for unknown session"),
        }
    }

    /// Terminate every live session; used on server shutdown
    pub async fn close_all(&self) {
        let tokens: Vec<CancellationToken> = {
            let sessions = self.sessions.read().await;
            sessions.values().map(|entry| entry.cancel.clone()).collect()
        };
        for token in tokens {
            token.cancel();
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn take_pipe<P>(pipe: Option<P>, shell: &str) -> Result<P, HostError> {
        pipe.ok_or_else(|| HostError::Spawn {
            shell: shell.to_string(),
            source: io::Error::new(io::ErrorKind::Other, "child stdio not captured"),
        })
    }
}

/// Read one pipe to EOF, forwarding each chunk verbatim
async fn pump_output<R>(mut reader: R, events: mpsc::UnboundedSender<SessionEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if events.send(SessionEvent::Output(chunk)).is_err() {
                    break;
                }
            }
            Err(error) => {
                tracing::debug!(%error, "output pump stopped");
                break;
            }
        }
    }
}

/// Wait for process exit (or a close request), drain the pumps, then emit
/// the final `Closed` event and drop the registry entry
async fn reap_session(
    mut child: Child,
    cancel: CancellationToken,
    pumps: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    session_id: SessionId,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            if let Err(error) = child.kill().await {
                tracing::debug!(%session_id, %error, "kill after close request failed");
            }
        }
        status = child.wait() => {
            match status {
                Ok(status) => tracing::info!(%session_id, %status, "terminal session exited"),
                Err(error) => tracing::warn!(%session_id, %error, "waiting on terminal session failed"),
            }
        }
    }

    // The pipes are closed now, so both pumps finish on EOF. Joining them
    // before Closed keeps every output chunk ahead of the final event.
    for pump in pumps {
        let _ = pump.await;
    }

    sessions.write().await.remove(&session_id);
    let _ = events.send(SessionEvent::Closed);
}
