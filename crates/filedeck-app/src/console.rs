//! Interactive terminal console
//!
//! Drives a [`ConsoleSession`] over a real WebSocket: stdin lines feed the
//! session, inbound frames mutate the transcript, and the transcript renders
//! incrementally to the local terminal.

use std::io::{self, Write};

use anyhow::{Context, Result};
use colored::Colorize;
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use filedeck_console::{ChannelTransport, ConsoleSession, SessionState, TranscriptEntry};
use filedeck_types::ServerFrame;

use crate::config::ClientConfig;

/// Connect to the server and run the console until the user leaves.
///
/// `exit` goes to the shell like any other command; the session ends when the
/// host reports the process gone. Ctrl-D leaves immediately with a best-effort
/// close request.
pub async fn run(config: &ClientConfig) -> Result<()> {
    let (socket, _response) = connect_async(config.ws_url())
        .await
        .with_context(|| format!("failed to connect to {}", config.server))?;
    println!("{}", format!("🔌 Connected to {}", config.server).cyan());

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Writer task; the session's transport feeds this channel.
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    let forward_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sink.send(Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut session = ConsoleSession::new(ChannelTransport::new(frame_tx));
    session.start();

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut rendered = 0;

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) => {
                        let leaving = line.trim() == "exit"
                            && session.state() != SessionState::Active;
                        session.submit_command(&line);
                        if leaving {
                            break;
                        }
                    }
                    None => break,
                }
            }
            message = ws_stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(frame) => session.handle_frame(frame),
                            Err(error) => {
                                tracing::debug!(%error, "ignoring malformed frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        session.mark_disconnected();
                        println!("{}", "connection closed by server".yellow());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        session.mark_disconnected();
                        println!("{} {}", "connection lost:".red(), error);
                        break;
                    }
                }
            }
        }
        rendered = render_new_entries(&session, rendered);
        if session.state() == SessionState::Terminated {
            break;
        }
    }

    session.terminate();
    render_new_entries(&session, rendered);
    // Dropping the session closes the frame channel; the writer drains the
    // best-effort close request before it exits.
    drop(session);
    let _ = forward_task.await;
    println!("{}", "👋 Console closed".dimmed());
    Ok(())
}

/// Render transcript entries past `from`, returning the new high-water mark.
///
/// A transcript shorter than the mark means the display was cleared; wipe the
/// screen and render from the top.
fn render_new_entries(session: &ConsoleSession<ChannelTransport>, from: usize) -> usize {
    let entries = session.transcript();
    let mut start = from;
    if entries.len() < from {
        print!("\x1b[2J\x1b[H");
        start = 0;
    }
    for entry in &entries[start..] {
        match entry {
            TranscriptEntry::Banner(text) => println!("{}", text.green().bold()),
            TranscriptEntry::Echo(command) => {
                println!("{} {}", "$".cyan().bold(), command.cyan())
            }
            TranscriptEntry::Output(chunk) => print!("{}", chunk),
            TranscriptEntry::Error(message) => {
                println!("{} {}", "❌ Error:".red().bold(), message)
            }
            TranscriptEntry::Notice(text) => println!("{}", text.dimmed()),
        }
    }
    let _ = io::stdout().flush();
    entries.len()
}
