//! End-to-end tests against a real server on an ephemeral port

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use filedeck::types::{ClientFrame, DirListing, ServerFrame, SystemInfoReport};
use filedeck::web::routes::{create_router, AppState};
use filedeck_files::{FileStore, SystemMonitor};
use filedeck_terminal::{ShellConfig, TerminalHost};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    // Keeps the served root alive for the server's lifetime.
    _root: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws/terminal", self.addr)
    }
}

async fn spawn_server(auth_token: Option<String>) -> TestServer {
    let root = TempDir::new().unwrap();
    let shell = ShellConfig {
        program: "sh".to_string(),
        args: Vec::new(),
        working_dir: Some(root.path().to_path_buf()),
    };
    let state = AppState {
        store: Arc::new(FileStore::new(root.path()).unwrap()),
        host: Arc::new(TerminalHost::new(shell, 4)),
        monitor: Arc::new(SystemMonitor::new()),
        auth_token,
    };
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer { addr, _root: root }
}

async fn send_frame(ws: &mut WsStream, frame: &ClientFrame) {
    let json = serde_json::to_string(frame).unwrap();
    ws.send(Message::text(json)).await.unwrap();
}

async fn next_frame(ws: &mut WsStream) -> ServerFrame {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("valid frame");
        }
    }
}

#[tokio::test]
async fn test_file_api_round_trip() {
    let server = spawn_server(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/create_folder"))
        .json(&serde_json::json!({ "parent_path": "/", "name": "docs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.json::<serde_json::Value>().await.unwrap(),
        serde_json::json!({ "success": true })
    );

    let response = client
        .post(server.url("/api/edit"))
        .json(&serde_json::json!({ "path": "/docs/notes.txt", "content": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let listing: DirListing = client
        .get(server.url("/api/files"))
        .query(&[("path", "/docs")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.path, "/docs");
    let names: Vec<&str> = listing.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["..", "notes.txt"]);
    assert_eq!(listing.items[1].size, "5 bytes");

    let body: serde_json::Value = client
        .get(server.url("/api/edit"))
        .query(&[("path", "/docs/notes.txt")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["content"], "hello");

    let response = client
        .post(server.url("/api/rename"))
        .json(&serde_json::json!({ "old_path": "/docs/notes.txt", "new_name": "notes.md" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(server.url("/api/delete"))
        .json(&serde_json::json!({ "path": "/docs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let listing: DirListing = client
        .get(server.url("/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.path, "/");
    assert!(listing.items.is_empty());
}

#[tokio::test]
async fn test_errors_carry_status_and_error_body() {
    let server = spawn_server(None).await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/api/download"))
        .query(&[("path", "/nope.txt")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("/nope.txt"));

    let response = client
        .get(server.url("/api/files"))
        .query(&[("path", "/../outside")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(server.url("/api/delete"))
        .json(&serde_json::json!({ "wrong_field": "/x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_upload_then_download() {
    let server = spawn_server(None).await;
    let client = reqwest::Client::new();

    let part = reqwest::multipart::Part::bytes(b"payload".to_vec()).file_name("my report.txt");
    let form = reqwest::multipart::Form::new()
        .text("path", "/")
        .part("file", part);
    let response = client
        .post(server.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The stored name is the sanitized one.
    let response = client
        .get(server.url("/api/download"))
        .query(&[("path", "/my_report.txt")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap(),
        "attachment; filename=\"my_report.txt\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"payload");
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let server = spawn_server(None).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("path", "/");
    let response = client
        .post(server.url("/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file selected");
}

#[tokio::test]
async fn test_system_info_shape() {
    let server = spawn_server(None).await;

    let info: SystemInfoReport = reqwest::get(server.url("/api/system_info"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(info.cpu.ends_with('%'));
    assert!(info.memory.ends_with('%'));
    assert!(info.disk.ends_with('%'));
}

#[tokio::test]
async fn test_auth_guards_api_and_ws() {
    let server = spawn_server(Some("secret".to_string())).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/api/files")).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(server.url("/api/files"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .get(server.url("/api/files"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The WebSocket handshake is refused without the token and accepted with
    // it as a query parameter.
    assert!(connect_async(server.ws_url()).await.is_err());
    let (mut ws, _response) = connect_async(format!("{}?token=secret", server.ws_url()))
        .await
        .unwrap();
    ws.close(None).await.ok();
}

#[tokio::test]
async fn test_terminal_session_end_to_end() {
    let server = spawn_server(None).await;
    let (mut ws, _response) = connect_async(server.ws_url()).await.unwrap();

    send_frame(&mut ws, &ClientFrame::StartTerminal).await;
    let session_id = match next_frame(&mut ws).await {
        ServerFrame::TerminalStarted { session_id } => session_id,
        other => panic!("expected TerminalStarted, got {:?}", other),
    };

    send_frame(
        &mut ws,
        &ClientFrame::TerminalInput {
            session_id: session_id.clone(),
            command: "echo deck-ok".to_string(),
        },
    )
    .await;

    let mut output = String::new();
    loop {
        match next_frame(&mut ws).await {
            ServerFrame::TerminalOutput {
                session_id: id,
                chunk,
            } => {
                assert_eq!(id, session_id);
                output.push_str(&chunk);
                if output.contains("deck-ok") {
                    break;
                }
            }
            other => panic!("expected TerminalOutput, got {:?}", other),
        }
    }

    send_frame(
        &mut ws,
        &ClientFrame::CloseTerminal {
            session_id: session_id.clone(),
        },
    )
    .await;
    loop {
        match next_frame(&mut ws).await {
            ServerFrame::TerminalClosed { session_id: id } => {
                assert_eq!(id, session_id);
                break;
            }
            ServerFrame::TerminalOutput { .. } => continue,
            other => panic!("expected TerminalClosed, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_second_start_replaces_the_live_session() {
    let server = spawn_server(None).await;
    let (mut ws, _response) = connect_async(server.ws_url()).await.unwrap();

    send_frame(&mut ws, &ClientFrame::StartTerminal).await;
    let first_id = match next_frame(&mut ws).await {
        ServerFrame::TerminalStarted { session_id } => session_id,
        other => panic!("expected TerminalStarted, got {:?}", other),
    };

    send_frame(&mut ws, &ClientFrame::StartTerminal).await;

    // The old session's close notice and the new session's start can arrive
    // in either order.
    let mut old_closed = false;
    let mut new_id = None;
    while !(old_closed && new_id.is_some()) {
        match next_frame(&mut ws).await {
            ServerFrame::TerminalClosed { session_id } => {
                assert_eq!(session_id, first_id);
                old_closed = true;
            }
            ServerFrame::TerminalStarted { session_id } => {
                assert_ne!(session_id, first_id);
                new_id = Some(session_id);
            }
            ServerFrame::TerminalOutput { .. } => {}
            other => panic!("unexpected frame {:?}", other),
        }
    }

    // The replacement session is live.
    let new_id = new_id.unwrap();
    send_frame(
        &mut ws,
        &ClientFrame::TerminalInput {
            session_id: new_id.clone(),
            command: "echo still-here".to_string(),
        },
    )
    .await;
    loop {
        if let ServerFrame::TerminalOutput { chunk, .. } = next_frame(&mut ws).await {
            if chunk.contains("still-here") {
                break;
            }
        }
    }
}

#[tokio::test]
async fn test_input_for_unknown_session_is_ignored() {
    let server = spawn_server(None).await;
    let (mut ws, _response) = connect_async(server.ws_url()).await.unwrap();

    send_frame(&mut ws, &ClientFrame::StartTerminal).await;
    let session_id = match next_frame(&mut ws).await {
        ServerFrame::TerminalStarted { session_id } => session_id,
        other => panic!("expected TerminalStarted, got {:?}", other),
    };

    send_frame(
        &mut ws,
        &ClientFrame::TerminalInput {
            session_id: filedeck::types::SessionId::new("bogus"),
            command: "echo never".to_string(),
        },
    )
    .await;
    send_frame(
        &mut ws,
        &ClientFrame::TerminalInput {
            session_id: session_id.clone(),
            command: "echo marker".to_string(),
        },
    )
    .await;

    let mut output = String::new();
    loop {
        match next_frame(&mut ws).await {
            ServerFrame::TerminalOutput { chunk, .. } => {
                output.push_str(&chunk);
                if output.contains("marker") {
                    break;
                }
            }
            other => panic!("expected TerminalOutput, got {:?}", other),
        }
    }
    assert!(!output.contains("never"));
}
