use axum::{
    body::Body,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        DefaultBodyLimit, Multipart, Query, Request, State, WebSocketUpgrade,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

use filedeck_files::{FileStore, FilesError, SystemMonitor};
use filedeck_terminal::{SessionEvent, TerminalHost};
use filedeck_types::{ClientFrame, DirListing, ServerFrame, SessionId, SystemInfoReport};

/// Uploads above this size are rejected outright
const MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub host: Arc<TerminalHost>,
    pub monitor: Arc<SystemMonitor>,
    pub auth_token: Option<String>,
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // File API
        .route("/api/files", get(list_files))
        .route("/api/create_folder", post(create_folder))
        .route("/api/delete", post(delete_entry))
        .route("/api/rename", post(rename_entry))
        .route("/api/upload", post(upload_file))
        .route("/api/download", get(download_file))
        .route("/api/edit", get(read_file).post(write_file))
        .route("/api/system_info", get(system_info))
        // Terminal endpoint
        .route("/ws/terminal", get(terminal_socket))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

/// Reject requests without the configured bearer token.
///
/// WebSocket clients cannot always set headers, so a `token` query parameter
/// is accepted as an equivalent.
async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.auth_token else {
        return next.run(req).await;
    };
    let bearer = format!("Bearer {}", expected);
    let header_ok = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == bearer);
    let query_ok = req.uri().query().is_some_and(|query| {
        query
            .split('&')
            .any(|pair| pair.strip_prefix("token=") == Some(expected.as_str()))
    });
    if header_ok || query_ok {
        next.run(req).await
    } else {
        let body = Json(serde_json::json!({ "error": "invalid or missing token" }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[derive(Deserialize)]
struct PathQuery {
    #[serde(default = "default_path")]
    path: String,
}

fn default_path() -> String {
    "/".to_string()
}

#[derive(Deserialize)]
struct CreateFolderBody {
    parent_path: String,
    name: String,
}

#[derive(Deserialize)]
struct DeleteBody {
    path: String,
}

#[derive(Deserialize)]
struct RenameBody {
    old_path: String,
    new_name: String,
}

#[derive(Deserialize)]
struct EditBody {
    path: String,
    content: String,
}

/// GET /api/files - List a directory
async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<DirListing>, AppError> {
    Ok(Json(state.store.list_dir(&query.path).await?))
}

/// POST /api/create_folder - Create a folder under a parent directory
async fn create_folder(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body: CreateFolderBody = serde_json::from_value(payload)?;
    state.store.create_dir(&body.parent_path, &body.name).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/delete - Delete a file or directory
async fn delete_entry(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body: DeleteBody = serde_json::from_value(payload)?;
    state.store.remove(&body.path).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/rename - Rename an entry within its directory
async fn rename_entry(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body: RenameBody = serde_json::from_value(payload)?;
    state.store.rename(&body.old_path, &body.new_name).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/upload - Store a multipart upload into a directory
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut dir_path = "/".to_string();
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("path") => dir_path = field.text().await?,
            Some("file") => {
                let name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .map(str::to_string);
                let bytes = field.bytes().await?;
                if let Some(name) = name {
                    upload = Some((name, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }
    let (name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("No file selected".to_string()))?;
    state.store.save_upload(&dir_path, &name, &bytes).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/download - Stream a file as an attachment
async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, AppError> {
    let download = state.store.open_download(&query.path).await?;
    let headers = [
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.name),
        ),
        (header::CONTENT_LENGTH, download.size.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(download.file));
    Ok((headers, body).into_response())
}

/// GET /api/edit - Read a file for the editor
async fn read_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let content = state.store.read_text(&query.path).await?;
    Ok(Json(serde_json::json!({ "content": content })))
}

/// POST /api/edit - Overwrite a file from the editor
async fn write_file(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body: EditBody = serde_json::from_value(payload)?;
    state.store.write_text(&body.path, &body.content).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/system_info - Host resource snapshot
async fn system_info(State(state): State<AppState>) -> Json<SystemInfoReport> {
    Json(state.monitor.report().await)
}

/// GET /ws/terminal - Terminal frame protocol endpoint
async fn terminal_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_terminal_socket(socket, state))
}

/// Handle one terminal connection.
///
/// The connection owns at most one live session; a new start request replaces
/// the old session, and disconnecting closes it so children never outlive
/// their connection.
async fn handle_terminal_socket(socket: WebSocket, state: AppState) {
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerFrame>();
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Spawn task to serialize outbound frames onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&frame) {
                if ws_sink.send(WsMessage::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut session: Option<SessionId> = None;

    while let Some(Ok(msg)) = ws_stream.next().await {
        if let WsMessage::Text(text) = msg {
            match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => handle_client_frame(frame, &state, &outbox, &mut session).await,
                Err(error) => {
                    tracing::debug!(%error, "ignoring malformed frame");
                }
            }
        }
    }

    // Client disconnected
    if let Some(session_id) = session.take() {
        state.host.close(&session_id).await;
    }
    send_task.abort();
}

/// Handle a frame from the client
async fn handle_client_frame(
    frame: ClientFrame,
    state: &AppState,
    outbox: &mpsc::UnboundedSender<ServerFrame>,
    session: &mut Option<SessionId>,
) {
    match frame {
        ClientFrame::StartTerminal => {
            // A start while a session is live replaces it.
            if let Some(old) = session.take() {
                state.host.close(&old).await;
            }
            match state.host.spawn().await {
                Ok((session_id, events)) => {
                    *session = Some(session_id.clone());
                    spawn_event_forwarder(session_id.clone(), events, outbox.clone());
                    let _ = outbox.send(ServerFrame::TerminalStarted { session_id });
                }
                Err(error) => {
                    tracing::warn!(%error, "failed to start terminal session");
                    let _ = outbox.send(ServerFrame::TerminalError {
                        message: error.to_string(),
                    });
                }
            }
        }
        ClientFrame::TerminalInput {
            session_id,
            command,
        } => {
            state.host.write_input(&session_id, &command).await;
        }
        ClientFrame::CloseTerminal { session_id } => {
            if session.as_ref() == Some(&session_id) {
                *session = None;
            }
            state.host.close(&session_id).await;
        }
    }
}

/// Relay one session's host events onto the connection as frames
fn spawn_event_forwarder(
    session_id: SessionId,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    outbox: mpsc::UnboundedSender<ServerFrame>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match event {
                SessionEvent::Output(chunk) => ServerFrame::TerminalOutput {
                    session_id: session_id.clone(),
                    chunk,
                },
                SessionEvent::Error(message) => ServerFrame::TerminalError { message },
                SessionEvent::Closed => {
                    let _ = outbox.send(ServerFrame::TerminalClosed {
                        session_id: session_id.clone(),
                    });
                    break;
                }
            };
            if outbox.send(frame).is_err() {
                break;
            }
        }
    });
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    Files(FilesError),
    BadRequest(String),
    SerdeJson(serde_json::Error),
}

impl From<FilesError> for AppError {
    fn from(err: FilesError) -> Self {
        AppError::Files(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeJson(err)
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Files(err) => {
                let status = match &err {
                    FilesError::NotFound(_) => StatusCode::NOT_FOUND,
                    FilesError::InvalidPath(_) | FilesError::InvalidName(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    FilesError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::SerdeJson(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };

        let body = Json(serde_json::json!({ "error": message }));

        (status, body).into_response()
    }
}
