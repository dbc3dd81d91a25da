use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use filedeck_files::{FileStore, SystemMonitor};
use filedeck_terminal::{ShellConfig, TerminalHost};

use crate::config::ServerConfig;
use crate::web::routes;

/// Web server instance
pub struct WebServer {
    config: ServerConfig,
    store: Arc<FileStore>,
    host: Arc<TerminalHost>,
    monitor: Arc<SystemMonitor>,
}

impl WebServer {
    /// Create a new web server over the configured root
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = Arc::new(
            FileStore::new(&config.root)
                .with_context(|| format!("cannot serve root {}", config.root.display()))?,
        );
        let shell = ShellConfig {
            program: config.shell.clone(),
            args: Vec::new(),
            working_dir: Some(store.root().to_path_buf()),
        };
        let host = Arc::new(TerminalHost::new(shell, config.max_terminals));
        let monitor = Arc::new(SystemMonitor::new());

        Ok(Self {
            config,
            store,
            host,
            monitor,
        })
    }

    /// Serve until Ctrl-C, then close every live terminal session
    pub async fn start(self) -> Result<()> {
        let host = self.host.clone();
        let state = routes::AppState {
            store: self.store.clone(),
            host: self.host.clone(),
            monitor: self.monitor.clone(),
            auth_token: self.config.auth_token.clone(),
        };

        // Create router
        let mut app = routes::create_router(state);

        // Add CORS layer for browser clients
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors).layer(TraceLayer::new_for_http());

        // Serve the UI if a static directory is configured
        if let Some(static_dir) = &self.config.static_dir {
            if static_dir.exists() {
                println!("Serving static files from: {}", static_dir.display());
                app = app.fallback_service(ServeDir::new(static_dir));
            } else {
                tracing::warn!(dir = %static_dir.display(), "static directory does not exist");
            }
        }

        let bind_addr = self.config.bind_addr()?;
        println!("🗂️  {}", "FileDeck server".bold());
        println!("🌐 Listening on http://{}", bind_addr);
        println!("   Terminal endpoint: ws://{}/ws/terminal", bind_addr);
        println!("   Serving root: {}", self.store.root().display());
        if self.config.auth_token.is_some() {
            println!("   {}", "Bearer token required".yellow());
        }

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", bind_addr))?;

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_token.cancel();
            }
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        println!("🛑 Shutting down, closing terminal sessions");
        host.close_all().await;

        Ok(())
    }
}
