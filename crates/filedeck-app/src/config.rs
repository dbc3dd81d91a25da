//! Server and client configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::{Cli, ServeArgs};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SHELL: &str = "bash";
pub const DEFAULT_MAX_TERMINALS: usize = 16;

/// Optional settings read from a `--config` TOML file
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    root: Option<PathBuf>,
    static_dir: Option<PathBuf>,
    shell: Option<String>,
    max_terminals: Option<usize>,
    token: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Resolved server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub shell: String,
    pub max_terminals: usize,
    pub auth_token: Option<String>,
}

impl ServerConfig {
    /// Layer `serve` flags over the config file, then built-in defaults
    pub fn resolve(args: &ServeArgs, token: Option<String>) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self {
            host: args
                .host
                .clone()
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            root: args
                .root
                .clone()
                .or(file.root)
                .unwrap_or_else(|| PathBuf::from("/")),
            static_dir: args.static_dir.clone().or(file.static_dir),
            shell: args
                .shell
                .clone()
                .or(file.shell)
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            max_terminals: args
                .max_terminals
                .or(file.max_terminals)
                .unwrap_or(DEFAULT_MAX_TERMINALS),
            auth_token: token.or(file.token),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Settings client commands use to reach a server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            server: cli.server.trim_end_matches('/').to_string(),
            token: cli.token.clone(),
        }
    }

    /// REST endpoint URL for a server path like `/api/files`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    /// Terminal WebSocket URL, carrying the token as a query parameter so the
    /// handshake can be authorized before the upgrade
    pub fn ws_url(&self) -> String {
        let ws_base = if let Some(rest) = self.server.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.server.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", self.server)
        };
        match &self.token {
            Some(token) => format!("{}/ws/terminal?token={}", ws_base, token),
            None => format!("{}/ws/terminal", ws_base),
        }
    }
}
