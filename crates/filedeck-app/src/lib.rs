//! FileDeck Application Library
//!
//! Wires the workspace crates into one binary: the axum web server (REST +
//! terminal WebSocket), the reqwest client behind the CLI subcommands, and
//! the interactive console runner.

// Re-export workspace crates
pub use filedeck_console as session;
pub use filedeck_files as files;
pub use filedeck_terminal as terminal;
pub use filedeck_types as types;

// Local modules
pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod logging;
pub mod web;

// Re-exports from local modules
pub use cli::{Cli, Commands};
pub use client::ApiClient;
pub use config::{ClientConfig, ServerConfig};
pub use web::WebServer;
