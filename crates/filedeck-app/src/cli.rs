use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// CLI arguments for filedeck
#[derive(Parser)]
#[command(name = "filedeck")]
#[command(about = "FileDeck - web file manager with an interactive terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server URL for client commands
    #[arg(long, global = true, value_name = "URL", env = "FILEDECK_SERVER", default_value = "http://127.0.0.1:8000")]
    pub server: String,

    /// Bearer token; required when the server was started with one
    #[arg(long, global = true, value_name = "TOKEN", env = "FILEDECK_TOKEN")]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the FileDeck server
    Serve(ServeArgs),
    /// Open an interactive terminal session on the server
    Console,
    /// List a directory on the server
    Ls {
        /// Directory to list
        #[arg(default_value = "/")]
        path: String,
    },
    /// Create a folder on the server
    Mkdir {
        /// Directory to create the folder in
        parent: String,
        /// Name of the new folder
        name: String,
    },
    /// Delete a file, or a folder with everything in it
    Rm {
        /// Path to delete
        path: String,
    },
    /// Rename a file or folder in place
    Mv {
        /// Path of the entry to rename
        path: String,
        /// New name (not a path)
        new_name: String,
    },
    /// Print a file's contents
    Cat {
        /// File to print
        path: String,
    },
    /// Write a file on the server from --content or stdin
    Write {
        /// File to write
        path: String,
        /// Content to write; read from stdin when omitted
        #[arg(long)]
        content: Option<String>,
    },
    /// Upload a local file into a server directory
    Upload {
        /// Local file to upload
        local: PathBuf,
        /// Server directory to upload into
        #[arg(default_value = "/")]
        dir: String,
    },
    /// Download a file from the server
    Download {
        /// Server file to download
        path: String,
        /// Local destination; defaults to the file's name
        local: Option<PathBuf>,
    },
    /// Show server CPU, memory, disk and uptime
    Info,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Settings for the `serve` subcommand.
///
/// Every flag falls back to the matching field of the TOML file named by
/// `--config`, then to a built-in default.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (default 0.0.0.0)
    #[arg(long, value_name = "ADDR", env = "FILEDECK_HOST")]
    pub host: Option<String>,

    /// Port to listen on (default 8000)
    #[arg(long, env = "FILEDECK_PORT")]
    pub port: Option<u16>,

    /// Directory served as the file-manager root (default /)
    #[arg(long, value_name = "DIR", env = "FILEDECK_ROOT")]
    pub root: Option<PathBuf>,

    /// Directory of static UI files served at /
    #[arg(long, value_name = "DIR", env = "FILEDECK_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Shell program backing terminal sessions (default bash)
    #[arg(long, value_name = "PROGRAM", env = "FILEDECK_SHELL")]
    pub shell: Option<String>,

    /// Maximum concurrent terminal sessions (default 16)
    #[arg(long, value_name = "N", env = "FILEDECK_MAX_TERMINALS")]
    pub max_terminals: Option<usize>,

    /// TOML config file supplying defaults for the flags above
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
