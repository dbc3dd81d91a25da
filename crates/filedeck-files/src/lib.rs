//! Root-scoped file service and system monitor
//!
//! `FileStore` implements the file-manager operations against a configured
//! root directory, producing the exact listing and error shapes of the HTTP
//! API. `SystemMonitor` backs the system-info endpoint.

pub mod error;
pub mod monitor;
pub mod store;

pub use error::FilesError;
pub use monitor::SystemMonitor;
pub use store::{Download, FileStore};
