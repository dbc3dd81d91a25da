//! Root-scoped file operations

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::fs;

use filedeck_types::{DirListing, EntryKind, FileEntry};

use crate::error::FilesError;

/// An opened file ready for streamed download
pub struct Download {
    pub file: fs::File,
    pub name: String,
    pub size: u64,
}

/// File-manager operations against one served root directory.
///
/// Callers address entries by absolute virtual paths (`/`-rooted); the store
/// resolves them under the configured root and rejects any path that would
/// escape it. With the root set to `/` the virtual namespace and the host
/// filesystem coincide.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store over `root`, which must exist
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FilesError> {
        let root = root.into().canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List one directory: a `..` pseudo-entry unless at the root, then
    /// directories, then files, each group sorted by name. Entries that fail
    /// to stat are skipped.
    pub async fn list_dir(&self, path: &str) -> Result<DirListing, FilesError> {
        let target = self.resolve(path)?;
        let metadata = fs::metadata(&target)
            .await
            .map_err(|_| FilesError::NotFound(path.to_string()))?;
        if !metadata.is_dir() {
            return Err(FilesError::InvalidPath(format!("not a directory: {}", path)));
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        if path != "/" {
            dirs.push(FileEntry {
                name: "..".to_string(),
                path: virtual_parent(path),
                kind: EntryKind::Directory,
                size: "-".to_string(),
                modified: "-".to_string(),
            });
        }

        let mut names = Vec::new();
        let mut read_dir = fs::read_dir(&target).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        for name in names {
            let real = target.join(&name);
            let metadata = match fs::metadata(&real).await {
                Ok(metadata) => metadata,
                Err(error) => {
                    tracing::debug!(%error, entry = %real.display(), "skipping unreadable entry");
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .map(format_modified)
                .unwrap_or_else(|_| "-".to_string());
            let virtual_path = join_virtual(path, &name);
            if metadata.is_dir() {
                dirs.push(FileEntry {
                    name,
                    path: virtual_path,
                    kind: EntryKind::Directory,
                    size: "-".to_string(),
                    modified,
                });
            } else {
                files.push(FileEntry {
                    name,
                    path: virtual_path,
                    kind: EntryKind::File,
                    size: format_size(metadata.len()),
                    modified,
                });
            }
        }

        dirs.extend(files);
        Ok(DirListing {
            path: path.to_string(),
            items: dirs,
        })
    }

    /// Create a directory under `parent_path`; succeeds when it already
    /// exists, creating missing parents along the way
    pub async fn create_dir(&self, parent_path: &str, name: &str) -> Result<(), FilesError> {
        let name = validate_entry_name(name)?;
        let parent = self.resolve(parent_path)?;
        fs::create_dir_all(parent.join(name)).await?;
        Ok(())
    }

    /// Delete a file, or a directory with everything beneath it
    pub async fn remove(&self, path: &str) -> Result<(), FilesError> {
        let target = self.resolve(path)?;
        if target == self.root {
            return Err(FilesError::InvalidPath(
                "cannot remove the served root".to_string(),
            ));
        }
        let metadata = fs::metadata(&target)
            .await
            .map_err(|_| FilesError::NotFound(path.to_string()))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&target).await?;
        } else {
            fs::remove_file(&target).await?;
        }
        Ok(())
    }

    /// Rename an entry within its parent directory
    pub async fn rename(&self, old_path: &str, new_name: &str) -> Result<(), FilesError> {
        let new_name = validate_entry_name(new_name)?;
        let old = self.resolve(old_path)?;
        if old == self.root {
            return Err(FilesError::InvalidPath(
                "cannot rename the served root".to_string(),
            ));
        }
        let parent = old.parent().ok_or_else(|| {
            FilesError::InvalidPath("cannot rename the served root".to_string())
        })?;
        if !fs::try_exists(&old).await? {
            return Err(FilesError::NotFound(old_path.to_string()));
        }
        fs::rename(&old, parent.join(new_name)).await?;
        Ok(())
    }

    /// Read a whole file as UTF-8, for the editor
    pub async fn read_text(&self, path: &str) -> Result<String, FilesError> {
        let target = self.resolve(path)?;
        let metadata = fs::metadata(&target)
            .await
            .map_err(|_| FilesError::NotFound(path.to_string()))?;
        if metadata.is_dir() {
            return Err(FilesError::InvalidPath(format!("not a file: {}", path)));
        }
        Ok(fs::read_to_string(&target).await?)
    }

    /// Overwrite a whole file, for the editor
    pub async fn write_text(&self, path: &str, content: &str) -> Result<(), FilesError> {
        let target = self.resolve(path)?;
        fs::write(&target, content).await?;
        Ok(())
    }

    /// Store an uploaded file into `dir_path` under a sanitized name.
    ///
    /// Returns the name actually used.
    pub async fn save_upload(
        &self,
        dir_path: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, FilesError> {
        let safe_name = sanitize_file_name(file_name)?;
        let dir = self.resolve(dir_path)?;
        fs::write(dir.join(&safe_name), bytes).await?;
        Ok(safe_name)
    }

    /// Open a file for attachment download
    pub async fn open_download(&self, path: &str) -> Result<Download, FilesError> {
        let target = self.resolve(path)?;
        let metadata = fs::metadata(&target)
            .await
            .map_err(|_| FilesError::NotFound(path.to_string()))?;
        if metadata.is_dir() {
            return Err(FilesError::InvalidPath(format!("not a file: {}", path)));
        }
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        let file = fs::File::open(&target).await?;
        Ok(Download {
            file,
            name,
            size: metadata.len(),
        })
    }

    /// Map a virtual path onto the served root.
    ///
    /// Paths must be absolute and may not contain `..` components, and the
    /// canonical form of the result must stay under the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, FilesError> {
        let mut resolved = self.root.clone();
        let mut saw_root = false;
        for component in Path::new(path).components() {
            match component {
                std::path::Component::RootDir => saw_root = true,
                std::path::Component::Normal(part) => resolved.push(part),
                std::path::Component::CurDir => {}
                _ => {
                    return Err(FilesError::InvalidPath(format!(
                        "path escapes the served root: {}",
                        path
                    )))
                }
            }
        }
        if !saw_root {
            return Err(FilesError::InvalidPath(format!(
                "path must be absolute: {}",
                path
            )));
        }
        self.check_canonical(&resolved, path)?;
        Ok(resolved)
    }

    /// Reject a lexically-resolved path whose canonical form leaves the root.
    ///
    /// The lexical pass cannot see symlinks, and terminal sessions run a
    /// shell inside the root that can create them. The path itself may not
    /// exist yet (writes, uploads), so the deepest existing ancestor is
    /// canonicalized instead and checked against the canonical root.
    fn check_canonical(&self, resolved: &Path, path: &str) -> Result<(), FilesError> {
        let mut probe = resolved;
        let canonical = loop {
            match probe.canonicalize() {
                Ok(canonical) => break canonical,
                Err(_) => match probe.parent() {
                    Some(parent) => probe = parent,
                    None => {
                        return Err(FilesError::InvalidPath(format!(
                            "path escapes the served root: {}",
                            path
                        )))
                    }
                },
            }
        };
        if canonical.starts_with(&self.root) {
            Ok(())
        } else {
            Err(FilesError::InvalidPath(format!(
                "path escapes the served root: {}",
                path
            )))
        }
    }
}

/// Reject names that would address anything but a direct child
fn validate_entry_name(name: &str) -> Result<&str, FilesError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FilesError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Reduce a client-supplied file name to a bare safe name.
///
/// Path components are stripped, characters outside `[A-Za-z0-9._-]` become
/// underscores, and leading dots are dropped.
fn sanitize_file_name(name: &str) -> Result<String, FilesError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        return Err(FilesError::InvalidName(name.to_string()));
    }
    Ok(cleaned)
}

/// Display path of a virtual path's parent directory
fn virtual_parent(path: &str) -> String {
    match Path::new(path).parent().and_then(Path::to_str) {
        Some("") | None => "/".to_string(),
        Some(parent) => parent.to_string(),
    }
}

/// Join a child name onto a virtual directory path
fn join_virtual(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Human-readable size: byte counts with thousands separators, then one
/// decimal of KB/MB/GB past each power of 1024
fn format_size(bytes: u64) -> String {
    let mut size = format!("{} bytes", group_thousands(bytes));
    if bytes > 1024 {
        size = format!("{:.1} KB", bytes as f64 / 1024.0);
    }
    if bytes > 1024 * 1024 {
        size = format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0));
    }
    if bytes > 1024 * 1024 * 1024 {
        size = format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0));
    }
    size
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

fn format_modified(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
