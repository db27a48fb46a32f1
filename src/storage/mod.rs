//! Finished downloads on local disk
//!
//! The extractor writes straight into the downloads directory; this module
//! lists what is there and opens single files for streaming back to
//! clients. Names coming from requests are checked so they can never leave
//! the directory.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::humanize::ByteSize;

/// Suffixes the extractor uses for files that are still being written
const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One finished download
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub name: String,
    pub size: ByteSize,
    pub created: DateTime<Utc>,
}

/// A file opened for streaming
#[derive(Debug)]
pub struct OpenedFile {
    pub file: fs::File,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadStore {
    root: PathBuf,
}

impl DownloadStore {
    /// Use `root` as the downloads directory, creating it when missing
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(path = %root.display(), "Downloads directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Finished files, newest first. Hidden and partial files are skipped.
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = ?entry.path(), "Skipping non UTF-8 file name");
                continue;
            };
            if name.starts_with('.') || PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                continue;
            }

            if let Some(file) = stored_file(name, entry.metadata().await)? {
                files.push(file);
            }
        }

        files.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }

    /// Open a single file by name for reading
    pub async fn open_file(&self, name: &str) -> Result<OpenedFile> {
        let path = self.resolve(name)?;

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let file = fs::File::open(&path).await?;
        Ok(OpenedFile {
            file,
            size: metadata.len(),
        })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Listing entry for one directory entry, `None` for anything that is not a
/// regular file. Temporary files the extractor deletes mid-listing vanish
/// between `read_dir` and `metadata`; those are skipped too.
fn stored_file(name: String, metadata: std::io::Result<Metadata>) -> Result<Option<StoredFile>> {
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(name = %name, "File vanished while listing downloads");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_file() {
        return Ok(None);
    }

    let created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(Some(StoredFile {
        name,
        size: ByteSize(metadata.len()),
        created,
    }))
}

/// A plain file name: no separators, no parent references, no control
/// characters.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);

    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
