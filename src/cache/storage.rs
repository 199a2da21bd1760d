//! Text blob storage behind the disk cache.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

const RECORD_EXTENSION: &str = "screen";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key is not a safe file name. Keys must be sanitized first.
    #[error("Invalid storage key '{key}'")]
    InvalidKey { key: String },
}

/// Key/text storage used by [`DiskScreenCache`](super::DiskScreenCache).
///
/// Keys handed to a storage are already sanitized with [`sanitize_key`].
#[async_trait]
pub trait DiskStorage: Send + Sync {
    async fn write(&self, key: &str, text: &str) -> Result<(), StorageError>;
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Returns whether something was deleted.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
    async fn list_keys(&self) -> Result<Vec<String>, StorageError>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileDiskStorage {
    directory: PathBuf,
}

impl FileDiskStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let safe = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !safe {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self
            .directory
            .join(format!("{}.{}", key, RECORD_EXTENSION)))
    }
}

#[async_trait]
impl DiskStorage for FileDiskStorage {
    async fn write(&self, key: &str, text: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(io_err)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.directory.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Map an arbitrary key to a file-name-safe identifier.
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (lowercase hex). The mapping is injective, see [`restore_key`].
pub fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02x}", byte));
        }
    }
    out
}

/// Inverse of [`sanitize_key`]. Returns `None` for strings it never produces.
pub fn restore_key(sanitized: &str) -> Option<String> {
    let bytes = sanitized.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = sanitized.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
