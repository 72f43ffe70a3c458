//! Directory-backed blob store
//!
//! Each key maps to one file below the store root. Writes go to a temporary
//! file first and are renamed into place so a crash never leaves a torn record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{validate_key, BlobStore};
use crate::constants::storage;
use crate::errors::StoreResult;

/// Blob store keeping one file per key under a root directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        debug!("Opened blob store at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(storage::TEMP_FILE_SUFFIX);
        path.with_file_name(name)
    }

    /// Recursively sum file sizes, skipping unfinished temporary files
    pub(crate) fn directory_size(dir: &Path) -> std::io::Result<u64> {
        let mut total = 0u64;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                total += Self::directory_size(&path)?;
            } else if !path
                .to_string_lossy()
                .ends_with(storage::TEMP_FILE_SUFFIX)
            {
                total += metadata.len();
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = Self::temp_path_for(&path);
        fs::write(&temp_path, value).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!("Atomic rename failed for {}: {}", path.display(), e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Stored {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn usage(&self) -> StoreResult<u64> {
        let root = self.root.clone();
        let size = tokio::task::spawn_blocking(move || Self::directory_size(&root))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
        Ok(size)
    }
}
