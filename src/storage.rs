//! The storage directory, modelled as a small file index.
//!
//! Handlers only talk to [`FileIndex`]; [`DiskIndex`] is the flat directory
//! used in production.

use crate::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Rejects names that are not a single plain path segment.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Names of all stored entries, sorted.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Maps a stored name to its location inside the storage directory.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError>;

    /// Whether `name` refers to a readable regular file inside the directory.
    async fn exists(&self, name: &str) -> bool;

    /// Real on-disk location of a servable file. Symlinks are followed and
    /// the target must stay inside the directory.
    async fn locate(&self, name: &str) -> Result<PathBuf, StorageError>;

    /// Writes a new file. Fails with [`StorageError::AlreadyExists`] without
    /// reading from `reader` if the name is taken.
    async fn store(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, StorageError>;

    async fn remove(&self, name: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct DiskIndex {
    root: PathBuf,
}

impl DiskIndex {
    /// Creates the directory if needed and anchors the index at its
    /// canonical path.
    pub async fn create(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;
        let root = fs::canonicalize(dir).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves and follows symlinks, refusing anything that lands outside
    /// the root.
    async fn checked_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let path = self.resolve(name)?;
        let real = fs::canonicalize(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::Io(err),
        })?;
        if !real.starts_with(&self.root) {
            return Err(StorageError::OutsideRoot(name.to_string()));
        }
        Ok(real)
    }
}

#[async_trait]
impl FileIndex for DiskIndex {
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!(name = ?raw, "skipping non UTF-8 directory entry"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        let path = self.root.join(name);
        if path.parent() != Some(self.root.as_path()) {
            return Err(StorageError::OutsideRoot(name.to_string()));
        }
        Ok(path)
    }

    async fn exists(&self, name: &str) -> bool {
        match self.checked_path(name).await {
            Ok(path) => fs::metadata(&path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn locate(&self, name: &str) -> Result<PathBuf, StorageError> {
        let path = self.checked_path(name).await?;
        if !fs::metadata(&path).await?.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(path)
    }

    async fn store(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, StorageError> {
        let path = self.resolve(name)?;
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let written = async {
            let written = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(written)
        }
        .await;

        match written {
            Ok(written) => Ok(written),
            Err(err) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    tracing::warn!(name, error = %cleanup, "failed to remove partial upload");
                }
                Err(err.into())
            }
        }
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(name.to_string()),
            _ => StorageError::Io(err),
        })
    }
}
