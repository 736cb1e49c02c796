//! Sharded content store.
//!
//! Maps a content identifier to a plain file under `<root>/<xx>/<id>`, where
//! `xx` is the first two hex digits of the identifier. All 256 shard
//! directories are created up front.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::schema::SHARD_COUNT;

#[derive(Debug, Clone)]
pub struct BlockStore {
    root: PathBuf,
}

impl BlockStore {
    /// Open a store rooted at an existing directory, creating any missing
    /// shard directories.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();

        let meta = fs::metadata(&root).await.map_err(|e| {
            StorageError::Io(io::Error::new(
                e.kind(),
                format!("invalid block store root {}: {e}", root.display()),
            ))
        })?;
        if !meta.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block store root {} must be a directory", root.display()),
            )));
        }

        tracing::info!("load blocks from {}", root.display());

        for shard in 0..SHARD_COUNT {
            match fs::create_dir(root.join(format!("{shard:02x}"))).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self { root })
    }

    /// Location of the backing file for `content_id`.
    pub fn path_for(&self, content_id: Uuid) -> PathBuf {
        let id = content_id.to_string();
        self.root.join(&id[..2]).join(id)
    }

    /// Open the backing file for read and write, creating it on first use.
    pub async fn open(&self, content_id: Uuid) -> StorageResult<File> {
        let path = self.path_for(content_id);
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        options.mode(0o600);

        options.open(&path).await.map_err(|e| {
            StorageError::Io(io::Error::new(
                e.kind(),
                format!("failed to open block {}: {e}", path.display()),
            ))
        })
    }

    pub async fn exists(&self, content_id: Uuid) -> StorageResult<bool> {
        Ok(fs::try_exists(self.path_for(content_id)).await?)
    }

    /// Remove the backing file. Removing an absent block succeeds.
    pub async fn delete(&self, content_id: Uuid) -> StorageResult<()> {
        match fs::remove_file(self.path_for(content_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_creates_all_shards() {
        let dir = tempfile::tempdir().unwrap();
        BlockStore::new(dir.path()).await.unwrap();

        assert!(dir.path().join("00").is_dir());
        assert!(dir.path().join("7f").is_dir());
        assert!(dir.path().join("ff").is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 256);

        // Reopening an initialised root is fine.
        BlockStore::new(dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = BlockStore::new(dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[tokio::test]
    async fn test_open_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path()).await.unwrap();
        let id = Uuid::new_v4();

        let path = store.path_for(id);
        assert_eq!(path.parent().unwrap(), dir.path().join(&id.to_string()[..2]));

        let mut file = store.open(id).await.unwrap();
        file.write_all(b"hello").await.unwrap();
        file.flush().await.unwrap();
        drop(file);
        assert!(store.exists(id).await.unwrap());

        let mut file = store.open(id).await.unwrap();
        file.rewind().await.unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello");

        store.delete(id).await.unwrap();
        assert!(!store.exists(id).await.unwrap());
        store.delete(id).await.unwrap();
    }
}
