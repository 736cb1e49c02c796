//! Open handles returned by [`FsService::open_file`].

use std::io::{self, SeekFrom};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::{FsService, OpenOptions};
use crate::error::{FsError, Result, StorageError};
use crate::inode::{now, INode, INodePatch, Paginate};

/// Buffered bytes are flushed to the block once they exceed this.
const MAX_BUF_SIZE: usize = 1024 * 1024;

/// Read size when hashing a block.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

fn io_error(path: &str, op: &str, err: io::Error) -> FsError {
    FsError::storage(format!("{op} {path:?}"), StorageError::Io(err))
}

/// Result of opening a path: a file with byte content, or a directory that
/// can only be listed.
pub enum Handle {
    File(FileHandle),
    Dir(DirHandle),
}

impl Handle {
    pub fn inode(&self) -> &INode {
        match self {
            Handle::File(file) => file.inode(),
            Handle::Dir(dir) => dir.inode(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    /// The file handle; a directory has no byte content.
    pub fn into_file(self) -> Result<FileHandle> {
        match self {
            Handle::File(file) => Ok(file),
            Handle::Dir(dir) => Err(FsError::invalid_argument(format!(
                "{:?} is a directory",
                dir.path
            ))),
        }
    }

    pub fn into_dir(self) -> Result<DirHandle> {
        match self {
            Handle::Dir(dir) => Ok(dir),
            Handle::File(file) => Err(FsError::invalid_argument(format!(
                "{:?} is not a directory",
                file.path
            ))),
        }
    }

    /// Flush pending writes and return the final inode.
    pub async fn close(self) -> Result<INode> {
        match self {
            Handle::File(file) => file.close().await,
            Handle::Dir(dir) => Ok(dir.inode),
        }
    }
}

/// Read/write handle over a file's block.
///
/// Writes are buffered; every flush persists the new size, the BLAKE3
/// checksum of the whole block and the modification time. Dropping a handle
/// without [`close`](Self::close) or [`sync`](Self::sync) loses buffered bytes.
pub struct FileHandle {
    fs: FsService,
    inode: INode,
    path: String,
    file: File,
    readable: bool,
    writable: bool,
    buffer: Vec<u8>,
}

impl FileHandle {
    pub(crate) fn new(
        fs: FsService,
        inode: INode,
        file: File,
        path: String,
        options: &OpenOptions,
    ) -> Self {
        Self {
            fs,
            inode,
            path,
            file,
            readable: options.read,
            writable: options.write,
            buffer: Vec::new(),
        }
    }

    pub fn inode(&self) -> &INode {
        &self.inode
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(FsError::invalid_argument(format!(
                "{:?} not opened for writing",
                self.path
            )));
        }

        self.buffer.extend_from_slice(data);

        if self.buffer.len() > MAX_BUF_SIZE {
            self.sync().await?;
        }

        Ok(data.len())
    }

    fn check_readable(&self) -> Result<()> {
        if self.readable {
            Ok(())
        } else {
            Err(FsError::invalid_argument(format!(
                "{:?} not opened for reading",
                self.path
            )))
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_readable()?;
        self.sync().await?;
        self.file
            .read(buf)
            .await
            .map_err(|e| io_error(&self.path, "read", e))
    }

    pub async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        self.check_readable()?;
        self.sync().await?;
        self.file
            .read_to_end(buf)
            .await
            .map_err(|e| io_error(&self.path, "read", e))
    }

    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.sync().await?;
        self.file
            .seek(pos)
            .await
            .map_err(|e| io_error(&self.path, "seek", e))
    }

    /// Write buffered bytes to the block and record the write on the inode.
    pub async fn sync(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.file
            .write_all(&self.buffer)
            .await
            .map_err(|e| io_error(&self.path, "write", e))?;
        self.file
            .flush()
            .await
            .map_err(|e| io_error(&self.path, "flush", e))?;
        let (size, checksum) = self.hash_block().await?;

        let patch = INodePatch {
            size: Some(size),
            checksum: Some(checksum),
            last_modified_at: Some(now()),
            ..Default::default()
        };
        self.fs.register_write(&mut self.inode, patch).await?;
        self.buffer.clear();

        Ok(())
    }

    /// Hash the block from the start, leaving the cursor where it was.
    async fn hash_block(&mut self) -> Result<(u64, String)> {
        let position = self
            .file
            .stream_position()
            .await
            .map_err(|e| io_error(&self.path, "hash", e))?;
        self.file
            .rewind()
            .await
            .map_err(|e| io_error(&self.path, "hash", e))?;

        let mut hasher = blake3::Hasher::new();
        let mut chunk = vec![0; HASH_CHUNK_SIZE];
        let mut size = 0;
        loop {
            let n = self
                .file
                .read(&mut chunk)
                .await
                .map_err(|e| io_error(&self.path, "hash", e))?;
            if n == 0 {
                break;
            }
            hasher.update(&chunk[..n]);
            size += n as u64;
        }

        self.file
            .seek(SeekFrom::Start(position))
            .await
            .map_err(|e| io_error(&self.path, "hash", e))?;

        Ok((size, hex::encode(hasher.finalize().as_bytes())))
    }

    /// Empty the block and reset size and checksum.
    pub(crate) async fn truncate(&mut self) -> Result<()> {
        self.buffer.clear();

        self.file
            .set_len(0)
            .await
            .map_err(|e| io_error(&self.path, "truncate", e))?;
        self.file
            .rewind()
            .await
            .map_err(|e| io_error(&self.path, "truncate", e))?;

        let patch = INodePatch {
            size: Some(0),
            checksum: Some(hex::encode(blake3::hash(b"").as_bytes())),
            last_modified_at: Some(now()),
            ..Default::default()
        };
        self.fs.register_write(&mut self.inode, patch).await
    }

    pub async fn close(mut self) -> Result<INode> {
        self.sync().await?;
        Ok(self.inode)
    }
}

/// Listing-only handle over a directory.
pub struct DirHandle {
    fs: FsService,
    inode: INode,
    path: String,
}

impl DirHandle {
    pub(crate) fn new(fs: FsService, inode: INode, path: String) -> Self {
        Self { fs, inode, path }
    }

    pub fn inode(&self) -> &INode {
        &self.inode
    }

    pub async fn readdir(&self, paginate: &Paginate) -> Result<Vec<INode>> {
        self.fs.list_children(&self.inode, paginate).await
    }
}
