//! # inodefs - Virtual Filesystem Engine
//!
//! inodefs keeps a per-user hierarchy of files and directories ("inodes") as
//! flat rows in a SQL table and maps every file's bytes onto a sharded
//! content store on disk.
//!
//! ## Layers
//!
//! - **Block store**: content id to byte stream, 256 shard directories
//! - **Inode repository**: [`INodeStorage`], implemented by [`SqlBackend`]
//!   (SQLite, PostgreSQL via sqlx)
//! - **Path resolver**: walks `/a/b/c` from a user's root, one lookup per segment
//! - **Filesystem service**: mkdir, open/create, readdir, soft delete, hard delete
//! - **Garbage collector**: background post-order reclamation of soft-deleted subtrees
//!
//! ## Example
//!
//! ```rust,ignore
//! use inodefs::{Engine, FsConfig, PathCmd};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::open(FsConfig::load("inodefs.json").await?).await?;
//!     let fs = engine.fs();
//!
//!     let owner = uuid::Uuid::new_v4();
//!     let root = fs.bootstrap_user(owner).await?;
//!     fs.create_dir(&PathCmd::new(root.id(), owner, "/docs")).await?;
//!
//!     let mut file = fs.create_file(&PathCmd::new(root.id(), owner, "/docs/a.txt")).await?;
//!     file.write(b"hello").await?;
//!     file.close().await?;
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one backend feature: `sqlite` or `postgres`");

pub mod backend;
pub mod blocks;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod gc;
pub mod inode;
pub mod resolver;
pub mod schema;
pub mod storage;

pub use backend::{SqlBackend, SqlBackendConfig};
pub use blocks::BlockStore;
pub use config::{FsConfig, GcConfig};
pub use engine::Engine;
pub use error::{ErrorKind, FsError, Result, StorageError, StorageResult};
pub use fs::{DirHandle, FileHandle, FsService, Handle, OpenOptions};
pub use gc::{GarbageCollector, GcHandle, GcState};
pub use inode::{INode, INodePatch, NodeKind, Paginate, PathCmd};
pub use resolver::{Lookup, PathResolver};
pub use storage::INodeStorage;
