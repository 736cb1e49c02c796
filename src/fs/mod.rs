//! The filesystem service: the path-based operation surface of the engine.
//!
//! Every path operation validates its `(root, owner, path)` triple through
//! the [`PathResolver`] before touching state, then persists through the
//! [`INodeStorage`] and, for file content, the [`BlockStore`].
//!
//! There is no in-process locking of the tree. Two callers racing to create
//! the same `(parent, name)` are arbitrated by the repository's uniqueness
//! check, and the loser sees either [`FsError::Conflict`] or the winner's
//! inode depending on whether it asked for exclusivity. The path walk is a
//! sequence of independent reads, so a segment removed mid-walk yields
//! [`FsError::NotFound`].

mod handle;
mod options;

use std::sync::Arc;

use uuid::Uuid;

use crate::blocks::BlockStore;
use crate::error::{ErrorKind, FsError, Result, StorageContext, StorageError};
use crate::inode::{now, INode, INodePatch, Paginate, PathCmd};
use crate::resolver::{split_path, Lookup, PathResolver};
use crate::storage::INodeStorage;

pub use handle::{DirHandle, FileHandle, Handle};
pub use options::OpenOptions;

#[derive(Clone)]
pub struct FsService {
    storage: Arc<dyn INodeStorage>,
    blocks: Arc<BlockStore>,
    resolver: PathResolver,
}

impl FsService {
    pub fn new(storage: Arc<dyn INodeStorage>, blocks: BlockStore) -> Self {
        Self {
            resolver: PathResolver::new(storage.clone()),
            storage,
            blocks: Arc::new(blocks),
        }
    }

    pub fn storage(&self) -> &Arc<dyn INodeStorage> {
        &self.storage
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    /// Create the root directory of a new user.
    #[tracing::instrument(skip(self), name = "fs.bootstrap_user")]
    pub async fn bootstrap_user(&self, owner: Uuid) -> Result<INode> {
        let count = self
            .storage
            .count_user_inodes(owner)
            .await
            .context(|| format!("count inodes of {owner}"))?;
        if count > 0 {
            return Err(FsError::AlreadyBootstrapped(owner));
        }

        let root = INode::new_root(owner);
        self.storage
            .save(&root)
            .await
            .context(|| format!("save root of {owner}"))?;

        Ok(root)
    }

    /// Create the last segment of `cmd.path` as a directory, or return the
    /// directory already living there. Parents are never created.
    #[tracing::instrument(skip(self), name = "fs.create_dir")]
    pub async fn create_dir(&self, cmd: &PathCmd) -> Result<INode> {
        self.make_dir(cmd, false).await
    }

    /// Like [`create_dir`](Self::create_dir), but fails with `AlreadyExists`
    /// when the entry is already there.
    #[tracing::instrument(skip(self), name = "fs.create_dir_exclusive")]
    pub async fn create_dir_exclusive(&self, cmd: &PathCmd) -> Result<INode> {
        self.make_dir(cmd, true).await
    }

    async fn make_dir(&self, cmd: &PathCmd, exclusive: bool) -> Result<INode> {
        match self.resolver.lookup(cmd).await? {
            Lookup::Root(root) if exclusive => Err(FsError::already_exists(format!(
                "{:?}: root {}",
                cmd.path,
                root.id()
            ))),
            Lookup::Root(root) => Ok(root),
            Lookup::Child {
                node: Some(node), ..
            } => {
                if !node.is_dir() {
                    Err(FsError::invalid_argument(format!("{:?} is a file", cmd.path)))
                } else if exclusive {
                    Err(FsError::already_exists(cmd.path.clone()))
                } else {
                    Ok(node)
                }
            }
            Lookup::Child {
                parent,
                name,
                node: None,
            } => self.insert_dir(&parent, &name, &cmd.path, exclusive).await,
        }
    }

    /// Create every missing directory along `cmd.path`.
    #[tracing::instrument(skip(self), name = "fs.mkdir_all")]
    pub async fn mkdir_all(&self, cmd: &PathCmd) -> Result<INode> {
        let segments = split_path(&cmd.path)?;
        let mut dir = self.resolver.resolve_root(cmd).await?;

        for segment in segments {
            dir = match self.resolver.child(cmd.owner, &dir, segment).await? {
                Some(node) if node.is_dir() => node,
                Some(_) => {
                    return Err(FsError::invalid_argument(format!(
                        "{:?}: {segment:?} is a file",
                        cmd.path
                    )));
                }
                None => self.insert_dir(&dir, segment, &cmd.path, false).await?,
            };
        }

        Ok(dir)
    }

    /// Save a new directory under `parent`. A non-exclusive caller that loses
    /// a creation race gets the winner's directory.
    async fn insert_dir(
        &self,
        parent: &INode,
        name: &str,
        path: &str,
        exclusive: bool,
    ) -> Result<INode> {
        let dir = INode::new_dir(parent.owner_id(), parent.id(), name);

        match self.storage.save(&dir).await {
            Ok(()) => Ok(dir),
            Err(StorageError::Conflict(msg)) if !exclusive => {
                match self.resolver.child(parent.owner_id(), parent, name).await? {
                    Some(existing) if existing.is_dir() => Ok(existing),
                    Some(_) => Err(FsError::invalid_argument(format!("{path:?} is a file"))),
                    None => Err(FsError::Conflict(format!("mkdir {path:?}: {msg}"))),
                }
            }
            Err(e) => Err(FsError::storage(format!("mkdir {path:?}"), e)),
        }
    }

    /// Open, and optionally create, the file at `cmd.path`.
    ///
    /// A directory at the path opens as a listing-only [`DirHandle`].
    #[tracing::instrument(skip(self), name = "fs.open_file")]
    pub async fn open_file(&self, cmd: &PathCmd, options: &OpenOptions) -> Result<Handle> {
        options.validate()?;

        let (parent, name, existing) = match self.resolver.lookup(cmd).await? {
            Lookup::Root(root) => {
                if options.create_new {
                    return Err(FsError::already_exists(cmd.path.clone()));
                }
                return Ok(Handle::Dir(DirHandle::new(self.clone(), root, cmd.path.clone())));
            }
            Lookup::Child { parent, name, node } => (parent, name, node),
        };

        if let Some(node) = existing {
            if options.create_new {
                return Err(FsError::already_exists(cmd.path.clone()));
            }
            return self.open_node(node, cmd, options).await;
        }

        if !options.create && !options.create_new {
            return Err(FsError::not_found(cmd.path.clone()));
        }

        let inode = INode::new_file(parent.owner_id(), parent.id(), name.as_str(), Uuid::new_v4());
        match self.storage.save(&inode).await {
            Ok(()) => self.open_node(inode, cmd, options).await,
            Err(StorageError::Conflict(msg)) if !options.create_new => {
                match self.resolver.child(cmd.owner, &parent, &name).await? {
                    Some(winner) => self.open_node(winner, cmd, options).await,
                    None => Err(FsError::Conflict(format!("create {:?}: {msg}", cmd.path))),
                }
            }
            Err(e) => Err(FsError::storage(format!("create {:?}", cmd.path), e)),
        }
    }

    /// Create the file at `cmd.path`, or open the one already there.
    pub async fn create_file(&self, cmd: &PathCmd) -> Result<FileHandle> {
        let options = OpenOptions::new().read(true).write(true).create(true);
        self.open_file(cmd, &options).await?.into_file()
    }

    async fn open_node(&self, node: INode, cmd: &PathCmd, options: &OpenOptions) -> Result<Handle> {
        if node.is_dir() {
            return Ok(Handle::Dir(DirHandle::new(self.clone(), node, cmd.path.clone())));
        }

        let mut inode = node;
        let content_id = match inode.content_id() {
            Some(content_id) => content_id,
            None => {
                let content_id = Uuid::new_v4();
                let patch = INodePatch {
                    content_id: Some(content_id),
                    ..Default::default()
                };
                self.storage
                    .patch(inode.id(), &patch)
                    .await
                    .context(|| format!("allocate content for {:?}", cmd.path))?;
                inode.apply(&patch);
                content_id
            }
        };

        let file = self
            .blocks
            .open(content_id)
            .await
            .context(|| format!("open {:?}", cmd.path))?;

        let mut handle = FileHandle::new(self.clone(), inode, file, cmd.path.clone(), options);
        if options.truncate {
            handle.truncate().await?;
        }

        Ok(Handle::File(handle))
    }

    /// Resolve a path. A missing last segment is `Ok(None)`, not an error.
    #[tracing::instrument(skip(self), name = "fs.get")]
    pub async fn get(&self, cmd: &PathCmd) -> Result<Option<INode>> {
        self.resolver.get(cmd).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<INode>> {
        self.storage
            .get_by_id(id)
            .await
            .context(|| format!("get inode {id}"))
    }

    /// Follow parent pointers up to the topmost reachable ancestor.
    pub async fn get_inode_root(&self, inode: &INode) -> Result<INode> {
        let mut current = inode.clone();
        while let Some(parent_id) = current.parent_id() {
            match self.get_by_id(parent_id).await? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(current)
    }

    /// List the live children of the directory at `cmd.path`, ordered by name.
    #[tracing::instrument(skip(self), name = "fs.readdir")]
    pub async fn readdir(&self, cmd: &PathCmd, paginate: &Paginate) -> Result<Vec<INode>> {
        match self.resolver.get(cmd).await? {
            None => Err(FsError::not_found(cmd.path.clone())),
            Some(node) if !node.is_dir() => Err(FsError::invalid_argument(format!(
                "{:?} is not a directory",
                cmd.path
            ))),
            Some(dir) => self.list_children(&dir, paginate).await,
        }
    }

    pub(crate) async fn list_children(&self, dir: &INode, paginate: &Paginate) -> Result<Vec<INode>> {
        self.storage
            .get_all_children(dir.id(), paginate)
            .await
            .context(|| format!("list children of {}", dir.id()))
    }

    /// Soft-delete the node at `cmd.path`. Its subtree is left for the
    /// garbage collector. Succeeds without effect when nothing resolves.
    #[tracing::instrument(skip(self), name = "fs.remove_all")]
    pub async fn remove_all(&self, cmd: &PathCmd) -> Result<()> {
        let node = match self.resolver.get(cmd).await {
            Ok(Some(node)) => node,
            Ok(None) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        match self
            .storage
            .patch(node.id(), &INodePatch::soft_delete(now()))
            .await
        {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(FsError::storage(format!("remove {:?}", cmd.path), e)),
        }
    }

    /// Remove a row for good, releasing its block first. Absent ids succeed
    /// with `false`.
    #[tracing::instrument(skip(self), name = "fs.hard_delete")]
    pub async fn hard_delete(&self, id: Uuid) -> Result<bool> {
        let Some(inode) = self.get_by_id(id).await? else {
            return Ok(false);
        };

        if let Some(content_id) = inode.content_id() {
            self.blocks
                .delete(content_id)
                .await
                .context(|| format!("release block {content_id} of {id}"))?;
        }

        self.storage
            .hard_delete(id)
            .await
            .context(|| format!("hard delete {id}"))?;
        Ok(true)
    }

    pub(crate) async fn get_all_deleted(&self, limit: u32) -> Result<Vec<INode>> {
        self.storage
            .get_all_deleted(limit)
            .await
            .context(|| "list deleted inodes")
    }

    pub(crate) async fn children_for_reclaim(&self, dir: &INode, limit: u32) -> Result<Vec<INode>> {
        self.storage
            .get_children_for_reclaim(dir.id(), limit)
            .await
            .context(|| format!("list children of deleted {}", dir.id()))
    }

    /// Persist a write's metadata and mirror it on the caller's copy.
    pub(crate) async fn register_write(&self, inode: &mut INode, patch: INodePatch) -> Result<()> {
        self.storage
            .patch(inode.id(), &patch)
            .await
            .context(|| format!("register write on {}", inode.id()))?;
        inode.apply(&patch);
        Ok(())
    }
}
