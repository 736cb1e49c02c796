//! Path resolution over the inode repository.
//!
//! A path is walked one segment at a time from a user-owned root: each step
//! is an independent `(owner, name, parent)` lookup. There is no transaction
//! around the walk, so an intermediate segment removed between two steps
//! surfaces as [`FsError::NotFound`] on an operation that would have
//! succeeded a moment earlier.
//!
//! Ownership mismatches are reported exactly like absence.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{FsError, Result, StorageContext};
use crate::inode::{INode, PathCmd};
use crate::schema::NAME_MAX;
use crate::storage::INodeStorage;

/// Outcome of resolving a path down to its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The path named the root itself.
    Root(INode),
    /// The last segment, looked up under its resolved parent directory.
    Child {
        parent: INode,
        name: String,
        node: Option<INode>,
    },
}

impl Lookup {
    /// The resolved inode, if any.
    pub fn into_node(self) -> Option<INode> {
        match self {
            Lookup::Root(root) => Some(root),
            Lookup::Child { node, .. } => node,
        }
    }
}

/// Split a slash-separated path into its segments.
///
/// Leading, trailing and repeated slashes are ignored; an empty result names
/// the root. `.` and `..` are rejected rather than interpreted.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for segment in &segments {
        if *segment == "." || *segment == ".." {
            return Err(FsError::invalid_argument(format!(
                "{path:?}: relative segment {segment:?}"
            )));
        }
        if segment.contains('\0') {
            return Err(FsError::invalid_argument(format!("{path:?}: NUL byte in name")));
        }
        if segment.len() > NAME_MAX {
            return Err(FsError::invalid_argument(format!(
                "{path:?}: name longer than {NAME_MAX} bytes"
            )));
        }
    }

    Ok(segments)
}

#[derive(Clone)]
pub struct PathResolver {
    storage: Arc<dyn INodeStorage>,
}

impl PathResolver {
    pub fn new(storage: Arc<dyn INodeStorage>) -> Self {
        Self { storage }
    }

    /// Fetch the live root directory of `cmd`, owned by `cmd.owner`.
    pub async fn resolve_root(&self, cmd: &PathCmd) -> Result<INode> {
        let root = self
            .storage
            .get_by_id(cmd.root)
            .await
            .context(|| format!("fetch root {}", cmd.root))?;

        match root {
            Some(root) if root.owner_id() == cmd.owner && !root.is_deleted() => Ok(root),
            _ => Err(FsError::not_found(format!("root {}", cmd.root))),
        }
    }

    /// Look up the live child `name` of `dir`, checking the caller owns it.
    pub async fn child(&self, owner: Uuid, dir: &INode, name: &str) -> Result<Option<INode>> {
        let child = self
            .storage
            .get_by_name_and_parent(owner, name, dir.id())
            .await
            .context(|| format!("lookup {name:?} in {}", dir.id()))?;

        Ok(child.filter(|c| c.owner_id() == owner && !c.is_deleted()))
    }

    /// Walk every segment but the last, then look the last one up.
    ///
    /// Fails with `NotFound` when the root or an intermediate segment is
    /// missing, and `InvalidArgument` when an intermediate segment is a file.
    /// A missing last segment is not an error.
    pub async fn lookup(&self, cmd: &PathCmd) -> Result<Lookup> {
        let segments = split_path(&cmd.path)?;
        let root = self.resolve_root(cmd).await?;

        let Some((last, intermediate)) = segments.split_last() else {
            return Ok(Lookup::Root(root));
        };

        let mut dir = root;
        for segment in intermediate {
            if !dir.is_dir() {
                return Err(FsError::invalid_argument(format!(
                    "{}: {:?} is not a directory",
                    cmd.path,
                    dir.name()
                )));
            }
            dir = self
                .child(cmd.owner, &dir, segment)
                .await?
                .ok_or_else(|| FsError::not_found(cmd.path.clone()))?;
        }

        if !dir.is_dir() {
            return Err(FsError::invalid_argument(format!(
                "{}: {:?} is not a directory",
                cmd.path,
                dir.name()
            )));
        }

        let node = self.child(cmd.owner, &dir, last).await?;

        Ok(Lookup::Child {
            parent: dir,
            name: (*last).to_string(),
            node,
        })
    }

    /// Resolve a path to its inode; `None` when only the last segment is missing.
    pub async fn get(&self, cmd: &PathCmd) -> Result<Option<INode>> {
        Ok(self.lookup(cmd).await?.into_node())
    }
}
