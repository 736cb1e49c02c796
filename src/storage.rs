//! The inode repository contract.
//!
//! Pure persistence: implementations store and fetch rows, they never walk
//! paths or reason about the tree. Tree semantics live in
//! [`PathResolver`](crate::resolver::PathResolver) and
//! [`FsService`](crate::fs::FsService).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::inode::{INode, INodePatch, Paginate};

#[async_trait]
pub trait INodeStorage: Send + Sync {
    /// Insert a new row. Fails with [`StorageError::Conflict`](crate::StorageError::Conflict)
    /// when a live sibling already uses `(parent_id, name)`.
    async fn save(&self, inode: &INode) -> StorageResult<()>;

    /// Fetch a row whatever its deleted state.
    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<INode>>;

    /// Fetch a live child of `parent_id` owned by `owner_id`.
    async fn get_by_name_and_parent(
        &self,
        owner_id: Uuid,
        name: &str,
        parent_id: Uuid,
    ) -> StorageResult<Option<INode>>;

    /// Partial update. Fails with [`StorageError::NotFound`](crate::StorageError::NotFound)
    /// when no row has this id.
    async fn patch(&self, id: Uuid, patch: &INodePatch) -> StorageResult<()>;

    /// Live children of `parent_id`, ordered by name.
    async fn get_all_children(&self, parent_id: Uuid, paginate: &Paginate)
    -> StorageResult<Vec<INode>>;

    /// Every row pointing at `parent_id`, live or soft-deleted. Used by the
    /// garbage collector, which must see beneath deleted directories.
    async fn get_children_for_reclaim(&self, parent_id: Uuid, limit: u32)
    -> StorageResult<Vec<INode>>;

    /// Up to `limit` soft-deleted rows, at any depth.
    async fn get_all_deleted(&self, limit: u32) -> StorageResult<Vec<INode>>;

    /// Remove the row. Removing an absent id succeeds.
    async fn hard_delete(&self, id: Uuid) -> StorageResult<()>;

    /// Number of live rows owned by `owner_id`.
    async fn count_user_inodes(&self, owner_id: Uuid) -> StorageResult<u64>;
}
