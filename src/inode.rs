//! The inode record and the small command types passed around with it.

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::schema;

/// Current time at the precision the backend persists (milliseconds).
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Directory or regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    pub fn as_i64(&self) -> i64 {
        match self {
            NodeKind::Directory => schema::kind::DIRECTORY,
            NodeKind::File => schema::kind::FILE,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            schema::kind::DIRECTORY => Some(NodeKind::Directory),
            schema::kind::FILE => Some(NodeKind::File),
            _ => None,
        }
    }
}

/// A single file-or-directory metadata record.
///
/// `id`, `owner_id`, `parent_id` and `name` never change once the row is
/// saved. Everything else moves through [`INodePatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct INode {
    pub(crate) id: Uuid,
    pub(crate) owner_id: Uuid,
    pub(crate) parent_id: Option<Uuid>,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) content_id: Option<Uuid>,
    pub(crate) size: u64,
    pub(crate) checksum: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_modified_at: DateTime<Utc>,
    pub(crate) deleted_at: Option<DateTime<Utc>>,
}

impl INode {
    /// A user's root directory: no parent, empty name.
    pub(crate) fn new_root(owner_id: Uuid) -> Self {
        Self::new(owner_id, None, String::new(), NodeKind::Directory, None)
    }

    pub(crate) fn new_dir(owner_id: Uuid, parent_id: Uuid, name: impl Into<String>) -> Self {
        Self::new(owner_id, Some(parent_id), name.into(), NodeKind::Directory, None)
    }

    pub(crate) fn new_file(
        owner_id: Uuid,
        parent_id: Uuid,
        name: impl Into<String>,
        content_id: Uuid,
    ) -> Self {
        Self::new(
            owner_id,
            Some(parent_id),
            name.into(),
            NodeKind::File,
            Some(content_id),
        )
    }

    fn new(
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: String,
        kind: NodeKind,
        content_id: Option<Uuid>,
    ) -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            parent_id,
            name,
            kind,
            content_id,
            size: 0,
            checksum: None,
            created_at: now,
            last_modified_at: now,
            deleted_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    /// `None` for a user's root.
    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn content_id(&self) -> Option<Uuid> {
        self.content_id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a patch locally, mirroring what the backend does to the row.
    pub(crate) fn apply(&mut self, patch: &INodePatch) {
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(checksum) = &patch.checksum {
            self.checksum = Some(checksum.clone());
        }
        if let Some(at) = patch.last_modified_at {
            self.last_modified_at = at;
        }
        if let Some(at) = patch.deleted_at {
            self.deleted_at.get_or_insert(at);
        }
        if let Some(content_id) = patch.content_id {
            self.content_id = Some(content_id);
        }
    }
}

/// Partial update of the mutable inode fields. `None` leaves a field as is.
///
/// `deleted_at` only ever goes from null to a timestamp: patching it on an
/// already deleted row keeps the first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct INodePatch {
    pub size: Option<u64>,
    pub checksum: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub content_id: Option<Uuid>,
}

impl INodePatch {
    pub fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.checksum.is_none()
            && self.last_modified_at.is_none()
            && self.deleted_at.is_none()
            && self.content_id.is_none()
    }

    pub fn soft_delete(at: DateTime<Utc>) -> Self {
        Self {
            deleted_at: Some(at),
            ..Default::default()
        }
    }
}

/// Keyset pagination over children, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paginate {
    /// Only return names strictly greater than this one.
    pub start_after: Option<String>,
    pub limit: Option<u32>,
}

impl Paginate {
    pub fn limit(limit: u32) -> Self {
        Self {
            start_after: None,
            limit: Some(limit),
        }
    }

    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.start_after = Some(name.into());
        self
    }
}

/// The `(root, owner, path)` triple every path-based operation starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCmd {
    pub root: Uuid,
    pub owner: Uuid,
    pub path: String,
}

impl PathCmd {
    pub fn new(root: Uuid, owner: Uuid, path: impl Into<String>) -> Self {
        Self {
            root,
            owner,
            path: path.into(),
        }
    }
}
