//! Database schema definitions for inodefs
//!
//! One row per inode in `fs_inodes`. The tree is rebuilt on demand from the
//! `parent_id` pointers; nothing here knows about paths.

/// Table holding every inode row.
pub const INODES_TABLE: &str = "fs_inodes";

/// Column list of an inode row, in insertion order.
pub const INODE_COLUMNS: &str = "id, owner_id, parent_id, name, kind, content_id, size, checksum, created_at, last_modified_at, deleted_at";

/// Select list shared by every inode query.
///
/// The Any driver cannot decode NULL into `Option<T>`, so nullable columns
/// come back as sentinels: `''` for text and [`NULL_MILLIS`] for timestamps.
pub const INODE_SELECT: &str = "id, owner_id, COALESCE(parent_id, '') AS parent_id, name, kind, \
    COALESCE(content_id, '') AS content_id, size, COALESCE(checksum, '') AS checksum, \
    created_at, last_modified_at, COALESCE(deleted_at, -1) AS deleted_at";

/// Stands in for a NULL `deleted_at` in [`INODE_SELECT`] results.
pub const NULL_MILLIS: i64 = -1;

/// Values stored in the `kind` column
pub mod kind {
    pub const DIRECTORY: i64 = 0;
    pub const FILE: i64 = 1;
}

/// Longest accepted path segment, in bytes.
pub const NAME_MAX: usize = 255;

/// Number of shard directories in the block store (`00` to `ff`).
pub const SHARD_COUNT: usize = 256;
