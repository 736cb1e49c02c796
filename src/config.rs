//! Engine configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "database": { "sqlite": "./inodes.db" },
//!   "blocks_path": "./blocks",
//!   "gc": { "interval_ms": 5000, "batch_size": 10 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::SqlBackendConfig;
use crate::error::StorageResult;
use crate::gc::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    pub database: SqlBackendConfig,
    /// Existing directory holding the block shards.
    pub blocks_path: PathBuf,
    #[serde(default)]
    pub gc: GcConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub batch_size: u32,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5_000,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl GcConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl FsConfig {
    pub fn from_json(json: &str) -> StorageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_defaults() {
        let config = FsConfig::from_json(
            r#"{ "database": { "sqlite": ":memory:" }, "blocks_path": "/var/blocks" }"#,
        )
        .unwrap();
        assert_eq!(config.database, SqlBackendConfig::Sqlite(":memory:".into()));
        assert_eq!(config.blocks_path, PathBuf::from("/var/blocks"));
        assert_eq!(config.gc, GcConfig::default());
        assert_eq!(config.gc.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_gc_section() {
        let config = FsConfig::from_json(
            r#"{ "database": { "sqlite": "x.db" }, "blocks_path": "b", "gc": { "batch_size": 50 } }"#,
        )
        .unwrap();
        assert!(config.gc.enabled);
        assert_eq!(config.gc.batch_size, 50);
        assert_eq!(config.gc.interval_ms, 5_000);
    }

    #[test]
    fn test_invalid_json() {
        let err = FsConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "database": { "sqlite": "x.db" }, "blocks_path": "b", "gc": { "enabled": false } }"#,
        )
        .unwrap();

        let config = FsConfig::load(&path).await.unwrap();
        assert!(!config.gc.enabled);
    }
}
