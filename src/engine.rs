//! Wiring: configuration in, running filesystem service and collector out.

use std::sync::Arc;

use crate::backend::SqlBackend;
use crate::blocks::BlockStore;
use crate::config::FsConfig;
use crate::error::{FsError, Result};
use crate::fs::FsService;
use crate::gc::{GarbageCollector, GcHandle, GcState};

pub struct Engine {
    backend: Arc<SqlBackend>,
    fs: FsService,
    gc: Option<GcHandle>,
}

impl Engine {
    /// Connect the backend, run migrations, prepare the block shards and
    /// start the collector when enabled. Must run inside a tokio runtime.
    pub async fn open(config: FsConfig) -> Result<Self> {
        let backend = Arc::new(
            SqlBackend::new(config.database.clone())
                .await
                .map_err(|e| FsError::storage("open database", e))?,
        );
        let blocks = BlockStore::new(&config.blocks_path)
            .await
            .map_err(|e| FsError::storage("open block store", e))?;

        let fs = FsService::new(backend.clone(), blocks);

        let gc = config.gc.enabled.then(|| {
            GarbageCollector::new(fs.clone(), config.gc.batch_size).start(config.gc.interval())
        });

        Ok(Self { backend, fs, gc })
    }

    pub fn fs(&self) -> &FsService {
        &self.fs
    }

    /// `None` when the collector is disabled.
    pub fn gc_state(&self) -> Option<GcState> {
        self.gc.as_ref().map(GcHandle::state)
    }

    /// Stop the collector, letting a running sweep finish, then close the pool.
    pub async fn shutdown(self) {
        if let Some(gc) = self.gc {
            gc.stop().await;
        }
        self.backend.close().await;
    }
}
