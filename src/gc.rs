//! Background reclamation of soft-deleted subtrees.
//!
//! A sweep pulls soft-deleted inodes in batches and hard-deletes each one
//! together with everything beneath it, children before parents. Listing
//! beneath a deleted node goes straight to the repository and ignores
//! deleted state, since path resolution no longer reaches those rows.
//!
//! Any error aborts the sweep. Rows already removed stay removed, and the
//! next tick starts over.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::fs::FsService;
use crate::inode::INode;

pub const DEFAULT_BATCH_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcState {
    Idle,
    Sweeping,
    Stopped,
}

#[derive(Clone)]
pub struct GarbageCollector {
    fs: FsService,
    batch_size: u32,
}

impl GarbageCollector {
    pub fn new(fs: FsService, batch_size: u32) -> Self {
        Self {
            fs,
            batch_size: batch_size.max(1),
        }
    }

    /// Run one full sweep: batches are pulled back to back until a batch
    /// comes back short. Returns the number of rows removed.
    pub async fn sweep(&self) -> Result<usize> {
        let mut reclaimed = 0;

        loop {
            let batch = self.fs.get_all_deleted(self.batch_size).await?;
            let drained = batch.len() < self.batch_size as usize;

            for inode in batch {
                reclaimed += self.reclaim(inode).await?;
            }

            if drained {
                tracing::debug!(reclaimed, "fs gc sweep done");
                return Ok(reclaimed);
            }
        }
    }

    /// Hard-delete `top` and its whole subtree, post-order.
    ///
    /// A directory is listed again each time it comes back to the top of the
    /// stack, one batch at a time, and only removed once it has no children
    /// left.
    async fn reclaim(&self, top: INode) -> Result<usize> {
        let mut removed = 0;
        let mut stack = vec![top];

        while let Some(inode) = stack.pop() {
            if inode.is_dir() {
                let children = self.fs.children_for_reclaim(&inode, self.batch_size).await?;
                if !children.is_empty() {
                    stack.push(inode);
                    stack.extend(children);
                    continue;
                }
            }

            // Already gone when an earlier subtree of this sweep covered it.
            if self.fs.hard_delete(inode.id()).await? {
                tracing::debug!(inode = %inode.id(), "inode successfully removed");
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Sweep every `interval` on a background task, the first time one
    /// interval from now.
    pub fn start(self, interval: Duration) -> GcHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(GcState::Idle);

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // A sweep in flight always runs to completion.
                state_tx.send_replace(GcState::Sweeping);
                if let Err(err) = self.sweep().await {
                    tracing::error!(error = %err, "fs gc error");
                }
                state_tx.send_replace(GcState::Idle);
            }

            state_tx.send_replace(GcState::Stopped);
        });

        GcHandle {
            cancel,
            state: state_rx,
            task,
        }
    }
}

/// Control handle for a running collector.
pub struct GcHandle {
    cancel: CancellationToken,
    state: watch::Receiver<GcState>,
    task: JoinHandle<()>,
}

impl GcHandle {
    pub fn state(&self) -> GcState {
        *self.state.borrow()
    }

    /// A receiver following state changes.
    pub fn subscribe(&self) -> watch::Receiver<GcState> {
        self.state.clone()
    }

    /// Request a stop and wait for the task to finish, including a sweep
    /// that was already running.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "fs gc task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqlBackend;
    use crate::blocks::BlockStore;
    use crate::inode::PathCmd;
    use std::sync::Arc;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn setup() -> (FsService, PathCmd, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqlBackend::sqlite(":memory:").await.unwrap());
        let fs = FsService::new(storage, BlockStore::new(dir.path()).await.unwrap());
        let owner = Uuid::new_v4();
        let root = fs.bootstrap_user(owner).await.unwrap();
        (fs, PathCmd::new(root.id(), owner, "/"), dir)
    }

    fn at(cmd: &PathCmd, path: &str) -> PathCmd {
        PathCmd::new(cmd.root, cmd.owner, path)
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_deleted() {
        let (fs, _, _dir) = setup().await;
        let gc = GarbageCollector::new(fs, DEFAULT_BATCH_SIZE);
        assert_eq!(gc.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_subtree_beneath_deleted_dir() {
        let (fs, root, _dir) = setup().await;
        let inner = fs.mkdir_all(&at(&root, "/docs/inner")).await.unwrap();
        let mut file = fs.create_file(&at(&root, "/docs/inner/a.txt")).await.unwrap();
        file.write(b"hello").await.unwrap();
        let file = file.close().await.unwrap();
        let content_id = file.content_id().unwrap();
        let top = fs.get(&at(&root, "/docs")).await.unwrap().unwrap();

        fs.remove_all(&at(&root, "/docs")).await.unwrap();

        let gc = GarbageCollector::new(fs.clone(), DEFAULT_BATCH_SIZE);
        assert_eq!(gc.sweep().await.unwrap(), 3);

        for id in [top.id(), inner.id(), file.id()] {
            assert_eq!(fs.get_by_id(id).await.unwrap(), None);
        }
        assert!(!fs.blocks().exists(content_id).await.unwrap());

        // The root and its other content are untouched.
        assert!(fs.get_by_id(root.root).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wide_directories_drain_past_batch_size() {
        let (fs, root, _dir) = setup().await;
        fs.create_dir(&at(&root, "/wide")).await.unwrap();
        for i in 0..7 {
            fs.create_dir(&at(&root, &format!("/wide/{i}"))).await.unwrap();
        }
        fs.remove_all(&at(&root, "/wide")).await.unwrap();

        let gc = GarbageCollector::new(fs.clone(), 2);
        assert_eq!(gc.sweep().await.unwrap(), 8);
        assert_eq!(fs.storage().count_user_inodes(root.owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleted_descendant_of_deleted_dir() {
        let (fs, root, _dir) = setup().await;
        fs.mkdir_all(&at(&root, "/a/b")).await.unwrap();
        fs.remove_all(&at(&root, "/a/b")).await.unwrap();
        fs.remove_all(&at(&root, "/a")).await.unwrap();

        let gc = GarbageCollector::new(fs.clone(), 1);
        gc.sweep().await.unwrap();
        assert!(fs.storage().get_all_deleted(10).await.unwrap().is_empty());
        assert_eq!(fs.storage().count_user_inodes(root.owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nested_deleted_rows_counted_once() {
        let (fs, root, _dir) = setup().await;
        fs.mkdir_all(&at(&root, "/a/b")).await.unwrap();
        fs.remove_all(&at(&root, "/a/b")).await.unwrap();
        fs.remove_all(&at(&root, "/a")).await.unwrap();

        // One batch holds both `/a` and `/a/b`.
        let gc = GarbageCollector::new(fs.clone(), DEFAULT_BATCH_SIZE);
        assert_eq!(gc.sweep().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_many_deleted_roots_span_several_batches() {
        let (fs, root, _dir) = setup().await;
        for i in 0..5 {
            fs.create_file(&at(&root, &format!("/f{i}")))
                .await
                .unwrap()
                .close()
                .await
                .unwrap();
            fs.remove_all(&at(&root, &format!("/f{i}"))).await.unwrap();
        }

        let gc = GarbageCollector::new(fs.clone(), 2);
        assert_eq!(gc.sweep().await.unwrap(), 5);
        assert!(fs.storage().get_all_deleted(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (fs, root, _dir) = setup().await;
        let docs = fs.create_dir(&at(&root, "/docs")).await.unwrap();
        fs.remove_all(&at(&root, "/docs")).await.unwrap();

        let handle = GarbageCollector::new(fs.clone(), DEFAULT_BATCH_SIZE)
            .start(Duration::from_millis(20));
        assert_ne!(handle.state(), GcState::Stopped);

        tokio::time::timeout(Duration::from_secs(5), async {
            while fs.get_by_id(docs.id()).await.unwrap().is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let mut state = handle.subscribe();
        handle.stop().await;
        assert_eq!(*state.borrow_and_update(), GcState::Stopped);
    }
}
