//! Flat listing of a single directory.
//!
//! A [`FileList`] is the tree's one-level sibling: it lists its root once,
//! in the background, and reports the whole block to its listener as a
//! single `(0, n)` update. It shares the tree's ordering and lifecycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::fs::lister;
use crate::fs::node::TreeNode;
use crate::fs::tree::is_accessible;

/// Rows `start..start + count` of a [`FileList`] were filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListUpdate {
    pub start: usize,
    pub count: usize,
}

/// Receiver of list updates. Same contract as the tree listener: called
/// with the list's lock held, so it must not block.
pub trait ListListener: Send + Sync {
    fn on_list_updated(&self, update: ListUpdate);
}

impl ListListener for mpsc::UnboundedSender<ListUpdate> {
    fn on_list_updated(&self, update: ListUpdate) {
        if self.send(update).is_err() {
            debug!("list listener is gone, dropping update");
        }
    }
}

struct ListInner {
    root: TreeNode,
    items: Mutex<Vec<TreeNode>>,
    listener: Arc<dyn ListListener>,
    cancel: Mutex<CancellationToken>,
    destroyed: AtomicBool,
}

impl ListInner {
    async fn load(self: Arc<Self>) {
        let root = self.root.clone();
        let rows = match tokio::task::spawn_blocking(move || lister::list(&root)).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "listing worker failed");
                return;
            }
        };

        let mut items = self.items.lock();
        *items = rows;
        self.listener.on_list_updated(ListUpdate {
            start: 0,
            count: items.len(),
        });
    }
}

/// The immediate children of one directory, directories first.
#[derive(Clone)]
pub struct FileList {
    inner: Arc<ListInner>,
}

impl FileList {
    /// Start listing `root` in the background.
    ///
    /// The returned handle finishes once the listener has been told about
    /// the rows. An invalid root is logged and lists as empty. Must be
    /// called inside a tokio runtime.
    pub fn open(root: &Path, listener: Arc<dyn ListListener>) -> (Self, JoinHandle<()>) {
        if !is_accessible(root) {
            error!(path = %root.display(), "invalid path for file list");
        }

        let list = Self {
            inner: Arc::new(ListInner {
                root: TreeNode::root(root),
                items: Mutex::new(Vec::new()),
                listener,
                cancel: Mutex::new(CancellationToken::new()),
                destroyed: AtomicBool::new(false),
            }),
        };

        let token = list.inner.cancel.lock().clone();
        let work = Arc::clone(&list.inner).load();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!("file list load cancelled"),
                _ = work => {}
            }
        });
        info!(root = %root.display(), "file list opened");
        (list, handle)
    }

    /// Snapshot of the listed rows.
    pub fn items(&self) -> Vec<TreeNode> {
        self.inner.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> &TreeNode {
        &self.inner.root
    }

    /// Cancel the load if it is still running.
    pub fn cancel_all(&self) {
        let mut token = self.inner.cancel.lock();
        token.cancel();
        if !self.inner.destroyed.load(Ordering::Acquire) {
            *token = CancellationToken::new();
        }
    }

    /// Cancel background work for good.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.cancel.lock().cancel();
        debug!(root = %self.inner.root.path.display(), "file list destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }
}
