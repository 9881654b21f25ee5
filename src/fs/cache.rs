use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::fs::node::TreeNode;

/// Default maximum number of cached directory listings.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default period of the background trim cycle.
pub const DEFAULT_TRIM_INTERVAL: Duration = Duration::from_secs(10);

/// A cached, already-sorted listing shared between readers.
pub type Children = Arc<Vec<TreeNode>>;

#[derive(Default)]
struct Entries {
    by_path: HashMap<PathBuf, (u64, Children)>,
    /// Write sequence -> key; the first entry is the oldest write.
    order: BTreeMap<u64, PathBuf>,
    next_seq: u64,
}

impl Entries {
    fn trim_to(&mut self, max_size: usize) -> usize {
        let mut removed = 0;
        while self.by_path.len() > max_size {
            let Some((_, path)) = self.order.pop_first() else {
                break;
            };
            self.by_path.remove(&path);
            removed += 1;
        }
        removed
    }
}

/// Concurrent directory-listing cache keyed by node identity.
///
/// The cache is advisory: a miss only means the caller lists the directory
/// itself, and concurrent writers to the same key simply overwrite each other.
/// Eviction drops the oldest writes first; an overwrite counts as a new write.
pub struct NodeCache {
    entries: RwLock<Entries>,
    max_size: usize,
}

impl NodeCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the cached children of `node`.
    pub fn get(&self, node: &TreeNode) -> Option<Children> {
        self.entries
            .read()
            .by_path
            .get(&node.path)
            .map(|(_, children)| Arc::clone(children))
    }

    /// Store the children of `node`, trimming if the cache grew past its limit.
    pub fn put(&self, node: &TreeNode, children: Vec<TreeNode>) -> Children {
        let children = Arc::new(children);
        let mut entries = self.entries.write();
        let seq = entries.next_seq;
        entries.next_seq += 1;

        if let Some((old_seq, _)) = entries
            .by_path
            .insert(node.path.clone(), (seq, Arc::clone(&children)))
        {
            entries.order.remove(&old_seq);
        }
        entries.order.insert(seq, node.path.clone());

        if entries.by_path.len() > self.max_size {
            entries.trim_to(self.max_size);
        }
        children
    }

    /// Evict the oldest entries until the cache fits `max_size`.
    ///
    /// Returns the number of evicted entries.
    pub fn trim(&self) -> usize {
        self.entries.write().trim_to(self.max_size)
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.by_path.clear();
        entries.order.clear();
    }

    /// Run [`NodeCache::trim`] every `period` on the current tokio runtime.
    ///
    /// The task only holds a weak reference and ends once the cache is dropped.
    pub fn spawn_trim_task(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("node cache dropped, stopping trim cycle");
                    break;
                };
                let removed = cache.trim();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "trimmed node cache");
                }
            }
        })
    }
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}
