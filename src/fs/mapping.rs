//! Background cache warm-up.
//!
//! The [`MappingSupervisor`] walks a tree once, ahead of user interaction,
//! listing every directory on a `rayon` pool and storing the results in the
//! shared [`NodeCache`]. At most one walk runs at a time: a second request
//! while one is in flight is dropped with an error log.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::fs::cache::NodeCache;
use crate::fs::lister;
use crate::fs::node::TreeNode;

/// Function used to list one directory.
pub type ListFn = Arc<dyn Fn(&TreeNode) -> Vec<TreeNode> + Send + Sync>;

/// Counters of a mapping pass, updated while it runs.
#[derive(Debug, Default)]
pub struct MappingStats {
    dirs: AtomicUsize,
    files: AtomicUsize,
}

impl MappingStats {
    pub fn dirs(&self) -> usize {
        self.dirs.load(Ordering::Relaxed)
    }

    pub fn files(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }
}

struct MappingJob {
    cancel: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Single-flight runner of cache-population passes.
pub struct MappingSupervisor {
    cache: Arc<NodeCache>,
    workers: usize,
    list: ListFn,
    job: Mutex<Option<MappingJob>>,
    /// Stopped passes that may still be unwinding.
    stopped: Mutex<Vec<thread::JoinHandle<()>>>,
    stats: Mutex<Arc<MappingStats>>,
}

impl MappingSupervisor {
    /// Create a supervisor feeding `cache`.
    ///
    /// `workers` defaults to the available parallelism.
    pub fn new(cache: Arc<NodeCache>, workers: Option<usize>) -> Self {
        let workers = workers
            .filter(|w| *w > 0)
            .or_else(|| thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1);
        Self {
            cache,
            workers,
            list: Arc::new(lister::list),
            job: Mutex::new(None),
            stopped: Mutex::new(Vec::new()),
            stats: Mutex::new(Arc::new(MappingStats::default())),
        }
    }

    /// Replace the directory lister used by future passes.
    pub fn with_lister(mut self, list: ListFn) -> Self {
        self.list = list;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start a mapping pass over `roots`.
    ///
    /// Returns `false` when a pass is already in flight or the worker thread
    /// could not be spawned.
    pub fn start_mapping(&self, roots: Vec<TreeNode>) -> bool {
        let mut job = self.job.lock();
        if job.as_ref().is_some_and(|j| !j.handle.is_finished()) {
            error!("mapping is already running, ignoring start request");
            return false;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(MappingStats::default());
        *self.stats.lock() = Arc::clone(&stats);

        let pass = MappingPass {
            cache: Arc::clone(&self.cache),
            list: Arc::clone(&self.list),
            cancel: Arc::clone(&cancel),
            stats,
        };
        let workers = self.workers;
        let spawned = thread::Builder::new()
            .name("orbit-mapping".into())
            .spawn(move || pass.run(roots, workers));

        match spawned {
            Ok(handle) => {
                *job = Some(MappingJob { cancel, handle });
                info!(workers, "mapping started");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to spawn mapping thread");
                false
            }
        }
    }

    /// Cancel the in-flight pass, if any, and accept new requests again.
    pub fn stop_mapping(&self) {
        if let Some(job) = self.job.lock().take() {
            job.cancel.store(true, Ordering::Relaxed);
            let mut stopped = self.stopped.lock();
            stopped.retain(|h| !h.is_finished());
            stopped.push(job.handle);
            info!("mapping stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.job
            .lock()
            .as_ref()
            .is_some_and(|j| !j.handle.is_finished())
    }

    /// Block until the in-flight pass, if any, and every stopped pass have
    /// finished.
    pub fn wait(&self) {
        let job = self.job.lock().take();
        let stopped: Vec<_> = self.stopped.lock().drain(..).collect();
        for handle in stopped.into_iter().chain(job.map(|j| j.handle)) {
            if handle.join().is_err() {
                error!("mapping thread panicked");
            }
        }
    }

    /// Counters of the most recently started pass.
    pub fn stats(&self) -> Arc<MappingStats> {
        Arc::clone(&self.stats.lock())
    }
}

impl Drop for MappingSupervisor {
    fn drop(&mut self) {
        if let Some(job) = self.job.get_mut().take() {
            job.cancel.store(true, Ordering::Relaxed);
        }
    }
}

struct MappingPass {
    cache: Arc<NodeCache>,
    list: ListFn,
    cancel: Arc<AtomicBool>,
    stats: Arc<MappingStats>,
}

impl MappingPass {
    fn run(self, roots: Vec<TreeNode>, workers: usize) {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("orbit-map-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                error!(error = %e, "failed to build mapping pool");
                return;
            }
        };

        let started = Instant::now();
        pool.install(|| self.map_nodes(&roots));

        if self.cancel.load(Ordering::Relaxed) {
            debug!(dirs = self.stats.dirs(), "mapping cancelled");
        } else {
            info!(
                dirs = self.stats.dirs(),
                files = self.stats.files(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "mapping finished"
            );
        }
    }

    /// List every node in parallel, cache the result, then recurse into the
    /// children. Returns once the whole subtree has been processed.
    fn map_nodes(&self, nodes: &[TreeNode]) {
        nodes.par_iter().for_each(|node| {
            if self.cancel.load(Ordering::Relaxed) {
                return;
            }
            if !node.is_dir {
                self.stats.files.fetch_add(1, Ordering::Relaxed);
                return;
            }
            self.stats.dirs.fetch_add(1, Ordering::Relaxed);

            let children = self.cache.put(node, (self.list)(node));
            let descend: Vec<TreeNode> = children
                .iter()
                .filter(|child| !(child.is_dir && child.is_symlink))
                .cloned()
                .collect();
            self.map_nodes(&descend);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn setup_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src").join("fs")).unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        File::create(dir.path().join("src").join("main.rs")).unwrap();
        File::create(dir.path().join("src").join("fs").join("tree.rs")).unwrap();
        File::create(dir.path().join("README.md")).unwrap();
        dir
    }

    #[test]
    fn mapping_fills_cache_for_every_directory() {
        let dir = setup_tree();
        let cache = Arc::new(NodeCache::new(100));
        let supervisor = MappingSupervisor::new(Arc::clone(&cache), Some(2));
        let root = TreeNode::root(dir.path());

        assert!(supervisor.start_mapping(vec![root.clone()]));
        supervisor.wait();

        assert_eq!(cache.get(&root).unwrap().len(), 3);
        let src = root.child(&dir.path().join("src"));
        assert_eq!(cache.get(&src).unwrap().len(), 2);
        let nested = src.child(&dir.path().join("src").join("fs"));
        assert_eq!(cache.get(&nested).unwrap().len(), 1);
        assert!(cache.get(&root.child(&dir.path().join("docs"))).is_some());

        let stats = supervisor.stats();
        assert_eq!(stats.dirs(), 4);
        assert_eq!(stats.files(), 3);
        assert!(!supervisor.is_running());
    }

    #[test]
    fn cached_listing_matches_lister() {
        let dir = setup_tree();
        let cache = Arc::new(NodeCache::new(100));
        let supervisor = MappingSupervisor::new(Arc::clone(&cache), None);
        let root = TreeNode::root(dir.path());

        supervisor.start_mapping(vec![root.clone()]);
        supervisor.wait();

        let cached: Vec<String> = cache.get(&root).unwrap().iter().map(|n| n.name.clone()).collect();
        let listed: Vec<String> = lister::list(&root).into_iter().map(|n| n.name).collect();
        assert_eq!(cached, listed);
    }

    fn gated_supervisor(cache: Arc<NodeCache>, gate: Arc<Mutex<()>>) -> MappingSupervisor {
        MappingSupervisor::new(cache, Some(1)).with_lister(Arc::new(move |node: &TreeNode| {
            let _open = gate.lock();
            lister::list(node)
        }))
    }

    #[test]
    fn second_start_is_rejected_while_running() {
        let dir = setup_tree();
        let cache = Arc::new(NodeCache::new(100));
        let gate = Arc::new(Mutex::new(()));
        let supervisor = gated_supervisor(Arc::clone(&cache), Arc::clone(&gate));
        let root = TreeNode::root(dir.path());

        let closed = gate.lock();
        assert!(supervisor.start_mapping(vec![root.clone()]));
        assert!(supervisor.is_running());
        assert!(!supervisor.start_mapping(vec![root.clone()]));
        drop(closed);

        supervisor.wait();
        assert!(!supervisor.is_running());
        assert!(supervisor.start_mapping(vec![root]));
        supervisor.wait();
    }

    #[test]
    fn stop_resets_the_slot() {
        let dir = setup_tree();
        let cache = Arc::new(NodeCache::new(100));
        let gate = Arc::new(Mutex::new(()));
        let supervisor = gated_supervisor(Arc::clone(&cache), Arc::clone(&gate));
        let root = TreeNode::root(dir.path());

        let closed = gate.lock();
        assert!(supervisor.start_mapping(vec![root.clone()]));
        supervisor.stop_mapping();
        assert!(!supervisor.is_running());
        assert!(supervisor.start_mapping(vec![root]));
        drop(closed);
        supervisor.wait();
    }

    #[test]
    fn stop_cancels_the_walk_in_flight() {
        let dir = setup_tree();
        let cache = Arc::new(NodeCache::new(100));
        let gate = Arc::new(Mutex::new(()));
        let supervisor = gated_supervisor(Arc::clone(&cache), Arc::clone(&gate));
        let root = TreeNode::root(dir.path());

        let closed = gate.lock();
        assert!(supervisor.start_mapping(vec![root]));
        supervisor.stop_mapping();
        drop(closed);
        supervisor.wait();

        // At most the root listing that was already blocked gets through.
        let stats = supervisor.stats();
        assert!(stats.dirs() <= 1, "walked {} directories", stats.dirs());
        assert_eq!(stats.files(), 0);
        assert!(cache.len() <= 1);
    }

    #[test]
    fn files_are_not_cached() {
        let dir = setup_tree();
        let cache = Arc::new(NodeCache::new(100));
        let supervisor = MappingSupervisor::new(Arc::clone(&cache), Some(1));
        let root = TreeNode::root(dir.path());

        supervisor.start_mapping(vec![root.clone()]);
        supervisor.wait();

        let readme = root.child(&dir.path().join("README.md"));
        assert!(cache.get(&readme).is_none());
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn workers_default_to_available_parallelism() {
        let supervisor = MappingSupervisor::new(Arc::new(NodeCache::default()), None);
        assert!(supervisor.workers() >= 1);
        let pinned = MappingSupervisor::new(Arc::new(NodeCache::default()), Some(3));
        assert_eq!(pinned.workers(), 3);
    }
}
