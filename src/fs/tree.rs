use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::fs::cache::{Children, NodeCache};
use crate::fs::lister;
use crate::fs::mapping::MappingSupervisor;
use crate::fs::node::TreeNode;
use crate::fs::policy::{self, ExpansionPolicy};

/// Kind of structural change applied to the flattened list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Inserted,
    Removed,
}

/// A contiguous range of rows that changed.
///
/// `anchor` is the row of the directory whose expansion state changed;
/// `start..start + count` are the rows inserted (or, for removals, the rows
/// that used to sit there). Below the root row, both kinds report `start` as
/// the first changed row, `anchor + 1`, not the anchor itself, so a removal
/// replays on a mirror of the list as `drain(start..start + count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeUpdate {
    pub kind: UpdateKind,
    pub anchor: usize,
    pub start: usize,
    pub count: usize,
}

impl TreeUpdate {
    fn inserted(anchor: usize, count: usize) -> Self {
        Self {
            kind: UpdateKind::Inserted,
            anchor,
            start: anchor + 1,
            count,
        }
    }

    fn removed(anchor: usize, count: usize) -> Self {
        Self {
            kind: UpdateKind::Removed,
            anchor,
            start: anchor + 1,
            count,
        }
    }

    pub fn start_position(&self) -> usize {
        self.start
    }

    pub fn item_count(&self) -> usize {
        self.count
    }
}

/// Receiver of tree updates, living on the rendering side.
///
/// Called from inside the tree's critical section, so implementations must
/// not block; posting to a queue drained by the UI context is the intent.
///
/// Removals carry the row of the collapsed directory in `anchor` and the
/// first removed row in `start`; see [`TreeUpdate`].
pub trait TreeListener: Send + Sync {
    fn on_tree_updated(&self, update: TreeUpdate);
}

impl TreeListener for mpsc::UnboundedSender<TreeUpdate> {
    fn on_tree_updated(&self, update: TreeUpdate) {
        if self.send(update).is_err() {
            debug!("tree listener is gone, dropping update");
        }
    }
}

/// Options fixed when a tree is opened.
#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
    pub policy: ExpansionPolicy,
    /// Warm the cache with a mapping pass over the root.
    pub start_mapping: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            policy: ExpansionPolicy::Default,
            start_mapping: true,
        }
    }
}

/// The flattened list plus the expansion bookkeeping.
///
/// Every visible directory is in exactly one of `expanded`/`collapsed`.
#[derive(Debug, Default)]
struct TreeState {
    items: Vec<TreeNode>,
    expanded: HashSet<PathBuf>,
    collapsed: HashSet<PathBuf>,
}

impl TreeState {
    fn position(&self, path: &Path) -> Option<usize> {
        self.items.iter().position(|n| n.path == path)
    }

    /// Whether `path` is a visible directory whose expansion state is
    /// `expanded`.
    fn is_dir_in_state(&self, path: &Path, expanded: bool) -> bool {
        self.position(path)
            .is_some_and(|i| self.items[i].is_dir && self.items[i].is_expanded == expanded)
    }

    fn track(&mut self, node: &TreeNode) {
        if !node.is_dir {
            return;
        }
        if node.is_expanded {
            self.collapsed.remove(&node.path);
            self.expanded.insert(node.path.clone());
        } else {
            self.expanded.remove(&node.path);
            self.collapsed.insert(node.path.clone());
        }
    }

    fn untrack(&mut self, path: &Path) {
        self.expanded.remove(path);
        self.collapsed.remove(path);
    }

    fn push_root(&mut self, root: TreeNode) -> TreeUpdate {
        self.track(&root);
        self.items.push(root);
        TreeUpdate {
            kind: UpdateKind::Inserted,
            anchor: 0,
            start: 0,
            count: 1,
        }
    }

    /// Recompute the row range of every expanded directory.
    fn reindex(&mut self) {
        let mut open: Vec<usize> = Vec::new();
        for i in 0..self.items.len() {
            let level = self.items[i].level;
            while let Some(&top) = open.last() {
                if self.items[top].level < level {
                    break;
                }
                self.items[top].children_end = i;
                open.pop();
            }
            let node = &mut self.items[i];
            if node.is_expanded {
                node.children_start = i + 1;
                open.push(i);
            } else {
                node.children_start = 0;
                node.children_end = 0;
            }
        }
        let len = self.items.len();
        for top in open {
            self.items[top].children_end = len;
        }
    }

    /// Mark `path` expanded and splice `segment` in right below it.
    ///
    /// Returns `None` when the node is gone, not a directory, already
    /// expanded, or has nothing to show.
    fn expand_with(&mut self, path: &Path, segment: Vec<TreeNode>) -> Option<TreeUpdate> {
        let index = self.position(path)?;
        let node = &mut self.items[index];
        if !node.is_dir || node.is_expanded {
            return None;
        }
        node.is_expanded = true;
        let node = node.clone();
        self.track(&node);

        if segment.is_empty() {
            debug!(path = %path.display(), "no children to expand");
            self.reindex();
            return None;
        }

        let count = segment.len();
        for child in &segment {
            self.track(child);
        }
        self.items.splice(index + 1..index + 1, segment);
        self.reindex();
        Some(TreeUpdate::inserted(index, count))
    }

    /// Paths of every visible descendant of `path`, found breadth-first
    /// through the parent links.
    fn descendants(&self, path: &Path) -> HashSet<PathBuf> {
        let mut by_parent: HashMap<&Path, Vec<&Path>> = HashMap::new();
        for node in &self.items {
            if let Some(parent) = node.parent.as_deref() {
                by_parent.entry(parent).or_default().push(&node.path);
            }
        }

        let mut found = HashSet::new();
        let mut queue = VecDeque::from([path]);
        while let Some(current) = queue.pop_front() {
            for &child in by_parent.get(current).into_iter().flatten() {
                if found.insert(child.to_path_buf()) {
                    queue.push_back(child);
                }
            }
        }
        found
    }

    /// Mark `path` collapsed and drop its whole visible subtree.
    fn collapse(&mut self, path: &Path) -> Option<TreeUpdate> {
        let index = self.position(path)?;
        let node = &mut self.items[index];
        if !node.is_dir || !node.is_expanded {
            return None;
        }
        node.reset_expansion();
        let node = node.clone();
        self.track(&node);

        let doomed = self.descendants(path);
        let before = self.items.len();
        self.items.retain(|n| !doomed.contains(&n.path));
        for gone in &doomed {
            self.untrack(gone);
        }
        self.reindex();
        Some(TreeUpdate::removed(index, before - self.items.len()))
    }

    /// Replace everything under the root with `rows`, expanding the root.
    fn replace_below_root(&mut self, rows: Vec<TreeNode>) -> Vec<TreeUpdate> {
        let mut updates = Vec::new();
        if self.items.is_empty() {
            return updates;
        }

        let old: Vec<TreeNode> = self.items.drain(1..).collect();
        for gone in &old {
            self.untrack(&gone.path);
        }
        if !old.is_empty() {
            updates.push(TreeUpdate::removed(0, old.len()));
        }

        self.items[0].is_expanded = self.items[0].is_dir;
        let root = self.items[0].clone();
        self.track(&root);
        if root.is_dir && !rows.is_empty() {
            for row in &rows {
                self.track(row);
            }
            updates.push(TreeUpdate::inserted(0, rows.len()));
            self.items.extend(rows);
        }
        self.reindex();
        updates
    }

    /// Close every directory under the root, keeping the root's direct
    /// children visible.
    fn collapse_below_root(&mut self) -> Vec<TreeUpdate> {
        let Some(root) = self.items.first() else {
            return Vec::new();
        };
        if !root.is_expanded {
            return Vec::new();
        }
        if self.items.iter().all(|n| n.level <= 1) {
            for node in self.items.iter_mut().skip(1) {
                node.reset_expansion();
            }
            let tops: Vec<TreeNode> = self.items[1..].to_vec();
            for top in &tops {
                self.track(top);
            }
            self.reindex();
            return Vec::new();
        }

        let tops: Vec<TreeNode> = self.items[1..]
            .iter()
            .filter(|n| n.level == 1)
            .cloned()
            .map(|mut n| {
                n.reset_expansion();
                n
            })
            .collect();
        self.replace_below_root(tops)
    }
}

struct Inner {
    root: TreeNode,
    state: Mutex<TreeState>,
    policy: Mutex<ExpansionPolicy>,
    cache: Arc<NodeCache>,
    mapping: Arc<MappingSupervisor>,
    listener: Arc<dyn TreeListener>,
    runtime: Handle,
    cancel: Mutex<CancellationToken>,
    destroyed: AtomicBool,
}

impl Inner {
    /// Children of `node`: the cached listing, or a fresh one that is then
    /// cached.
    fn children_of(&self, node: &TreeNode) -> Children {
        if let Some(children) = self.cache.get(node) {
            return children;
        }
        self.cache.put(node, lister::list(node))
    }

    fn notify(&self, update: TreeUpdate) {
        self.listener.on_tree_updated(update);
    }

    async fn run_expand(self: Arc<Self>, path: PathBuf, policy: ExpansionPolicy, token: CancellationToken) {
        let candidate = {
            let state = self.state.lock();
            state
                .position(&path)
                .map(|i| state.items[i].clone())
                .filter(|n| n.is_dir && !n.is_expanded)
        };
        let Some(node) = candidate else {
            debug!(path = %path.display(), "expand ignored, not a collapsed directory");
            return;
        };

        let Some(segment) = self.build_segment(policy, node, token).await else {
            return;
        };

        let mut state = self.state.lock();
        if let Some(update) = state.expand_with(&path, segment) {
            self.notify(update);
        }
    }

    fn run_collapse(&self, path: &Path) {
        let mut state = self.state.lock();
        match state.collapse(path) {
            Some(update) => self.notify(update),
            None => debug!(path = %path.display(), "collapse ignored, not an expanded directory"),
        }
    }

    /// Rebuild the list with every directory open.
    ///
    /// With a `target`, the rebuild only applies while that row is still a
    /// collapsed directory, so racing requests on it apply once.
    async fn run_expand_all(self: Arc<Self>, target: Option<PathBuf>, token: CancellationToken) {
        let root = self.root.clone();
        let Some(rows) = self
            .build_segment(ExpansionPolicy::MainRecursive, root, token)
            .await
        else {
            return;
        };

        let mut state = self.state.lock();
        if let Some(path) = &target {
            if !state.is_dir_in_state(path, false) {
                debug!(path = %path.display(), "expand ignored, no longer a collapsed directory");
                return;
            }
        }
        for update in state.replace_below_root(rows) {
            self.notify(update);
        }
    }

    fn run_collapse_all(&self) {
        let mut state = self.state.lock();
        for update in state.collapse_below_root() {
            self.notify(update);
        }
    }

    /// Resolve the rows to insert on a blocking thread, off the state lock.
    async fn build_segment(
        self: &Arc<Self>,
        policy: ExpansionPolicy,
        node: TreeNode,
        token: CancellationToken,
    ) -> Option<Vec<TreeNode>> {
        let inner = Arc::clone(self);
        let walk_token = token.clone();
        let result = tokio::task::spawn_blocking(move || {
            policy::expansion_segment(
                policy,
                &node,
                &|n| inner.children_of(n),
                &|| walk_token.is_cancelled(),
            )
        })
        .await;

        match result {
            Ok(Some(segment)) => Some(segment),
            Ok(None) => {
                debug!("expansion cancelled while listing");
                None
            }
            Err(e) => {
                error!(error = %e, "expansion worker failed");
                None
            }
        }
    }
}

/// Flattened, lazily expanded view of a directory tree.
///
/// Cloning is cheap; clones share the same state. Every control call runs
/// as its own task and returns its handle, which callers may ignore. All
/// structural changes happen in one critical section with no await points,
/// so a cancelled task never leaves a half-applied change behind.
#[derive(Clone)]
pub struct FileTree {
    inner: Arc<Inner>,
}

impl FileTree {
    /// Open a tree at `root` and expand its first level.
    ///
    /// A missing or inaccessible root is logged and the tree starts anyway,
    /// showing only the root row. Must be called inside a tokio runtime.
    pub async fn open(
        root: &Path,
        options: TreeOptions,
        cache: Arc<NodeCache>,
        mapping: Arc<MappingSupervisor>,
        listener: Arc<dyn TreeListener>,
    ) -> Self {
        if !is_accessible(root) {
            error!(path = %root.display(), "the provided path is invalid or does not exist");
            debug!("continuing anyway");
        }

        let root = TreeNode::root(root);
        let tree = Self {
            inner: Arc::new(Inner {
                root: root.clone(),
                state: Mutex::new(TreeState::default()),
                policy: Mutex::new(options.policy),
                cache,
                mapping,
                listener,
                runtime: Handle::current(),
                cancel: Mutex::new(CancellationToken::new()),
                destroyed: AtomicBool::new(false),
            }),
        };

        {
            let mut state = tree.inner.state.lock();
            let update = state.push_root(root.clone());
            tree.inner.notify(update);
        }

        if options.start_mapping {
            tree.inner.mapping.start_mapping(vec![root.clone()]);
        }

        let path = root.path.clone();
        let initial = tree.spawn("expand", move |inner, token| {
            inner.run_expand(path, ExpansionPolicy::Single, token)
        });
        if let Err(e) = initial.await {
            warn!(error = %e, "initial expansion did not complete");
        }
        info!(root = %root.path.display(), policy = options.policy.label(), "file tree opened");
        tree
    }

    fn spawn<F, Fut>(&self, op: &'static str, task: F) -> JoinHandle<()>
    where
        F: FnOnce(Arc<Inner>, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Read the token before the flag: `destroy` raises the flag first and
        // then cancels the installed token, so one of the two checks sees it.
        let token = self.inner.cancel.lock().clone();
        if self.inner.destroyed.load(Ordering::Acquire) || token.is_cancelled() {
            debug!(op, "tree destroyed, ignoring request");
            return self.inner.runtime.spawn(async {});
        }

        let work = task(Arc::clone(&self.inner), token.clone());
        self.inner.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!(op, "tree task cancelled"),
                _ = work => {}
            }
        })
    }

    /// Expand `node` according to the active policy.
    ///
    /// Only a visible, collapsed directory reacts. Under a policy that acts
    /// on the root, such a directory opens the whole tree.
    pub fn expand(&self, node: &TreeNode) -> JoinHandle<()> {
        let policy = self.policy();
        let path = node.path.clone();
        if policy.acts_on_root() {
            return self.spawn("expand", move |inner, token| async move {
                let collapsed = inner.state.lock().is_dir_in_state(&path, false);
                if collapsed {
                    inner.run_expand_all(Some(path), token).await;
                } else {
                    debug!(path = %path.display(), "expand ignored, not a collapsed directory");
                }
            });
        }
        self.spawn("expand", move |inner, token| inner.run_expand(path, policy, token))
    }

    /// Collapse `node` according to the active policy.
    ///
    /// Only a visible, expanded directory reacts. Under a policy that acts on
    /// the root, such a directory closes everything below the root.
    pub fn collapse(&self, node: &TreeNode) -> JoinHandle<()> {
        let path = node.path.clone();
        if self.policy().acts_on_root() {
            return self.spawn("collapse", move |inner, _| async move {
                let expanded = inner.state.lock().is_dir_in_state(&path, true);
                if expanded {
                    inner.run_collapse_all();
                } else {
                    debug!(path = %path.display(), "collapse ignored, not an expanded directory");
                }
            });
        }
        self.spawn("collapse", move |inner, _| async move { inner.run_collapse(&path) })
    }

    /// Expand a collapsed directory or collapse an expanded one.
    pub fn toggle(&self, node: &TreeNode) -> JoinHandle<()> {
        let expanded = self
            .node(&node.path)
            .map(|n| n.is_expanded)
            .unwrap_or(node.is_expanded);
        if expanded {
            self.collapse(node)
        } else {
            self.expand(node)
        }
    }

    /// Open every directory under the root.
    pub fn expand_all(&self) -> JoinHandle<()> {
        self.spawn("expand_all", |inner, token| inner.run_expand_all(None, token))
    }

    /// Close every directory under the root, leaving its direct children.
    pub fn collapse_all(&self) -> JoinHandle<()> {
        self.spawn("collapse_all", |inner, _| async move { inner.run_collapse_all() })
    }

    pub fn policy(&self) -> ExpansionPolicy {
        *self.inner.policy.lock()
    }

    pub fn set_policy(&self, policy: ExpansionPolicy) {
        *self.inner.policy.lock() = policy;
        info!(policy = policy.label(), "expansion policy changed");
    }

    /// Cancel every in-flight expand/collapse task. The tree stays usable
    /// unless it has been destroyed.
    pub fn cancel_all(&self) {
        let mut token = self.inner.cancel.lock();
        token.cancel();
        if !self.inner.destroyed.load(Ordering::Acquire) {
            *token = CancellationToken::new();
        }
        debug!("cancelled in-flight tree tasks");
    }

    /// Cancel all background work and reject further requests.
    ///
    /// The cancelled token stays installed, so a task that slips past the
    /// destroyed flag is cancelled as soon as it starts.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        self.inner.cancel.lock().cancel();
        self.inner.mapping.stop_mapping();
        info!(root = %self.inner.root.path.display(), "file tree destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Snapshot of the visible rows.
    pub fn items(&self) -> Vec<TreeNode> {
        self.inner.state.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current state of the visible row at `path`.
    pub fn node(&self, path: &Path) -> Option<TreeNode> {
        let state = self.inner.state.lock();
        state.position(path).map(|i| state.items[i].clone())
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.inner.state.lock().position(path)
    }

    pub fn root(&self) -> TreeNode {
        self.inner
            .state
            .lock()
            .items
            .first()
            .cloned()
            .unwrap_or_else(|| self.inner.root.clone())
    }

    pub fn expanded_paths(&self) -> HashSet<PathBuf> {
        self.inner.state.lock().expanded.clone()
    }

    pub fn collapsed_paths(&self) -> HashSet<PathBuf> {
        self.inner.state.lock().collapsed.clone()
    }

    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.inner.cache
    }

    pub fn mapping(&self) -> &Arc<MappingSupervisor> {
        &self.inner.mapping
    }
}

/// Whether `path` exists and can be both read and written.
pub(crate) fn is_accessible(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let readable = if metadata.is_dir() {
        std::fs::read_dir(path).is_ok()
    } else {
        std::fs::File::open(path).is_ok()
    };
    readable && !metadata.permissions().readonly()
}
