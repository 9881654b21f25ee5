use std::path::PathBuf;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::debug;

use orbit::fs::node::TreeNode;
use orbit::fs::tree::{FileTree, TreeUpdate, UpdateKind};

/// Main application state.
///
/// `rows` is a snapshot of the tree taken on every update notification;
/// the selection is remembered by path so it survives rows shifting.
pub struct App {
    pub tree: FileTree,
    pub rows: Vec<TreeNode>,
    pub selected_index: usize,
    selected_path: Option<PathBuf>,
    pub scroll_offset: usize,
    pub should_quit: bool,
    pub show_help: bool,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(tree: FileTree) -> Self {
        let rows = tree.items();
        let selected_path = rows.first().map(|n| n.path.clone());
        Self {
            tree,
            rows,
            selected_index: 0,
            selected_path,
            scroll_offset: 0,
            should_quit: false,
            show_help: false,
            status_message: None,
        }
    }

    /// Re-read the rows after the tree changed.
    pub fn handle_tree_update(&mut self, update: TreeUpdate) {
        debug!(kind = ?update.kind, start = update.start, count = update.count, "tree updated");
        self.rows = self.tree.items();

        let kept = self
            .selected_path
            .as_ref()
            .and_then(|path| self.rows.iter().position(|n| &n.path == path));
        let index = match kept {
            Some(index) => index,
            // The selection was inside the removed block; fall back to its owner.
            None if update.kind == UpdateKind::Removed => update.anchor,
            None => self.selected_index,
        };
        self.select(index);
    }

    fn select(&mut self, index: usize) {
        self.selected_index = index.min(self.rows.len().saturating_sub(1));
        self.selected_path = self.rows.get(self.selected_index).map(|n| n.path.clone());
    }

    pub fn selected_node(&self) -> Option<&TreeNode> {
        self.rows.get(self.selected_index)
    }

    /// Quit the application.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        if self.selected_index + 1 < self.rows.len() {
            self.select(self.selected_index + 1);
        }
    }

    /// Move selection up by one item.
    pub fn select_previous(&mut self) {
        if self.selected_index > 0 {
            self.select(self.selected_index - 1);
        }
    }

    /// Jump to the first item.
    pub fn select_first(&mut self) {
        self.select(0);
    }

    /// Jump to the last item.
    pub fn select_last(&mut self) {
        self.select(self.rows.len().saturating_sub(1));
    }

    /// Update the scroll offset to ensure the selected item is visible.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        } else if self.selected_index >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected_index - visible_height + 1;
        }
    }

    /// Expand the selected directory (or no-op on files).
    ///
    /// Returns the handle of the spawned tree task, if any.
    pub fn expand_selected(&mut self) -> Option<JoinHandle<()>> {
        let node = self.selected_node()?.clone();
        if !node.is_dir || node.is_expanded {
            return None;
        }
        Some(self.tree.expand(&node))
    }

    /// Collapse the selected directory, or jump to parent if on a file or
    /// collapsed directory.
    pub fn collapse_selected(&mut self) -> Option<JoinHandle<()>> {
        let node = self.selected_node()?.clone();
        if node.is_dir && node.is_expanded {
            return Some(self.tree.collapse(&node));
        }
        if let Some(parent) = node.parent.as_deref() {
            if let Some(index) = self.rows.iter().position(|n| n.path == parent) {
                self.select(index);
            }
        }
        None
    }

    pub fn toggle_selected(&mut self) -> Option<JoinHandle<()>> {
        let node = self.selected_node()?.clone();
        if !node.is_dir {
            return None;
        }
        Some(self.tree.toggle(&node))
    }

    pub fn expand_all(&mut self) -> Option<JoinHandle<()>> {
        Some(self.tree.expand_all())
    }

    pub fn collapse_all(&mut self) -> Option<JoinHandle<()>> {
        Some(self.tree.collapse_all())
    }

    /// Switch to the next expansion policy.
    pub fn cycle_policy(&mut self) {
        let policy = self.tree.policy().next();
        self.tree.set_policy(policy);
        self.set_status_message(format!("Policy: {}", policy.label()));
    }

    /// Cancel in-flight expansions and the mapping pass.
    pub fn cancel_background(&mut self) {
        self.tree.cancel_all();
        self.tree.mapping().stop_mapping();
        self.set_status_message("Background work cancelled".to_string());
    }

    /// Set a status message with current timestamp.
    pub fn set_status_message(&mut self, msg: String) {
        self.status_message = Some((msg, Instant::now()));
    }

    /// Clear the status message if it has been displayed for more than 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, ref created)) = self.status_message {
            if created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }
}
