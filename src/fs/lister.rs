use std::cmp::Ordering;
use std::fs;

use tracing::warn;

use crate::fs::node::TreeNode;

/// List the immediate children of `node`, directories first.
///
/// Each partition is sorted by case-insensitive name. A file, a missing path
/// or an unreadable directory lists as empty. Entries that disappear while
/// being read are skipped; broken symlinks are kept and sort with the files.
pub fn list(node: &TreeNode) -> Vec<TreeNode> {
    if !node.is_dir {
        return Vec::new();
    }

    let entries = match fs::read_dir(&node.path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %node.path.display(), error = %e, "failed to read directory");
            return Vec::new();
        }
    };

    let (mut dirs, mut files): (Vec<TreeNode>, Vec<TreeNode>) = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| node.child(&entry.path()))
        .filter(is_listable)
        .partition(|child| child.is_dir);

    dirs.sort_by(compare_names);
    files.sort_by(compare_names);
    dirs.extend(files);
    dirs
}

/// Whether a freshly built child still names something on disk.
fn is_listable(child: &TreeNode) -> bool {
    child.is_dir || child.is_file || child.is_symlink
}

/// Case-insensitive name order, falling back to the raw name so the result
/// is deterministic when two names differ only by case.
fn compare_names(a: &TreeNode, b: &TreeNode) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}
