use std::fs;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A filesystem entry placed in the tree.
///
/// Identity is the absolute path: two nodes compare equal (and hash equally)
/// whenever their paths match, regardless of expansion state. The parent is a
/// path key into the flattened list, never an owning link.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub path: PathBuf,
    pub extension: String,
    pub size: u64,
    pub is_empty: bool,
    pub is_dir: bool,
    pub is_file: bool,
    /// Walks never descend into symlinked directories on their own.
    pub is_symlink: bool,
    /// Only ever true for directories.
    pub is_expanded: bool,
    pub parent: Option<PathBuf>,
    /// Depth in the tree; the root sits at level 0.
    pub level: usize,
    /// First row of the visible subtree once expanded.
    pub children_start: usize,
    /// One past the last row of the visible subtree once expanded.
    pub children_end: usize,
}

impl TreeNode {
    /// Build a node from filesystem metadata.
    ///
    /// Symlinks are followed so a link to a directory is expandable. A path
    /// whose metadata can't be read still yields a node that is neither a
    /// file nor a directory.
    pub fn from_path(path: &Path, parent: Option<&Path>, level: usize) -> Self {
        let path = absolute(path);
        let metadata = fs::metadata(&path).ok();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
        let is_symlink = fs::symlink_metadata(&path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        Self {
            name,
            extension,
            size,
            is_empty: size == 0,
            is_dir: metadata.as_ref().is_some_and(|m| m.is_dir()),
            is_file: metadata.as_ref().is_some_and(|m| m.is_file()),
            is_symlink,
            is_expanded: false,
            parent: parent.map(Path::to_path_buf),
            level,
            children_start: 0,
            children_end: 0,
            path,
        }
    }

    /// Create the tree root (level 0, no parent).
    pub fn root(path: &Path) -> Self {
        Self::from_path(path, None, 0)
    }

    /// Create a child of this node from one of its directory entries.
    pub fn child(&self, path: &Path) -> Self {
        Self::from_path(path, Some(&self.path), self.level + 1)
    }

    /// Rows occupied by the visible subtree of an expanded directory.
    pub fn children_range(&self) -> Range<usize> {
        self.children_start..self.children_end
    }

    /// Whether `other` names this node as its parent.
    pub fn is_parent_of(&self, other: &TreeNode) -> bool {
        other.parent.as_deref() == Some(self.path.as_path())
    }

    /// Reset to the state of a freshly listed node.
    pub(crate) fn reset_expansion(&mut self) {
        self.is_expanded = false;
        self.children_start = 0;
        self.children_end = 0;
    }
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for TreeNode {}

impl Hash for TreeNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn file_node_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.md"), "hello").unwrap();
        let node = TreeNode::from_path(&dir.path().join("notes.md"), Some(dir.path()), 1);
        assert!(node.is_file);
        assert!(!node.is_dir);
        assert_eq!(node.name, "notes.md");
        assert_eq!(node.extension, "md");
        assert_eq!(node.size, 5);
        assert!(!node.is_empty);
        assert_eq!(node.parent.as_deref(), Some(dir.path()));
        assert_eq!(node.level, 1);
    }

    #[test]
    fn directory_node_starts_collapsed() {
        let dir = TempDir::new().unwrap();
        let node = TreeNode::root(dir.path());
        assert!(node.is_dir);
        assert!(!node.is_expanded);
        assert!(node.parent.is_none());
        assert!(!node.is_symlink);
        assert_eq!(node.level, 0);
        assert!(node.children_range().is_empty());
    }

    #[test]
    fn missing_path_is_neither_file_nor_dir() {
        let node = TreeNode::root(Path::new("/definitely/not/here"));
        assert!(!node.is_dir);
        assert!(!node.is_file);
        assert_eq!(node.size, 0);
        assert_eq!(node.name, "here");
    }

    #[test]
    fn relative_paths_become_absolute() {
        let node = TreeNode::root(Path::new("some-relative-entry"));
        assert!(node.path.is_absolute());
    }

    #[test]
    fn equality_ignores_expansion_state() {
        let dir = TempDir::new().unwrap();
        let a = TreeNode::root(dir.path());
        let mut b = a.clone();
        b.is_expanded = true;
        b.children_start = 1;
        b.children_end = 4;
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn child_links_back_to_parent() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("a.txt")).unwrap();
        let root = TreeNode::root(dir.path());
        let child = root.child(&dir.path().join("a.txt"));
        assert!(root.is_parent_of(&child));
        assert!(!child.is_parent_of(&root));
        assert_eq!(child.level, 1);
        assert!(child.is_empty);
    }
}
