use serde::Deserialize;

use crate::fs::cache::Children;
use crate::fs::node::TreeNode;

/// How an expand or collapse request affects the target's descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpansionPolicy {
    /// Reveal direct children only.
    Single,
    /// Open the whole subtree of the target.
    Recursive,
    /// Open or close everything under the tree root, whatever the target.
    MainRecursive,
    /// Reveal children, descending through single-child directory chains.
    #[default]
    Default,
}

impl ExpansionPolicy {
    /// Parse a policy name as written in config files and on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "single" => Some(Self::Single),
            "recursive" => Some(Self::Recursive),
            "main-recursive" => Some(Self::MainRecursive),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Recursive => "recursive",
            Self::MainRecursive => "main-recursive",
            Self::Default => "default",
        }
    }

    /// Cycle to the next policy.
    pub fn next(&self) -> Self {
        match self {
            Self::Default => Self::Single,
            Self::Single => Self::Recursive,
            Self::Recursive => Self::MainRecursive,
            Self::MainRecursive => Self::Default,
        }
    }

    /// Whether requests are redirected to the tree root.
    pub fn acts_on_root(&self) -> bool {
        matches!(self, Self::MainRecursive)
    }
}

/// Compute the rows revealed by expanding `node`, in pre-order.
///
/// Directories inside the segment that the policy opens are returned with
/// `is_expanded` set. `children_of` resolves one directory; `cancelled` is
/// polled before every listing and a cancelled walk returns `None`.
pub fn expansion_segment(
    policy: ExpansionPolicy,
    node: &TreeNode,
    children_of: &dyn Fn(&TreeNode) -> Children,
    cancelled: &dyn Fn() -> bool,
) -> Option<Vec<TreeNode>> {
    let mut segment = Vec::new();
    match policy {
        ExpansionPolicy::Single => {
            if cancelled() {
                return None;
            }
            segment.extend(fresh_children(node, children_of));
        }
        ExpansionPolicy::Default => single_child_chain(node, children_of, cancelled, &mut segment)?,
        ExpansionPolicy::Recursive | ExpansionPolicy::MainRecursive => {
            full_subtree(node, children_of, cancelled, &mut segment)?
        }
    }
    Some(segment)
}

fn fresh_children(
    node: &TreeNode,
    children_of: &dyn Fn(&TreeNode) -> Children,
) -> impl Iterator<Item = TreeNode> {
    let children = children_of(node);
    (0..children.len()).map(move |i| {
        let mut child = children[i].clone();
        child.reset_expansion();
        child
    })
}

fn descends_into(node: &TreeNode) -> bool {
    node.is_dir && !node.is_symlink
}

fn single_child_chain(
    node: &TreeNode,
    children_of: &dyn Fn(&TreeNode) -> Children,
    cancelled: &dyn Fn() -> bool,
    out: &mut Vec<TreeNode>,
) -> Option<()> {
    if cancelled() {
        return None;
    }
    let start = out.len();
    out.extend(fresh_children(node, children_of));

    if out.len() - start == 1 && descends_into(&out[start]) {
        out[start].is_expanded = true;
        let only_child = out[start].clone();
        single_child_chain(&only_child, children_of, cancelled, out)?;
    }
    Some(())
}

fn full_subtree(
    node: &TreeNode,
    children_of: &dyn Fn(&TreeNode) -> Children,
    cancelled: &dyn Fn() -> bool,
    out: &mut Vec<TreeNode>,
) -> Option<()> {
    if cancelled() {
        return None;
    }
    for mut child in fresh_children(node, children_of) {
        let descend = descends_into(&child);
        child.is_expanded = descend;
        out.push(child);
        if descend {
            let child = out[out.len() - 1].clone();
            full_subtree(&child, children_of, cancelled, out)?;
        }
    }
    Some(())
}
