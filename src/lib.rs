//! Lazily expanded filesystem tree with a background listing cache.
//!
//! [`fs::tree::FileTree`] owns the flattened list of visible rows and
//! applies expand/collapse requests to it; [`fs::cache::NodeCache`] and
//! [`fs::mapping::MappingSupervisor`] keep directory listings warm so most
//! expansions never touch the disk. [`fs::list::FileList`] is the flat,
//! single-directory counterpart of the tree.

pub mod config;
pub mod error;
pub mod fs;
