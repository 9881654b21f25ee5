pub mod cache;
pub mod list;
pub mod lister;
pub mod mapping;
pub mod node;
pub mod policy;
pub mod tree;
