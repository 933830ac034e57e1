/// Collaborators the engine calls while expanding nodes.
///
/// The engine knows nothing about filesystems: it asks a [`ChildLister`] for
/// the children of each node and a [`Predicate`] whether a leaf's name is a
/// match. [`FsLister`] and [`NameEquals`] are the real-world implementations.
pub mod fs;

pub use fs::FsLister;

use crate::error::ListingError;
use compact_str::CompactString;

/// One child discovered while listing a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child<N> {
    /// Handle the engine pushes (non-leaf) or emits (matching leaf).
    pub node: N,
    /// Name the predicate is evaluated against (the basename, for files).
    pub name: CompactString,
    /// `true` for nodes that cannot be expanded further.
    pub is_leaf: bool,
}

impl<N> Child<N> {
    pub fn leaf(node: N, name: impl Into<CompactString>) -> Self {
        Self {
            node,
            name: name.into(),
            is_leaf: true,
        }
    }

    pub fn branch(node: N, name: impl Into<CompactString>) -> Self {
        Self {
            node,
            name: name.into(),
            is_leaf: false,
        }
    }
}

/// Enumerates the children of a node.
///
/// Called once per expanded node, concurrently from every worker on
/// different nodes. The returned order becomes the push order.
pub trait ChildLister: Send + Sync + 'static {
    type Node: Send + 'static;

    fn list(&self, node: &Self::Node) -> Result<Vec<Child<Self::Node>>, ListingError>;
}

/// Decides whether a leaf's name is a match. Must be pure.
pub trait Predicate: Send + Sync + 'static {
    fn matches(&self, name: &str) -> bool;
}

impl<F> Predicate for F
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    fn matches(&self, name: &str) -> bool {
        self(name)
    }
}

/// Exact, case-sensitive basename equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEquals(CompactString);

impl NameEquals {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Predicate for NameEquals {
    fn matches(&self, name: &str) -> bool {
        self.0 == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_equals_is_exact() {
        let predicate = NameEquals::new("target");
        assert!(predicate.matches("target"));
        assert!(!predicate.matches("Target"));
        assert!(!predicate.matches("target.txt"));
        assert!(!predicate.matches("a/target"));
        assert_eq!(predicate.name(), "target");
    }

    #[test]
    fn closures_are_predicates() {
        fn check(p: &dyn Predicate, name: &str) -> bool {
            p.matches(name)
        }
        let ends_with_rs = |name: &str| name.ends_with(".rs");
        assert!(check(&ends_with_rs, "lib.rs"));
        assert!(!check(&ends_with_rs, "Cargo.toml"));
    }

    #[test]
    fn child_constructors() {
        let leaf = Child::leaf(1u32, "a");
        let branch = Child::branch(2u32, "b");
        assert!(leaf.is_leaf);
        assert!(!branch.is_leaf);
        assert_eq!(branch.name, "b");
    }
}
