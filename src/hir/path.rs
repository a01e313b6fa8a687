//! Logical module paths.

use std::fmt;
use std::sync::Arc;

use super::CrateId;
use crate::base::Name;

/// The path of a module or item from its crate root: `crate#0::a::b`.
///
/// Module paths are how def maps refer to each other's nodes. A [`VisItem`]
/// that denotes a module or enum carries the path of that node.
///
/// [`VisItem`]: super::VisItem
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModPath {
    pub krate: CrateId,
    pub segments: Arc<[Name]>,
}

impl ModPath {
    /// The root module of `krate`.
    pub fn root(krate: CrateId) -> Self {
        Self { krate, segments: Arc::from([]) }
    }

    pub fn new(krate: CrateId, segments: impl IntoIterator<Item = Name>) -> Self {
        Self { krate, segments: segments.into_iter().collect() }
    }

    pub fn child(&self, name: Name) -> Self {
        let segments = self.segments.iter().cloned().chain(std::iter::once(name)).collect();
        Self { krate: self.krate, segments }
    }

    /// `None` for the crate root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self { krate: self.krate, segments: Arc::from(init) })
    }

    /// The last segment; `None` for the crate root.
    pub fn name(&self) -> Option<&Name> {
        self.segments.last()
    }

    pub fn is_crate_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ModPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.krate)?;
        for segment in self.segments.iter() {
            write!(f, "::{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModPath({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_path_navigation() {
        let root = ModPath::root(CrateId::new(0));
        let ab = root.child(Name::new("a")).child(Name::new("b"));

        assert_eq!(ab.to_string(), "crate#0::a::b");
        assert_eq!(ab.name().map(Name::as_str), Some("b"));
        assert_eq!(ab.parent().and_then(|p| p.parent()), Some(root.clone()));
        assert!(root.parent().is_none());
        assert!(root.is_crate_root());
    }
}
