//! Identifiers for crates and modules.

use std::fmt;

/// A crate in the [`CrateGraph`](super::CrateGraph).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrateId(pub u32);

impl CrateId {
    /// Create a new CrateId from a raw index.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CrateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CrateId({})", self.0)
    }
}

impl fmt::Display for CrateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crate#{}", self.0)
    }
}

/// A module within one crate's def map.
///
/// These index the def map's module arena. They are assigned in discovery
/// order and are stable as long as the crate's structure doesn't change.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LocalModuleId(pub u32);

impl LocalModuleId {
    /// The crate root is always the first module.
    pub const ROOT: LocalModuleId = LocalModuleId(0);

    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for LocalModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalModuleId({})", self.0)
    }
}

/// A globally unique module identifier: the owning crate plus the module's
/// index in that crate's def map.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ModuleId {
    pub krate: CrateId,
    pub local: LocalModuleId,
}

impl ModuleId {
    #[inline]
    pub const fn new(krate: CrateId, local: LocalModuleId) -> Self {
        Self { krate, local }
    }

    /// The root module of `krate`.
    #[inline]
    pub const fn crate_root(krate: CrateId) -> Self {
        Self { krate, local: LocalModuleId::ROOT }
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({:?}:{})", self.krate, self.local.0)
    }
}
