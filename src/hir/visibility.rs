//! The visibility lattice.

use super::{CrateDefMap, ModuleId};

/// Visibility of a binding.
///
/// Ordered by permissiveness: `CfgDisabled < Invisible < Restricted < Public`,
/// and between two restrictions in the same crate, the ancestor is the more
/// permissive one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    /// Visible from the module and its descendants.
    Restricted(ModuleId),
    /// Not visible from anywhere. Glob imports copy unreachable items with
    /// this visibility so that scope listings can still show them.
    Invisible,
    /// Eliminated by `#[cfg]`. Never visible; kept for diagnostics.
    CfgDisabled,
}

impl Visibility {
    /// Whether a binding with this visibility can be used from `from`.
    ///
    /// `def_map` must be the def map of `from`'s crate.
    pub fn is_visible_from(&self, from: ModuleId, def_map: &CrateDefMap) -> bool {
        match *self {
            Visibility::Public => true,
            Visibility::Restricted(scope) => {
                scope.krate == from.krate
                    && def_map.krate == from.krate
                    && def_map.is_ancestor_of(scope.local, from.local)
            }
            Visibility::Invisible | Visibility::CfgDisabled => false,
        }
    }

    /// True for `Invisible` and `CfgDisabled`.
    pub fn is_invisible(&self) -> bool {
        matches!(self, Visibility::Invisible | Visibility::CfgDisabled)
    }

    pub fn is_cfg_disabled(&self) -> bool {
        matches!(self, Visibility::CfgDisabled)
    }

    fn rank(&self) -> u8 {
        match self {
            Visibility::CfgDisabled => 0,
            Visibility::Invisible => 1,
            Visibility::Restricted(_) => 2,
            Visibility::Public => 3,
        }
    }

    /// `self > other` in the lattice. Restrictions to unrelated modules are
    /// incomparable.
    pub fn is_strictly_more_permissive(&self, other: &Visibility, def_map: &CrateDefMap) -> bool {
        match (self, other) {
            (Visibility::Restricted(a), Visibility::Restricted(b)) => {
                a != b
                    && a.krate == b.krate
                    && a.krate == def_map.krate
                    && def_map.is_ancestor_of(a.local, b.local)
            }
            _ => self.rank() > other.rank(),
        }
    }
}
