//! In rust, it is possible to have a value, a type and a macro with the same
//! name without conflicts.
//!
//! `PerNs` (per namespace) captures this.

use super::{ModPath, Visibility};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Types,
    Values,
    Macros,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Types, Namespace::Values, Namespace::Macros];
}

/// What kind of definition a [`VisItem`] points at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DefKind {
    Module,
    Enum,
    Struct,
    Union,
    Trait,
    TypeAlias,
    EnumVariant,
    Fn,
    Const,
    Static,
    Macro,
}

/// An item as seen by resolution: where it is defined, how visible the
/// binding is, and what it is.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VisItem {
    /// Path of the item. For modules and enums this is the path of their
    /// `ModData` node.
    pub path: ModPath,
    pub visibility: Visibility,
    pub kind: DefKind,
}

impl VisItem {
    pub fn new(path: ModPath, visibility: Visibility, kind: DefKind) -> Self {
        Self { path, visibility, kind }
    }

    /// Modules and enums host items and can be walked through.
    pub fn is_mod_or_enum(&self) -> bool {
        matches!(self.kind, DefKind::Module | DefKind::Enum)
    }

    pub fn with_visibility(&self, visibility: Visibility) -> Self {
        Self { visibility, ..self.clone() }
    }
}

/// Up to one binding per namespace for a single name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PerNs {
    pub types: Option<VisItem>,
    pub values: Option<VisItem>,
    pub macros: Option<VisItem>,
}

impl PerNs {
    pub fn none() -> PerNs {
        PerNs::default()
    }

    pub fn types(item: VisItem) -> PerNs {
        PerNs { types: Some(item), ..PerNs::default() }
    }

    pub fn values(item: VisItem) -> PerNs {
        PerNs { values: Some(item), ..PerNs::default() }
    }

    pub fn macros(item: VisItem) -> PerNs {
        PerNs { macros: Some(item), ..PerNs::default() }
    }

    pub fn is_none(&self) -> bool {
        self.types.is_none() && self.values.is_none() && self.macros.is_none()
    }

    pub fn has_all_namespaces(&self) -> bool {
        self.types.is_some() && self.values.is_some() && self.macros.is_some()
    }

    pub fn get(&self, ns: Namespace) -> Option<&VisItem> {
        match ns {
            Namespace::Types => self.types.as_ref(),
            Namespace::Values => self.values.as_ref(),
            Namespace::Macros => self.macros.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, ns: Namespace) -> &mut Option<VisItem> {
        match ns {
            Namespace::Types => &mut self.types,
            Namespace::Values => &mut self.values,
            Namespace::Macros => &mut self.macros,
        }
    }

    pub fn filter_visibility(self, mut f: impl FnMut(&Visibility) -> bool) -> PerNs {
        PerNs {
            types: self.types.filter(|it| f(&it.visibility)),
            values: self.values.filter(|it| f(&it.visibility)),
            macros: self.macros.filter(|it| f(&it.visibility)),
        }
    }

    /// Re-bind every namespace with `visibility`. Cfg-disabled bindings
    /// stay disabled.
    pub fn with_visibility(self, visibility: Visibility) -> PerNs {
        let adjust = |it: VisItem| {
            if it.visibility.is_cfg_disabled() { it } else { VisItem { visibility, ..it } }
        };
        PerNs {
            types: self.types.map(adjust),
            values: self.values.map(adjust),
            macros: self.macros.map(adjust),
        }
    }

    pub fn or(self, other: PerNs) -> PerNs {
        PerNs {
            types: self.types.or(other.types),
            values: self.values.or(other.values),
            macros: self.macros.or(other.macros),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Namespace, &VisItem)> + '_ {
        Namespace::ALL.into_iter().filter_map(move |ns| self.get(ns).map(|it| (ns, it)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Name;
    use crate::hir::{CrateId, ModuleId};

    fn item(name: &str, visibility: Visibility, kind: DefKind) -> VisItem {
        VisItem::new(ModPath::root(CrateId::new(0)).child(Name::new(name)), visibility, kind)
    }

    #[test]
    fn test_per_ns_or() {
        let ty = PerNs::types(item("S", Visibility::Public, DefKind::Struct));
        let val = PerNs::values(item("f", Visibility::Public, DefKind::Fn));
        let other_ty = PerNs::types(item("T", Visibility::Public, DefKind::Trait));

        let merged = ty.clone().or(val).or(other_ty);
        assert_eq!(merged.types, ty.types);
        assert!(merged.values.is_some());
        assert!(merged.macros.is_none());
        assert!(!merged.has_all_namespaces());
    }

    #[test]
    fn test_with_visibility_keeps_cfg_disabled() {
        let restricted = Visibility::Restricted(ModuleId::crate_root(CrateId::new(0)));
        let per_ns = PerNs {
            types: Some(item("S", Visibility::Public, DefKind::Struct)),
            values: Some(item("S", Visibility::CfgDisabled, DefKind::Struct)),
            macros: None,
        };
        let adjusted = per_ns.with_visibility(restricted);

        assert_eq!(adjusted.types.unwrap().visibility, restricted);
        assert_eq!(adjusted.values.unwrap().visibility, Visibility::CfgDisabled);
    }

    #[test]
    fn test_filter_visibility() {
        let per_ns = PerNs {
            types: Some(item("a", Visibility::Invisible, DefKind::Module)),
            values: Some(item("a", Visibility::Public, DefKind::Fn)),
            macros: None,
        };
        let filtered = per_ns.filter_visibility(|vis| !vis.is_invisible());
        assert!(filtered.types.is_none());
        assert!(filtered.values.is_some());
        assert_eq!(filtered.iter().count(), 1);
    }
}
