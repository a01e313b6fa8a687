//! Path resolution against a def map.
//!
//! A path is an ordered list of segments. The first segment (or a keyword
//! prefix) decides where lookup starts; every later segment is looked up in
//! the types namespace of the module or enum reached so far.
//!
//! ## Path kinds, in priority order
//!
//! ```text
//! $crate::<id>::a   → root of crate <id> (macro hygiene)
//! crate::a          → own crate root
//! super::a          → n-th parent (`self::super` is the same)
//! self::a           → containing module
//! ::a               → extern prelude (2018+), crate root or extern prelude (2015)
//! a                 → module scope, extern prelude, std prelude
//! ```

use tracing::warn;

use super::{CrateDefMap, CrateId, DefKind, LocalModuleId, ModuleId, PerNs, VisItem, Visibility};
use crate::base::Name;
use crate::hir::Edition;
use crate::syntax::DOLLAR_CRATE;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Where the path is written.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResolveMode {
    /// The path of a `use` declaration.
    Import,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvePathResult {
    pub resolved_def: PerNs,
    /// `false` if the result may still change as more items get collected.
    pub reached_fixed_point: bool,
    /// Some segment was looked up in a module of another crate.
    pub visited_other_crate: bool,
}

impl ResolvePathResult {
    pub fn empty(reached_fixed_point: bool) -> Self {
        Self { resolved_def: PerNs::none(), reached_fixed_point, visited_other_crate: false }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PathKind {
    Plain,
    /// `super` repeated `n` times; `self` is `Super(0)`.
    Super(usize),
    Crate,
    Absolute,
    DollarCrate(CrateId),
}

/// The kind of `path` and the index of its first unconsumed segment.
fn classify(path: &[Name]) -> (PathKind, usize) {
    match path.first().map(Name::as_str) {
        Some(DOLLAR_CRATE) => match path.get(1).and_then(|id| id.parse::<u32>().ok()) {
            Some(id) => (PathKind::DollarCrate(CrateId::new(id)), 2),
            None => {
                warn!(path = %join(path), "`$crate` path without a crate id");
                (PathKind::Plain, 0)
            }
        },
        Some("crate") => (PathKind::Crate, 1),
        Some("super") => {
            let level = path.iter().take_while(|segment| *segment == "super").count();
            (PathKind::Super(level), level)
        }
        Some("self") => {
            if path.get(1).is_some_and(|segment| segment == "super") {
                let (kind, consumed) = classify(&path[1..]);
                (kind, consumed + 1)
            } else {
                (PathKind::Super(0), 1)
            }
        }
        Some("") => (PathKind::Absolute, 1),
        _ => (PathKind::Plain, 0),
    }
}

/// Invisible glob copies and cfg-disabled items do not shadow the preludes;
/// they are only returned when nothing else matches.
fn split_usable(per_ns: PerNs) -> (PerNs, PerNs) {
    let unusable = per_ns.clone().filter_visibility(|vis| vis.is_invisible());
    (per_ns.filter_visibility(|vis| !vis.is_invisible()), unusable)
}

fn join(path: &[Name]) -> String {
    path.iter().map(Name::as_str).collect::<Vec<_>>().join("::")
}

// ============================================================================
// RESOLVER
// ============================================================================

impl CrateDefMap {
    /// Resolve `path` as written in module `containing` of this crate.
    ///
    /// With `with_invisible_items`, bindings that are not visible from
    /// `containing` are returned as well.
    pub fn resolve_path_fp(
        &self,
        containing: LocalModuleId,
        path: &[Name],
        mode: ResolveMode,
        with_invisible_items: bool,
    ) -> ResolvePathResult {
        if self.module(containing).is_none() {
            return ResolvePathResult::empty(true);
        }
        let from = ModuleId::new(self.krate, containing);
        let (kind, mut index) = classify(path);
        let is_2015 = self.edition() == Edition::Edition2015;

        // A PerNs rather than a module: `use crate as foo;` and `use f as g;`
        // are single-segment paths.
        let first = match kind {
            PathKind::DollarCrate(krate) => match self.crate_def_map(krate) {
                Some(def_map) => def_map.root().as_per_ns(),
                None => {
                    warn!(krate = %krate, path = %join(path), "`$crate` refers to an unknown crate");
                    return ResolvePathResult::empty(true);
                }
            },
            PathKind::Crate => self.root().as_per_ns(),
            PathKind::Super(level) => match self.nth_parent(containing, level) {
                Some(parent) => self.mod_data(parent).as_per_ns(),
                None => return ResolvePathResult::empty(true),
            },
            PathKind::Absolute | PathKind::Plain
                if is_2015 && (kind == PathKind::Absolute || mode == ResolveMode::Import) =>
            {
                let Some(name) = path.get(index) else {
                    return ResolvePathResult::empty(true);
                };
                index += 1;
                self.resolve_name_in_crate_root_or_extern_prelude(name)
            }
            PathKind::Absolute => {
                let Some(name) = path.get(index) else {
                    return ResolvePathResult::empty(true);
                };
                index += 1;
                match self.extern_prelude_entry(name) {
                    Some(root) => self.extern_crate_per_ns(root),
                    // `extern crate` may still add it
                    None => return ResolvePathResult::empty(false),
                }
            }
            PathKind::Plain => {
                let Some(name) = path.get(index) else {
                    return ResolvePathResult::empty(true);
                };
                index += 1;
                let with_legacy_macros = mode == ResolveMode::Import && path.len() == 1;
                let per_ns = self.resolve_name_in_module(containing, name, with_legacy_macros);
                if per_ns.is_none() {
                    return ResolvePathResult::empty(false);
                }
                per_ns
            }
        };

        let is_visible = |vis: &Visibility| with_invisible_items || vis.is_visible_from(from, self);

        let mut current = first;
        let mut visited_other_crate = false;
        for segment in &path[index..] {
            // Segments left, but nothing to walk into
            let Some(item) = current.types.as_ref().filter(|item| is_visible(&item.visibility)) else {
                return ResolvePathResult::empty(false);
            };
            // `Struct::method` and other associated items continue outside the def map
            let Some(module) = self.mod_or_enum(item) else {
                return ResolvePathResult::empty(true);
            };
            if module.id.krate != self.krate {
                visited_other_crate = true;
            }
            current = module.get(segment);
        }

        ResolvePathResult {
            resolved_def: current.filter_visibility(is_visible),
            reached_fixed_point: true,
            visited_other_crate,
        }
    }

    /// Resolve a path from `containing`, ignoring whether the result may
    /// still change.
    pub fn resolve_path(&self, containing: LocalModuleId, path: &[Name]) -> PerNs {
        self.resolve_path_fp(containing, path, ResolveMode::Other, false).resolved_def
    }

    /// Module scope first, then the extern prelude, then the std prelude,
    /// merged per namespace.
    pub(crate) fn resolve_name_in_module(
        &self,
        module: LocalModuleId,
        name: &str,
        with_legacy_macros: bool,
    ) -> PerNs {
        let Some(data) = self.module(module) else {
            return PerNs::none();
        };
        let from_legacy = match data.legacy_macros.get(name) {
            Some(def) if with_legacy_macros => {
                PerNs::macros(VisItem::new(def.path.clone(), Visibility::Public, DefKind::Macro))
            }
            _ => PerNs::none(),
        };
        let (usable, unusable) = split_usable(data.get(name));
        from_legacy
            .or(usable)
            .or(self.resolve_name_in_extern_prelude(name))
            .or(self.resolve_name_in_prelude(name))
            .or(unusable)
    }

    fn resolve_name_in_crate_root_or_extern_prelude(&self, name: &str) -> PerNs {
        let (usable, unusable) = split_usable(self.root().get(name));
        usable.or(self.resolve_name_in_extern_prelude(name)).or(unusable)
    }

    fn resolve_name_in_extern_prelude(&self, name: &str) -> PerNs {
        match self.extern_prelude_entry(name) {
            Some(root) => self.extern_crate_per_ns(root),
            None => PerNs::none(),
        }
    }

    fn resolve_name_in_prelude(&self, name: &str) -> PerNs {
        match self.prelude.and_then(|prelude| self.module_data(prelude)) {
            Some(prelude) => prelude.get(name),
            None => PerNs::none(),
        }
    }

    fn extern_crate_per_ns(&self, root: ModuleId) -> PerNs {
        match self.module_data(root) {
            Some(data) => data.as_per_ns(),
            None => PerNs::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Vec<Name> {
        segments.iter().map(|s| Name::new(s)).collect()
    }

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify(&path(&["crate", "a"])), (PathKind::Crate, 1));
        assert_eq!(classify(&path(&["super", "super", "a"])), (PathKind::Super(2), 2));
        assert_eq!(classify(&path(&["self", "a"])), (PathKind::Super(0), 1));
        assert_eq!(classify(&path(&["self", "super", "a"])), (PathKind::Super(1), 2));
        assert_eq!(classify(&path(&["", "dep", "a"])), (PathKind::Absolute, 1));
        assert_eq!(classify(&path(&["a", "b"])), (PathKind::Plain, 0));
    }

    #[test]
    fn test_classify_dollar_crate() {
        assert_eq!(
            classify(&path(&["$crate", "3", "a"])),
            (PathKind::DollarCrate(CrateId::new(3)), 2)
        );
        // Missing id falls back to a plain path
        assert_eq!(classify(&path(&["$crate", "a"])), (PathKind::Plain, 0));
    }
}
