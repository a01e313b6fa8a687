//! Entries visible in a module scope.

use crate::base::Name;
use crate::hir::{
    CrateDefMap, DefKind, LocalModuleId, ModData, Namespace, VisItem, Visibility,
};

/// Name used for unnamed trait imports (`use Trait as _`).
const UNDERSCORE: &str = "_";

/// Whether glob-imported items that are not visible from the module are
/// reported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemProcessingMode {
    WithPrivateImports,
    WithoutPrivateImports,
}

impl ItemProcessingMode {
    fn keeps(self, visibility: &Visibility) -> bool {
        match self {
            ItemProcessingMode::WithPrivateImports => true,
            ItemProcessingMode::WithoutPrivateImports => !visibility.is_invisible(),
        }
    }
}

/// A name visible in a module scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeEntry {
    pub name: Name,
    pub namespace: Namespace,
    pub item: VisItem,
}

/// List the items declared in or imported into `module`.
///
/// Covers the module's own bindings, unnamed trait imports (reported under
/// `_`) and extern-prelude crates that no module item shadows. With `name`
/// set only matching entries are returned.
pub fn process_item_declarations(
    def_map: &CrateDefMap,
    module: LocalModuleId,
    namespaces: &[Namespace],
    name: Option<&str>,
    mode: ItemProcessingMode,
) -> Vec<ScopeEntry> {
    let Some(data) = def_map.module(module) else {
        return Vec::new();
    };
    let matches = |candidate: &str| name.is_none_or(|name| name == candidate);
    let mut entries = Vec::new();

    for (item_name, per_ns) in &data.visible_items {
        if !matches(item_name) {
            continue;
        }
        for (namespace, item) in per_ns.iter() {
            if namespaces.contains(&namespace) && mode.keeps(&item.visibility) {
                entries.push(ScopeEntry { name: item_name.clone(), namespace, item: item.clone() });
            }
        }
    }

    if !namespaces.contains(&Namespace::Types) {
        return entries;
    }

    if matches(UNDERSCORE) {
        for (trait_path, visibility) in &data.unnamed_trait_imports {
            entries.push(ScopeEntry {
                name: Name::new_static(UNDERSCORE),
                namespace: Namespace::Types,
                item: VisItem::new(trait_path.clone(), *visibility, DefKind::Trait),
            });
        }
    }

    for (crate_name, root) in def_map.extern_prelude() {
        if !matches(crate_name) || has_types_binding(data, crate_name) {
            continue;
        }
        if let Some(root_data) = def_map.module_data(root) {
            entries.push(ScopeEntry {
                name: crate_name.clone(),
                namespace: Namespace::Types,
                item: root_data.as_vis_item(),
            });
        }
    }

    entries
}

fn has_types_binding(data: &ModData, name: &str) -> bool {
    data.visible_items
        .get(name)
        .and_then(|per_ns| per_ns.types.as_ref())
        .is_some_and(|item| !item.visibility.is_invisible())
}

/// Macros reachable by a bare name from `module`: textual (`macro_rules!`)
/// scope first, then macros bound in the module.
pub fn macros_in_scope(def_map: &CrateDefMap, module: LocalModuleId, name: Option<&str>) -> Vec<ScopeEntry> {
    let Some(data) = def_map.module(module) else {
        return Vec::new();
    };
    let matches = |candidate: &str| name.is_none_or(|name| name == candidate);

    let legacy = data.legacy_macros.iter().filter(|(macro_name, _)| matches(macro_name)).map(|(macro_name, info)| {
        ScopeEntry {
            name: macro_name.clone(),
            namespace: Namespace::Macros,
            item: VisItem::new(info.path.clone(), Visibility::Public, DefKind::Macro),
        }
    });
    let scoped = data
        .visible_items
        .iter()
        .filter(|(macro_name, _)| matches(macro_name))
        .filter_map(|(macro_name, per_ns)| {
            let item = per_ns.macros.as_ref()?;
            Some(ScopeEntry { name: macro_name.clone(), namespace: Namespace::Macros, item: item.clone() })
        });
    legacy.chain(scoped).collect()
}

/// Whether `name` resolves to anything from `module`: its own scope, the
/// textual macro scope, the extern prelude or the std prelude.
pub fn is_name_in_scope(def_map: &CrateDefMap, module: LocalModuleId, name: &str) -> bool {
    if def_map.module(module).is_none() {
        return false;
    }
    if name == UNDERSCORE {
        return false;
    }
    let path: [Name; 1] = [Name::new(name)];
    !def_map.resolve_path(module, &path).is_none()
        || def_map.module(module).is_some_and(|data| data.legacy_macros.contains_key(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Vfs;
    use crate::config::DefMapConfig;
    use crate::hir::{CrateGraph, Edition, MacroRulesExpander, build_def_map};
    use crate::syntax::CfgOptions;
    use rustc_hash::FxHashMap;
    use tokio_util::sync::CancellationToken;

    fn def_map(text: &str) -> CrateDefMap {
        let vfs = Vfs::new();
        let file = vfs.set_file_text("/lib.rs", text).file_id();
        let mut graph = CrateGraph::new();
        let krate = graph.add_crate("test", Edition::Edition2021, file, CfgOptions::new());
        build_def_map(
            krate,
            &graph,
            &vfs,
            FxHashMap::default(),
            &MacroRulesExpander,
            &DefMapConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap()
    }

    fn names(entries: &[ScopeEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[test]
    fn test_private_imports_filtered() {
        let map = def_map(
            "
mod a { pub fn visible() {} fn hidden() {} }
use a::*;
",
        );
        let root = map.root().id.local;
        let all = process_item_declarations(
            &map,
            root,
            &[Namespace::Values],
            None,
            ItemProcessingMode::WithPrivateImports,
        );
        assert!(names(&all).contains(&"hidden"));
        let public = process_item_declarations(
            &map,
            root,
            &[Namespace::Values],
            None,
            ItemProcessingMode::WithoutPrivateImports,
        );
        assert_eq!(names(&public), vec!["visible"]);
    }

    #[test]
    fn test_unnamed_trait_import() {
        let map = def_map(
            "
mod t { pub trait Tr {} }
use t::Tr as _;
",
        );
        let entries = process_item_declarations(
            &map,
            map.root().id.local,
            &[Namespace::Types],
            Some("_"),
            ItemProcessingMode::WithoutPrivateImports,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item.kind, DefKind::Trait);
        assert_eq!(entries[0].item.path.name().map(|name| name.as_str()), Some("Tr"));
    }

    #[test]
    fn test_macros_in_scope_textual_first() {
        let map = def_map(
            "
macro_rules! m { () => {} }
macro n() {}
",
        );
        let entries = macros_in_scope(&map, map.root().id.local, None);
        assert_eq!(names(&entries), vec!["m", "n"]);
    }

    #[test]
    fn test_is_name_in_scope() {
        let map = def_map("struct S; macro_rules! m { () => {} }");
        let root = map.root().id.local;
        assert!(is_name_in_scope(&map, root, "S"));
        assert!(is_name_in_scope(&map, root, "m"));
        assert!(!is_name_in_scope(&map, root, "missing"));
    }
}
