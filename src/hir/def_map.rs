//! The persistent result of name resolution for one crate.
//!
//! A [`CrateDefMap`] owns an arena of [`ModData`] nodes, one per module,
//! inline module and enum. Parent links are arena indices; child edges are
//! name → index tables. Maps are built once by the collector and never
//! mutated after they are published.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

use super::{
    CrateData, CrateId, DefDiagnostic, DefKind, Dependency, Edition, LocalModuleId, MacroDefInfo,
    ModPath, ModuleId, PerNs, VisItem, Visibility,
};
use crate::base::{ContentHash, FileId, Name};
use crate::syntax::CfgOptions;

// ============================================================================
// MODULE DATA
// ============================================================================

/// One module (file, inline `mod {}`, or enum hosting its variants).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModData {
    pub id: ModuleId,
    pub path: ModPath,
    /// Non-owning back edge; `None` for the crate root.
    pub parent: Option<LocalModuleId>,
    pub child_modules: IndexMap<Name, LocalModuleId>,
    pub visible_items: IndexMap<Name, PerNs>,
    /// Textual `macro_rules!` scope at the end of the module. Later
    /// definitions shadow earlier ones.
    pub legacy_macros: IndexMap<Name, Arc<MacroDefInfo>>,
    /// Traits imported with `as _` or through globs, usable for method
    /// resolution but not by name.
    pub unnamed_trait_imports: IndexMap<ModPath, Visibility>,
    pub is_enum: bool,
    /// False if this module or one of its ancestors is cfg-disabled.
    pub is_deeply_enabled_by_cfg: bool,
    /// A second `mod` declaration for a file that already backs another
    /// module. Such nodes are not reachable from the root.
    pub is_shadowed_by_other_file: bool,
    pub file_id: Option<FileId>,
    /// Path of an inline module within its file (`a::b`); empty for the
    /// module that the file itself defines.
    pub file_relative_path: Name,
    /// Directory holding the files of `mod child;` declarations.
    pub dir_path: Option<PathBuf>,
    /// Visibility of the module's own declaration.
    pub visibility: Visibility,
}

impl ModData {
    pub(crate) fn new(
        id: ModuleId,
        path: ModPath,
        parent: Option<LocalModuleId>,
        file_id: Option<FileId>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id,
            path,
            parent,
            child_modules: IndexMap::new(),
            visible_items: IndexMap::new(),
            legacy_macros: IndexMap::new(),
            unnamed_trait_imports: IndexMap::new(),
            is_enum: false,
            is_deeply_enabled_by_cfg: true,
            is_shadowed_by_other_file: false,
            file_id,
            file_relative_path: Name::default(),
            dir_path: None,
            visibility,
        }
    }

    /// The bindings of `name` in this module; empty if unbound.
    pub fn get(&self, name: &str) -> PerNs {
        self.visible_items.get(name).cloned().unwrap_or_default()
    }

    pub fn name(&self) -> Option<&Name> {
        self.path.name()
    }

    pub fn is_crate_root(&self) -> bool {
        self.id.local == LocalModuleId::ROOT
    }

    pub fn as_vis_item(&self) -> VisItem {
        let kind = if self.is_enum { DefKind::Enum } else { DefKind::Module };
        VisItem::new(self.path.clone(), Visibility::Public, kind)
    }

    /// This module as a types-namespace binding.
    pub fn as_per_ns(&self) -> PerNs {
        PerNs::types(self.as_vis_item())
    }
}

// ============================================================================
// CRATE DEF MAP
// ============================================================================

/// Inputs the def map was built from; compared on recheck.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrateMetaData {
    pub display_name: Name,
    pub edition: Edition,
    pub root_file: FileId,
    pub dependencies: Vec<Dependency>,
    pub cfg_options: CfgOptions,
}

impl From<&CrateData> for CrateMetaData {
    fn from(data: &CrateData) -> Self {
        Self {
            display_name: data.display_name.clone(),
            edition: data.edition,
            root_file: data.root_file,
            dependencies: data.dependencies.clone(),
            cfg_options: data.cfg_options.clone(),
        }
    }
}

/// What a def map knew about one of its files when it was built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub modification_stamp: u64,
    pub hash: ContentHash,
    /// The module the file defines.
    pub mod_path: ModPath,
}

/// Modules, items and macros of one crate.
#[derive(Debug, PartialEq, Eq)]
pub struct CrateDefMap {
    pub krate: CrateId,
    pub metadata: CrateMetaData,
    modules: Vec<ModData>,
    /// Names that refer to dependency crate roots from anywhere in the crate.
    pub(crate) extern_prelude: IndexMap<Name, ModuleId>,
    /// The std prelude module, if the crate has a `std` or `core` dependency.
    pub(crate) prelude: Option<ModuleId>,
    /// Def maps of all direct and transitive dependencies.
    dependency_def_maps: FxHashMap<CrateId, Arc<CrateDefMap>>,
    pub(crate) macro_defs: FxHashMap<ModPath, Arc<MacroDefInfo>>,
    pub(crate) file_infos: IndexMap<FileId, FileInfo>,
    /// Candidate paths of `mod` declarations whose file does not exist.
    pub(crate) missed_files: IndexSet<PathBuf>,
    pub(crate) file_to_module: FxHashMap<FileId, LocalModuleId>,
    pub(crate) diagnostics: Vec<DefDiagnostic>,
}

impl CrateDefMap {
    pub(crate) fn new(
        krate: CrateId,
        metadata: CrateMetaData,
        dependency_def_maps: FxHashMap<CrateId, Arc<CrateDefMap>>,
    ) -> Self {
        Self {
            krate,
            metadata,
            modules: Vec::new(),
            extern_prelude: IndexMap::new(),
            prelude: None,
            dependency_def_maps,
            macro_defs: FxHashMap::default(),
            file_infos: IndexMap::new(),
            missed_files: IndexSet::new(),
            file_to_module: FxHashMap::default(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn alloc_module(&mut self, data: ModData) -> LocalModuleId {
        debug_assert_eq!(data.id.local.index(), self.modules.len());
        self.modules.push(data);
        LocalModuleId::new(self.modules.len() as u32 - 1)
    }

    pub(crate) fn next_module_id(&self) -> ModuleId {
        ModuleId::new(self.krate, LocalModuleId::new(self.modules.len() as u32))
    }

    pub(crate) fn mod_data(&self, local: LocalModuleId) -> &ModData {
        &self.modules[local.index()]
    }

    pub(crate) fn mod_data_mut(&mut self, local: LocalModuleId) -> &mut ModData {
        &mut self.modules[local.index()]
    }

    pub fn root(&self) -> &ModData {
        self.mod_data(LocalModuleId::ROOT)
    }

    pub fn root_id(&self) -> ModuleId {
        ModuleId::crate_root(self.krate)
    }

    pub fn edition(&self) -> Edition {
        self.metadata.edition
    }

    pub fn module(&self, local: LocalModuleId) -> Option<&ModData> {
        self.modules.get(local.index())
    }

    /// All module nodes, including enums and shadowed modules.
    pub fn modules(&self) -> impl Iterator<Item = &ModData> + '_ {
        self.modules.iter()
    }

    /// This map if `krate` is its crate, otherwise the def map of that
    /// dependency.
    pub fn crate_def_map(&self, krate: CrateId) -> Option<&CrateDefMap> {
        if krate == self.krate {
            Some(self)
        } else {
            self.dependency_def_maps.get(&krate).map(Arc::as_ref)
        }
    }

    pub fn dependency_def_maps(&self) -> impl Iterator<Item = &Arc<CrateDefMap>> + '_ {
        self.dependency_def_maps.values()
    }

    /// The def map of the direct dependency known as `name`.
    pub fn direct_dependency_def_map(&self, name: &str) -> Option<&CrateDefMap> {
        let dep = self.metadata.dependencies.iter().find(|dep| dep.name == name)?;
        self.crate_def_map(dep.krate)
    }

    pub fn module_data(&self, id: ModuleId) -> Option<&ModData> {
        self.crate_def_map(id.krate)?.module(id.local)
    }

    /// Find the node at a logical path, following child-module edges from
    /// the root of the path's crate.
    pub fn get_mod_data(&self, path: &ModPath) -> Option<&ModData> {
        let def_map = self.crate_def_map(path.krate)?;
        let mut current = def_map.root();
        for segment in path.segments.iter() {
            let child = *current.child_modules.get(segment)?;
            current = def_map.mod_data(child);
        }
        Some(current)
    }

    /// The module whose body is `file`.
    pub fn get_mod_data_for_file(&self, file: FileId) -> Option<&ModData> {
        let local = *self.file_to_module.get(&file)?;
        self.module(local)
    }

    /// The node a module or enum binding refers to.
    pub fn mod_or_enum(&self, item: &VisItem) -> Option<&ModData> {
        if !item.is_mod_or_enum() {
            return None;
        }
        self.get_mod_data(&item.path)
    }

    /// Walk `n` parents up; `n == 0` is the module itself.
    pub fn nth_parent(&self, local: LocalModuleId, n: usize) -> Option<LocalModuleId> {
        let mut current = local;
        for _ in 0..n {
            current = self.module(current)?.parent?;
        }
        Some(current)
    }

    /// Whether `ancestor` is `descendant` or one of its ancestors.
    pub fn is_ancestor_of(&self, ancestor: LocalModuleId, descendant: LocalModuleId) -> bool {
        let mut current = Some(descendant);
        while let Some(local) = current {
            if local == ancestor {
                return true;
            }
            current = self.module(local).and_then(|data| data.parent);
        }
        false
    }

    pub fn macro_def(&self, path: &ModPath) -> Option<&Arc<MacroDefInfo>> {
        self.crate_def_map(path.krate)?.macro_defs.get(path)
    }

    pub fn extern_prelude(&self) -> impl Iterator<Item = (&Name, ModuleId)> + '_ {
        self.extern_prelude.iter().map(|(name, &root)| (name, root))
    }

    pub fn extern_prelude_entry(&self, name: &str) -> Option<ModuleId> {
        self.extern_prelude.get(name).copied()
    }

    pub fn prelude(&self) -> Option<ModuleId> {
        self.prelude
    }

    pub fn file_infos(&self) -> &IndexMap<FileId, FileInfo> {
        &self.file_infos
    }

    pub fn missed_files(&self) -> &IndexSet<PathBuf> {
        &self.missed_files
    }

    pub fn is_missed_file(&self, path: &Path) -> bool {
        self.missed_files.contains(path)
    }

    pub fn diagnostics(&self) -> &[DefDiagnostic] {
        &self.diagnostics
    }

    /// Number of modules and of bound namespace entries.
    pub fn statistics(&self) -> (usize, usize) {
        let items = self
            .modules
            .iter()
            .flat_map(|module| module.visible_items.values())
            .map(|per_ns| per_ns.iter().count())
            .sum();
        (self.modules.len(), items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def_map_with_tree() -> CrateDefMap {
        let krate = CrateId::new(0);
        let metadata = CrateMetaData {
            display_name: Name::new("test"),
            edition: Edition::Edition2021,
            root_file: FileId::new(0),
            dependencies: Vec::new(),
            cfg_options: CfgOptions::new(),
        };
        let mut def_map = CrateDefMap::new(krate, metadata, FxHashMap::default());
        let root_path = ModPath::root(krate);
        let root = def_map.alloc_module(ModData::new(
            def_map.next_module_id(),
            root_path.clone(),
            None,
            Some(FileId::new(0)),
            Visibility::Public,
        ));
        let a_path = root_path.child(Name::new("a"));
        let a = def_map.alloc_module(ModData::new(
            def_map.next_module_id(),
            a_path.clone(),
            Some(root),
            Some(FileId::new(1)),
            Visibility::Public,
        ));
        let b = def_map.alloc_module(ModData::new(
            def_map.next_module_id(),
            a_path.child(Name::new("b")),
            Some(a),
            Some(FileId::new(1)),
            Visibility::Public,
        ));
        def_map.mod_data_mut(root).child_modules.insert(Name::new("a"), a);
        def_map.mod_data_mut(a).child_modules.insert(Name::new("b"), b);
        def_map.file_to_module.insert(FileId::new(1), a);
        def_map
    }

    #[test]
    fn test_get_mod_data() {
        let def_map = def_map_with_tree();
        let path = ModPath::new(CrateId::new(0), [Name::new("a"), Name::new("b")]);

        let b = def_map.get_mod_data(&path).unwrap();
        assert_eq!(b.path, path);
        assert!(def_map.get_mod_data(&path.child(Name::new("c"))).is_none());
        assert_eq!(
            def_map.get_mod_data_for_file(FileId::new(1)).map(|m| m.path.to_string()),
            Some("crate#0::a".to_owned())
        );
    }

    #[test]
    fn test_ancestors() {
        let def_map = def_map_with_tree();
        let (root, a, b) = (LocalModuleId::new(0), LocalModuleId::new(1), LocalModuleId::new(2));

        assert!(def_map.is_ancestor_of(root, b));
        assert!(def_map.is_ancestor_of(b, b));
        assert!(!def_map.is_ancestor_of(b, a));
        assert_eq!(def_map.nth_parent(b, 2), Some(root));
        assert_eq!(def_map.nth_parent(b, 3), None);
    }

    #[test]
    fn test_visibility_lattice() {
        let def_map = def_map_with_tree();
        let krate = CrateId::new(0);
        let in_a = Visibility::Restricted(ModuleId::new(krate, LocalModuleId::new(1)));
        let in_b = Visibility::Restricted(ModuleId::new(krate, LocalModuleId::new(2)));
        let from_b = ModuleId::new(krate, LocalModuleId::new(2));
        let from_root = ModuleId::crate_root(krate);

        assert!(in_a.is_visible_from(from_b, &def_map));
        assert!(!in_b.is_visible_from(from_root, &def_map));
        assert!(in_a.is_strictly_more_permissive(&in_b, &def_map));
        assert!(!in_b.is_strictly_more_permissive(&in_a, &def_map));
        assert!(Visibility::Public.is_strictly_more_permissive(&in_a, &def_map));
        assert!(Visibility::Invisible.is_strictly_more_permissive(&Visibility::CfgDisabled, &def_map));
        assert!(!Visibility::Invisible.is_visible_from(from_root, &def_map));
    }
}
