//! Def-map construction.
//!
//! [`DefCollector`] walks the item trees of one crate, binds every item it
//! finds, records `use` declarations and macro calls, and then runs passes
//! until nothing changes:
//!
//! ```text
//! seed:   root module → collect items (recursing into `mod`s, expanding
//!         macros whose path already resolves)
//! pass:   resolve pending imports → re-apply globs whose target changed
//!         → resolve + expand pending macro calls
//! stop:   a pass adds no binding and resolves nothing, or the pass cap
//! ```
//!
//! Bindings are never removed during collection, which is what makes the
//! loop terminate on import cycles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn};

use super::{
    CrateData, CrateDefMap, CrateGraph, CrateId, CrateMetaData, DefDiagnostic, DefDiagnosticKind,
    DefKind, DiagnosticCollector, FileInfo, LocalModuleId, MacroDefInfo, MacroExpander, MacroKind,
    ModData, ModPath, ModuleId, Namespace, PerNs, ResolveMode, VisItem, Visibility,
};
use crate::base::{FileId, Name, SourceDatabase};
use crate::config::DefMapConfig;
use crate::error::{DefMapError, DefMapResult};
use crate::syntax::{
    DOLLAR_CRATE, FlatImportKind, ImportAlias, Item, ItemKind, ItemTree, MacroCall, RawVisibility,
    StructShape, SyntaxError,
};

/// Build the def map of `krate`.
///
/// `dependency_def_maps` must hold the maps of all direct and transitive
/// dependencies of `krate`.
pub fn build_def_map(
    krate: CrateId,
    graph: &CrateGraph,
    db: &dyn SourceDatabase,
    dependency_def_maps: FxHashMap<CrateId, Arc<CrateDefMap>>,
    expander: &dyn MacroExpander,
    config: &DefMapConfig,
    cancel: &CancellationToken,
) -> DefMapResult<CrateDefMap> {
    let span = info_span!("build_def_map", krate = %krate);
    let _guard = span.enter();

    let collector = DefCollector::new(krate, graph, db, dependency_def_maps, expander, config, cancel)?;
    collector.collect()
}

// ============================================================================
// COLLECTOR STATE
// ============================================================================

/// How a binding got into a module. Explicit items shadow named imports,
/// which shadow glob imports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BindingSource {
    Def,
    NamedImport,
    Glob,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ImportStatus {
    Unresolved,
    /// Resolved in some namespaces; more may appear in later passes.
    Indeterminate,
    Resolved,
}

#[derive(Clone, Debug)]
struct Import {
    module: LocalModuleId,
    file: Option<FileId>,
    path: Vec<Name>,
    kind: FlatImportKind,
    visibility: Visibility,
    status: ImportStatus,
}

#[derive(Clone, Debug)]
struct GlobImport {
    module: LocalModuleId,
    target: ModPath,
    visibility: Visibility,
    /// Version of the target module when it was last copied.
    applied_version: Option<u64>,
}

#[derive(Clone, Debug)]
struct MacroCallInfo {
    ctx: ModCtx,
    call: MacroCall,
    /// `macro_rules!` in textual scope at the call site.
    legacy_scope: IndexMap<Name, Arc<MacroDefInfo>>,
}

/// Where items are being collected.
#[derive(Copy, Clone, Debug)]
struct ModCtx {
    module: LocalModuleId,
    file: Option<FileId>,
    /// Number of macro expansions the items came out of.
    depth: usize,
    enabled: bool,
}

/// Fixed-point collector for one crate.
pub struct DefCollector<'a> {
    def_map: CrateDefMap,
    db: &'a dyn SourceDatabase,
    crate_data: &'a CrateData,
    expander: &'a dyn MacroExpander,
    config: &'a DefMapConfig,
    cancel: &'a CancellationToken,

    imports: Vec<Import>,
    globs: Vec<GlobImport>,
    macro_calls: Vec<MacroCallInfo>,
    sources: FxHashMap<(LocalModuleId, Name, Namespace), BindingSource>,
    /// Bumped whenever a module's bindings change.
    versions: Vec<u64>,
    binding_changes: u64,
    passes: usize,
    diagnostics: DiagnosticCollector,
}

impl<'a> DefCollector<'a> {
    /// Create the crate root and collect the items reachable without
    /// resolving anything.
    pub fn new(
        krate: CrateId,
        graph: &'a CrateGraph,
        db: &'a dyn SourceDatabase,
        dependency_def_maps: FxHashMap<CrateId, Arc<CrateDefMap>>,
        expander: &'a dyn MacroExpander,
        config: &'a DefMapConfig,
        cancel: &'a CancellationToken,
    ) -> DefMapResult<Self> {
        let crate_data = graph.get(krate).ok_or(DefMapError::UnknownCrate(krate))?;
        let root_file = crate_data.root_file;
        let missing_root = || DefMapError::MissingRootFile { krate, file: root_file };
        let root_path = db.file_path(root_file).ok_or_else(missing_root)?;
        let root_tree = db.item_tree(root_file).ok_or_else(missing_root)?;

        let def_map = CrateDefMap::new(krate, CrateMetaData::from(crate_data), dependency_def_maps);
        let mut collector = Self {
            def_map,
            db,
            crate_data,
            expander,
            config,
            cancel,
            imports: Vec::new(),
            globs: Vec::new(),
            macro_calls: Vec::new(),
            sources: FxHashMap::default(),
            versions: Vec::new(),
            binding_changes: 0,
            passes: 0,
            diagnostics: DiagnosticCollector::new(),
        };

        let mut root = ModData::new(
            collector.def_map.next_module_id(),
            ModPath::root(krate),
            None,
            Some(root_file),
            Visibility::Public,
        );
        root.dir_path = root_path.parent().map(Path::to_path_buf);
        let root = collector.alloc_module(root);
        collector.record_file(root_file, root);

        collector.seed_extern_prelude();
        collector.seed_std_prelude();

        let ctx = ModCtx { module: root, file: Some(root_file), depth: 0, enabled: true };
        collector.collect_tree(ctx, &root_tree);
        Ok(collector)
    }

    /// The map as collected so far.
    pub fn def_map(&self) -> &CrateDefMap {
        &self.def_map
    }

    /// Passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Run passes until a fixed point, then finish the map.
    pub fn collect(mut self) -> DefMapResult<CrateDefMap> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(DefMapError::Cancelled);
            }
            if self.passes >= self.config.max_fixed_point_iterations {
                warn!(passes = self.passes, "def map collection hit the pass cap");
                let root = self.def_map.root().path.clone();
                self.diagnostics.add(DefDiagnostic::new(
                    root,
                    None,
                    DefDiagnosticKind::IterationCapReached { passes: self.passes },
                ));
                break;
            }
            if !self.resolve_pass() {
                break;
            }
        }
        Ok(self.finish())
    }

    /// One pass over everything still pending. Returns whether anything
    /// changed.
    pub fn resolve_pass(&mut self) -> bool {
        self.passes += 1;
        let before = self.binding_changes;
        let mut progress = self.resolve_imports();
        progress |= self.apply_globs();
        progress |= self.resolve_macro_calls();
        progress || self.binding_changes != before
    }

    /// Report what is still unresolved and hand out the map.
    pub fn finish(mut self) -> CrateDefMap {
        for import in std::mem::take(&mut self.imports) {
            if import.status == ImportStatus::Unresolved {
                self.diagnostic(
                    import.module,
                    import.file,
                    DefDiagnosticKind::UnresolvedImport { path: import.path },
                );
            }
        }
        for info in std::mem::take(&mut self.macro_calls) {
            self.diagnostic(
                info.ctx.module,
                info.ctx.file,
                DefDiagnosticKind::UnresolvedMacroCall { path: info.call.path },
            );
        }

        let (modules, items) = self.def_map.statistics();
        debug!(
            passes = self.passes,
            modules,
            items,
            errors = self.diagnostics.error_count(),
            "def map collected"
        );
        self.def_map.diagnostics = self.diagnostics.finish();
        self.def_map
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    fn seed_extern_prelude(&mut self) {
        for dep in &self.crate_data.dependencies {
            if self.def_map.crate_def_map(dep.krate).is_some() {
                self.def_map.extern_prelude.insert(dep.name.clone(), ModuleId::crate_root(dep.krate));
            }
        }
    }

    fn seed_std_prelude(&mut self) {
        let edition = self.crate_data.edition;
        let Some(std) = self
            .def_map
            .direct_dependency_def_map("std")
            .or_else(|| self.def_map.direct_dependency_def_map("core"))
        else {
            return;
        };
        let prelude = [edition.prelude_module(), "v1"].into_iter().find_map(|module| {
            let path = ModPath::new(std.krate, [Name::new("prelude"), Name::new(module)]);
            std.get_mod_data(&path).map(|data| data.id)
        });
        self.def_map.prelude = prelude;
    }

    // ========================================================================
    // ITEM COLLECTION
    // ========================================================================

    fn alloc_module(&mut self, data: ModData) -> LocalModuleId {
        self.versions.push(0);
        self.def_map.alloc_module(data)
    }

    fn record_file(&mut self, file: FileId, module: LocalModuleId) {
        let (Some(modification_stamp), Some(hash)) =
            (self.db.modification_stamp(file), self.db.content_hash(file))
        else {
            return;
        };
        let mod_path = self.def_map.mod_data(module).path.clone();
        self.def_map.file_infos.insert(file, FileInfo { modification_stamp, hash, mod_path });
        self.def_map.file_to_module.insert(file, module);
    }

    fn collect_tree(&mut self, ctx: ModCtx, tree: &ItemTree) {
        self.report_syntax_errors(ctx, &tree.errors);
        for item in &tree.items {
            self.collect_item(ctx, item);
        }
    }

    fn report_syntax_errors(&mut self, ctx: ModCtx, errors: &[SyntaxError]) {
        for error in errors {
            self.diagnostic(
                ctx.module,
                ctx.file,
                DefDiagnosticKind::SyntaxError { range: error.range, message: error.message.clone() },
            );
        }
    }

    fn collect_item(&mut self, ctx: ModCtx, item: &Item) {
        let options = &self.crate_data.cfg_options;
        let enabled = ctx.enabled && item.attrs.cfg.as_ref().is_none_or(|cfg| cfg.eval(options));
        let visibility = if enabled {
            self.resolve_visibility(ctx, &item.visibility)
        } else {
            Visibility::CfgDisabled
        };

        match &item.kind {
            ItemKind::Fn { name } => self.define(ctx, name, DefKind::Fn, &[Namespace::Values], visibility),
            ItemKind::Struct { name, shape } => {
                let namespaces: &[Namespace] = match shape {
                    StructShape::Record => &[Namespace::Types],
                    StructShape::Tuple | StructShape::Unit => &[Namespace::Types, Namespace::Values],
                };
                self.define(ctx, name, DefKind::Struct, namespaces, visibility);
            }
            ItemKind::Union { name } => self.define(ctx, name, DefKind::Union, &[Namespace::Types], visibility),
            ItemKind::Trait { name } => self.define(ctx, name, DefKind::Trait, &[Namespace::Types], visibility),
            ItemKind::TypeAlias { name } => {
                self.define(ctx, name, DefKind::TypeAlias, &[Namespace::Types], visibility)
            }
            ItemKind::Const { name: Some(name) } => {
                self.define(ctx, name, DefKind::Const, &[Namespace::Values], visibility)
            }
            ItemKind::Static { name } => self.define(ctx, name, DefKind::Static, &[Namespace::Values], visibility),
            ItemKind::Const { name: None } | ItemKind::Impl => {}
            ItemKind::Enum { name, variants } => {
                let data = self.alloc_enum(ctx, name, visibility, enabled);
                for variant in variants {
                    let variant_enabled =
                        enabled && variant.cfg.as_ref().is_none_or(|cfg| cfg.eval(options));
                    let variant_visibility = if variant_enabled { visibility } else { Visibility::CfgDisabled };
                    let namespaces: &[Namespace] = match variant.shape {
                        StructShape::Record => &[Namespace::Types],
                        StructShape::Tuple | StructShape::Unit => &[Namespace::Types, Namespace::Values],
                    };
                    let enum_ctx = ModCtx { module: data, enabled: variant_enabled, ..ctx };
                    self.define(enum_ctx, &variant.name, DefKind::EnumVariant, namespaces, variant_visibility);
                }
            }
            ItemKind::Module { name, body } => {
                self.collect_module(ctx, item, name, body.as_ref(), visibility, enabled)
            }
            ItemKind::Use(tree) if enabled => {
                for flat in tree.flatten() {
                    self.imports.push(Import {
                        module: ctx.module,
                        file: ctx.file,
                        path: flat.path,
                        kind: flat.kind,
                        visibility,
                        status: ImportStatus::Unresolved,
                    });
                }
            }
            ItemKind::ExternCrate { name, alias } if enabled => {
                self.collect_extern_crate(ctx, name, alias.as_ref(), visibility, item.attrs.macro_use)
            }
            ItemKind::MacroRules { name, body } if enabled => {
                self.collect_macro_rules(ctx, name, body, item.attrs.macro_export)
            }
            ItemKind::MacroDef { name, body } => {
                let path = self.def_map.mod_data(ctx.module).path.child(name.clone());
                if enabled {
                    let info = MacroDefInfo {
                        krate: self.def_map.krate,
                        path: path.clone(),
                        kind: MacroKind::Macro2,
                        body: body.clone(),
                    };
                    self.def_map.macro_defs.insert(path.clone(), Arc::new(info));
                }
                let macro_item = VisItem::new(path, visibility, DefKind::Macro);
                self.push_binding(ctx.module, name, Namespace::Macros, macro_item, BindingSource::Def);
            }
            ItemKind::MacroCall(call) if enabled => self.collect_macro_call(ctx, call),
            ItemKind::Use(_) | ItemKind::ExternCrate { .. } | ItemKind::MacroRules { .. } | ItemKind::MacroCall(_) => {}
        }
    }

    fn define(&mut self, ctx: ModCtx, name: &Name, kind: DefKind, namespaces: &[Namespace], visibility: Visibility) {
        let path = self.def_map.mod_data(ctx.module).path.child(name.clone());
        let item = VisItem::new(path, visibility, kind);
        for &ns in namespaces {
            self.push_binding(ctx.module, name, ns, item.clone(), BindingSource::Def);
        }
    }

    fn alloc_enum(&mut self, ctx: ModCtx, name: &Name, visibility: Visibility, enabled: bool) -> LocalModuleId {
        let parent = self.def_map.mod_data(ctx.module);
        let path = parent.path.child(name.clone());
        let mut data =
            ModData::new(self.def_map.next_module_id(), path.clone(), Some(ctx.module), ctx.file, visibility);
        data.is_enum = true;
        data.is_deeply_enabled_by_cfg = enabled;
        data.file_relative_path = child_relative_path(&parent.file_relative_path, name);
        data.dir_path = parent.dir_path.clone();

        let local = self.alloc_module(data);
        self.link_child(ctx.module, name, local, enabled);
        let item = VisItem::new(path, visibility, DefKind::Enum);
        self.push_binding(ctx.module, name, Namespace::Types, item, BindingSource::Def);
        local
    }

    /// An enabled node always takes the name; a disabled one only if free.
    fn link_child(&mut self, parent: LocalModuleId, name: &Name, child: LocalModuleId, enabled: bool) {
        let children = &mut self.def_map.mod_data_mut(parent).child_modules;
        if enabled || !children.contains_key(name) {
            children.insert(name.clone(), child);
        }
    }

    fn collect_module(
        &mut self,
        ctx: ModCtx,
        item: &Item,
        name: &Name,
        body: Option<&ItemTree>,
        visibility: Visibility,
        enabled: bool,
    ) {
        let parent = self.def_map.mod_data(ctx.module);
        let path = parent.path.child(name.clone());
        let parent_dir = parent.dir_path.clone();
        let parent_is_file_root = parent.file_relative_path.is_empty();
        let parent_relative_path = parent.file_relative_path.clone();
        let inherited_macros = parent.legacy_macros.clone();

        let module_item = VisItem::new(path.clone(), visibility, DefKind::Module);

        let child = match body {
            Some(body) => {
                let mut data =
                    ModData::new(self.def_map.next_module_id(), path, Some(ctx.module), ctx.file, visibility);
                data.is_deeply_enabled_by_cfg = enabled;
                data.file_relative_path = child_relative_path(&parent_relative_path, name);
                let dir_name = item.attrs.path.as_deref().unwrap_or(name.as_str());
                data.dir_path = parent_dir.map(|dir| dir.join(dir_name));
                data.legacy_macros = inherited_macros;

                let child = self.alloc_module(data);
                self.link_child(ctx.module, name, child, enabled);
                self.push_binding(ctx.module, name, Namespace::Types, module_item, BindingSource::Def);
                self.collect_tree(ModCtx { module: child, enabled, ..ctx }, body);
                child
            }
            None if !enabled => {
                // The file of a disabled module need not exist
                self.push_binding(ctx.module, name, Namespace::Types, module_item, BindingSource::Def);
                return;
            }
            None => {
                let Some(parent_dir) = parent_dir else { return };
                let candidates = module_file_candidates(
                    &parent_dir,
                    name,
                    item.attrs.path.as_deref(),
                    parent_is_file_root,
                    ctx.file.and_then(|file| self.db.file_path(file)).as_deref(),
                );
                let Some((file, file_path)) = candidates
                    .iter()
                    .find_map(|candidate| self.db.file_id(candidate).map(|file| (file, candidate.clone())))
                else {
                    self.def_map.missed_files.extend(candidates.iter().cloned());
                    self.diagnostic(
                        ctx.module,
                        ctx.file,
                        DefDiagnosticKind::MissingModuleFile { name: name.clone(), candidates },
                    );
                    return;
                };

                let mut data =
                    ModData::new(self.def_map.next_module_id(), path, Some(ctx.module), Some(file), visibility);
                data.legacy_macros = inherited_macros;
                data.dir_path = if item.attrs.path.is_some() {
                    file_path.parent().map(Path::to_path_buf)
                } else {
                    Some(parent_dir.join(name.as_str()))
                };

                if self.def_map.file_to_module.contains_key(&file) {
                    data.is_shadowed_by_other_file = true;
                    self.alloc_module(data);
                    self.diagnostic(
                        ctx.module,
                        ctx.file,
                        DefDiagnosticKind::ModuleShadowed { name: name.clone(), file },
                    );
                    return;
                }

                let child = self.alloc_module(data);
                self.link_child(ctx.module, name, child, enabled);
                self.push_binding(ctx.module, name, Namespace::Types, module_item, BindingSource::Def);
                self.record_file(file, child);
                if let Some(tree) = self.db.item_tree(file) {
                    self.collect_tree(ModCtx { module: child, file: Some(file), ..ctx }, &tree);
                }
                child
            }
        };

        if item.attrs.macro_use {
            let exported = self.def_map.mod_data(child).legacy_macros.clone();
            let legacy = &mut self.def_map.mod_data_mut(ctx.module).legacy_macros;
            for (name, def) in exported {
                legacy.shift_remove(&name);
                legacy.insert(name, def);
            }
        }
    }

    fn collect_extern_crate(
        &mut self,
        ctx: ModCtx,
        name: &Name,
        alias: Option<&ImportAlias>,
        visibility: Visibility,
        macro_use: bool,
    ) {
        let target = if name == "self" {
            Some(self.def_map.root_id())
        } else {
            self.crate_data
                .dependencies
                .iter()
                .find(|dep| dep.name == *name)
                .filter(|dep| self.def_map.crate_def_map(dep.krate).is_some())
                .map(|dep| ModuleId::crate_root(dep.krate))
        };
        let Some(target) = target else {
            self.diagnostic(ctx.module, ctx.file, DefDiagnosticKind::UnresolvedExternCrate { name: name.clone() });
            return;
        };

        let binding = match alias {
            Some(ImportAlias::Named(alias)) => Some(alias.clone()),
            Some(ImportAlias::Underscore) => None,
            None if name == "self" => None,
            None => Some(name.clone()),
        };
        if let Some(binding) = &binding {
            let target_path = ModPath::root(target.krate);
            let item = VisItem::new(target_path, visibility, DefKind::Module);
            self.push_binding(ctx.module, binding, Namespace::Types, item, BindingSource::NamedImport);
            if ctx.module == LocalModuleId::ROOT && name != "self" {
                self.def_map.extern_prelude.insert(binding.clone(), target);
            }
        }

        if macro_use && target.krate != self.def_map.krate {
            self.import_exported_macros(ctx.module, target.krate);
        }
    }

    /// `#[macro_use] extern crate`: every `#[macro_export]` macro of the
    /// dependency enters the textual scope.
    fn import_exported_macros(&mut self, module: LocalModuleId, krate: CrateId) {
        let Some(dep) = self.def_map.crate_def_map(krate) else { return };
        let exported: Vec<(Name, Arc<MacroDefInfo>)> = dep
            .root()
            .visible_items
            .iter()
            .filter_map(|(name, per_ns)| {
                let item = per_ns.macros.as_ref().filter(|item| item.visibility == Visibility::Public)?;
                let def = dep.macro_def(&item.path)?;
                Some((name.clone(), def.clone()))
            })
            .collect();
        let legacy = &mut self.def_map.mod_data_mut(module).legacy_macros;
        for (name, def) in exported {
            legacy.shift_remove(&name);
            legacy.insert(name, def);
        }
    }

    fn collect_macro_rules(&mut self, ctx: ModCtx, name: &Name, body: &Arc<str>, macro_export: bool) {
        let path = self.def_map.mod_data(ctx.module).path.child(name.clone());
        let info = Arc::new(MacroDefInfo {
            krate: self.def_map.krate,
            path: path.clone(),
            kind: MacroKind::Rules,
            body: body.clone(),
        });

        let legacy = &mut self.def_map.mod_data_mut(ctx.module).legacy_macros;
        legacy.shift_remove(name);
        legacy.insert(name.clone(), info.clone());
        self.def_map.macro_defs.insert(path.clone(), info);

        if macro_export {
            let item = VisItem::new(path, Visibility::Public, DefKind::Macro);
            self.push_binding(LocalModuleId::ROOT, name, Namespace::Macros, item, BindingSource::Def);
        }
    }

    fn collect_macro_call(&mut self, ctx: ModCtx, call: &MacroCall) {
        if ctx.depth >= self.config.max_macro_depth {
            warn!(path = %join(&call.path), depth = ctx.depth, "macro expansion is too deep");
            self.diagnostic(
                ctx.module,
                ctx.file,
                DefDiagnosticKind::MacroExpansionFailed {
                    path: call.path.clone(),
                    reason: Name::new("recursion limit reached"),
                },
            );
            return;
        }
        let legacy_scope = self.def_map.mod_data(ctx.module).legacy_macros.clone();
        match self.resolve_macro(ctx.module, &call.path, &legacy_scope) {
            Some(def) => self.expand_macro(ctx, &def, call),
            None => self.macro_calls.push(MacroCallInfo { ctx, call: call.clone(), legacy_scope }),
        }
    }

    /// Textual scope of the call site first for single-segment paths, then
    /// path resolution in the macros namespace.
    fn resolve_macro(
        &self,
        module: LocalModuleId,
        path: &[Name],
        legacy_scope: &IndexMap<Name, Arc<MacroDefInfo>>,
    ) -> Option<Arc<MacroDefInfo>> {
        if let [name] = path {
            if let Some(def) = legacy_scope.get(name) {
                return Some(def.clone());
            }
        }
        let result = self.def_map.resolve_path_fp(module, path, ResolveMode::Other, false);
        let item = result.resolved_def.macros?;
        self.def_map.macro_def(&item.path).cloned()
    }

    fn expand_macro(&mut self, ctx: ModCtx, def: &MacroDefInfo, call: &MacroCall) {
        let Some(tree) = self.expander.expand(def, call) else {
            self.diagnostic(
                ctx.module,
                ctx.file,
                DefDiagnosticKind::MacroExpansionFailed {
                    path: call.path.clone(),
                    reason: Name::new("no rule matched the invocation"),
                },
            );
            return;
        };
        let tree = tree.with_dollar_crate(&Name::new(def.krate.index().to_string()));
        self.collect_tree(ModCtx { depth: ctx.depth + 1, ..ctx }, &tree);
    }

    // ========================================================================
    // VISIBILITY
    // ========================================================================

    fn resolve_visibility(&mut self, ctx: ModCtx, raw: &RawVisibility) -> Visibility {
        let krate = self.def_map.krate;
        let current = ModuleId::new(krate, ctx.module);
        match raw {
            RawVisibility::Public => Visibility::Public,
            RawVisibility::Private | RawVisibility::SelfMod => Visibility::Restricted(current),
            RawVisibility::Crate => Visibility::Restricted(self.def_map.root_id()),
            RawVisibility::Super => {
                let parent = self.def_map.mod_data(ctx.module).parent.unwrap_or(ctx.module);
                Visibility::Restricted(ModuleId::new(krate, parent))
            }
            RawVisibility::In(path) => match self.resolve_visibility_path(ctx.module, path) {
                Some(scope) => Visibility::Restricted(ModuleId::new(krate, scope)),
                None => {
                    self.diagnostic(
                        ctx.module,
                        ctx.file,
                        DefDiagnosticKind::UnresolvedVisibility { path: path.clone() },
                    );
                    Visibility::Restricted(current)
                }
            },
        }
    }

    /// The ancestor of `module` that `pub(in path)` names.
    fn resolve_visibility_path(&self, module: LocalModuleId, path: &[Name]) -> Option<LocalModuleId> {
        let own_crate = self.def_map.krate.index().to_string();
        let segments = match path {
            [dollar, id, rest @ ..] if dollar == DOLLAR_CRATE && id.as_str() == own_crate => {
                return self.walk_children(LocalModuleId::ROOT, rest, module);
            }
            [first, rest @ ..] if first == "crate" => return self.walk_children(LocalModuleId::ROOT, rest, module),
            [first, rest @ ..] if first == "self" => rest,
            segments => segments,
        };
        let supers = segments.iter().take_while(|segment| *segment == "super").count();
        let start = self.def_map.nth_parent(module, supers)?;
        self.walk_children(start, &segments[supers..], module)
    }

    fn walk_children(&self, start: LocalModuleId, path: &[Name], module: LocalModuleId) -> Option<LocalModuleId> {
        let mut current = start;
        for segment in path {
            let data = self.def_map.mod_data(current);
            current = *data.child_modules.get(segment)?;
            if self.def_map.mod_data(current).is_enum {
                return None;
            }
        }
        self.def_map.is_ancestor_of(current, module).then_some(current)
    }

    // ========================================================================
    // BINDINGS
    // ========================================================================

    /// Bind `item` under `name` unless the existing binding takes priority.
    /// Returns whether the module changed.
    fn push_binding(
        &mut self,
        module: LocalModuleId,
        name: &Name,
        ns: Namespace,
        item: VisItem,
        source: BindingSource,
    ) -> bool {
        let key = (module, name.clone(), ns);
        let data = self.def_map.mod_data(module);
        let old = data.visible_items.get(name).and_then(|per_ns| per_ns.get(ns));
        let replace = match (old, self.sources.get(&key)) {
            (Some(old), Some(&old_source)) => should_replace(old, old_source, &item, source, &self.def_map),
            _ => true,
        };
        if !replace {
            return false;
        }

        let per_ns = self.def_map.mod_data_mut(module).visible_items.entry(name.clone()).or_default();
        *per_ns.slot_mut(ns) = Some(item);
        self.sources.insert(key, source);
        self.bump(module);
        true
    }

    fn bump(&mut self, module: LocalModuleId) {
        self.versions[module.index()] += 1;
        self.binding_changes += 1;
    }

    fn add_unnamed_trait(&mut self, module: LocalModuleId, trait_path: ModPath, visibility: Visibility) {
        let data = self.def_map.mod_data(module);
        let better = match data.unnamed_trait_imports.get(&trait_path) {
            Some(old) => visibility.is_strictly_more_permissive(old, &self.def_map),
            None => true,
        };
        if better {
            self.def_map.mod_data_mut(module).unnamed_trait_imports.insert(trait_path, visibility);
            self.bump(module);
        }
    }

    // ========================================================================
    // IMPORTS
    // ========================================================================

    fn resolve_imports(&mut self) -> bool {
        let mut progress = false;
        for idx in 0..self.imports.len() {
            if self.imports[idx].status == ImportStatus::Resolved {
                continue;
            }
            let import = self.imports[idx].clone();
            let result = self.def_map.resolve_path_fp(import.module, &import.path, ResolveMode::Import, false);
            let def = result.resolved_def;
            if !result.reached_fixed_point || def.is_none() {
                continue;
            }

            let status = match &import.kind {
                FlatImportKind::Glob => {
                    self.record_glob(&import, &def);
                    ImportStatus::Resolved
                }
                FlatImportKind::Named(alias) => {
                    self.record_named(&import, alias, &def);
                    if result.visited_other_crate || def.has_all_namespaces() {
                        ImportStatus::Resolved
                    } else {
                        ImportStatus::Indeterminate
                    }
                }
                FlatImportKind::Underscore => {
                    if let Some(item) = def.types.as_ref().filter(|item| item.kind == DefKind::Trait) {
                        let visibility = self.import_visibility(import.visibility, &item.visibility);
                        self.add_unnamed_trait(import.module, item.path.clone(), visibility);
                    }
                    ImportStatus::Resolved
                }
            };
            if status != import.status {
                progress |= status == ImportStatus::Resolved || import.status == ImportStatus::Unresolved;
                self.imports[idx].status = status;
            }
        }
        progress
    }

    fn record_named(&mut self, import: &Import, name: &Name, def: &PerNs) {
        for (ns, item) in def.iter() {
            let visibility = self.import_visibility(import.visibility, &item.visibility);
            let item = item.with_visibility(visibility);
            self.push_binding(import.module, name, ns, item, BindingSource::NamedImport);
        }
    }

    fn record_glob(&mut self, import: &Import, def: &PerNs) {
        let Some(target) = def.types.as_ref().filter(|item| item.is_mod_or_enum()) else {
            return;
        };
        self.globs.push(GlobImport {
            module: import.module,
            target: target.path.clone(),
            visibility: import.visibility,
            applied_version: None,
        });
    }

    /// A re-export is never more visible than the item it re-exports.
    fn import_visibility(&self, import: Visibility, item: &Visibility) -> Visibility {
        match item {
            Visibility::Restricted(scope) if scope.krate == self.def_map.krate => {
                if import.is_strictly_more_permissive(item, &self.def_map) { *item } else { import }
            }
            _ => import,
        }
    }

    /// Copy the bindings of every glob target that changed since it was last
    /// copied.
    fn apply_globs(&mut self) -> bool {
        let mut progress = false;
        let krate = self.def_map.krate;
        for idx in 0..self.globs.len() {
            let glob = &self.globs[idx];
            let version = if glob.target.krate == krate {
                match self.def_map.get_mod_data(&glob.target) {
                    Some(target) => self.versions[target.id.local.index()],
                    None => continue,
                }
            } else {
                // Other crates are frozen
                0
            };
            if glob.applied_version == Some(version) {
                continue;
            }
            self.globs[idx].applied_version = Some(version);
            let glob = self.globs[idx].clone();
            progress |= self.apply_glob(&glob);
        }
        progress
    }

    fn apply_glob(&mut self, glob: &GlobImport) -> bool {
        let Some(target) = self.def_map.get_mod_data(&glob.target) else {
            return false;
        };
        let entries: Vec<(Name, PerNs)> =
            target.visible_items.iter().map(|(name, per_ns)| (name.clone(), per_ns.clone())).collect();
        let traits: Vec<(ModPath, Visibility)> =
            target.unnamed_trait_imports.iter().map(|(path, vis)| (path.clone(), *vis)).collect();
        let target_is_enum = target.is_enum;

        let from = ModuleId::new(self.def_map.krate, glob.module);
        let mut changed = false;
        for (name, per_ns) in entries {
            for (ns, item) in per_ns.iter() {
                let visibility = if item.visibility.is_cfg_disabled() {
                    Visibility::CfgDisabled
                } else if target_is_enum || item.visibility.is_visible_from(from, &self.def_map) {
                    self.import_visibility(glob.visibility, &item.visibility)
                } else {
                    Visibility::Invisible
                };
                let imported = item.with_visibility(visibility);
                changed |= self.push_binding(glob.module, &name, ns, imported, BindingSource::Glob);

                // A trait shadowed by another name stays usable for methods
                if ns == Namespace::Types && item.kind == DefKind::Trait && !visibility.is_invisible() {
                    let bound = self.def_map.mod_data(glob.module).get(&name);
                    if bound.types.is_some_and(|bound| bound.path != item.path) {
                        self.add_unnamed_trait(glob.module, item.path.clone(), visibility);
                    }
                }
            }
        }
        for (trait_path, visibility) in traits {
            if visibility.is_visible_from(from, &self.def_map) {
                let visibility = self.import_visibility(glob.visibility, &visibility);
                self.add_unnamed_trait(glob.module, trait_path, visibility);
            }
        }
        changed
    }

    // ========================================================================
    // MACRO CALLS
    // ========================================================================

    fn resolve_macro_calls(&mut self) -> bool {
        let pending = std::mem::take(&mut self.macro_calls);
        let mut progress = false;
        for info in pending {
            match self.resolve_macro(info.ctx.module, &info.call.path, &info.legacy_scope) {
                Some(def) => {
                    progress = true;
                    self.expand_macro(info.ctx, &def, &info.call);
                }
                None => self.macro_calls.push(info),
            }
        }
        progress
    }

    fn diagnostic(&mut self, module: LocalModuleId, file: Option<FileId>, kind: DefDiagnosticKind) {
        let path = self.def_map.mod_data(module).path.clone();
        self.diagnostics.add(DefDiagnostic::new(path, file, kind));
    }
}

/// Whether `new` from `new_source` should replace the existing `old`.
fn should_replace(
    old: &VisItem,
    old_source: BindingSource,
    new: &VisItem,
    new_source: BindingSource,
    def_map: &CrateDefMap,
) -> bool {
    if old == new {
        return false;
    }
    let old_disabled = old.visibility.is_cfg_disabled();
    let new_disabled = new.visibility.is_cfg_disabled();
    if old_disabled != new_disabled {
        return old_disabled;
    }
    match (old_source, new_source) {
        // Later definitions win
        (_, BindingSource::Def) => true,
        (BindingSource::Def, _) => false,
        (BindingSource::Glob, BindingSource::NamedImport) => true,
        (BindingSource::NamedImport, BindingSource::Glob) => false,
        _ => new.visibility.is_strictly_more_permissive(&old.visibility, def_map),
    }
}

fn child_relative_path(parent: &Name, name: &Name) -> Name {
    if parent.is_empty() { name.clone() } else { Name::new(format!("{parent}::{name}")) }
}

/// Files `mod name;` may refer to, in lookup order.
fn module_file_candidates(
    dir: &Path,
    name: &Name,
    path_attr: Option<&str>,
    parent_is_file_root: bool,
    parent_file: Option<&Path>,
) -> Vec<PathBuf> {
    match path_attr {
        Some(path_attr) => {
            let base = if parent_is_file_root {
                parent_file.and_then(Path::parent).unwrap_or(dir)
            } else {
                dir
            };
            vec![base.join(path_attr)]
        }
        None => vec![dir.join(format!("{name}.rs")), dir.join(name.as_str()).join("mod.rs")],
    }
}

fn join(path: &[Name]) -> String {
    path.iter().map(Name::as_str).collect::<Vec<_>>().join("::")
}
