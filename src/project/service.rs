//! Per-crate holders and the change hooks that invalidate them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::update::{DefMapUpdater, UpdateReport};
use crate::base::{FileChange, FileId, SourceDatabase};
use crate::config::DefMapConfig;
use crate::error::DefMapResult;
use crate::hir::{CrateData, CrateDefMap, CrateGraph, CrateId, CrateMetaData, MacroExpander, MacroRulesExpander};

// ============================================================================
// HOLDER
// ============================================================================

/// Freshness of a crate's def map.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefMapState {
    Fresh,
    NeedsRecheck,
    NeedsRebuild,
}

const NEVER_BUILT: u64 = u64::MAX;

/// The published def map of one crate plus its dirty flags.
#[derive(Debug)]
pub(crate) struct DefMapHolder {
    def_map: RwLock<Option<Arc<CrateDefMap>>>,
    /// Structure stamp at the time the published map started to build.
    stamp: AtomicU64,
    should_rebuild: AtomicBool,
    should_recheck: AtomicBool,
    changed_files: Mutex<FxHashSet<FileId>>,
}

impl DefMapHolder {
    fn new() -> Self {
        Self {
            def_map: RwLock::new(None),
            stamp: AtomicU64::new(NEVER_BUILT),
            should_rebuild: AtomicBool::new(true),
            should_recheck: AtomicBool::new(false),
            changed_files: Mutex::new(FxHashSet::default()),
        }
    }

    pub(crate) fn def_map(&self) -> Option<Arc<CrateDefMap>> {
        self.def_map.read().clone()
    }

    /// Replace the published map in one step.
    pub(crate) fn publish(&self, def_map: Arc<CrateDefMap>, stamp: u64) {
        *self.def_map.write() = Some(def_map);
        self.set_should_rebuild(false);
        self.set_latest_stamp(stamp);
    }

    pub(crate) fn has_latest_stamp(&self, structure_stamp: u64) -> bool {
        !self.should_rebuild() && self.stamp.load(Ordering::Acquire) == structure_stamp
    }

    pub(crate) fn set_latest_stamp(&self, structure_stamp: u64) {
        self.stamp.store(structure_stamp, Ordering::Release);
    }

    pub(crate) fn should_rebuild(&self) -> bool {
        self.should_rebuild.load(Ordering::Acquire)
    }

    /// Flagging a rebuild drops any pending recheck work.
    pub(crate) fn set_should_rebuild(&self, value: bool) {
        self.should_rebuild.store(value, Ordering::Release);
        if value {
            self.should_recheck.store(false, Ordering::Release);
            self.changed_files.lock().clear();
        }
    }

    fn schedule_recheck(&self) {
        self.should_recheck.store(true, Ordering::Release);
    }

    fn add_changed_file(&self, file: FileId) {
        self.changed_files.lock().insert(file);
    }

    /// Nothing flagged and a map exists: no need to look at sources.
    pub(crate) fn definitely_should_not_rebuild(&self) -> bool {
        !self.should_rebuild()
            && !self.should_recheck.load(Ordering::Acquire)
            && self.changed_files.lock().is_empty()
            && self.def_map.read().is_some()
    }

    /// Compare the published map against the current sources and flag a
    /// rebuild if anything it was built from changed.
    pub(crate) fn update_should_rebuild(&self, crate_data: &CrateData, db: &dyn SourceDatabase) -> bool {
        if self.should_rebuild() {
            return true;
        }
        let Some(def_map) = self.def_map() else {
            self.set_should_rebuild(true);
            return true;
        };

        let recheck = self.should_recheck.swap(false, Ordering::AcqRel);
        let changed = std::mem::take(&mut *self.changed_files.lock());
        let rebuild = if recheck {
            is_def_map_stale(&def_map, crate_data, db)
        } else {
            changed.iter().any(|&file| is_file_changed(&def_map, file, db))
        };
        if rebuild {
            self.set_should_rebuild(true);
        }
        rebuild
    }

    fn state(&self, structure_stamp: u64) -> DefMapState {
        if self.should_rebuild() || self.def_map.read().is_none() {
            DefMapState::NeedsRebuild
        } else if self.has_latest_stamp(structure_stamp) {
            DefMapState::Fresh
        } else {
            DefMapState::NeedsRecheck
        }
    }
}

fn is_def_map_stale(def_map: &CrateDefMap, crate_data: &CrateData, db: &dyn SourceDatabase) -> bool {
    def_map.metadata != CrateMetaData::from(crate_data)
        || def_map.file_infos().keys().any(|&file| is_file_changed(def_map, file, db))
        || def_map.missed_files().iter().any(|path| db.file_id(path).is_some())
}

/// A file counts as changed if it is gone or its text hash moved. A new
/// stamp with the same hash is not a change.
fn is_file_changed(def_map: &CrateDefMap, file: FileId, db: &dyn SourceDatabase) -> bool {
    let Some(info) = def_map.file_infos().get(&file) else {
        return false;
    };
    match db.modification_stamp(file) {
        None => true,
        Some(stamp) if stamp == info.modification_stamp => false,
        Some(_) => db.content_hash(file) != Some(info.hash),
    }
}

// ============================================================================
// PROJECT STATE
// ============================================================================

/// Def maps of every crate of one project, and everything needed to keep
/// them up to date.
///
/// Lookups that find a fresh map never block. Deciding what to rebuild and
/// rebuilding it happens under a single build lock, so concurrent callers
/// wait for one build and then see its result.
pub struct ProjectResolutionState {
    holders: RwLock<FxHashMap<CrateId, Arc<DefMapHolder>>>,
    build_lock: Mutex<()>,
    structure_stamp: AtomicU64,
    /// File → crates whose def maps include it.
    file_index: RwLock<FxHashMap<FileId, FxHashSet<CrateId>>>,
    /// Merged missed files of all crates.
    missed_files: RwLock<FxHashMap<PathBuf, FxHashSet<CrateId>>>,
    expander: Arc<dyn MacroExpander>,
    config: DefMapConfig,
}

impl std::fmt::Debug for ProjectResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectResolutionState")
            .field("crates", &self.holders.read().len())
            .field("structure_stamp", &self.structure_stamp())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for ProjectResolutionState {
    fn default() -> Self {
        Self::new(DefMapConfig::default())
    }
}

impl ProjectResolutionState {
    /// State that expands `macro_rules!` with the built-in fixture expander.
    pub fn new(config: DefMapConfig) -> Self {
        Self::with_expander(Arc::new(MacroRulesExpander), config)
    }

    pub fn with_expander(expander: Arc<dyn MacroExpander>, config: DefMapConfig) -> Self {
        Self {
            holders: RwLock::new(FxHashMap::default()),
            build_lock: Mutex::new(()),
            structure_stamp: AtomicU64::new(0),
            file_index: RwLock::new(FxHashMap::default()),
            missed_files: RwLock::new(FxHashMap::default()),
            expander,
            config,
        }
    }

    pub fn config(&self) -> &DefMapConfig {
        &self.config
    }

    pub(crate) fn expander(&self) -> &dyn MacroExpander {
        self.expander.as_ref()
    }

    pub fn structure_stamp(&self) -> u64 {
        self.structure_stamp.load(Ordering::Acquire)
    }

    fn bump_structure_stamp(&self) {
        self.structure_stamp.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn holder(&self, krate: CrateId) -> Arc<DefMapHolder> {
        if let Some(holder) = self.holders.read().get(&krate) {
            return holder.clone();
        }
        self.holders.write().entry(krate).or_insert_with(|| Arc::new(DefMapHolder::new())).clone()
    }

    /// The last published map of `krate`, fresh or not.
    pub fn def_map(&self, krate: CrateId) -> Option<Arc<CrateDefMap>> {
        self.holders.read().get(&krate).and_then(|holder| holder.def_map())
    }

    pub fn holder_state(&self, krate: CrateId) -> DefMapState {
        match self.holders.read().get(&krate) {
            Some(holder) => holder.state(self.structure_stamp()),
            None => DefMapState::NeedsRebuild,
        }
    }

    /// Refresh the file and missed-file indices after `def_map` was
    /// published.
    pub(crate) fn after_def_map_built(&self, def_map: &CrateDefMap) {
        let krate = def_map.krate;

        let mut file_index = self.file_index.write();
        file_index.retain(|_, crates| {
            crates.remove(&krate);
            !crates.is_empty()
        });
        for &file in def_map.file_infos().keys() {
            file_index.entry(file).or_default().insert(krate);
        }
        drop(file_index);

        let mut missed_files = self.missed_files.write();
        missed_files.retain(|_, crates| {
            crates.remove(&krate);
            !crates.is_empty()
        });
        for path in def_map.missed_files() {
            missed_files.entry(path.clone()).or_default().insert(krate);
        }
    }

    // ========================================================================
    // CHANGE HOOKS
    // ========================================================================

    /// A file appeared. Only crates that looked for it need a rebuild.
    pub fn on_file_added(&self, path: &Path) {
        self.bump_structure_stamp();
        let crates = self.missed_files.read().get(path).cloned().unwrap_or_default();
        for krate in crates {
            debug!(krate = %krate, path = %path.display(), "missed file appeared");
            self.holder(krate).set_should_rebuild(true);
        }
    }

    pub fn on_file_removed(&self, file: FileId) {
        self.bump_structure_stamp();
        for krate in self.crates_of_file(file) {
            self.holder(krate).set_should_rebuild(true);
        }
    }

    /// The file's text changed; owners will compare hashes on the next
    /// update.
    pub fn on_file_changed(&self, file: FileId) {
        self.bump_structure_stamp();
        for krate in self.crates_of_file(file) {
            self.holder(krate).add_changed_file(file);
        }
    }

    /// Crates, editions, cfg options or dependency edges changed.
    pub fn on_crate_graph_changed(&self) {
        self.bump_structure_stamp();
        self.schedule_recheck_all();
    }

    /// Route a [`Vfs`](crate::base::Vfs) change to the matching hook.
    pub fn on_vfs_change(&self, change: &FileChange) {
        match change {
            FileChange::Added { path, .. } => self.on_file_added(path),
            FileChange::Changed { file } => self.on_file_changed(*file),
            FileChange::Removed { file } => self.on_file_removed(*file),
            FileChange::Unchanged { .. } => {}
        }
    }

    pub fn schedule_rebuild_all(&self) {
        for holder in self.holders.read().values() {
            holder.set_should_rebuild(true);
        }
    }

    pub fn schedule_recheck_all(&self) {
        for holder in self.holders.read().values() {
            holder.schedule_recheck();
        }
    }

    fn crates_of_file(&self, file: FileId) -> Vec<CrateId> {
        self.file_index.read().get(&file).map(|crates| crates.iter().copied().collect()).unwrap_or_default()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// The def map of `krate`, updating every stale crate first if needed.
    ///
    /// Returns `Ok(None)` for a crate the graph does not know.
    pub fn get_or_update(
        &self,
        krate: CrateId,
        graph: &CrateGraph,
        db: &dyn SourceDatabase,
        cancel: &CancellationToken,
    ) -> DefMapResult<Option<Arc<CrateDefMap>>> {
        if graph.get(krate).is_none() {
            return Ok(None);
        }
        let holder = self.holder(krate);
        if holder.has_latest_stamp(self.structure_stamp()) {
            return Ok(holder.def_map());
        }

        let _guard = self.build_lock.lock();
        if holder.has_latest_stamp(self.structure_stamp()) {
            return Ok(holder.def_map());
        }
        DefMapUpdater::new(self, graph, db, cancel).run()?;
        if holder.def_map().is_some() {
            self.check_has_latest_stamp(krate, &holder);
        }
        Ok(holder.def_map())
    }

    /// Bring every crate of `graph` up to date.
    pub fn update_all(
        &self,
        graph: &CrateGraph,
        db: &dyn SourceDatabase,
        cancel: &CancellationToken,
    ) -> DefMapResult<UpdateReport> {
        let _guard = self.build_lock.lock();
        let report = DefMapUpdater::new(self, graph, db, cancel).run()?;
        for krate in &report.rebuilt {
            self.check_has_latest_stamp(*krate, &self.holder(*krate));
        }
        Ok(report)
    }

    /// Rebuild every crate regardless of its state.
    pub fn force_rebuild_all(
        &self,
        graph: &CrateGraph,
        db: &dyn SourceDatabase,
        cancel: &CancellationToken,
    ) -> DefMapResult<UpdateReport> {
        for data in graph.iter() {
            self.holder(data.id);
        }
        self.schedule_rebuild_all();
        self.update_all(graph, db, cancel)
    }

    fn check_has_latest_stamp(&self, krate: CrateId, holder: &DefMapHolder) {
        if !self.config.debug_checks {
            return;
        }
        let project_stamp = self.structure_stamp();
        if !holder.has_latest_stamp(project_stamp) {
            let holder_stamp = holder.stamp.load(Ordering::Acquire);
            error!(
                krate = %krate,
                holder_stamp,
                project_stamp,
                "def map holder must have the latest stamp right after an update"
            );
            debug_assert!(false, "stale def map holder for {krate} right after an update");
        }
    }
}
