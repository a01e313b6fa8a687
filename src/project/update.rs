//! The multi-crate updater.
//!
//! ```text
//! topological order
//!   → skip crates whose holder is fresh
//!   → recheck the rest (stamps, hashes, metadata) on the pool
//!   → add every crate that depends on one that must be rebuilt
//!   → rebuild layer by layer; crates of one layer are independent
//! ```

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::service::{DefMapHolder, ProjectResolutionState};
use crate::base::SourceDatabase;
use crate::error::{DefMapError, DefMapResult};
use crate::hir::{CrateDefMap, CrateGraph, CrateId, build_def_map};

/// What an update did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Rebuilt crates, in the order their maps were published.
    pub rebuilt: Vec<CrateId>,
}

impl UpdateReport {
    pub fn is_empty(&self) -> bool {
        self.rebuilt.is_empty()
    }
}

pub(crate) struct DefMapUpdater<'a> {
    state: &'a ProjectResolutionState,
    graph: &'a CrateGraph,
    db: &'a dyn SourceDatabase,
    cancel: &'a CancellationToken,
    /// Structure stamp when the update started.
    stamp: u64,
}

impl<'a> DefMapUpdater<'a> {
    pub(crate) fn new(
        state: &'a ProjectResolutionState,
        graph: &'a CrateGraph,
        db: &'a dyn SourceDatabase,
        cancel: &'a CancellationToken,
    ) -> Self {
        let stamp = state.structure_stamp();
        Self { state, graph, db, cancel, stamp }
    }

    pub(crate) fn run(self) -> DefMapResult<UpdateReport> {
        let started = Instant::now();
        let order = self.graph.topological_order();
        if order.is_empty() {
            return Ok(UpdateReport::default());
        }
        self.check_cancelled()?;

        let to_check = self.find_crates_to_check(&order);
        if to_check.is_empty() {
            return Ok(UpdateReport::default());
        }
        let to_update = self.find_crates_to_update(to_check)?;
        if to_update.is_empty() {
            return Ok(UpdateReport::default());
        }

        let all: FxHashSet<CrateId> = self.with_reverse_dependencies(&to_update);
        let sorted: Vec<CrateId> = order.into_iter().filter(|krate| all.contains(krate)).collect();
        let rebuilt = self.build(&sorted)?;

        info!(
            crates = rebuilt.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "updated def maps"
        );
        Ok(UpdateReport { rebuilt })
    }

    fn check_cancelled(&self) -> DefMapResult<()> {
        if self.cancel.is_cancelled() { Err(DefMapError::Cancelled) } else { Ok(()) }
    }

    fn find_crates_to_check(&self, order: &[CrateId]) -> Vec<(CrateId, Arc<DefMapHolder>)> {
        let mut to_check = Vec::new();
        for &krate in order {
            let holder = self.state.holder(krate);
            if holder.has_latest_stamp(self.stamp) || holder.definitely_should_not_rebuild() {
                holder.set_latest_stamp(self.stamp);
                debug!(krate = %krate, "def map is fresh");
            } else {
                to_check.push((krate, holder));
            }
        }
        to_check
    }

    /// Recheck candidates in parallel. Holders that turn out unchanged are
    /// marked fresh.
    fn find_crates_to_update(&self, to_check: Vec<(CrateId, Arc<DefMapHolder>)>) -> DefMapResult<Vec<CrateId>> {
        let check = |(krate, holder): &(CrateId, Arc<DefMapHolder>)| -> DefMapResult<Option<CrateId>> {
            self.check_cancelled()?;
            let Some(data) = self.graph.get(*krate) else {
                return Ok(None);
            };
            let should_rebuild = holder.update_should_rebuild(data, self.db);
            if should_rebuild {
                debug!(krate = %krate, "def map needs a rebuild");
                Ok(Some(*krate))
            } else {
                debug!(krate = %krate, "def map unchanged after recheck");
                holder.set_latest_stamp(self.stamp);
                Ok(None)
            }
        };

        let results: Vec<DefMapResult<Option<CrateId>>> = match self.pool(to_check.len())? {
            Some(pool) => pool.install(|| to_check.par_iter().map(check).collect()),
            None => to_check.iter().map(check).collect(),
        };
        results.into_iter().filter_map(Result::transpose).collect()
    }

    /// `crates` plus everything that depends on them.
    fn with_reverse_dependencies(&self, crates: &[CrateId]) -> FxHashSet<CrateId> {
        let mut result: FxHashSet<CrateId> = crates.iter().copied().collect();
        for &krate in crates {
            result.extend(self.graph.reverse_dependencies(krate));
        }
        result
    }

    /// Rebuild `sorted` (topologically ordered) one layer at a time.
    fn build(&self, sorted: &[CrateId]) -> DefMapResult<Vec<CrateId>> {
        // Dependents stay dirty if a cancellation lands between layers.
        for &krate in sorted {
            self.state.holder(krate).set_should_rebuild(true);
        }
        let layers = self.layers(sorted);
        let pool = self.pool(sorted.len())?;
        let mut rebuilt = Vec::with_capacity(sorted.len());

        for layer in layers {
            self.check_cancelled()?;
            let built: Vec<DefMapResult<CrateDefMap>> = match &pool {
                Some(pool) if layer.len() > 1 => {
                    pool.install(|| layer.par_iter().map(|&krate| self.build_one(krate)).collect())
                }
                _ => layer.iter().map(|&krate| self.build_one(krate)).collect(),
            };
            for def_map in built {
                let def_map = def_map?;
                let krate = def_map.krate;
                self.state.after_def_map_built(&def_map);
                self.state.holder(krate).publish(Arc::new(def_map), self.stamp);
                rebuilt.push(krate);
            }
        }
        Ok(rebuilt)
    }

    /// Split `sorted` so that each crate comes after the layer of every
    /// dependency that is rebuilt too.
    fn layers(&self, sorted: &[CrateId]) -> Vec<Vec<CrateId>> {
        let mut depth: FxHashMap<CrateId, usize> = FxHashMap::default();
        let mut layers: Vec<Vec<CrateId>> = Vec::new();
        for &krate in sorted {
            let layer = self
                .graph
                .get(krate)
                .into_iter()
                .flat_map(|data| data.dependencies.iter())
                .filter_map(|dep| depth.get(&dep.krate))
                .map(|&d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(krate, layer);
            if layers.len() <= layer {
                layers.resize_with(layer + 1, Vec::new);
            }
            layers[layer].push(krate);
        }
        layers
    }

    fn build_one(&self, krate: CrateId) -> DefMapResult<CrateDefMap> {
        self.check_cancelled()?;
        let dependency_def_maps: FxHashMap<CrateId, Arc<CrateDefMap>> = self
            .graph
            .transitive_dependencies(krate)
            .into_iter()
            .filter_map(|dep| Some((dep, self.state.holder(dep).def_map()?)))
            .collect();
        build_def_map(
            krate,
            self.graph,
            self.db,
            dependency_def_maps,
            self.state.expander(),
            self.state.config(),
            self.cancel,
        )
    }

    /// A dedicated pool when parallel work pays off.
    fn pool(&self, jobs: usize) -> DefMapResult<Option<rayon::ThreadPool>> {
        if !self.state.config().parallel || jobs <= 1 {
            return Ok(None);
        }
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|idx| format!("defmap-{idx}"));
        if let Some(threads) = self.state.config().num_threads {
            builder = builder.num_threads(threads);
        }
        Ok(Some(builder.build()?))
    }
}
