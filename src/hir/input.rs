//! The crate graph: inputs supplied by the project model.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use super::CrateId;
use crate::base::{FileId, Name};
use crate::error::{DefMapError, DefMapResult};
use crate::syntax::CfgOptions;

/// Rust edition of a crate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Edition {
    Edition2015,
    Edition2018,
    #[default]
    Edition2021,
    Edition2024,
}

impl Edition {
    /// Name of the edition-specific module under `std::prelude`.
    pub fn prelude_module(self) -> &'static str {
        match self {
            Edition::Edition2015 => "rust_2015",
            Edition::Edition2018 => "rust_2018",
            Edition::Edition2021 => "rust_2021",
            Edition::Edition2024 => "rust_2024",
        }
    }
}

/// A named edge to a dependency crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    /// The name the dependency is known by in the depending crate.
    pub name: Name,
    pub krate: CrateId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrateData {
    pub id: CrateId,
    pub display_name: Name,
    pub edition: Edition,
    pub root_file: FileId,
    pub dependencies: Vec<Dependency>,
    pub cfg_options: CfgOptions,
}

/// All crates of a project and their dependency edges.
///
/// The graph is kept acyclic: [`CrateGraph::add_dependency`] rejects edges
/// that would close a cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrateGraph {
    crates: IndexMap<CrateId, CrateData>,
    next_id: u32,
}

impl CrateGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a crate without dependencies.
    pub fn add_crate(
        &mut self,
        display_name: &str,
        edition: Edition,
        root_file: FileId,
        cfg_options: CfgOptions,
    ) -> CrateId {
        let id = CrateId::new(self.next_id);
        self.next_id += 1;
        self.crates.insert(
            id,
            CrateData {
                id,
                display_name: Name::new(display_name),
                edition,
                root_file,
                dependencies: Vec::new(),
                cfg_options,
            },
        );
        id
    }

    /// Make `from` depend on `to` under `name`.
    pub fn add_dependency(&mut self, from: CrateId, name: &str, to: CrateId) -> DefMapResult<()> {
        if !self.crates.contains_key(&to) {
            return Err(DefMapError::UnknownCrate(to));
        }
        if from == to || self.transitive_dependencies(to).contains(&from) {
            return Err(DefMapError::CyclicCrateGraph { from, to });
        }
        let data = self.crates.get_mut(&from).ok_or(DefMapError::UnknownCrate(from))?;
        data.dependencies.push(Dependency { name: Name::new(name), krate: to });
        Ok(())
    }

    /// Get a crate's data.
    pub fn get(&self, krate: CrateId) -> Option<&CrateData> {
        self.crates.get(&krate)
    }

    /// Iterate over all crates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CrateData> + '_ {
        self.crates.values()
    }

    /// Get the number of crates.
    pub fn len(&self) -> usize {
        self.crates.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.crates.is_empty()
    }

    /// All crates, every crate after all of its dependencies.
    pub fn topological_order(&self) -> Vec<CrateId> {
        let mut order = Vec::with_capacity(self.crates.len());
        let mut visited = FxHashSet::default();
        for &krate in self.crates.keys() {
            self.visit_post_order(krate, &mut visited, &mut order);
        }
        order
    }

    fn visit_post_order(&self, krate: CrateId, visited: &mut FxHashSet<CrateId>, order: &mut Vec<CrateId>) {
        if !visited.insert(krate) {
            return;
        }
        if let Some(data) = self.crates.get(&krate) {
            for dep in &data.dependencies {
                self.visit_post_order(dep.krate, visited, order);
            }
        }
        order.push(krate);
    }

    /// Every crate `krate` depends on, directly or not, in topological order.
    pub fn transitive_dependencies(&self, krate: CrateId) -> Vec<CrateId> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        self.visit_post_order(krate, &mut visited, &mut order);
        order.pop();
        order
    }

    /// Every crate that depends on `krate`, directly or not.
    pub fn reverse_dependencies(&self, krate: CrateId) -> FxHashSet<CrateId> {
        let mut result = FxHashSet::default();
        let mut worklist = vec![krate];
        while let Some(current) = worklist.pop() {
            for data in self.crates.values() {
                let depends = data.dependencies.iter().any(|dep| dep.krate == current);
                if depends && result.insert(data.id) {
                    worklist.push(data.id);
                }
            }
        }
        result
    }
}
