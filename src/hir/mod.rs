//! Definition maps: what every module of a crate contains, and how paths
//! resolve against that.
//!
//! ## Key Data Structures
//!
//! - [`CrateGraph`] - Crates, editions, root files and dependency edges
//! - [`CrateDefMap`] - One per crate: an arena of [`ModData`] nodes, the
//!   extern prelude and the std prelude link
//! - [`PerNs`] - Up to one binding per namespace for a name
//! - [`Visibility`] - `Public > Restricted(module) > Invisible > CfgDisabled`
//!
//! ## Building
//!
//! [`build_def_map`] runs the [`DefCollector`] to a fixed point. Dependency
//! maps must be built first; the project layer takes care of ordering.

mod collector;
mod def_map;
mod diagnostics;
mod ids;
mod input;
mod macros;
mod path;
mod per_ns;
mod resolve;
mod visibility;

pub use collector::{DefCollector, build_def_map};
pub use def_map::{CrateDefMap, CrateMetaData, FileInfo, ModData};
pub use diagnostics::{DefDiagnostic, DefDiagnosticKind, DiagnosticCollector, Severity, codes};
pub use ids::{CrateId, LocalModuleId, ModuleId};
pub use input::{CrateData, CrateGraph, Dependency, Edition};
pub use macros::{MacroDefInfo, MacroExpander, MacroKind, MacroRulesExpander};
pub use path::ModPath;
pub use per_ns::{DefKind, Namespace, PerNs, VisItem};
pub use resolve::{ResolveMode, ResolvePathResult};
pub use visibility::Visibility;
