//! # defmap
//!
//! Incremental, per-crate symbol resolution for Rust sources: definition maps
//! (modules, items, macros and their visibility) and the path resolver that
//! answers qualified-path queries against them.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide      → Scope queries for resolution consumers
//!   ↓
//! project  → Per-crate holders, change tracking, multi-crate rebuild scheduling
//!   ↓
//! hir      → CrateDefMap / ModData, the fixed-point collector, the path resolver
//!   ↓
//! syntax   → Lexer + item-tree parser, cfg expressions, macro_rules fixtures
//!   ↓
//! base     → Primitives (FileId, Name, Vfs)
//! ```

/// Foundation types: FileId, Name, the in-memory file set
pub mod base;

/// Item trees: the syntax the collector consumes
pub mod syntax;

/// Definition maps and path resolution
pub mod hir;

/// Project-wide resolution state and the incremental updater
pub mod project;

/// Queries over finished def maps
pub mod ide;

mod config;
mod error;

pub use base::{FileId, Name, SourceDatabase, Vfs};
pub use config::DefMapConfig;
pub use error::{DefMapError, DefMapResult};
pub use hir::{CrateDefMap, CrateGraph, CrateId, Edition, ModData, PerNs, Visibility};
pub use project::{DefMapState, ProjectResolutionState, UpdateReport};
