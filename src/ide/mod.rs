//! Scope queries for resolution consumers.
//!
//! Completion, "is this name in scope" checks and path-based navigation all
//! want the same thing: the entries a module can see, per namespace, without
//! re-walking the collector's bookkeeping.
//!
//! ## Usage
//!
//! ```ignore
//! use defmap::hir::Namespace;
//! use defmap::ide::{ItemProcessingMode, process_item_declarations};
//!
//! let entries = process_item_declarations(
//!     &def_map,
//!     def_map.root().id.local,
//!     &[Namespace::Types],
//!     None,
//!     ItemProcessingMode::WithoutPrivateImports,
//! );
//! ```

mod scope;

pub use scope::{ItemProcessingMode, ScopeEntry, is_name_in_scope, macros_in_scope, process_item_declarations};
