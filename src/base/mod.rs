//! Foundation types for the resolution engine.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`FileId`] - Interned file identifiers
//! - [`Name`] - Identifier strings
//! - [`Vfs`] - In-memory file set with modification stamps and content hashes
//! - [`SourceDatabase`] - What the collector and the updater read sources through
//!
//! This module has NO dependencies on resolution modules (only on `syntax`
//! for the item trees it caches).

mod file_id;
mod loader;
mod vfs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use file_id::{ContentHash, FileId};
pub use loader::load_directory;
pub use vfs::{FileChange, Vfs};

// Re-export text-size types for convenience
pub use text_size::{TextRange, TextSize};

use crate::syntax::ItemTree;

/// An identifier (module, item, macro or path segment name).
pub type Name = smol_str::SmolStr;

/// Read access to source files.
///
/// The collector reads item trees through this trait; the updater reads
/// stamps and hashes to decide whether a cached def map is still valid.
pub trait SourceDatabase: Send + Sync {
    /// The id of the file at `path`, if such a file currently exists.
    fn file_id(&self, path: &Path) -> Option<FileId>;

    /// The path of an existing file.
    fn file_path(&self, file: FileId) -> Option<PathBuf>;

    /// The parsed item tree of an existing file.
    fn item_tree(&self, file: FileId) -> Option<Arc<ItemTree>>;

    /// Bumped every time the file's text is replaced.
    fn modification_stamp(&self, file: FileId) -> Option<u64>;

    /// Hash of the current file text.
    fn content_hash(&self, file: FileId) -> Option<ContentHash>;
}
