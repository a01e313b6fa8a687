//! In-memory file set: paths, texts, stamps and cached item trees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{ContentHash, FileId, SourceDatabase};
use crate::syntax::{ItemTree, parse_item_tree};

/// Manages the mapping between file paths and FileIds, plus file contents.
///
/// Every text replacement bumps the file's modification stamp. Item trees
/// are parsed lazily and cached until the text changes.
#[derive(Debug, Default)]
pub struct Vfs {
    inner: RwLock<VfsInner>,
}

#[derive(Debug, Default)]
struct VfsInner {
    /// Path → FileId mapping
    path_to_id: IndexMap<PathBuf, FileId>,
    /// FileId → Path mapping (reverse lookup)
    id_to_path: IndexMap<FileId, PathBuf>,
    /// Files that currently exist
    files: FxHashMap<FileId, FileEntry>,
    /// Next FileId to assign
    next_id: u32,
    /// Source of modification stamps
    next_stamp: u64,
}

#[derive(Debug)]
struct FileEntry {
    text: Arc<str>,
    stamp: u64,
    hash: ContentHash,
    item_tree: Option<Arc<ItemTree>>,
}

/// What [`Vfs::set_file_text`] and [`Vfs::remove_file`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileChange {
    /// A file appeared at a path that had no file.
    Added { file: FileId, path: PathBuf },
    /// An existing file got new text.
    Changed { file: FileId },
    /// An existing file was given identical text.
    Unchanged { file: FileId },
    /// A file was deleted.
    Removed { file: FileId },
}

impl FileChange {
    pub fn file_id(&self) -> FileId {
        match self {
            FileChange::Added { file, .. }
            | FileChange::Changed { file }
            | FileChange::Unchanged { file }
            | FileChange::Removed { file } => *file,
        }
    }
}

impl Vfs {
    /// Create a new empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text of the file at `path`, creating the file if needed.
    pub fn set_file_text(&self, path: impl AsRef<Path>, text: impl Into<Arc<str>>) -> FileChange {
        let path = path.as_ref();
        let text = text.into();
        let hash = ContentHash::of(&text);

        let mut inner = self.inner.write();
        let file = inner.intern_path(path);
        inner.next_stamp += 1;
        let stamp = inner.next_stamp;

        match inner.files.get_mut(&file) {
            Some(entry) if entry.hash == hash && *entry.text == *text => {
                FileChange::Unchanged { file }
            }
            Some(entry) => {
                entry.text = text;
                entry.hash = hash;
                entry.stamp = stamp;
                entry.item_tree = None;
                FileChange::Changed { file }
            }
            None => {
                inner.files.insert(file, FileEntry { text, stamp, hash, item_tree: None });
                FileChange::Added { file, path: path.to_owned() }
            }
        }
    }

    /// Delete the file at `path`.
    ///
    /// The path keeps its FileId, so re-creating the file yields the same id.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> Option<FileChange> {
        let mut inner = self.inner.write();
        let file = *inner.path_to_id.get(path.as_ref())?;
        inner.files.remove(&file)?;
        Some(FileChange::Removed { file })
    }

    /// Get the text of a file.
    pub fn file_text(&self, file: FileId) -> Option<Arc<str>> {
        self.inner.read().files.get(&file).map(|entry| entry.text.clone())
    }

    /// Get the path for a FileId, whether or not the file currently exists.
    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.inner.read().id_to_path.get(&file).cloned()
    }

    /// Get the number of existing files.
    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Check if the file set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all existing files, in path-interning order.
    pub fn files(&self) -> Vec<FileId> {
        let inner = self.inner.read();
        inner
            .id_to_path
            .keys()
            .copied()
            .filter(|file| inner.files.contains_key(file))
            .collect()
    }
}

impl VfsInner {
    fn intern_path(&mut self, path: &Path) -> FileId {
        if let Some(&id) = self.path_to_id.get(path) {
            return id;
        }
        let id = FileId::new(self.next_id);
        self.next_id += 1;
        self.path_to_id.insert(path.to_owned(), id);
        self.id_to_path.insert(id, path.to_owned());
        id
    }
}

impl SourceDatabase for Vfs {
    fn file_id(&self, path: &Path) -> Option<FileId> {
        let inner = self.inner.read();
        let id = *inner.path_to_id.get(path)?;
        inner.files.contains_key(&id).then_some(id)
    }

    fn file_path(&self, file: FileId) -> Option<PathBuf> {
        let inner = self.inner.read();
        if !inner.files.contains_key(&file) {
            return None;
        }
        inner.id_to_path.get(&file).cloned()
    }

    fn item_tree(&self, file: FileId) -> Option<Arc<ItemTree>> {
        // Fast path: cached tree (read lock)
        let (text, stamp) = {
            let inner = self.inner.read();
            let entry = inner.files.get(&file)?;
            if let Some(tree) = &entry.item_tree {
                return Some(tree.clone());
            }
            (entry.text.clone(), entry.stamp)
        };

        let tree = Arc::new(parse_item_tree(&text));

        // Only cache if the text was not replaced while parsing
        let mut inner = self.inner.write();
        if let Some(entry) = inner.files.get_mut(&file) {
            if entry.stamp == stamp {
                entry.item_tree = Some(tree.clone());
            }
        }
        Some(tree)
    }

    fn modification_stamp(&self, file: FileId) -> Option<u64> {
        self.inner.read().files.get(&file).map(|entry| entry.stamp)
    }

    fn content_hash(&self, file: FileId) -> Option<ContentHash> {
        self.inner.read().files.get(&file).map(|entry| entry.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_id_assignment() {
        let vfs = Vfs::new();

        let a = vfs.set_file_text("/src/lib.rs", "mod a;");
        let b = vfs.set_file_text("/src/a.rs", "fn f() {}");

        let (FileChange::Added { file: id1, .. }, FileChange::Added { file: id2, .. }) = (a, b) else {
            panic!("expected two added files");
        };
        assert_ne!(id1, id2);
        assert_eq!(vfs.file_id(Path::new("/src/lib.rs")), Some(id1));
        assert_eq!(vfs.len(), 2);
    }

    #[test]
    fn test_vfs_change_kinds() {
        let vfs = Vfs::new();
        let FileChange::Added { file, .. } = vfs.set_file_text("/lib.rs", "fn a() {}") else {
            panic!("expected an added file");
        };
        let stamp = vfs.modification_stamp(file).unwrap();

        assert_eq!(vfs.set_file_text("/lib.rs", "fn a() {}"), FileChange::Unchanged { file });
        assert_eq!(vfs.set_file_text("/lib.rs", "fn b() {}"), FileChange::Changed { file });
        assert!(vfs.modification_stamp(file).unwrap() > stamp);
    }

    #[test]
    fn test_vfs_remove_keeps_id() {
        let vfs = Vfs::new();
        vfs.set_file_text("/lib.rs", "");
        let file = vfs.file_id(Path::new("/lib.rs")).unwrap();

        assert_eq!(vfs.remove_file("/lib.rs"), Some(FileChange::Removed { file }));
        assert_eq!(vfs.file_id(Path::new("/lib.rs")), None);
        assert!(vfs.item_tree(file).is_none());

        let change = vfs.set_file_text("/lib.rs", "struct S;");
        assert_eq!(change, FileChange::Added { file, path: PathBuf::from("/lib.rs") });
    }

    #[test]
    fn test_item_tree_cache_invalidated() {
        let vfs = Vfs::new();
        vfs.set_file_text("/lib.rs", "fn a() {}");
        let file = vfs.file_id(Path::new("/lib.rs")).unwrap();

        let first = vfs.item_tree(file).unwrap();
        assert!(Arc::ptr_eq(&first, &vfs.item_tree(file).unwrap()));

        vfs.set_file_text("/lib.rs", "fn a() {} fn b() {}");
        assert_eq!(vfs.item_tree(file).unwrap().items.len(), 2);
    }
}
