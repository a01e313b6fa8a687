//! Loading source trees from disk into a [`Vfs`].

use std::path::Path;

use walkdir::WalkDir;

use super::{FileId, Vfs};
use crate::error::DefMapResult;

/// Loads every `.rs` file under `dir` into `vfs`.
///
/// Returns the ids of the loaded files. A directory walk or read failure
/// aborts the load.
pub fn load_directory(vfs: &Vfs, dir: impl AsRef<Path>) -> DefMapResult<Vec<FileId>> {
    let dir = dir.as_ref();
    let mut loaded = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "rs") {
            continue;
        }
        let text = std::fs::read_to_string(path)?;
        loaded.push(vfs.set_file_text(path, text).file_id());
    }

    tracing::debug!(dir = %dir.display(), files = loaded.len(), "loaded source directory");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::SourceDatabase;

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "mod a;").unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "pub fn f() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let vfs = Vfs::new();
        let files = load_directory(&vfs, dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert!(vfs.file_id(&dir.path().join("src/lib.rs")).is_some());
        assert!(vfs.file_id(&dir.path().join("README.md")).is_none());
    }

    #[test]
    fn test_load_missing_directory() {
        let vfs = Vfs::new();
        let err = load_directory(&vfs, "/definitely/not/here").unwrap_err();
        assert!(err.to_string().contains("I/O error"));
    }
}
