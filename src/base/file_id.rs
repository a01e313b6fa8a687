//! File identifiers and content fingerprints.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// An interned identifier for a source file.
///
/// `FileId` is a lightweight handle (just a u32) that uniquely identifies
/// a file within a [`Vfs`](super::Vfs). The actual path is stored there.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new FileId from a raw index.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

impl From<u32> for FileId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Fingerprint of a file's text.
///
/// Compared when a file's modification stamp moved, so that saving a file
/// without changing it does not force a rebuild.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ContentHash(u64);

impl ContentHash {
    /// Hash the given text.
    pub fn of(text: &str) -> Self {
        let mut hasher = FxHasher::default();
        text.hash(&mut hasher);
        Self(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_display() {
        assert_eq!(FileId::new(3).to_string(), "file#3");
        assert_eq!(format!("{:?}", FileId::new(3)), "FileId(3)");
    }

    #[test]
    fn test_content_hash_tracks_text() {
        assert_eq!(ContentHash::of("mod a;"), ContentHash::of("mod a;"));
        assert_ne!(ContentHash::of("mod a;"), ContentHash::of("mod b;"));
    }
}
