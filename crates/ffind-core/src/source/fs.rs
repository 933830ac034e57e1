/// Filesystem child lister backed by `std::fs::read_dir`.
///
/// Symlinks are never followed: a link is reported as a leaf whatever it
/// points at, which keeps the walk free of cycles. Children are sorted by name
/// so a single-worker walk is reproducible.
use crate::error::ListingError;
use crate::source::{Child, ChildLister};
use compact_str::CompactString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct FsLister {
    include_hidden: bool,
}

impl FsLister {
    /// A lister that skips hidden entries (names starting with `.`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Also descend into and report hidden entries.
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// The hidden filter applies to descendants only; the root a caller
    /// passes in is always listed, even if it is `.` or `.config`.
    fn is_excluded(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

impl ChildLister for FsLister {
    type Node = PathBuf;

    fn list(&self, dir: &PathBuf) -> Result<Vec<Child<PathBuf>>, ListingError> {
        let entries = fs::read_dir(dir).map_err(|e| listing_error(dir, e))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| listing_error(dir, e))?;
            let name = entry.file_name();
            let name = CompactString::new(name.to_string_lossy());
            if self.is_excluded(&name) {
                continue;
            }

            // `DirEntry::file_type` does not traverse symlinks.
            let is_dir = match entry.file_type() {
                Ok(file_type) => file_type.is_dir(),
                Err(err) => {
                    trace!("file_type failed for {}: {err}", entry.path().display());
                    false
                }
            };

            children.push(Child {
                node: entry.path(),
                name,
                is_leaf: !is_dir,
            });
        }

        children.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}

fn listing_error(dir: &Path, source: std::io::Error) -> ListingError {
    ListingError::new(dir.display().to_string(), source)
}
