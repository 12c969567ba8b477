//! Directory listing seam used by the slice walk.

use std::io;
use std::path::Path;

/// Lists directory contents for the store's bounded-depth walks.
pub trait DirectoryLister: Send + Sync {
    /// Names of the immediate subdirectories of `dir`.
    fn subdirectories(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Sizes in bytes of the regular files directly inside `dir`.
    fn file_sizes(&self, dir: &Path) -> io::Result<Vec<u64>>;
}

/// Lister backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn subdirectories(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn file_sizes(&self, dir: &Path) -> io::Result<Vec<u64>> {
        let mut sizes = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                sizes.push(metadata.len());
            }
        }
        Ok(sizes)
    }
}
