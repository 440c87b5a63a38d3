use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::CatalogError;

/// File name fragment that marks a candidate data file.
pub const DATA_SUFFIX: &str = ".nc";

pub fn is_candidate(path: &Utf8Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.contains(DATA_SUFFIX))
}

/// Source of candidate file paths below a root.
pub trait PathSource {
    fn discover<'a>(
        &'a self,
        root: &'a Utf8Path,
    ) -> Result<Box<dyn Iterator<Item = Utf8PathBuf> + 'a>, CatalogError>;
}

/// Lazy recursive walk of the real filesystem.
///
/// Entries are visited in file-name order so repeated scans log in the same
/// order. Symlinks to files are yielded under their link path even when
/// `follow_links` is off; that flag only controls descending into linked
/// directories. Unreadable entries and non-UTF-8 paths are skipped with a
/// warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWalker {
    pub follow_links: bool,
}

impl FsWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn following_links() -> Self {
        Self { follow_links: true }
    }
}

impl PathSource for FsWalker {
    fn discover<'a>(
        &'a self,
        root: &'a Utf8Path,
    ) -> Result<Box<dyn Iterator<Item = Utf8PathBuf> + 'a>, CatalogError> {
        let unreadable = |reason: String| CatalogError::UnreadableRoot {
            path: root.to_path_buf(),
            reason,
        };
        let metadata = fs::metadata(root.as_std_path()).map_err(|err| unreadable(err.to_string()))?;
        if !metadata.is_dir() {
            return Err(unreadable("not a directory".to_string()));
        }
        fs::read_dir(root.as_std_path()).map_err(|err| unreadable(err.to_string()))?;

        let entries = WalkDir::new(root.as_std_path())
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| {
                if entry.file_type().is_file() {
                    return true;
                }
                if !entry.path_is_symlink() {
                    return false;
                }
                match fs::metadata(entry.path()) {
                    Ok(target) => target.is_file(),
                    Err(err) => {
                        warn!("skipping broken link {}: {err}", entry.path().display());
                        false
                    }
                }
            })
            .filter_map(|entry| match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => Some(path),
                Err(path) => {
                    warn!("skipping non UTF-8 path: {}", path.display());
                    None
                }
            })
            .filter(|path| is_candidate(path));
        Ok(Box::new(entries))
    }
}

/// Fixed list of paths standing in for a directory tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryPaths {
    paths: Vec<Utf8PathBuf>,
}

impl MemoryPaths {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl PathSource for MemoryPaths {
    fn discover<'a>(
        &'a self,
        root: &'a Utf8Path,
    ) -> Result<Box<dyn Iterator<Item = Utf8PathBuf> + 'a>, CatalogError> {
        let whole_tree = matches!(root.as_str(), "" | ".");
        Ok(Box::new(
            self.paths
                .iter()
                .filter(move |path| whole_tree || path.starts_with(root))
                .filter(|path| is_candidate(path))
                .cloned(),
        ))
    }
}
