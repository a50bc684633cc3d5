//! Directory walking shared by the built-in crawlers.

use std::path::Path;

use autobump_shared::{AutobumpError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never worth scanning.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Compiled ignore globs, matched against `/`-separated paths relative to
/// the scanned root.
pub(crate) struct IgnoreSet {
    globs: GlobSet,
}

impl IgnoreSet {
    pub(crate) fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.trim_end_matches('/');
            match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "invalid ignore pattern, skipping"),
            }
        }

        let globs = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to compile ignore patterns, ignoring nothing");
            GlobSet::empty()
        });
        Self { globs }
    }

    pub(crate) fn is_ignored(&self, relative: &str) -> bool {
        self.globs.is_match(relative)
    }
}

/// Render a path relative to `root` with `/` separators.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_pruned(entry: &DirEntry, root: &Path, ignore: &IgnoreSet) -> bool {
    // The root itself may live in a hidden directory (temp dirs often do).
    if entry.depth() == 0 {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    if entry.file_type().is_dir() && (name.starts_with('.') || SKIPPED_DIRS.contains(&&*name)) {
        return true;
    }

    let relative = relative_path(root, entry.path());
    if ignore.is_ignored(&relative) {
        debug!(path = %relative, "ignored");
        return true;
    }
    false
}

/// Collect files under `root` whose file name satisfies `matches`.
///
/// Hidden directories, build output, and ignored paths are pruned. Returned
/// paths are relative to `root` and sorted. Unreadable entries below the root
/// are logged and skipped.
pub(crate) fn find_files(
    root: &Path,
    ignore: &IgnoreSet,
    matches: impl Fn(&str) -> bool,
) -> Result<Vec<String>> {
    let mut found = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry, root, ignore));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let path = e.path().unwrap_or(root).to_path_buf();
                return Err(AutobumpError::io(path, e.into()));
            }
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        if entry.file_type().is_file() && matches(&entry.file_name().to_string_lossy()) {
            found.push(relative_path(root, entry.path()));
        }
    }

    found.sort();
    Ok(found)
}
