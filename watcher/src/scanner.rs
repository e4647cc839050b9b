//! Full-directory scans for ingestible files.

use std::path::PathBuf;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::error::{Result, WatcherError};

/// Every ingestible file under `config.path`, sorted by path.
///
/// Entries that cannot be read are logged and skipped; only a missing or
/// unreadable root is an error.
pub fn scan(config: &WatchConfig) -> Result<Vec<PathBuf>> {
    let start = std::time::Instant::now();
    let root = &config.path;
    if !root.exists() {
        return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
    }
    if !root.is_dir() {
        return Err(WatcherError::NotADirectory(root.display().to_string()));
    }

    let matcher = config.matcher()?;
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .max_depth(config.max_depth.unwrap_or(usize::MAX))
        .sort_by_file_name();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if matcher.should_exclude(path) {
            debug!("Excluded {}", path.display());
            continue;
        }
        if matcher.has_ingestible_extension(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    info!(
        "Found {} ingestible files under {} in {:?}",
        files.len(),
        root.display(),
        start.elapsed()
    );
    Ok(files)
}
