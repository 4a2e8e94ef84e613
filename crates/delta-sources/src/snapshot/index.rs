//! Literal substring scan over a cached snapshot tree.
//!
//! Walks a directory recursively and returns the files whose raw content
//! contains the needle on at least one line.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Maximum directory depth to scan
const MAX_SCAN_DEPTH: usize = 24;

/// Find files under `root` named `*.<extension>` containing `needle`.
///
/// Entries are visited in file-name order, so repeated scans of an unchanged
/// tree return identical results. A missing root yields an empty list, and
/// unreadable files are logged and skipped.
pub async fn find_files(root: &Path, needle: &str, extension: &str) -> Vec<PathBuf> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut found = Vec::new();

    if !fs::try_exists(root).await.unwrap_or(false) {
        debug!(root = %root.display(), "snapshot directory missing, nothing to scan");
        return found;
    }

    walk(root, needle.as_bytes(), &suffix, MAX_SCAN_DEPTH, &mut found).await;

    debug!(
        root = %root.display(),
        extension,
        matches = found.len(),
        "snapshot scan complete"
    );
    found
}

/// Boxed so the recursion has a known future size.
fn walk<'a>(
    dir: &'a Path,
    needle: &'a [u8],
    suffix: &'a str,
    depth: usize,
    found: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if depth == 0 {
            debug!("Max depth reached, skipping: {:?}", dir);
            return;
        }

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read directory {:?}: {}", dir, e);
                return;
            }
        };

        let mut paths = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => paths.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to list entry in {:?}: {}", dir, e);
                    break;
                }
            }
        }
        paths.sort();

        for path in paths {
            // symlink_metadata so links are seen as links, not their targets
            let metadata = match fs::symlink_metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    debug!("Failed to read metadata for {:?}: {}", path, e);
                    continue;
                }
            };

            if metadata.file_type().is_symlink() {
                debug!("Skipping symlink: {:?}", path);
                continue;
            }

            if metadata.is_dir() {
                walk(&path, needle, suffix, depth - 1, found).await;
            } else if metadata.is_file() && has_suffix(&path, suffix) {
                match fs::read(&path).await {
                    Ok(contents) => {
                        if contains_on_a_line(&contents, needle) {
                            found.push(path);
                        }
                    }
                    Err(e) => warn!("Failed to read file {:?}: {}", path, e),
                }
            }
        }
    })
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}

/// Case-sensitive literal match confined to single lines.
fn contains_on_a_line(contents: &[u8], needle: &[u8]) -> bool {
    if contents.is_empty() {
        return false;
    }
    contents.split(|b| *b == b'\n').any(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        needle.is_empty() || line.windows(needle.len()).any(|window| window == needle)
    })
}
