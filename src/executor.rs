//! Cleanup executor (spec §4.4): sorted, safety-gated, progress-reported
//! deletion of the categories a `Cleanup` call selected.

use std::path::Path;

use tracing::{debug, warn};

use crate::model::{CategoryResult, CleanupOutcome, FailedEntry};
use crate::safety;

/// Deletes every real-filesystem entry across `categories`, in order,
/// reporting progress through `progress_fn` after every category start
/// and every entry. Pseudo-paths (`docker:Images`) are recognized and
/// bypassed — the executor never invokes the deletion primitive on
/// them (spec §4.4, §9).
pub fn execute(
    categories: &[CategoryResult],
    mut progress_fn: impl FnMut(&str, &str, usize, usize),
) -> CleanupOutcome {
    let total: usize = categories.iter().map(|c| c.entries.len()).sum();
    let mut current = 0usize;
    let mut outcome = CleanupOutcome::default();

    for category in categories {
        progress_fn(&category.description, "", current, total);

        for entry in &category.entries {
            current += 1;
            progress_fn(&category.description, &entry.path, current, total);

            if entry.is_pseudo_path() {
                debug!(path = %entry.path, "skipping pseudo-path entry, not a filesystem target");
                continue;
            }

            let path = Path::new(&entry.path);
            let (blocked, reason) = safety::is_path_blocked(path);
            if blocked {
                warn!(path = %entry.path, reason = %reason, "refusing to delete blocked path");
                outcome.failed.push(FailedEntry {
                    path: entry.path.clone(),
                    reason,
                });
                continue;
            }

            match remove(path) {
                Ok(()) => {
                    outcome.removed.push(entry.path.clone());
                    outcome.bytes_freed += entry.size;
                }
                Err(err) => {
                    outcome.errors.push(err.to_string());
                    outcome.failed.push(FailedEntry {
                        path: entry.path.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    outcome
}

fn remove(path: &Path) -> std::io::Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}
