//! Size computation and top-level enumeration helpers shared by scanner
//! implementations (spec §4.2).

use std::io;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::model::{CategoryResult, PermissionIssue, ScanEntry};
use crate::safety::{is_path_blocked, risk_for_category};

/// Whether `path` falls under one of `config`'s excluded path prefixes.
fn is_excluded(path: &Path, config: &ScanConfig) -> bool {
    config
        .excluded_paths
        .iter()
        .any(|excluded| path.starts_with(excluded))
}

/// Recursively sum the logical sizes of regular files under `root`.
/// Symlinks are never followed — their targets are never counted.
/// Per-entry errors deeper in the tree are swallowed; only a failure to
/// read `root` itself is surfaced, for the caller to turn into a
/// permission issue. The walk is bounded by `config.max_depth` and never
/// descends into `config.excluded_paths`.
pub fn dir_size(root: &Path, config: &ScanConfig) -> (u64, Option<io::Error>) {
    let mut total = 0u64;
    let mut top_level_error = None;

    let walker = WalkDir::new(root)
        .max_depth(config.max_depth)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry.path(), config));

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_symlink() || !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(meta) = entry.metadata() {
                    total += meta.len();
                }
            }
            Err(err) => {
                if err.depth() == 0 {
                    top_level_error = Some(io::Error::new(io::ErrorKind::Other, err.to_string()));
                }
            }
        }
    }

    (total, top_level_error)
}

/// Enumerate only the immediate children of `dir`, summing directories
/// with [`dir_size`] and reading file sizes directly. Every candidate
/// path is gated through `safety::is_path_blocked` before it is turned
/// into a [`ScanEntry`] — defense-in-depth alongside the executor's own
/// gate at deletion time (spec.md §4.3). Children under
/// `config.excluded_paths` or sized below `config.min_size_bytes` are
/// dropped silently; the rest are sorted descending by size, and
/// children that could not be read are collected as permission issues.
pub fn scan_top_level(
    dir: &Path,
    category_id: &str,
    description: &str,
    config: &ScanConfig,
) -> CategoryResult {
    let mut entries = Vec::new();
    let mut permission_issues = Vec::new();
    let risk_level = risk_for_category(category_id);

    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => {
            permission_issues.push(PermissionIssue::new(
                dir.to_string_lossy().to_string(),
                description.to_string(),
            ));
            return CategoryResult::new(category_id, description, entries, permission_issues);
        }
    };

    for child in read_dir {
        let child = match child {
            Ok(c) => c,
            Err(_) => continue,
        };
        let path = child.path();

        if is_excluded(&path, config) {
            continue;
        }
        let (blocked, _) = is_path_blocked(&path);
        if blocked {
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let file_type = match child.file_type() {
            Ok(ft) => ft,
            Err(_) => {
                permission_issues.push(PermissionIssue::new(path.to_string_lossy().to_string(), name));
                continue;
            }
        };

        if file_type.is_symlink() {
            continue;
        }

        let size = if file_type.is_dir() {
            let (size, err) = dir_size(&path, config);
            if err.is_some() && size == 0 {
                permission_issues
                    .push(PermissionIssue::new(path.to_string_lossy().to_string(), name));
                continue;
            }
            size
        } else if file_type.is_file() {
            match child.metadata() {
                Ok(meta) => meta.len(),
                Err(_) => {
                    permission_issues
                        .push(PermissionIssue::new(path.to_string_lossy().to_string(), name));
                    continue;
                }
            }
        } else {
            continue;
        };

        if size == 0 || size < config.min_size_bytes {
            continue;
        }

        entries.push(ScanEntry::new(
            path.to_string_lossy().to_string(),
            name,
            size,
            risk_level,
        ));
    }

    CategoryResult::new(category_id, description, entries, permission_issues)
}
