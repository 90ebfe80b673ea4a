use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::model::{CategoryResult, PermissionIssue, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let log_dir = home.join("Library/Logs");
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "system-logs".to_string(),
            name: "System Logs".to_string(),
            description: "Application and system log files under ~/Library/Logs".to_string(),
            category_ids: vec!["system-logs".to_string()],
            risk_level: None,
        },
        move || scan(&log_dir, &config),
    )
}

fn scan(log_dir: &Path, config: &ScanConfig) -> anyhow::Result<Vec<CategoryResult>> {
    let mut entries = Vec::new();
    let mut permission_issues = Vec::new();
    let risk_level = risk_for_category("system-logs");

    if log_dir.exists() {
        let walker = WalkDir::new(log_dir)
            .min_depth(1)
            .max_depth(config.max_depth)
            .into_iter()
            .filter_entry(|entry| {
                !config
                    .excluded_paths
                    .iter()
                    .any(|excluded| entry.path().starts_with(excluded))
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    if let Some(path) = err.path() {
                        permission_issues.push(PermissionIssue::new(
                            path.to_string_lossy().to_string(),
                            "log entry".to_string(),
                        ));
                    }
                    continue;
                }
            };

            if entry.file_type().is_symlink() || !entry.file_type().is_file() {
                continue;
            }

            let (blocked, _) = is_path_blocked(entry.path());
            if blocked {
                continue;
            }

            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(_) => {
                    permission_issues.push(PermissionIssue::new(
                        entry.path().to_string_lossy().to_string(),
                        "log entry".to_string(),
                    ));
                    continue;
                }
            };

            if size < config.min_size_bytes {
                continue;
            }

            let name = entry
                .path()
                .strip_prefix(log_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            entries.push(ScanEntry::new(
                entry.path().to_string_lossy().to_string(),
                name,
                size,
                risk_level,
            ));
        }
    }

    Ok(vec![CategoryResult::new(
        "system-logs",
        "System Logs",
        entries,
        permission_issues,
    )])
}
