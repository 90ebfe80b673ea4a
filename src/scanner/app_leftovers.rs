use std::path::Path;

use crate::appinfo::{self, AppDetector};
use crate::config::ScanConfig;
use crate::fsutil::dir_size;
use crate::model::{CategoryResult, PermissionIssue, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let home = home.to_path_buf();
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "app-leftovers".to_string(),
            name: "Orphaned App Data".to_string(),
            description: "Application Support, Preferences, Caches, Logs, and Launch Agents left behind by apps no longer under /Applications".to_string(),
            category_ids: vec!["app-leftovers".to_string()],
            risk_level: None,
        },
        move || scan(&home, &config),
    )
}

fn scan(home: &Path, config: &ScanConfig) -> anyhow::Result<Vec<CategoryResult>> {
    let installed = AppDetector::new(home).list_all();
    let identities: Vec<(String, String)> = installed
        .iter()
        .map(|app| {
            (
                app.name().to_string(),
                app.info().map(|i| i.bundle_id).unwrap_or_default(),
            )
        })
        .collect();

    let risk_level = risk_for_category("app-leftovers");
    let mut entries = Vec::new();
    let mut permission_issues = Vec::new();

    for (_label, dir) in appinfo::related_file_locations(home) {
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(_) => continue,
        };

        for child in read_dir.flatten() {
            let path = child.path();
            let name = child.file_name().to_string_lossy().to_string();

            let belongs_to_installed_app = identities
                .iter()
                .any(|(app_name, bundle_id)| appinfo::is_related(&name, app_name, bundle_id));
            if belongs_to_installed_app {
                continue;
            }

            let is_system_bundle = appinfo::SYSTEM_APPS
                .iter()
                .any(|bundle_id| name.to_lowercase().contains(&bundle_id.to_lowercase()));
            if is_system_bundle {
                continue;
            }

            if config.excluded_paths.iter().any(|excluded| path.starts_with(excluded)) {
                continue;
            }
            let (blocked, _) = is_path_blocked(&path);
            if blocked {
                continue;
            }

            let (size, err) = dir_size(&path, config);
            if err.is_some() && size == 0 {
                permission_issues.push(PermissionIssue::new(
                    path.to_string_lossy().to_string(),
                    name,
                ));
                continue;
            }
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
    }

    Ok(vec![CategoryResult::new(
        "app-leftovers",
        "Orphaned App Data",
        entries,
        permission_issues,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flags_leftovers_for_apps_no_longer_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path();
        fs::create_dir_all(home.join("Applications")).unwrap();
        fs::create_dir_all(home.join("Library/Application Support/OldApp")).unwrap();
        fs::write(
            home.join("Library/Application Support/OldApp/state.db"),
            b"0123456789",
        )
        .unwrap();

        let result = scan(home, &ScanConfig::unbounded()).unwrap();
        assert_eq!(result[0].entries.len(), 1);
        assert_eq!(result[0].entries[0].description, "OldApp");
    }

    #[test]
    fn skips_leftovers_belonging_to_an_installed_app() {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path();
        fs::create_dir_all(home.join("Applications/StillHere.app/Contents")).unwrap();
        fs::create_dir_all(home.join("Library/Application Support/StillHere")).unwrap();
        fs::write(
            home.join("Library/Application Support/StillHere/state.db"),
            b"0123456789",
        )
        .unwrap();

        let result = scan(home, &ScanConfig::unbounded()).unwrap();
        assert!(result[0].entries.is_empty());
    }
}
