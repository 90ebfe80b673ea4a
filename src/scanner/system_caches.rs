use std::path::PathBuf;

use crate::config::ScanConfig;
use crate::fsutil::scan_top_level;
use crate::model::{CategoryResult, ScannerInfo};

use super::{FnScanner, Scanner};

pub fn build(home: &std::path::Path, config: &ScanConfig) -> impl Scanner {
    let dirs = vec![
        home.join("Library/Caches"),
        home.join("Library/Developer/Xcode/DerivedData"),
    ];
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "system-caches".to_string(),
            name: "System Caches".to_string(),
            description: "Application and Xcode derived-data caches under ~/Library".to_string(),
            category_ids: vec!["system-caches".to_string()],
            risk_level: None,
        },
        move || scan(&dirs, &config),
    )
}

fn scan(dirs: &[PathBuf], config: &ScanConfig) -> anyhow::Result<Vec<CategoryResult>> {
    let mut entries = Vec::new();
    let mut permission_issues = Vec::new();

    for dir in dirs {
        if !dir.exists() {
            continue;
        }
        let result = scan_top_level(dir, "system-caches", "System Caches", config);
        entries.extend(result.entries);
        permission_issues.extend(result.permission_issues);
    }

    Ok(vec![CategoryResult::new(
        "system-caches",
        "System Caches",
        entries,
        permission_issues,
    )])
}
