use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::scan_top_level;
use crate::model::CategoryResult;

use super::{FnScanner, Scanner};
use crate::model::ScannerInfo;

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let dirs = vec![
        home.join("Library/Developer/Xcode/DerivedData"),
        home.join("Library/Developer/Xcode/iOS DeviceSupport"),
        home.join("Library/Developer/CoreSimulator/Caches"),
        home.join("Library/Developer/CoreSimulator/Devices"),
    ];
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "dev-xcode".to_string(),
            name: "Xcode Data".to_string(),
            description: "Derived data, device support files, and simulator caches".to_string(),
            category_ids: vec!["dev-xcode".to_string()],
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
        let result = scan_top_level(dir, "dev-xcode", "Xcode Data", config);
        entries.extend(result.entries);
        permission_issues.extend(result.permission_issues);
    }

    Ok(vec![CategoryResult::new(
        "dev-xcode",
        "Xcode Data",
        entries,
        permission_issues,
    )])
}
