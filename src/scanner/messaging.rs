use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::scan_top_level;
use crate::model::{CategoryResult, ScannerInfo};

use super::{FnScanner, Scanner};

fn search_dirs(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join("Library/Messages/Attachments"),
        home.join("Library/Containers/com.apple.mail/Data/Library/Mail Downloads"),
        home.join("Library/Mail Downloads"),
    ]
}

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let dirs = search_dirs(home);
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "messaging".to_string(),
            name: "Messaging Attachments".to_string(),
            description: "Messages attachment store and Mail downloaded-attachments cache"
                .to_string(),
            category_ids: vec!["messaging-attachments".to_string()],
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
        let result = scan_top_level(dir, "messaging-attachments", "Messaging Attachments", config);
        entries.extend(result.entries);
        permission_issues.extend(result.permission_issues);
    }

    entries.sort_by(|a, b| b.size.cmp(&a.size));

    Ok(vec![CategoryResult::new(
        "messaging-attachments",
        "Messaging Attachments",
        entries,
        permission_issues,
    )])
}
