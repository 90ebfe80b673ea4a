use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::scan_top_level;
use crate::model::{CategoryResult, ScannerInfo};

use super::{FnScanner, Scanner};

fn library_path(home: &Path) -> PathBuf {
    home.join("Pictures/Photos Library.photoslibrary")
}

fn search_dirs(home: &Path) -> Vec<PathBuf> {
    let library = library_path(home);
    vec![
        library.join("resources/derivatives/thumbs"),
        library.join("resources/caches"),
    ]
}

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let dirs = search_dirs(home);
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "photos".to_string(),
            name: "Photos Library Caches".to_string(),
            description: "Thumbnail derivatives and cache data inside Photos Library.photoslibrary"
                .to_string(),
            category_ids: vec!["photos-library".to_string()],
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
        let result = scan_top_level(dir, "photos-library", "Photos Library Caches", config);
        entries.extend(result.entries);
        permission_issues.extend(result.permission_issues);
    }

    entries.sort_by(|a, b| b.size.cmp(&a.size));

    Ok(vec![CategoryResult::new(
        "photos-library",
        "Photos Library Caches",
        entries,
        permission_issues,
    )])
}
