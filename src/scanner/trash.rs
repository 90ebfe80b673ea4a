use std::path::Path;

use crate::config::ScanConfig;
use crate::fsutil::dir_size;
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let trash_dir = home.join(".Trash");
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "trash".to_string(),
            name: "Trash".to_string(),
            description: "Files sitting in ~/.Trash".to_string(),
            category_ids: vec!["trash".to_string()],
            risk_level: Some(risk_for_category("trash")),
        },
        move || scan(&trash_dir, &config),
    )
}

fn scan(trash_dir: &Path, config: &ScanConfig) -> anyhow::Result<Vec<CategoryResult>> {
    let mut entries = Vec::new();

    if trash_dir.exists()
        && !config.excluded_paths.iter().any(|excluded| trash_dir.starts_with(excluded))
        && !is_path_blocked(trash_dir).0
    {
        let (size, _) = dir_size(trash_dir, config);
        if size > 0 && size >= config.min_size_bytes {
            entries.push(ScanEntry::new(
                trash_dir.to_string_lossy().to_string(),
                "Trash",
                size,
                risk_for_category("trash"),
            ));
        }
    }

    Ok(vec![CategoryResult::new("trash", "Trash", entries, Vec::new())])
}
