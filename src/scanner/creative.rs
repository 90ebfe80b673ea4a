use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::dir_size;
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

fn adobe_dirs(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join("Library/Application Support/Adobe/Common/Media Cache Files"),
        home.join("Library/Application Support/Adobe/Common/Media Cache"),
    ]
}

fn final_cut_glob(home: &Path) -> PathBuf {
    home.join("Movies").join("*.fcpbundle").join("*").join("Render Files")
}

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let adobe = adobe_dirs(home);
    let fcp_glob = final_cut_glob(home);
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "creative".to_string(),
            name: "Creative App Caches".to_string(),
            description: "Adobe Media Cache and Final Cut Pro render files".to_string(),
            category_ids: vec!["creative-adobe".to_string(), "creative-final-cut".to_string()],
            risk_level: None,
        },
        move || scan(&adobe, &fcp_glob, &config),
    )
}

fn scan(
    adobe_dirs: &[PathBuf],
    fcp_glob: &Path,
    config: &ScanConfig,
) -> anyhow::Result<Vec<CategoryResult>> {
    let adobe_risk = risk_for_category("creative-adobe");
    let mut adobe_entries = Vec::new();

    for dir in adobe_dirs {
        if !dir.exists() {
            continue;
        }
        if config.excluded_paths.iter().any(|excluded| dir.starts_with(excluded)) {
            continue;
        }
        let (blocked, _) = is_path_blocked(dir);
        if blocked {
            continue;
        }
        let (size, _) = dir_size(dir, config);
        if size == 0 || size < config.min_size_bytes {
            continue;
        }
        adobe_entries.push(ScanEntry::new(
            dir.to_string_lossy().to_string(),
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| dir.to_string_lossy().to_string()),
            size,
            adobe_risk,
        ));
    }

    let fcp_risk = risk_for_category("creative-final-cut");
    let mut fcp_entries = Vec::new();

    if let Ok(matches) = glob::glob(&fcp_glob.to_string_lossy()) {
        for render_dir in matches.filter_map(|e| e.ok()).filter(|p| p.is_dir()) {
            if config.excluded_paths.iter().any(|excluded| render_dir.starts_with(excluded)) {
                continue;
            }
            let (blocked, _) = is_path_blocked(&render_dir);
            if blocked {
                continue;
            }
            let (size, _) = dir_size(&render_dir, config);
            if size == 0 || size < config.min_size_bytes {
                continue;
            }
            let library_name = render_dir
                .ancestors()
                .find(|p| p.extension().map(|e| e == "fcpbundle").unwrap_or(false))
                .and_then(|p| p.file_stem())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "Final Cut Library".to_string());

            fcp_entries.push(ScanEntry::new(
                render_dir.to_string_lossy().to_string(),
                format!("{library_name} Render Files"),
                size,
                fcp_risk,
            ));
        }
    }

    Ok(vec![
        CategoryResult::new("creative-adobe", "Adobe Media Cache", adobe_entries, Vec::new()),
        CategoryResult::new(
            "creative-final-cut",
            "Final Cut Pro Render Files",
            fcp_entries,
            Vec::new(),
        ),
    ])
}
