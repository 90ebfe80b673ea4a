use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::dir_size;
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

const PATTERNS: &[&str] = &[
    "node_modules",
    "target",
    ".gradle",
    "build",
    "dist",
    ".venv",
    "__pycache__",
];

fn search_roots(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join("Documents"),
        home.join("Projects"),
        home.join("Developer"),
        home.join("Workspace"),
        home.join("src"),
        home.join("code"),
    ]
}

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let roots = search_roots(home);
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "dev-junk".to_string(),
            name: "Development Build Artifacts".to_string(),
            description: "node_modules, target, build, and similar directories under common project roots".to_string(),
            category_ids: vec!["dev-build-artifacts".to_string()],
            risk_level: None,
        },
        move || scan(&roots, &config),
    )
}

fn scan(roots: &[PathBuf], config: &ScanConfig) -> anyhow::Result<Vec<CategoryResult>> {
    let risk_level = risk_for_category("dev-build-artifacts");
    let mut entries = Vec::new();

    for root in roots {
        if !root.exists() {
            continue;
        }

        for pattern in PATTERNS {
            let full_pattern = root.join("**").join(pattern);
            let matches = match glob::glob(&full_pattern.to_string_lossy()) {
                Ok(m) => m,
                Err(_) => continue,
            };

            for entry in matches.filter_map(|e| e.ok()) {
                if !entry.is_dir() {
                    continue;
                }
                if config.excluded_paths.iter().any(|excluded| entry.starts_with(excluded)) {
                    continue;
                }
                let (blocked, _) = is_path_blocked(&entry);
                if blocked {
                    continue;
                }

                let (size, _) = dir_size(&entry, config);
                if size == 0 || size < config.min_size_bytes {
                    continue;
                }

                let name = entry
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| entry.to_string_lossy().to_string());

                entries.push(ScanEntry::new(
                    entry.to_string_lossy().to_string(),
                    format!("{name} ({pattern})"),
                    size,
                    risk_level,
                ));
            }
        }
    }

    Ok(vec![CategoryResult::new(
        "dev-build-artifacts",
        "Development Build Artifacts",
        entries,
        Vec::new(),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_node_modules_under_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("Projects/app/node_modules");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("pkg.js"), b"0123456789").unwrap();

        let result = scan(&[tmp.path().join("Projects")], &ScanConfig::unbounded()).unwrap();
        assert_eq!(result[0].entries.len(), 1);
        assert_eq!(result[0].total_size, 10);
    }

    #[test]
    fn missing_root_yields_empty_result() {
        let result = scan(&[PathBuf::from("/nonexistent/xyz")], &ScanConfig::unbounded()).unwrap();
        assert!(result[0].entries.is_empty());
    }
}
