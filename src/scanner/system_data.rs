use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::scan_top_level;
use crate::model::{CategoryResult, ScannerInfo};

use super::{FnScanner, Scanner};

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let dirs = vec![
        home.join("Library/Logs/DiagnosticReports"),
        PathBuf::from("/Library/Logs/DiagnosticReports"),
        home.join("Library/Application Support/CrashReporter"),
    ];
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "system-data".to_string(),
            name: "System Data".to_string(),
            description: "Diagnostic reports and crash logs under ~/Library and /Library"
                .to_string(),
            category_ids: vec!["system-data".to_string()],
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
        let result = scan_top_level(dir, "system-data", "System Data", config);
        entries.extend(result.entries);
        permission_issues.extend(result.permission_issues);
    }

    Ok(vec![CategoryResult::new(
        "system-data",
        "System Data",
        entries,
        permission_issues,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dirs_yield_empty_result() {
        let result = scan(&[PathBuf::from("/nonexistent/xyz")], &ScanConfig::unbounded()).unwrap();
        assert!(result[0].entries.is_empty());
    }
}
