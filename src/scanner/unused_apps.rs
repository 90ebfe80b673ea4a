use std::path::Path;

use chrono::Utc;

use crate::appinfo::{self, AppDetector};
use crate::command::{CommandRunner, SystemCommandRunner};
use crate::config::ScanConfig;
use crate::metadata::get_file_metadata;
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

/// Apps untouched for this long are surfaced as candidates — never
/// auto-selected, since `unused-apps` is risk-classified `risky`
/// (spec.md §4.3 roster).
const STALE_AFTER_DAYS: i64 = 180;

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let home = home.to_path_buf();
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "unused-apps".to_string(),
            name: "Unused Applications".to_string(),
            description: format!(
                "Installed apps not opened in over {STALE_AFTER_DAYS} days, per Spotlight metadata"
            ),
            category_ids: vec!["unused-apps".to_string()],
            risk_level: Some(risk_for_category("unused-apps")),
        },
        move || scan(&home, &config, &SystemCommandRunner),
    )
}

fn scan(
    home: &Path,
    config: &ScanConfig,
    runner: &dyn CommandRunner,
) -> anyhow::Result<Vec<CategoryResult>> {
    let risk_level = risk_for_category("unused-apps");
    let now = Utc::now();
    let mut entries = Vec::new();

    for app in AppDetector::new(home).list_all() {
        if appinfo::is_system_app(&app) {
            continue;
        }

        if config.excluded_paths.iter().any(|excluded| app.path.starts_with(excluded)) {
            continue;
        }
        let (blocked, _) = is_path_blocked(&app.path);
        if blocked {
            continue;
        }

        let Some(metadata) = get_file_metadata(runner, &app.path) else {
            continue;
        };
        let Some(last_used) = metadata.last_used else {
            continue;
        };

        let days_idle = (now - last_used).num_days();
        if days_idle < STALE_AFTER_DAYS {
            continue;
        }

        let size = app.size();
        if size < config.min_size_bytes {
            continue;
        }

        entries.push(ScanEntry::new(
            app.path.to_string_lossy().to_string(),
            format!("{} (unused {days_idle}d)", app.name()),
            size,
            risk_level,
        ));
    }

    Ok(vec![CategoryResult::new(
        "unused-apps",
        "Unused Applications",
        entries,
        Vec::new(),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct NoMetadata;
    impl CommandRunner for NoMetadata {
        fn run(&self, _program: &str, _args: &[&str], _deadline: Duration) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn missing_applications_dir_yields_empty_result() {
        let result = scan(
            Path::new("/nonexistent/home"),
            &ScanConfig::unbounded(),
            &NoMetadata,
        )
        .unwrap();
        assert!(result[0].entries.is_empty());
    }
}
