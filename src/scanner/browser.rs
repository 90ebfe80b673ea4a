use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::dir_size;
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

/// (category id, browser label, cache directory) triples. Several
/// browsers share the `browser-other` category; the rest each get a
/// dedicated category id per the roster in spec.md §2.
fn cache_paths(home: &Path) -> Vec<(&'static str, &'static str, PathBuf)> {
    vec![
        ("browser-safari", "Safari", home.join("Library/Caches/com.apple.Safari")),
        ("browser-chrome", "Chrome", home.join("Library/Caches/Google/Chrome")),
        ("browser-firefox", "Firefox", home.join("Library/Caches/Firefox")),
        ("browser-other", "Edge", home.join("Library/Caches/Microsoft Edge")),
        ("browser-other", "Arc", home.join("Library/Caches/Arc")),
        ("browser-other", "Brave", home.join("Library/Caches/BraveSoftware")),
        ("browser-other", "Vivaldi", home.join("Library/Caches/Vivaldi")),
        ("browser-other", "Opera", home.join("Library/Caches/com.operasoftware.Opera")),
        ("browser-other", "Opera GX", home.join("Library/Caches/com.operasoftware.OperaGX")),
        ("browser-other", "Chromium", home.join("Library/Caches/Chromium")),
    ]
}

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let paths = cache_paths(home);
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "browser".to_string(),
            name: "Browser Caches".to_string(),
            description: "Per-browser HTTP cache directories".to_string(),
            category_ids: vec![
                "browser-chrome".to_string(),
                "browser-firefox".to_string(),
                "browser-safari".to_string(),
                "browser-other".to_string(),
            ],
            risk_level: None,
        },
        move || scan(&paths, &config),
    )
}

fn scan(
    paths: &[(&'static str, &'static str, PathBuf)],
    config: &ScanConfig,
) -> anyhow::Result<Vec<CategoryResult>> {
    use std::collections::BTreeMap;

    let mut by_category: BTreeMap<&'static str, Vec<ScanEntry>> = BTreeMap::new();

    for (category_id, label, path) in paths {
        if !path.exists() {
            continue;
        }
        if config.excluded_paths.iter().any(|excluded| path.starts_with(excluded)) {
            continue;
        }
        let (blocked, _) = is_path_blocked(path);
        if blocked {
            continue;
        }
        let (size, _) = dir_size(path, config);
        if size == 0 || size < config.min_size_bytes {
            continue;
        }
        by_category.entry(category_id).or_default().push(ScanEntry::new(
            path.to_string_lossy().to_string(),
            format!("{label} Cache"),
            size,
            risk_for_category(category_id),
        ));
    }

    Ok(["browser-chrome", "browser-firefox", "browser-safari", "browser-other"]
        .into_iter()
        .map(|category_id| {
            let entries = by_category.remove(category_id).unwrap_or_default();
            CategoryResult::new(category_id, display_name(category_id), entries, Vec::new())
        })
        .collect())
}

fn display_name(category_id: &str) -> &'static str {
    match category_id {
        "browser-chrome" => "Chrome Cache",
        "browser-firefox" => "Firefox Cache",
        "browser-safari" => "Safari Cache",
        _ => "Other Browser Caches",
    }
}
