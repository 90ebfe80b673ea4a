use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::fsutil::dir_size;
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::{is_path_blocked, risk_for_category};

use super::{FnScanner, Scanner};

/// (extension, label) pairs for the VM bundle formats this scanner
/// recognizes. Each is a directory bundle, sized the same way an `.app`
/// bundle is in `appinfo::AppBundle::size`.
const VM_BUNDLE_EXTENSIONS: &[(&str, &str)] = &[
    ("pvm", "Parallels VM"),
    ("vmwarevm", "VMware Fusion VM"),
    ("utm", "UTM VM"),
];

fn search_dirs(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join("Parallels"),
        home.join("Documents/Virtual Machines.localized"),
        home.join("Library/Containers/com.utmapp.UTM/Data/Documents"),
    ]
}

pub fn build(home: &Path, config: &ScanConfig) -> impl Scanner {
    let dirs = search_dirs(home);
    let config = config.clone();

    FnScanner::new(
        ScannerInfo {
            id: "system-vm".to_string(),
            name: "Virtual Machine Images".to_string(),
            description: "Parallels, VMware Fusion, and UTM virtual machine bundles".to_string(),
            category_ids: vec!["system-vm-images".to_string()],
            risk_level: Some(risk_for_category("system-vm-images")),
        },
        move || scan(&dirs, &config),
    )
}

fn scan(dirs: &[PathBuf], config: &ScanConfig) -> anyhow::Result<Vec<CategoryResult>> {
    let risk_level = risk_for_category("system-vm-images");
    let mut entries = Vec::new();

    for dir in dirs {
        let read_dir = match std::fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(_) => continue,
        };

        for child in read_dir.flatten() {
            let path = child.path();
            let Some(label) = bundle_label(&path) else {
                continue;
            };

            if config.excluded_paths.iter().any(|excluded| path.starts_with(excluded)) {
                continue;
            }
            let (blocked, _) = is_path_blocked(&path);
            if blocked {
                continue;
            }

            let (size, _) = dir_size(&path, config);
            if size == 0 || size < config.min_size_bytes {
                continue;
            }

            let name = path
                .file_stem()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());

            entries.push(ScanEntry::new(
                path.to_string_lossy().to_string(),
                format!("{name} ({label})"),
                size,
                risk_level,
            ));
        }
    }

    entries.sort_by(|a, b| b.size.cmp(&a.size));

    Ok(vec![CategoryResult::new(
        "system-vm-images",
        "Virtual Machine Images",
        entries,
        Vec::new(),
    )])
}

fn bundle_label(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    VM_BUNDLE_EXTENSIONS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, label)| *label)
}
