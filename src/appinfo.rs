//! App bundle enumeration and `Info.plist` inspection, shared by the
//! `app-leftovers` and `unused-apps` scanners (spec.md §2 roster).
//!
//! Grounded in the teacher's `uninstaller` module: the bundle/plist
//! parsing and related-file detection survive unchanged, but the
//! deletion and admin-privilege-escalation logic does not — this crate
//! deletes only through the cleanup executor's safety-gated path
//! (spec §4.4), never via `osascript ... with administrator privileges`
//! (explicitly excluded, SPEC_FULL §1).

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use plist::Value;

/// Bundle identifier and version pulled from `Contents/Info.plist`.
#[derive(Debug, Clone, Default)]
pub struct PlistInfo {
    pub bundle_id: String,
    pub version: String,
}

/// A `.app` bundle under `/Applications` or `~/Applications`. Plist
/// parsing and size computation are both lazy and cached: most callers
/// only need a name for matching, not the full metadata.
pub struct AppBundle {
    pub path: PathBuf,
    info: RefCell<Option<PlistInfo>>,
    cached_size: Cell<Option<u64>>,
}

impl Clone for AppBundle {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            info: RefCell::new(self.info.borrow().clone()),
            cached_size: Cell::new(self.cached_size.get()),
        }
    }
}

impl AppBundle {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            info: RefCell::new(None),
            cached_size: Cell::new(None),
        }
    }

    pub fn info(&self) -> Option<PlistInfo> {
        if self.info.borrow().is_none() {
            if let Ok(parsed) = Self::parse_plist(&self.path) {
                *self.info.borrow_mut() = Some(parsed);
            }
        }
        self.info.borrow().clone()
    }

    fn parse_plist(path: &Path) -> anyhow::Result<PlistInfo> {
        let plist_path = path.join("Contents/Info.plist");
        let content = fs::read(&plist_path)?;
        let plist = Value::from_reader(Cursor::new(content))?;

        let get_string = |key: &str| -> String {
            plist
                .as_dictionary()
                .and_then(|d| d.get(key))
                .and_then(|v| v.as_string())
                .unwrap_or("")
                .to_string()
        };

        Ok(PlistInfo {
            bundle_id: get_string("CFBundleIdentifier"),
            version: get_string("CFBundleShortVersionString"),
        })
    }

    pub fn size(&self) -> u64 {
        if let Some(size) = self.cached_size.get() {
            return size;
        }
        // Always the exact bundle size, not tuning-dependent: used for
        // display and for unused-apps matching, never as a reclaim-size
        // floor a user would want silently truncated.
        let (size, _) = crate::fsutil::dir_size(&self.path, &crate::config::ScanConfig::unbounded());
        self.cached_size.set(Some(size));
        size
    }

    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
    }
}

/// Enumerates installed `.app` bundles under the standard application
/// directories.
pub struct AppDetector {
    search_paths: Vec<PathBuf>,
}

impl AppDetector {
    pub fn new(home: &Path) -> Self {
        Self {
            search_paths: vec![PathBuf::from("/Applications"), home.join("Applications")],
        }
    }

    pub fn list_all(&self) -> Vec<AppBundle> {
        let mut apps = Vec::new();

        for path in &self.search_paths {
            if !path.exists() {
                continue;
            }

            if let Ok(entries) = fs::read_dir(path) {
                for entry in entries.flatten() {
                    let entry_path = entry.path();
                    if entry_path.extension().map(|e| e == "app").unwrap_or(false) {
                        apps.push(AppBundle::new(entry_path));
                    }
                }
            }
        }

        apps.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        apps
    }
}

/// Bundle identifiers for apps that ship with macOS — never surfaced by
/// `unused-apps`, never treated as orphaned by `app-leftovers`.
pub const SYSTEM_APPS: &[&str] = &[
    "com.apple.Safari",
    "com.apple.Mail",
    "com.apple.calendar",
    "com.apple.AddressBook",
    "com.apple.finder",
    "com.apple.Terminal",
    "com.apple.Preview",
    "com.apple.TextEdit",
    "com.apple.Notes",
    "com.apple.Reminders",
    "com.apple.Maps",
    "com.apple.Photos",
    "com.apple.Music",
    "com.apple.Podcasts",
    "com.apple.News",
    "com.apple.Stocks",
    "com.apple.FaceTime",
    "com.apple.Messages",
    "com.apple.AppStore",
    "com.apple.SystemPreferences",
];

pub fn is_system_app(app: &AppBundle) -> bool {
    app.info()
        .map(|i| SYSTEM_APPS.contains(&i.bundle_id.as_str()))
        .unwrap_or(false)
}

/// Directories searched for per-app leftovers, alongside a human label.
pub fn related_file_locations(home: &Path) -> Vec<(&'static str, PathBuf)> {
    vec![
        ("Application Support", home.join("Library/Application Support")),
        ("Preferences", home.join("Library/Preferences")),
        ("Caches", home.join("Library/Caches")),
        ("Logs", home.join("Library/Logs")),
        ("LaunchAgents", home.join("Library/LaunchAgents")),
        ("Containers", home.join("Library/Containers")),
        ("Group Containers", home.join("Library/Group Containers")),
    ]
}

/// Whether a leftover file/directory `name` plausibly belongs to an app
/// identified by `app_name`/`bundle_id`.
pub fn is_related(name: &str, app_name: &str, bundle_id: &str) -> bool {
    let name_lower = name.to_lowercase();
    let app_lower = app_name.to_lowercase();
    let bundle_lower = bundle_id.to_lowercase();

    if !bundle_id.is_empty() && name_lower.contains(&bundle_lower) {
        return true;
    }

    if !app_name.is_empty() && name_lower.contains(&app_lower) {
        return true;
    }

    if name.ends_with(".plist") && !bundle_id.is_empty() {
        let bundle_prefix = bundle_lower.replace('.', "");
        if name_lower.starts_with(&bundle_prefix) {
            return true;
        }
    }

    false
}
