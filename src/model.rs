//! Shared value types flowing between the safety layer, scanners, the
//! engine, and the IPC protocol (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk classification assigned at scan time from category identity,
/// never chosen by a UI layer (spec §4.1, §9 "risk classification is a
/// safety concern, not UX").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Moderate,
    Risky,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Risky => "risky",
        };
        write!(f, "{s}")
    }
}

/// One reclaimable item.
///
/// `path` is either an absolute filesystem path or a pseudo-path of the
/// form `"<prefix>:<type>"` (e.g. `docker:Images`) standing in for a
/// non-filesystem reclaimable resource. Pseudo-paths are never passed to
/// the generic deletion primitive (spec §4.4, §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub path: String,
    pub description: String,
    pub size: u64,
    pub risk_level: RiskLevel,
}

impl ScanEntry {
    pub fn new(
        path: impl Into<String>,
        description: impl Into<String>,
        size: u64,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            size,
            risk_level,
        }
    }

    /// A scheme-prefixed pseudo-path (`docker:Images`, `tmutil:snapshot:x`)
    /// has a `:` that appears strictly before any `/`.
    pub fn is_pseudo_path(&self) -> bool {
        is_pseudo_path(&self.path)
    }
}

pub fn is_pseudo_path(path: &str) -> bool {
    match (path.find(':'), path.find('/')) {
        (Some(colon), Some(slash)) => colon < slash,
        (Some(_), None) => true,
        _ => false,
    }
}

/// A path that could not be accessed during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionIssue {
    pub path: String,
    pub description: String,
}

impl PermissionIssue {
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
        }
    }
}

/// Results produced by one scanner for one category.
///
/// `entries` is sorted descending by size and `total_size` always equals
/// the sum of entry sizes (spec §3, §8 property 2). Construct via
/// [`CategoryResult::new`] rather than the struct literal so both
/// invariants hold by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: String,
    pub description: String,
    pub entries: Vec<ScanEntry>,
    pub total_size: u64,
    pub permission_issues: Vec<PermissionIssue>,
}

impl CategoryResult {
    pub fn new(
        category: impl Into<String>,
        description: impl Into<String>,
        mut entries: Vec<ScanEntry>,
        permission_issues: Vec<PermissionIssue>,
    ) -> Self {
        entries.retain(|e| e.size > 0);
        entries.sort_by(|a, b| b.size.cmp(&a.size));
        let total_size = entries.iter().map(|e| e.size).sum();

        Self {
            category: category.into(),
            description: description.into(),
            entries,
            total_size,
            permission_issues,
        }
    }
}

/// Scanner metadata exposed through the registry and IPC `categories` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category_ids: Vec<String>,
    pub risk_level: Option<RiskLevel>,
}

/// Internal record behind the engine's single token slot. Never
/// serialized, never leaves the engine (spec §3 ownership rule).
#[derive(Debug, Clone)]
pub(crate) struct TokenEntry {
    pub token: String,
    pub results: Vec<CategoryResult>,
    pub created_at: DateTime<Utc>,
}

/// Streaming record emitted while a `ScanAll` is in flight.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    ScannerStart {
        scanner_id: String,
        label: String,
    },
    ScannerDone {
        scanner_id: String,
        label: String,
        results: Vec<CategoryResult>,
    },
    ScannerError {
        scanner_id: String,
        label: String,
        err: String,
    },
}

/// Streaming record emitted while a `Cleanup` is in flight.
#[derive(Debug, Clone)]
pub enum CleanupEvent {
    CategoryStart {
        category_description: String,
    },
    Entry {
        category_description: String,
        entry_path: String,
        current_index: usize,
        total_count: usize,
    },
}

/// One failed deletion, kept alongside its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub path: String,
    pub reason: String,
}

/// Final value delivered by a completed `ScanAll`.
#[derive(Debug, Clone)]
pub struct ScanAllOutcome {
    pub results: Vec<CategoryResult>,
    pub token: String,
}

/// Final value delivered by a completed `Cleanup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub removed: Vec<String>,
    pub failed: Vec<FailedEntry>,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
}
