//! Safety layer (spec §4.1): the only place in the engine allowed to
//! decide whether a path may be mutated, and the only place that
//! assigns risk levels. Both tables are hardcoded and not configurable
//! — this is a safety invariant, not a policy knob.

use std::path::{Component, Path, PathBuf};

use crate::model::RiskLevel;

const VM_PREFIXES: &[&str] = &["/private/var/vm"];
const SIP_PREFIXES: &[&str] = &["/System", "/usr", "/bin", "/sbin"];
const SIP_EXCEPTIONS: &[&str] = &["/usr/local"];

/// Decide whether `path` may be mutated.
///
/// Returns `(blocked, reason)`. `reason` is empty iff `blocked` is false.
pub fn is_path_blocked(path: &Path) -> (bool, String) {
    let normalized = normalize(path);

    let resolved = match std::fs::canonicalize(&normalized) {
        Ok(p) => p,
        Err(_) if normalized.exists() => {
            return (true, "cannot resolve path".to_string());
        }
        Err(_) => normalized,
    };

    let resolved_str = resolved.to_string_lossy();

    for vm in VM_PREFIXES {
        if has_prefix_boundary(&resolved_str, vm) {
            return (true, "swap/VM file".to_string());
        }
    }

    for sip in SIP_PREFIXES {
        if !has_prefix_boundary(&resolved_str, sip) {
            continue;
        }
        if SIP_EXCEPTIONS
            .iter()
            .any(|ex| has_prefix_boundary(&resolved_str, ex))
        {
            continue;
        }
        return (true, "SIP-protected".to_string());
    }

    (false, String::new())
}

/// Lookup table assigning a risk level to every category identifier any
/// registered scanner may emit. Unknown categories default to moderate
/// per spec §3/§4.1.
pub fn risk_for_category(category_id: &str) -> RiskLevel {
    match category_id {
        "trash" | "system-caches" | "system-logs" | "dev-build-artifacts" => RiskLevel::Safe,
        "browser-chrome" | "browser-firefox" | "browser-safari" | "browser-other" => {
            RiskLevel::Safe
        }
        "system-data" | "dev-xcode" | "dev-docker" | "photos-library" | "messaging-attachments"
        | "creative-adobe" | "creative-final-cut" | "app-leftovers" => RiskLevel::Moderate,
        "unused-apps" | "system-vm-images" | "system-snapshots" => RiskLevel::Risky,
        _ => RiskLevel::Moderate,
    }
}

/// Collapse `.` and `..` path segments without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Boundary-safe prefix match: `path` matches `prefix` only on exact
/// equality or `prefix` followed by a path separator. Without this,
/// `/SystemVolume` would incorrectly match `/System`.
fn has_prefix_boundary(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}
