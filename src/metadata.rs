//! Spotlight metadata lookups used by the `unused-apps` scanner to
//! judge staleness (spec §4.3 roster, "Spotlight `kMDItemLastUsedDate`").

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::command::CommandRunner;

/// `mdls` renders dates like `2024-01-15 10:30:00 +0000`, not RFC 3339.
const MDLS_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Subprocess deadline (spec.md §5's generic "10 s hard deadline per
/// invocation" for subprocess-backed scanners, not scoped to `docker`).
const DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    pub last_used: Option<DateTime<Utc>>,
    pub use_count: Option<u32>,
}

/// Runs `mdls` through `runner` rather than shelling out directly, so a
/// hung or missing `mdls` surfaces as a nil result within `DEADLINE`
/// instead of stalling the strictly-sequential `ScanAll` pipeline (spec
/// §5), and so tests can inject canned output.
pub fn get_file_metadata(runner: &dyn CommandRunner, path: &Path) -> Option<FileMetadata> {
    let path_arg = path.to_string_lossy().to_string();
    let output = runner.run(
        "mdls",
        &[
            "-name",
            "kMDItemLastUsedDate",
            "-name",
            "kMDItemUseCount",
            &path_arg,
        ],
        DEADLINE,
    )?;

    let stdout = String::from_utf8_lossy(&output);
    parse_mdls_output(&stdout)
}

fn parse_mdls_output(output: &str) -> Option<FileMetadata> {
    let mut last_used = None;
    let mut use_count = None;

    for line in output.lines() {
        let line = line.trim();

        if line.starts_with("kMDItemLastUsedDate") {
            last_used = parse_date_value(line);
        } else if line.starts_with("kMDItemUseCount") {
            use_count = parse_int_value(line);
        }
    }

    if last_used.is_some() || use_count.is_some() {
        Some(FileMetadata { last_used, use_count })
    } else {
        None
    }
}

fn parse_date_value(line: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = line.splitn(2, '=').collect();
    if parts.len() != 2 {
        return None;
    }

    let value = parts[1].trim();
    if value == "(null)" {
        return None;
    }

    let value = value.trim_matches('"');
    DateTime::parse_from_str(value, MDLS_DATE_FORMAT)
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt.naive_utc()))
}

fn parse_int_value(line: &str) -> Option<u32> {
    let parts: Vec<&str> = line.splitn(2, '=').collect();
    if parts.len() != 2 {
        return None;
    }

    let value = parts[1].trim();
    if value == "(null)" {
        return None;
    }

    value.parse().ok()
}
