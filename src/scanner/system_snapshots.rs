use std::time::Duration;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::risk_for_category;

use super::{FnScanner, Scanner};

const DEADLINE: Duration = Duration::from_secs(10);

pub fn build() -> impl Scanner {
    FnScanner::new(
        ScannerInfo {
            id: "system-snapshots".to_string(),
            name: "Local Time Machine Snapshots".to_string(),
            description: "APFS local snapshots retained by Time Machine on the boot volume"
                .to_string(),
            category_ids: vec!["system-snapshots".to_string()],
            risk_level: Some(risk_for_category("system-snapshots")),
        },
        || scan(&SystemCommandRunner),
    )
}

fn scan(runner: &dyn CommandRunner) -> anyhow::Result<Vec<CategoryResult>> {
    let names = match runner.run("tmutil", &["listlocalsnapshots", "/"], DEADLINE) {
        Some(bytes) => parse_snapshot_names(&String::from_utf8_lossy(&bytes)),
        None => {
            return Ok(vec![CategoryResult::new(
                "system-snapshots",
                "Local Time Machine Snapshots",
                Vec::new(),
                Vec::new(),
            )]);
        }
    };

    if names.is_empty() {
        return Ok(vec![CategoryResult::new(
            "system-snapshots",
            "Local Time Machine Snapshots",
            Vec::new(),
            Vec::new(),
        )]);
    }

    // `tmutil` reports snapshot names but not their individual sizes;
    // `diskutil apfs list` reports only the aggregate space snapshots
    // hold on the container. Split that aggregate evenly across the
    // named snapshots rather than inventing a per-snapshot figure the
    // OS does not expose — an approximation, not an exact accounting.
    let total_bytes = match runner.run("diskutil", &["apfs", "list"], DEADLINE) {
        Some(bytes) => parse_snapshot_capacity(&String::from_utf8_lossy(&bytes)),
        None => 0,
    };

    let risk_level = risk_for_category("system-snapshots");
    let share = total_bytes / names.len() as u64;

    let entries: Vec<ScanEntry> = names
        .into_iter()
        .filter(|_| share > 0)
        .map(|name| {
            ScanEntry::new(
                format!("tmutil:snapshot:{name}"),
                format!("Local snapshot {name}"),
                share,
                risk_level,
            )
        })
        .collect();

    Ok(vec![CategoryResult::new(
        "system-snapshots",
        "Local Time Machine Snapshots",
        entries,
        Vec::new(),
    )])
}

/// `tmutil listlocalsnapshots /` prints one
/// `com.apple.TimeMachine.<timestamp>.local` identifier per line (plus
/// a leading "Snapshots for disk ..." header on some macOS versions).
fn parse_snapshot_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("com.apple.TimeMachine."))
        .map(str::to_string)
        .collect()
}

/// `diskutil apfs list` includes a line of the form:
/// `Capacity in Use by Snapshots (Locked):  50300000000 B (50.3 GB) (53.2%)`
/// Only the leading byte count is parsed.
fn parse_snapshot_capacity(output: &str) -> u64 {
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Capacity in Use by Snapshots (Locked):") {
            if let Some(bytes) = rest.trim().split_whitespace().next() {
                if let Ok(value) = bytes.parse::<u64>() {
                    return value;
                }
            }
        }
    }
    0
}
