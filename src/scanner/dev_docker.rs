use std::time::Duration;

use serde::Deserialize;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::model::{CategoryResult, ScanEntry, ScannerInfo};
use crate::safety::risk_for_category;

use super::{FnScanner, Scanner};

const DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct DfRow {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Reclaimable")]
    reclaimable: String,
}

pub fn build() -> impl Scanner {
    FnScanner::new(
        ScannerInfo {
            id: "dev-docker".to_string(),
            name: "Docker Reclaimable Data".to_string(),
            description: "Docker images, containers, and build cache reported reclaimable by `docker system df`".to_string(),
            category_ids: vec!["dev-docker".to_string()],
            risk_level: None,
        },
        || scan(&SystemCommandRunner),
    )
}

fn scan(runner: &dyn CommandRunner) -> anyhow::Result<Vec<CategoryResult>> {
    if runner.run("docker", &["--version"], DEADLINE).is_none() {
        return Ok(vec![CategoryResult::new(
            "dev-docker",
            "Docker Reclaimable Data",
            Vec::new(),
            Vec::new(),
        )]);
    }

    let output = runner.run(
        "docker",
        &["system", "df", "--format", "{{json .}}"],
        DEADLINE,
    );

    let entries = match output {
        Some(bytes) => parse_df_output(&String::from_utf8_lossy(&bytes)),
        None => Vec::new(),
    };

    Ok(vec![CategoryResult::new(
        "dev-docker",
        "Docker Reclaimable Data",
        entries,
        Vec::new(),
    )])
}

/// `docker system df --format '{{json .}}'` emits one JSON object per
/// line, one per resource type (Images, Containers, Local Volumes,
/// Build Cache). Reclaimable is formatted like `"1.2GB (50%)"`; only the
/// byte count before the parenthesis is parsed.
fn parse_df_output(output: &str) -> Vec<ScanEntry> {
    let risk_level = risk_for_category("dev-docker");

    output
        .lines()
        .filter_map(|line| serde_json::from_str::<DfRow>(line).ok())
        .filter_map(|row| {
            let bytes = parse_reclaimable(&row.reclaimable)?;
            if bytes == 0 {
                return None;
            }
            Some(ScanEntry::new(
                format!("docker:{}", row.kind),
                format!("Docker {}", row.kind),
                bytes,
                risk_level,
            ))
        })
        .collect()
}

fn parse_reclaimable(raw: &str) -> Option<u64> {
    let amount = raw.split('(').next()?.trim();
    byte_unit::Byte::parse_str(amount, true)
        .ok()
        .map(|b| b.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FakeCommandRunner;

    struct MissingDocker;
    impl CommandRunner for MissingDocker {
        fn run(&self, _program: &str, _args: &[&str], _deadline: Duration) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn missing_docker_yields_nil_result() {
        let result = scan(&MissingDocker).unwrap();
        assert!(result[0].entries.is_empty());
    }

    struct VersionThenDf {
        df_output: Vec<u8>,
    }
    impl CommandRunner for VersionThenDf {
        fn run(&self, program: &str, args: &[&str], _deadline: Duration) -> Option<Vec<u8>> {
            if args.first() == Some(&"--version") {
                Some(b"Docker version 24.0.0".to_vec())
            } else if program == "docker" {
                Some(self.df_output.clone())
            } else {
                None
            }
        }
    }

    #[test]
    fn parses_reclaimable_rows_into_pseudo_path_entries() {
        let runner = VersionThenDf {
            df_output: br#"{"Type":"Images","Reclaimable":"1.2GB (50%)"}
{"Type":"Build Cache","Reclaimable":"0B (0%)"}
"#
            .to_vec(),
        };

        let result = scan(&runner).unwrap();
        assert_eq!(result[0].entries.len(), 1);
        assert_eq!(result[0].entries[0].path, "docker:Images");
        assert!(result[0].entries[0].is_pseudo_path());
    }

    #[test]
    fn fake_runner_output_is_used_directly() {
        let runner = FakeCommandRunner {
            output: Some(br#"{"Type":"Images","Reclaimable":"3MB (10%)"}"#.to_vec()),
        };
        let entries = parse_df_output(&String::from_utf8_lossy(runner.output.as_ref().unwrap()));
        assert_eq!(entries.len(), 1);
    }
}
