//! Engine (spec §4.5): the orchestrator holding the scanner registry and
//! the single-slot token store. Safe for concurrent use — the token
//! slot is behind a `parking_lot::Mutex` and scanners are read-only
//! after construction.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::{CancelledError, EngineError, RunError, ScanError, TokenError};
use crate::executor;
use crate::model::{CategoryResult, CleanupEvent, CleanupOutcome, ScanAllOutcome, ScanEvent, TokenEntry};
use crate::scanner::Scanner;
use crate::scanner::{
    app_leftovers, browser, creative, dev_docker, dev_junk, dev_xcode, messaging, photos,
    system_caches, system_data, system_logs, system_snapshots, system_vm, trash, unused_apps,
};

const EVENT_BUFFER: usize = 32;
const TOKEN_BYTES: usize = 16;

/// Builds the default scanner roster against `home` (spec.md §2's
/// "Scanner implementations" row, enumerated concretely in SPEC_FULL
/// §4.3's roster table). `config` is the tuning knobs from
/// `Config::load`'s `[scan]` table; `dev-docker` takes none of them —
/// it never walks the filesystem, only parses `docker system df`'s
/// pseudo-path rows.
pub fn default_scanners(home: &std::path::Path, config: &ScanConfig) -> Vec<Box<dyn Scanner>> {
    vec![
        Box::new(system_caches::build(home, config)),
        Box::new(system_logs::build(home, config)),
        Box::new(system_data::build(home, config)),
        Box::new(system_vm::build(home, config)),
        Box::new(system_snapshots::build()),
        Box::new(browser::build(home, config)),
        Box::new(dev_xcode::build(home, config)),
        Box::new(dev_junk::build(home, config)),
        Box::new(dev_docker::build()),
        Box::new(photos::build(home, config)),
        Box::new(messaging::build(home, config)),
        Box::new(creative::build(home, config)),
        Box::new(app_leftovers::build(home, config)),
        Box::new(unused_apps::build(home, config)),
        Box::new(trash::build(home, config)),
    ]
}

pub struct Engine {
    scanners: Arc<Vec<Box<dyn Scanner>>>,
    token_slot: Arc<Mutex<Option<TokenEntry>>>,
}

impl Engine {
    pub fn new(scanners: Vec<Box<dyn Scanner>>) -> Self {
        Self {
            scanners: Arc::new(scanners),
            token_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolves `$HOME` once and registers the full default roster,
    /// tuned by `Config::load`'s `[scan]` table. A config file that
    /// fails to load falls back to `ScanConfig::default()` rather than
    /// making the engine unusable over a tuning knob. Failure to
    /// resolve the home directory is the one documented fatal condition
    /// from spec §7 (SPEC_FULL §4.5).
    pub fn with_default_scanners() -> Result<Self, EngineError> {
        let home = dirs::home_dir().ok_or(EngineError::NoHomeDirectory)?;
        let scan_config = crate::config::Config::load()
            .map(|config| config.scan)
            .unwrap_or_else(|err| {
                warn!(error = %err, "failed to load config, using default scan tuning");
                ScanConfig::default()
            });
        Ok(Self::new(default_scanners(&home, &scan_config)))
    }

    pub fn scanner_infos(&self) -> Vec<crate::model::ScannerInfo> {
        self.scanners.iter().map(|s| s.info().clone()).collect()
    }

    /// Streams scan events in registry order, then delivers exactly one
    /// `ScanAllOutcome` and mints a fresh token (spec §4.5.1).
    pub fn scan_all(
        &self,
        cancel: CancellationToken,
        skip: HashSet<String>,
    ) -> (mpsc::Receiver<ScanEvent>, oneshot::Receiver<ScanAllOutcome>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (done_tx, done_rx) = oneshot::channel();
        let scanners = Arc::clone(&self.scanners);
        let token_slot = Arc::clone(&self.token_slot);

        tokio::spawn(async move {
            let mut accumulated = Vec::new();

            for scanner in scanners.iter() {
                if cancel.is_cancelled() {
                    info!("scan_all cancelled before next scanner started");
                    return;
                }

                let info = scanner.info().clone();
                debug!(scanner_id = %info.id, "starting scanner");
                if send_cancellable(
                    &event_tx,
                    ScanEvent::ScannerStart {
                        scanner_id: info.id.clone(),
                        label: info.name.clone(),
                    },
                    &cancel,
                )
                .await
                .is_err()
                {
                    return;
                }

                // Scanners are invoked strictly sequentially (spec §5):
                // the registry does not parallelize scans, so the call
                // below runs inline rather than on a blocking pool.
                match scanner.scan() {
                    Ok(results) => {
                        info!(scanner_id = %info.id, categories = results.len(), "scanner done");
                        let event = ScanEvent::ScannerDone {
                            scanner_id: info.id.clone(),
                            label: info.name.clone(),
                            results: results.clone(),
                        };
                        if send_cancellable(&event_tx, event, &cancel).await.is_err() {
                            return;
                        }
                        accumulated.extend(results);
                    }
                    Err(err) => {
                        let scan_error = ScanError {
                            scanner_id: info.id.clone(),
                            inner: err,
                        };
                        warn!(scanner_id = %info.id, error = %scan_error, "scanner failed");
                        let event = ScanEvent::ScannerError {
                            scanner_id: info.id.clone(),
                            label: info.name.clone(),
                            err: scan_error.to_string(),
                        };
                        if send_cancellable(&event_tx, event, &cancel).await.is_err() {
                            return;
                        }
                    }
                }
            }

            let filtered: Vec<CategoryResult> = accumulated
                .into_iter()
                .filter(|c| !skip.contains(&c.category))
                .collect();

            let token = mint_token();
            {
                let mut slot = token_slot.lock();
                *slot = Some(TokenEntry {
                    token: token.clone(),
                    results: filtered.clone(),
                    created_at: Utc::now(),
                });
            }
            info!(token = %token, categories = filtered.len(), "scan_all complete, token minted");

            let _ = done_tx.send(ScanAllOutcome {
                results: filtered,
                token,
            });
        });

        (event_rx, done_rx)
    }

    /// Runs a single scanner synchronously. Does not mint a token — only
    /// `ScanAll` participates in the cleanup token protocol (spec §4.5.2).
    pub fn run(
        &self,
        cancel: &CancellationToken,
        scanner_id: &str,
    ) -> Result<Vec<CategoryResult>, RunError> {
        let scanner = self
            .scanners
            .iter()
            .find(|s| s.info().id == scanner_id)
            .ok_or_else(|| EngineError::ScannerNotFound(scanner_id.to_string()))?;

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled(CancelledError {
                operation: format!("run:{scanner_id}"),
            }));
        }

        scanner.scan().map_err(|inner| {
            RunError::Scan(ScanError {
                scanner_id: scanner_id.to_string(),
                inner,
            })
        })
    }

    /// Validates `token`, clears the slot (one-time use), and delegates
    /// deletion to the executor (spec §4.5.3).
    pub fn cleanup(
        &self,
        cancel: CancellationToken,
        token: String,
        category_ids: HashSet<String>,
    ) -> (
        mpsc::Receiver<CleanupEvent>,
        oneshot::Receiver<Result<CleanupOutcome, TokenError>>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (done_tx, done_rx) = oneshot::channel();

        let snapshot = {
            let mut slot = self.token_slot.lock();
            match slot.as_ref() {
                Some(entry) if entry.token == token => {
                    let results = entry.results.clone();
                    *slot = None;
                    Some(results)
                }
                Some(_) => None,
                None => None,
            }
        };

        let Some(results) = snapshot else {
            let reason = if token.is_empty() {
                "missing token".to_string()
            } else {
                "token not found or already consumed".to_string()
            };
            let _ = done_tx.send(Err(TokenError::new(token, reason)));
            return (event_rx, done_rx);
        };

        let selected: Vec<CategoryResult> = if category_ids.is_empty() {
            results
        } else {
            results
                .into_iter()
                .filter(|c| category_ids.contains(&c.category))
                .collect()
        };

        tokio::task::spawn_blocking(move || {
            if cancel.is_cancelled() {
                info!("cleanup cancelled before execution started");
                return;
            }

            let outcome = executor::execute(&selected, |description, entry_path, current, total| {
                let event = if entry_path.is_empty() {
                    CleanupEvent::CategoryStart {
                        category_description: description.to_string(),
                    }
                } else {
                    CleanupEvent::Entry {
                        category_description: description.to_string(),
                        entry_path: entry_path.to_string(),
                        current_index: current,
                        total_count: total,
                    }
                };
                // Best-effort: tolerate a disconnected receiver (spec §4.4).
                let _ = event_tx.blocking_send(event);
            });

            info!(
                removed = outcome.removed.len(),
                failed = outcome.failed.len(),
                bytes_freed = outcome.bytes_freed,
                "cleanup complete"
            );
            let _ = done_tx.send(Ok(outcome));
        });

        (event_rx, done_rx)
    }
}

async fn send_cancellable<T>(
    tx: &mpsc::Sender<T>,
    value: T,
    cancel: &CancellationToken,
) -> Result<(), ()> {
    tokio::select! {
        result = tx.send(value) => result.map_err(|_| ()),
        _ = cancel.cancelled() => Err(()),
    }
}

fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryResult, RiskLevel, ScanEntry, ScannerInfo};
    use crate::scanner::FnScanner;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock_scanner(id: &str, category: &str, path: String, size: u64) -> impl Scanner {
        let path_clone = path.clone();
        let category = category.to_string();
        FnScanner::new(
            ScannerInfo {
                id: id.to_string(),
                name: id.to_string(),
                description: "mock".to_string(),
                category_ids: vec![category.clone()],
                risk_level: None,
            },
            move || {
                Ok(vec![CategoryResult::new(
                    category.clone(),
                    format!("{category} Cat"),
                    vec![ScanEntry::new(path_clone.clone(), "X", size, RiskLevel::Safe)],
                    Vec::new(),
                )])
            },
        )
    }

    #[tokio::test]
    async fn scan_then_cleanup_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = tmp.path().join("fixture-X");
        fs::write(&fixture, vec![0u8; 100]).unwrap();

        let engine = Engine::new(vec![Box::new(mock_scanner(
            "m",
            "m-c",
            fixture.to_string_lossy().to_string(),
            100,
        ))]);

        let (mut events, done) = engine.scan_all(CancellationToken::new(), HashSet::new());
        let first = events.recv().await.unwrap();
        assert!(matches!(first, ScanEvent::ScannerStart { .. }));
        let second = events.recv().await.unwrap();
        assert!(matches!(second, ScanEvent::ScannerDone { .. }));
        assert!(events.recv().await.is_none());

        let outcome = done.await.unwrap();
        assert_eq!(outcome.results[0].total_size, 100);
        assert!(!outcome.token.is_empty());

        let (mut cleanup_events, cleanup_done) =
            engine.cleanup(CancellationToken::new(), outcome.token.clone(), HashSet::new());
        let start = cleanup_events.recv().await.unwrap();
        assert!(matches!(start, CleanupEvent::CategoryStart { .. }));
        let entry = cleanup_events.recv().await.unwrap();
        assert!(matches!(entry, CleanupEvent::Entry { .. }));

        let result = cleanup_done.await.unwrap().unwrap();
        assert_eq!(result.removed, vec![fixture.to_string_lossy().to_string()]);
        assert_eq!(result.bytes_freed, 100);
        assert!(!fixture.exists());

        let (_, replay_done) = engine.cleanup(CancellationToken::new(), outcome.token, HashSet::new());
        assert!(replay_done.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn new_scan_invalidates_previous_token() {
        let engine = Engine::new(vec![Box::new(mock_scanner("m", "m-c", "docker:Images".to_string(), 10))]);

        let (_, done1) = engine.scan_all(CancellationToken::new(), HashSet::new());
        let token1 = done1.await.unwrap().token;

        let (_, done2) = engine.scan_all(CancellationToken::new(), HashSet::new());
        let token2 = done2.await.unwrap().token;

        assert_ne!(token1, token2);

        let (_, stale) = engine.cleanup(CancellationToken::new(), token1, HashSet::new());
        assert!(stale.await.unwrap().is_err());

        let (_, fresh) = engine.cleanup(CancellationToken::new(), token2, HashSet::new());
        assert!(fresh.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn skip_set_filters_categories_before_token_mint() {
        let engine = Engine::new(vec![
            Box::new(mock_scanner("a", "cat-a", "docker:A".to_string(), 10)),
            Box::new(mock_scanner("b", "cat-b", "docker:B".to_string(), 20)),
        ]);

        let mut skip = HashSet::new();
        skip.insert("cat-a".to_string());

        let (_, done) = engine.scan_all(CancellationToken::new(), skip);
        let outcome = done.await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].category, "cat-b");
    }

    #[tokio::test]
    async fn cancellation_before_first_scanner_closes_streams_without_token() {
        let engine = Engine::new(vec![Box::new(mock_scanner(
            "m",
            "m-c",
            "docker:Images".to_string(),
            10,
        ))]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let (mut events, done) = engine.scan_all(cancel, HashSet::new());
        assert!(events.recv().await.is_none());
        assert!(done.await.is_err());
    }

    #[tokio::test]
    async fn run_does_not_mint_a_token() {
        let engine = Engine::new(vec![Box::new(mock_scanner(
            "m",
            "m-c",
            "docker:Images".to_string(),
            10,
        ))]);

        let result = engine.run(&CancellationToken::new(), "m").unwrap();
        assert_eq!(result[0].category, "m-c");

        let (_, done) = engine.cleanup(CancellationToken::new(), "anything".to_string(), HashSet::new());
        assert!(done.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn run_unknown_scanner_is_not_found_error() {
        let engine = Engine::new(Vec::new());
        let err = engine.run(&CancellationToken::new(), "missing").unwrap_err();
        assert!(matches!(err, RunError::Engine(EngineError::ScannerNotFound(_))));
    }

    #[tokio::test]
    async fn cleanup_blocks_safety_blocked_paths() {
        let engine = Engine::new(vec![Box::new(mock_scanner(
            "m",
            "m-c",
            "/System/Library/FakeCache".to_string(),
            500,
        ))]);

        let (_, done) = engine.scan_all(CancellationToken::new(), HashSet::new());
        let token = done.await.unwrap().token;

        let (_, cleanup_done) = engine.cleanup(CancellationToken::new(), token, HashSet::new());
        let result = cleanup_done.await.unwrap().unwrap();
        assert!(result.removed.is_empty());
        assert_eq!(result.bytes_freed, 0);
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].reason.contains("SIP"));
    }

    #[test]
    fn mint_token_is_unique_and_long_enough() {
        let a = mint_token();
        let b = mint_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
    }

    /// A scanner whose `scan()` blocks until the test releases it, so a
    /// cancellation observed mid-scan can be exercised deterministically
    /// (spec §5, §8 property 9, Scenario E). `scan()` runs inline inside
    /// the engine's spawned task, not on a blocking pool, so this test
    /// needs more than one runtime worker thread or the blocked scan
    /// would starve its own event consumer.
    fn blocking_scanner(release: std::sync::mpsc::Receiver<()>) -> impl Scanner {
        let release = parking_lot::Mutex::new(Some(release));
        FnScanner::new(
            ScannerInfo {
                id: "blocker".to_string(),
                name: "Blocker".to_string(),
                description: "blocks until released".to_string(),
                category_ids: vec!["blocker-cat".to_string()],
                risk_level: None,
            },
            move || {
                if let Some(rx) = release.lock().take() {
                    let _ = rx.recv();
                }
                Ok(Vec::new())
            },
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_mid_scan_closes_streams_without_token() {
        let (tx, rx) = std::sync::mpsc::channel();
        let engine = Engine::new(vec![Box::new(blocking_scanner(rx))]);

        let cancel = CancellationToken::new();
        let (mut events, done) = engine.scan_all(cancel.clone(), HashSet::new());

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ScanEvent::ScannerStart { .. }));

        cancel.cancel();
        drop(tx);

        assert!(events.recv().await.is_none());
        assert!(done.await.is_err());

        let (_, cleanup_done) =
            engine.cleanup(CancellationToken::new(), "anything".to_string(), HashSet::new());
        assert!(cleanup_done.await.unwrap().is_err());
    }
}
