//! IPC server (spec.md §4.7): a line-delimited protocol server over a
//! Unix domain socket, wrapping one [`Engine`] for a native GUI peer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::ipc::protocol::{
    read_request, write_response, CleanupParams, ProtocolError, Request, Response, ScanParams,
};
use crate::model::{CleanupEvent, ScanEvent};

const STALE_SOCKET_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("another instance is already listening on {0}")]
    AlreadyRunning(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Listens at `socket_path`, serving the engine's operations to any
/// number of connections until `cancel` fires.
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Binds the socket, first probing (and removing) a stale file left
    /// behind by a prior, now-dead instance (spec.md §4.7 startup).
    pub async fn bind(socket_path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let socket_path = socket_path.as_ref().to_path_buf();

        if socket_path.exists() {
            if probe_is_live(&socket_path).await {
                return Err(ServerError::AlreadyRunning(socket_path));
            }
            info!(path = %socket_path.display(), "removing stale socket");
            let _ = std::fs::remove_file(&socket_path);
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        restrict_permissions(&socket_path)?;

        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accepts connections serially, handing each off to its own task so
    /// that a slow/blocked connection never stalls acceptance of the
    /// next one. Returns once `cancel` fires.
    pub async fn serve(self, engine: Arc<Engine>, cancel: CancellationToken) {
        let busy = Arc::new(AtomicBool::new(false));
        let socket_path = self.socket_path.clone();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let engine = Arc::clone(&engine);
                            let busy = Arc::clone(&busy);
                            let conn_cancel = cancel.child_token();
                            let server_cancel = cancel.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, engine, busy, conn_cancel, server_cancel)
                                    .await;
                            });
                        }
                        Err(err) => warn!(error = %err, "accept failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("server cancelled, stopping accept loop");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&socket_path);
    }
}

async fn probe_is_live(socket_path: &Path) -> bool {
    let connect = UnixStream::connect(socket_path);
    let Ok(Ok(stream)) = tokio::time::timeout(STALE_SOCKET_PROBE_TIMEOUT, connect).await else {
        return false;
    };

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let ping = Request {
        id: "startup-probe".to_string(),
        method: "ping".to_string(),
        params: serde_json::Value::Null,
    };
    let Ok(line) = serde_json::to_string(&ping) else {
        return false;
    };
    if tokio::time::timeout(
        STALE_SOCKET_PROBE_TIMEOUT,
        write_half.write_all(format!("{line}\n").as_bytes()),
    )
    .await
    .is_err()
    {
        return false;
    }

    tokio::time::timeout(STALE_SOCKET_PROBE_TIMEOUT, read_request(&mut reader))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// One connection's lifecycle: requests are read sequentially off a
/// single shared `BufReader` (SPEC_FULL §9's buffered-reader note) and
/// each is fully handled — including draining its progress events —
/// before the next line is read, so one connection never pipelines
/// overlapping requests.
///
/// `cancel` is this connection's own token (a child of the server's, used
/// to bound its in-flight operations); `server_cancel` is the server's
/// top-level token. `shutdown` must cancel `server_cancel`, not `cancel`
/// — cancellation cascades parent to child, so cancelling a connection's
/// own child token would never reach `serve()`'s accept loop or any
/// sibling connection.
async fn handle_connection(
    stream: UnixStream,
    engine: Arc<Engine>,
    busy: Arc<AtomicBool>,
    cancel: CancellationToken,
    server_cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer = Arc::new(AsyncMutex::new(write_half));

    loop {
        if cancel.is_cancelled() {
            debug!("connection context cancelled");
            return;
        }

        let request = tokio::select! {
            result = read_request(&mut reader) => result,
            _ = cancel.cancelled() => return,
        };

        let request = match request {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("peer disconnected");
                return;
            }
            Err(err) => {
                warn!(error = %err, "malformed request line");
                return;
            }
        };

        if request.method == "shutdown" {
            let _ = write_response(
                &mut *writer.lock().await,
                &Response::Result {
                    id: request.id.clone(),
                    payload: json!({}),
                },
            )
            .await;
            server_cancel.cancel();
            return;
        }

        dispatch(&request, &engine, &busy, &writer, &cancel).await;
    }
}

async fn dispatch(
    request: &Request,
    engine: &Arc<Engine>,
    busy: &Arc<AtomicBool>,
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    cancel: &CancellationToken,
) {
    match request.method.as_str() {
        "ping" => {
            let payload = json!({
                "version": env!("CARGO_PKG_VERSION"),
                "now": Utc::now().to_rfc3339(),
            });
            send_result(writer, &request.id, payload).await;
        }
        "categories" => {
            let scanners: Vec<_> = engine
                .scanner_infos()
                .into_iter()
                .map(|info| json!({"id": info.id, "label": info.name}))
                .collect();
            send_result(writer, &request.id, json!({"scanners": scanners})).await;
        }
        "scan" => handle_scan(request, engine, busy, writer, cancel).await,
        "cleanup" => handle_cleanup(request, engine, busy, writer, cancel).await,
        other => {
            send_error(writer, &request.id, format!("unknown method: {other}")).await;
        }
    }
}

/// Acquires the concurrency gate for the lifetime of the returned guard.
/// `None` means another scan/cleanup is in flight.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(Arc::clone(busy)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn handle_scan(
    request: &Request,
    engine: &Arc<Engine>,
    busy: &Arc<AtomicBool>,
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    cancel: &CancellationToken,
) {
    let Some(_guard) = BusyGuard::acquire(busy) else {
        send_error(writer, &request.id, "another operation is in progress").await;
        return;
    };

    let params: ScanParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(_) if request.params.is_null() => ScanParams::default(),
        Err(err) => {
            send_error(writer, &request.id, format!("malformed params: {err}")).await;
            return;
        }
    };
    let skip: HashSet<String> = params.skip.into_iter().collect();

    let (mut events, done) = engine.scan_all(cancel.child_token(), skip);

    while let Some(event) = events.recv().await {
        if cancel.is_cancelled() {
            return;
        }
        let payload = scan_event_payload(&event);
        send_progress(writer, &request.id, payload).await;
    }

    if cancel.is_cancelled() {
        return;
    }

    match done.await {
        Ok(outcome) => {
            let total_size: u64 = outcome.results.iter().map(|c| c.total_size).sum();
            let payload = json!({
                "categories": outcome.results,
                "total_size": total_size,
                "token": outcome.token,
            });
            send_result(writer, &request.id, payload).await;
        }
        Err(_) => {
            debug!("scan_all cancelled, skipping final result");
        }
    }
}

async fn handle_cleanup(
    request: &Request,
    engine: &Arc<Engine>,
    busy: &Arc<AtomicBool>,
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    cancel: &CancellationToken,
) {
    let Some(_guard) = BusyGuard::acquire(busy) else {
        send_error(writer, &request.id, "another operation is in progress").await;
        return;
    };

    let params: CleanupParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(_) if request.params.is_null() => CleanupParams::default(),
        Err(err) => {
            send_error(writer, &request.id, format!("malformed params: {err}")).await;
            return;
        }
    };

    if params.token.is_empty() {
        send_error(writer, &request.id, "missing token").await;
        return;
    }

    let categories: HashSet<String> = params.categories.into_iter().collect();
    let (mut events, done) = engine.cleanup(cancel.child_token(), params.token, categories);

    while let Some(event) = events.recv().await {
        if cancel.is_cancelled() {
            return;
        }
        let payload = cleanup_event_payload(&event);
        send_progress(writer, &request.id, payload).await;
    }

    if cancel.is_cancelled() {
        return;
    }

    match done.await {
        Ok(Ok(outcome)) => {
            let payload = json!({
                "removed": outcome.removed,
                "failed": outcome.failed,
                "bytes_freed": outcome.bytes_freed,
                "errors": outcome.errors,
            });
            send_result(writer, &request.id, payload).await;
        }
        Ok(Err(token_error)) => {
            send_error(writer, &request.id, token_error.to_string()).await;
        }
        Err(_) => {
            debug!("cleanup cancelled, skipping final result");
        }
    }
}

fn scan_event_payload(event: &ScanEvent) -> serde_json::Value {
    match event {
        ScanEvent::ScannerStart { scanner_id, label } => json!({
            "event": "scanner_start",
            "scanner_id": scanner_id,
            "label": label,
        }),
        ScanEvent::ScannerDone {
            scanner_id, label, ..
        } => json!({
            "event": "scanner_done",
            "scanner_id": scanner_id,
            "label": label,
        }),
        ScanEvent::ScannerError {
            scanner_id,
            label,
            err,
        } => json!({
            "event": "scanner_error",
            "scanner_id": scanner_id,
            "label": label,
            "err": err,
        }),
    }
}

fn cleanup_event_payload(event: &CleanupEvent) -> serde_json::Value {
    match event {
        CleanupEvent::CategoryStart {
            category_description,
        } => json!({
            "event": "cleanup_category_start",
            "category": category_description,
        }),
        CleanupEvent::Entry {
            category_description,
            entry_path,
            current_index,
            total_count,
        } => json!({
            "event": "cleanup_entry",
            "category": category_description,
            "entry_path": entry_path,
            "current": current_index,
            "total": total_count,
        }),
    }
}

async fn send_progress(
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    id: &str,
    event: serde_json::Value,
) {
    let response = Response::Progress {
        id: id.to_string(),
        event,
    };
    let mut guard = writer.lock().await;
    if let Err(err) = write_response(&mut *guard, &response).await {
        warn!(error = %err, "failed to write progress line");
    }
}

async fn send_result(
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    id: &str,
    payload: serde_json::Value,
) {
    let response = Response::Result {
        id: id.to_string(),
        payload,
    };
    let mut guard = writer.lock().await;
    if let Err(err) = write_response(&mut *guard, &response).await {
        warn!(error = %err, "failed to write result line");
    }
}

async fn send_error(
    writer: &Arc<AsyncMutex<tokio::net::unix::OwnedWriteHalf>>,
    id: &str,
    message: impl Into<String>,
) {
    let response = Response::Error {
        id: id.to_string(),
        message: message.into(),
    };
    let mut guard = writer.lock().await;
    if let Err(err) = write_response(&mut *guard, &response).await {
        warn!(error = %err, "failed to write error line");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryResult, RiskLevel, ScanEntry, ScannerInfo};
    use crate::scanner::{FnScanner, Scanner};
    use serde_json::Value;
    use std::fs;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

    fn mock_scanner(id: &str, category: &str) -> Box<dyn Scanner> {
        let category = category.to_string();
        Box::new(FnScanner::new(
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
                    category.clone(),
                    vec![ScanEntry::new(
                        format!("docker:{category}"),
                        "entry",
                        10,
                        RiskLevel::Safe,
                    )],
                    Vec::new(),
                )])
            },
        ))
    }

    async fn write_line(stream: &mut UnixStream, line: &str) {
        stream.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    }

    async fn read_line(stream: &mut tokio::io::BufReader<tokio::net::unix::OwnedReadHalf>) -> Value {
        let mut buf = String::new();
        stream.read_line(&mut buf).await.unwrap();
        serde_json::from_str(buf.trim_end()).unwrap()
    }

    #[tokio::test]
    async fn ping_and_categories_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(vec![mock_scanner("m", "cat-m")]));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        write_line(&mut write_half, r#"{"id":"1","method":"ping"}"#).await;
        let response = read_line(&mut reader).await;
        assert_eq!(response["kind"], "result");
        assert_eq!(response["id"], "1");
        assert!(response["version"].is_string());

        write_line(&mut write_half, r#"{"id":"2","method":"categories"}"#).await;
        let response = read_line(&mut reader).await;
        assert_eq!(response["scanners"][0]["id"], "m");

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn scan_streams_progress_then_one_result_with_token() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(vec![mock_scanner("m", "cat-m")]));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        write_line(&mut write_half, r#"{"id":"s1","method":"scan","params":{}}"#).await;

        let start = read_line(&mut reader).await;
        assert_eq!(start["kind"], "progress");
        assert_eq!(start["event"], "scanner_start");

        let done = read_line(&mut reader).await;
        assert_eq!(done["event"], "scanner_done");

        let result = read_line(&mut reader).await;
        assert_eq!(result["kind"], "result");
        assert!(result["token"].as_str().unwrap().len() > 0);
        assert_eq!(result["total_size"], 10);

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn skip_filters_categories_in_final_result_not_progress() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(vec![
            mock_scanner("a", "cat-a"),
            mock_scanner("b", "cat-b"),
        ]));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        write_line(
            &mut write_half,
            r#"{"id":"s1","method":"scan","params":{"skip":["cat-a"]}}"#,
        )
        .await;

        let mut saw_progress_for_both = (false, false);
        let mut result = None;
        loop {
            let msg = read_line(&mut reader).await;
            if msg["kind"] == "progress" {
                if msg["scanner_id"] == "a" {
                    saw_progress_for_both.0 = true;
                }
                if msg["scanner_id"] == "b" {
                    saw_progress_for_both.1 = true;
                }
            } else {
                result = Some(msg);
                break;
            }
        }

        assert!(saw_progress_for_both.0 && saw_progress_for_both.1);
        let result = result.unwrap();
        let categories = result["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0]["category"], "cat-b");
        assert!(!result["token"].as_str().unwrap().is_empty());

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn cleanup_without_token_is_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(Vec::new()));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        write_line(&mut write_half, r#"{"id":"c1","method":"cleanup","params":{}}"#).await;
        let response = read_line(&mut reader).await;
        assert_eq!(response["kind"], "error");
        assert_eq!(response["message"], "missing token");

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn unknown_method_replies_with_method_name() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(Vec::new()));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        write_line(&mut write_half, r#"{"id":"x","method":"frobnicate"}"#).await;
        let response = read_line(&mut reader).await;
        assert_eq!(response["kind"], "error");
        assert!(response["message"].as_str().unwrap().contains("frobnicate"));

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn shutdown_terminates_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(Vec::new()));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        write_line(&mut write_half, r#"{"id":"1","method":"shutdown"}"#).await;
        let response = read_line(&mut reader).await;
        assert_eq!(response["kind"], "result");
        assert_eq!(response["id"], "1");

        // The accept loop must actually stop, not just answer this one
        // request: wait for serve() to return on its own (no external
        // cancel() call from the test) and confirm a new connection can
        // no longer be established.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("serve() did not return after shutdown")
            .unwrap();

        assert!(!socket_path.exists());
        assert!(UnixStream::connect(&socket_path).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_cancels_other_in_flight_connections() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let (tx, rx) = std::sync::mpsc::channel();
        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(vec![blocking_scanner("blocker", rx)]));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream1 = UnixStream::connect(&socket_path).await.unwrap();
        let (read1, mut write1) = stream1.into_split();
        let mut reader1 = tokio::io::BufReader::new(read1);
        write_line(&mut write1, r#"{"id":"1","method":"scan"}"#).await;
        let progress = read_line(&mut reader1).await;
        assert_eq!(progress["event"], "scanner_start");

        let stream2 = UnixStream::connect(&socket_path).await.unwrap();
        let (read2, mut write2) = stream2.into_split();
        let mut reader2 = tokio::io::BufReader::new(read2);
        write_line(&mut write2, r#"{"id":"2","method":"shutdown"}"#).await;
        let response = read_line(&mut reader2).await;
        assert_eq!(response["kind"], "result");

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("serve() did not return after shutdown from a sibling connection")
            .unwrap();

        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn refuses_to_start_if_a_live_instance_is_listening() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(Vec::new()));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = IpcServer::bind(&socket_path).await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadyRunning(_)));

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn removes_stale_socket_file_and_binds_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("stale.sock");
        // Simulate a leftover file from a crashed prior instance: a
        // regular file, not a live listening socket.
        fs::write(&socket_path, b"not a socket").unwrap();

        let server = IpcServer::bind(&socket_path).await;
        assert!(server.is_ok());
    }

    #[tokio::test]
    async fn socket_file_has_owner_only_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("perm.sock");
        let _server = IpcServer::bind(&socket_path).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&socket_path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    /// A scanner that blocks until released, used to hold a scan open so a
    /// second, concurrent request can observe the busy gate (spec §8,
    /// Scenario D).
    fn blocking_scanner(id: &str, release: std::sync::mpsc::Receiver<()>) -> Box<dyn Scanner> {
        let release = parking_lot::Mutex::new(Some(release));
        Box::new(FnScanner::new(
            ScannerInfo {
                id: id.to_string(),
                name: id.to_string(),
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
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_scan_is_rejected_while_one_is_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("busy.sock");

        let (tx, rx) = std::sync::mpsc::channel();
        let server = IpcServer::bind(&socket_path).await.unwrap();
        let engine = Arc::new(Engine::new(vec![blocking_scanner("blocker", rx)]));
        let cancel = CancellationToken::new();
        let server_cancel = cancel.clone();
        let handle = tokio::spawn(async move { server.serve(engine, server_cancel).await });

        let stream1 = UnixStream::connect(&socket_path).await.unwrap();
        let (read1, mut write1) = stream1.into_split();
        let mut reader1 = tokio::io::BufReader::new(read1);
        write_line(&mut write1, r#"{"id":"1","method":"scan"}"#).await;
        let progress = read_line(&mut reader1).await;
        assert_eq!(progress["kind"], "progress");
        assert_eq!(progress["event"], "scanner_start");

        let stream2 = UnixStream::connect(&socket_path).await.unwrap();
        let (read2, mut write2) = stream2.into_split();
        let mut reader2 = tokio::io::BufReader::new(read2);
        write_line(&mut write2, r#"{"id":"2","method":"scan"}"#).await;
        let response2 = read_line(&mut reader2).await;
        assert_eq!(response2["kind"], "error");
        assert_eq!(response2["id"], "2");
        assert!(response2["message"]
            .as_str()
            .unwrap()
            .contains("another operation is in progress"));

        drop(tx);
        let result1 = read_line(&mut reader1).await;
        assert_eq!(result1["kind"], "result");
        assert_eq!(result1["id"], "1");
        assert!(result1["token"].is_string());

        cancel.cancel();
        let _ = handle.await;
    }
}
