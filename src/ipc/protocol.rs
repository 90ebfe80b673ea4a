//! Line-delimited JSON wire protocol (spec.md §4.6, §6).
//!
//! One record per newline-terminated line. Every response carries the
//! `id` of the request it answers; `progress` may appear zero or more
//! times before the single terminating `result` or `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A client → server request. `params` is left as an opaque JSON value
/// here and deserialized per-method by the handler, since `scan` and
/// `cleanup` have distinct (and optional) parameter shapes.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// `scan` parameters: an optional set of category ids to drop from the
/// final result (spec.md §4.6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanParams {
    #[serde(default)]
    pub skip: Vec<String>,
}

/// `cleanup` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupParams {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Server → client response. Tagged on `kind` so a peer can route on
/// one field; unrecognized request `method`s never produce a `kind`
/// this enum can't express, since every response this server emits is
/// one of these three.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Response {
    Progress {
        id: String,
        #[serde(flatten)]
        event: Value,
    },
    Result {
        id: String,
        #[serde(flatten)]
        payload: Value,
    },
    Error {
        id: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads and parses the next request line from `reader`.
///
/// Per SPEC_FULL §9's buffered-reader pitfall note: callers must thread
/// the same `BufReader` through every request on a connection rather
/// than wrapping the raw stream anew each time, or bytes prefetched
/// past the last newline are lost.
pub async fn read_request<R>(reader: &mut BufReader<R>) -> Result<Request, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    let request: Request = serde_json::from_str(line.trim_end())?;
    Ok(request)
}

/// Serializes `response` and writes it as one newline-terminated line.
/// Callers must hold the connection's writer mutex across this call so
/// concurrent emissions never interleave at the byte level (spec.md
/// §4.6, §5).
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
