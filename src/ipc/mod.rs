//! Line-delimited JSON IPC protocol and server (spec.md §4.6, §4.7).

pub mod protocol;
pub mod server;

pub use protocol::{CleanupParams, ProtocolError, Request, Response, ScanParams};
pub use server::{IpcServer, ServerError};
