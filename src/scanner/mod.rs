//! Scanner contract and the concrete scanners that implement it
//! (spec §4.3).
//!
//! A scanner is a capability pair: a pure function producing category
//! results, and a metadata accessor. [`FnScanner`] adapts a bare
//! closure plus a static [`ScannerInfo`] into the trait, for scanners
//! that need no state of their own.

pub mod app_leftovers;
pub mod browser;
pub mod creative;
pub mod dev_docker;
pub mod dev_junk;
pub mod dev_xcode;
pub mod messaging;
pub mod photos;
pub mod system_caches;
pub mod system_data;
pub mod system_logs;
pub mod system_snapshots;
pub mod system_vm;
pub mod trash;
pub mod unused_apps;

use crate::model::CategoryResult;
use crate::model::ScannerInfo;

/// Never modifies the filesystem. Treats "tool not installed" and
/// "directory does not exist" as a silent nil result, never an error.
pub trait Scanner: Send + Sync {
    fn info(&self) -> &ScannerInfo;
    fn scan(&self) -> anyhow::Result<Vec<CategoryResult>>;
}

/// Adapts a bare scan function plus a static info struct into a
/// [`Scanner`], for implementations with no internal state.
pub struct FnScanner<F> {
    info: ScannerInfo,
    func: F,
}

impl<F> FnScanner<F>
where
    F: Fn() -> anyhow::Result<Vec<CategoryResult>> + Send + Sync,
{
    pub fn new(info: ScannerInfo, func: F) -> Self {
        Self { info, func }
    }
}

impl<F> Scanner for FnScanner<F>
where
    F: Fn() -> anyhow::Result<Vec<CategoryResult>> + Send + Sync,
{
    fn info(&self) -> &ScannerInfo {
        &self.info
    }

    fn scan(&self) -> anyhow::Result<Vec<CategoryResult>> {
        (self.func)()
    }
}
