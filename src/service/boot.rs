// ABOUTME: Environment lookups shared by boot-time tooling around the router
// ABOUTME: Peripheral: the router itself never reads these, only the launcher that starts it

use std::env;
use std::path::PathBuf;

/// Root of the installation tree, used by boot scripts to locate
/// service manifests and well-known binaries. Falls back to the
/// current directory when unset, which is convenient for running the
/// daemon straight out of a build directory during development.
pub fn darq_root() -> PathBuf {
    env::var_os("DARQ_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// True when a service manager set `INVOCATION_ID` for this process,
/// meaning stdout/stderr are already being captured structurally and
/// don't need local timestamps. Shared with [`crate::service::logging`].
pub fn launched_by_service_manager() -> bool {
    env::var_os("INVOCATION_ID").is_some()
}
