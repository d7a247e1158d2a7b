// ABOUTME: tracing subscriber setup for the router and client binaries
// ABOUTME: Switches format based on whether the process was launched under a service manager

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber.
///
/// When `INVOCATION_ID` is set (systemd sets it for units it starts)
/// journald already timestamps and indexes each line, so a bare
/// level+message format is used. Otherwise a human-reading terminal
/// gets full timestamps. Verbosity is controlled the usual way, via
/// `RUST_LOG`, defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let under_service_manager = std::env::var_os("INVOCATION_ID").is_some();

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if under_service_manager {
        builder.without_time().init();
    } else {
        builder.init();
    }
}
