// ABOUTME: Ambient service-process concerns: logging, signals, pidfile, boot-environment lookups

pub mod boot;
pub mod logging;
pub mod pidfile;
pub mod signals;

pub use pidfile::PidFile;
pub use signals::SignalWatcher;
