// ABOUTME: SIGTERM/SIGINT delivery wired into the router's own event loop
// ABOUTME: A regular pollable source rather than a signal handler racing the main thread

use crate::eventloop::{EventLoop, SocketToken};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_mio::v0_8::Signals;
use std::io;

/// Registers SIGTERM/SIGINT with the event loop as an ordinary
/// readable source, so the router learns about a shutdown request the
/// same way it learns about a socket becoming readable — no separate
/// polling thread, no async-signal-safety concerns.
pub struct SignalWatcher {
    signals: Signals,
    token: SocketToken,
}

impl SignalWatcher {
    /// Generic over `L: EventLoop` rather than `&mut dyn EventLoop`: the
    /// trait's `run` method is generic over its dispatch closure, which
    /// would otherwise make it non-object-safe.
    pub fn register<L: EventLoop>(event_loop: &mut L) -> io::Result<Self> {
        let mut signals = Signals::new([SIGTERM, SIGINT])?;
        let token = event_loop.add_socket(&mut signals).map_err(io::Error::other)?;
        Ok(SignalWatcher { signals, token })
    }

    pub fn token(&self) -> SocketToken {
        self.token
    }

    /// Call once `token()` reports readable. Returns `true` if a
    /// termination signal was among the pending set.
    pub fn shutdown_requested(&mut self) -> bool {
        self.signals.pending().any(|s| s == SIGTERM || s == SIGINT)
    }
}
