// ABOUTME: Event loop abstraction shared by the client runtime and the pK router
// ABOUTME: A single small capability — readiness, timers, deferred work — with one concrete backend

//! Event loop abstraction.
//!
//! Both the client runtime and the pK router are single-threaded,
//! cooperatively scheduled processes built around one [`EventLoop`] per
//! process. The trait captures exactly the operations the rest of the
//! crate needs: socket readiness, timers, and deferred (end-of-iteration)
//! callbacks. [`mio_loop::MioEventLoop`] is the concrete implementation
//! used by both the daemon and the client; a GUI-toolkit-integrated loop
//! for lens processes would be a second implementation of this same
//! trait, but lenses are outside the scope of this crate.
//!
//! Rather than invoking per-socket callback objects, `run`/`poll_once`
//! hand back a batch of [`LoopEvent`] values rather than
//! invoking per-socket callback objects. Both the router and the client
//! runtime own their event loop as a field alongside their own mutable
//! state; returning events as plain data lets each dispatch into that
//! state with an ordinary `&mut self` method instead of needing a
//! listener trait object that would have to hold a second handle back
//! onto the owner (see DESIGN.md).

mod mio_loop;

pub use mio_loop::MioEventLoop;

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Opaque handle to a socket registered with an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketToken(pub usize);

/// Opaque handle to a timer registered with an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// A notification produced by one iteration of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// The socket identified by this token has data available to read.
    Readable(SocketToken),
    /// The socket identified by this token can accept more written data.
    Writable(SocketToken),
    /// The timer identified by this id has elapsed.
    Timeout {
        id: TimerId,
        scheduled: Instant,
        actual: Instant,
    },
}

#[derive(Debug, Error)]
pub enum EventLoopError {
    #[error("socket already registered")]
    DuplicateSocket,
    #[error("socket not registered")]
    UnknownSocket,
    #[error("i/o error registering with the loop: {0}")]
    Io(#[from] std::io::Error),
}

/// A handle that lets code invoked *from inside* a dispatch loop request
/// that the loop stop at the next iteration boundary, without needing a
/// second mutable borrow of the [`EventLoop`] itself.
#[derive(Debug, Clone)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    fn new(cell: Rc<Cell<bool>>) -> Self {
        StopHandle(cell)
    }

    /// Request that the owning loop stop at the next iteration boundary.
    pub fn request_stop(&self) {
        self.0.set(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.get()
    }
}

/// Capability used by both the client runtime and the pK router to
/// multiplex socket readiness, timers, and deferred work on a single
/// thread.
pub trait EventLoop {
    /// Monitor `source` for readiness. Duplicate registration of an
    /// already-tracked source (identified by its raw fd) is an error.
    /// Generic rather than `&mut dyn` — as with `run` below, keeping the
    /// trait object-unsafe costs nothing since nothing needs `dyn
    /// EventLoop`, and `AsRawFd` is what implementations use to detect
    /// duplicates.
    fn add_socket<S: mio::event::Source + std::os::fd::AsRawFd>(
        &mut self,
        source: &mut S,
    ) -> Result<SocketToken, EventLoopError>;

    /// Stop monitoring `token`/`source`. Errors if `token` was not
    /// registered.
    fn cancel_socket<S: mio::event::Source + std::os::fd::AsRawFd>(
        &mut self,
        token: SocketToken,
        source: &mut S,
    ) -> Result<(), EventLoopError>;

    /// Arm a single-shot timer that fires after `duration` has elapsed.
    /// Re-arming (if desired) is the caller's responsibility once the
    /// timer fires.
    fn add_timer(&mut self, duration: Duration) -> TimerId;

    /// Cancel a previously armed timer. Idempotent: cancelling an
    /// already-fired or unknown id is not an error.
    fn cancel_timer(&mut self, id: TimerId) -> bool;

    /// Schedule `callback`-less work for the end of the current
    /// iteration. Implemented as a zero-duration timer.
    fn add_deferred(&mut self) -> TimerId;

    /// Run one iteration: block for readiness or until the next timer's
    /// expiry (whichever is sooner), then return everything that fired,
    /// in the order: all readable, then all writable, then all expired
    /// timers (earliest expiry first, ties broken by registration order).
    fn poll_once(&mut self, timeout: Option<Duration>) -> std::io::Result<Vec<LoopEvent>>;

    /// Repeatedly call `poll_once`, handing each event to `dispatch`,
    /// until [`EventLoop::stop`] is called or a [`StopHandle`] obtained
    /// via [`EventLoop::stop_handle`] requests it.
    fn run<F: FnMut(LoopEvent)>(&mut self, dispatch: F) -> std::io::Result<()>;

    /// Stop the loop at the next iteration boundary.
    fn stop(&mut self);

    /// Obtain a handle that dispatch code can use to call [`EventLoop::stop`]
    /// without a second mutable borrow of the loop.
    fn stop_handle(&self) -> StopHandle;
}
