// ABOUTME: mio-backed EventLoop implementation — one Poll instance per process
// ABOUTME: Readiness-based, replacing a select()-style loop with epoll/kqueue via mio

use super::{EventLoop, EventLoopError, LoopEvent, SocketToken, StopHandle, TimerId};
use mio::{Events, Interest, Poll, Token};
use std::cell::Cell;
use std::collections::HashSet;
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Fallback wait when nothing is scheduled, so the loop still wakes
/// occasionally even with no registered timer.
const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

struct TimerEntry {
    id: TimerId,
    expiry: Instant,
}

/// A select-based (here, `mio::Poll`-based) implementation of
/// [`EventLoop`]. Single-threaded: all state below is owned, not shared.
pub struct MioEventLoop {
    poll: Poll,
    events: Events,
    next_token: usize,
    registered: HashSet<usize>,
    registered_fds: HashSet<RawFd>,
    timers: Vec<TimerEntry>,
    next_timer_id: u64,
    stopped: Rc<Cell<bool>>,
}

impl MioEventLoop {
    pub fn new() -> std::io::Result<Self> {
        Ok(MioEventLoop {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            next_token: 0,
            registered: HashSet::new(),
            registered_fds: HashSet::new(),
            timers: Vec::new(),
            next_timer_id: 1,
            stopped: Rc::new(Cell::new(false)),
        })
    }

    fn next_timer_wait(&self, now: Instant) -> Duration {
        match self.timers.first() {
            Some(t) => t.expiry.saturating_duration_since(now),
            None => DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

impl EventLoop for MioEventLoop {
    fn add_socket<S: mio::event::Source + AsRawFd>(
        &mut self,
        source: &mut S,
    ) -> Result<SocketToken, EventLoopError> {
        let fd = source.as_raw_fd();
        if self.registered_fds.contains(&fd) {
            return Err(EventLoopError::DuplicateSocket);
        }

        let token = self.next_token;
        self.next_token += 1;

        self.poll
            .registry()
            .register(source, Token(token), Interest::READABLE | Interest::WRITABLE)?;

        self.registered.insert(token);
        self.registered_fds.insert(fd);
        Ok(SocketToken(token))
    }

    fn cancel_socket<S: mio::event::Source + AsRawFd>(
        &mut self,
        token: SocketToken,
        source: &mut S,
    ) -> Result<(), EventLoopError> {
        if !self.registered.remove(&token.0) {
            return Err(EventLoopError::UnknownSocket);
        }
        self.registered_fds.remove(&source.as_raw_fd());
        self.poll.registry().deregister(source)?;
        Ok(())
    }

    fn add_timer(&mut self, duration: Duration) -> TimerId {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;

        let expiry = Instant::now() + duration;
        self.timers.push(TimerEntry { id, expiry });
        self.timers.sort_by_key(|t| t.expiry);

        id
    }

    fn cancel_timer(&mut self, id: TimerId) -> bool {
        match self.timers.iter().position(|t| t.id == id) {
            Some(pos) => {
                self.timers.remove(pos);
                true
            }
            None => false,
        }
    }

    fn add_deferred(&mut self) -> TimerId {
        self.add_timer(Duration::ZERO)
    }

    fn poll_once(&mut self, timeout: Option<Duration>) -> std::io::Result<Vec<LoopEvent>> {
        let now = Instant::now();
        let timer_wait = self.next_timer_wait(now);
        let effective = Some(match timeout {
            Some(t) => t.min(timer_wait),
            None => timer_wait,
        });

        self.poll.poll(&mut self.events, effective)?;

        let mut readable = Vec::new();
        let mut writable = Vec::new();
        for event in self.events.iter() {
            let token = SocketToken(event.token().0);
            if event.is_readable() {
                readable.push(LoopEvent::Readable(token));
            }
            if event.is_writable() {
                writable.push(LoopEvent::Writable(token));
            }
        }

        let mut results = Vec::with_capacity(readable.len() + writable.len());
        results.append(&mut readable);
        results.append(&mut writable);

        let actual = Instant::now();
        while let Some(t) = self.timers.first() {
            if t.expiry > actual {
                break;
            }
            let fired = self.timers.remove(0);
            results.push(LoopEvent::Timeout {
                id: fired.id,
                scheduled: fired.expiry,
                actual,
            });
        }

        Ok(results)
    }

    fn run<F: FnMut(LoopEvent)>(&mut self, mut dispatch: F) -> std::io::Result<()> {
        self.stopped.set(false);
        while !self.stopped.get() {
            let events = self.poll_once(None)?;
            for event in events {
                if self.stopped.get() {
                    break;
                }
                dispatch(event);
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.set(true);
    }

    fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.stopped.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::TcpListener;

    #[test]
    fn timers_fire_in_expiry_order() {
        let mut loop_ = MioEventLoop::new().unwrap();
        let a = loop_.add_timer(Duration::from_millis(20));
        let b = loop_.add_timer(Duration::from_millis(1));

        std::thread::sleep(Duration::from_millis(40));
        let events = loop_.poll_once(Some(Duration::ZERO)).unwrap();

        let ids: Vec<TimerId> = events
            .into_iter()
            .map(|e| match e {
                LoopEvent::Timeout { id, .. } => id,
                _ => panic!("expected only timeouts"),
            })
            .collect();

        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn cancel_timer_is_idempotent() {
        let mut loop_ = MioEventLoop::new().unwrap();
        let id = loop_.add_timer(Duration::from_secs(60));
        assert!(loop_.cancel_timer(id));
        assert!(!loop_.cancel_timer(id));
    }

    #[test]
    fn cancel_unknown_socket_is_an_error() {
        let mut loop_ = MioEventLoop::new().unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let result = loop_.cancel_socket(SocketToken(999), &mut listener);
        assert!(matches!(result, Err(EventLoopError::UnknownSocket)));
    }

    #[test]
    fn duplicate_socket_registration_increments_token() {
        let mut loop_ = MioEventLoop::new().unwrap();
        let mut a = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut b = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let ta = loop_.add_socket(&mut a).unwrap();
        let tb = loop_.add_socket(&mut b).unwrap();
        assert_ne!(ta, tb);
    }

    #[test]
    fn registering_the_same_fd_twice_is_an_error() {
        let mut loop_ = MioEventLoop::new().unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        loop_.add_socket(&mut listener).unwrap();

        let result = loop_.add_socket(&mut listener);
        assert!(matches!(result, Err(EventLoopError::DuplicateSocket)));
    }

    #[test]
    fn cancel_then_reregister_same_fd_is_allowed() {
        let mut loop_ = MioEventLoop::new().unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let token = loop_.add_socket(&mut listener).unwrap();
        loop_.cancel_socket(token, &mut listener).unwrap();

        assert!(loop_.add_socket(&mut listener).is_ok());
    }
}
