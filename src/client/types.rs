// ABOUTME: Client-side port and pending-request bookkeeping
// ABOUTME: The tables backing Runtime's p-call surface: local port state and in-flight requests

use crate::client::error::ClientResult;
use std::collections::VecDeque;

pub type Port = u64;

/// Range pK assigns ephemeral ports from; a requested port outside
/// this range that isn't 0 (meaning "assign me one") is still a valid
/// well-known port request — the range only bounds what the pK itself
/// hands out.
pub const EPHEMERAL_PORT_START: u64 = 16384;

/// Client-local view of one of the client's ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Reserved locally; `OpenPortRequest` sent, response not yet back.
    HalfOpen,
    /// Confirmed open by the pK.
    Open,
    /// `ClosePortRequest` sent, response not yet back.
    HalfClosed,
}

/// Client-side record of one locally opened port: its confirmed (or
/// pending) status, and a FIFO of payloads delivered but not yet
/// consumed by the application via `receive_message`.
#[derive(Debug)]
pub struct LocalPortState {
    pub port: Port,
    pub status: PortStatus,
    pub pending_payloads: VecDeque<bytes::Bytes>,
}

impl LocalPortState {
    pub fn new(port: Port, status: PortStatus) -> Self {
        LocalPortState {
            port,
            status,
            pending_payloads: VecDeque::new(),
        }
    }
}

/// What kind of request a `PendingRequest` is waiting on a response
/// for, so the runtime can tell a misrouted response (right
/// `request_id`, wrong frame kind) from a legitimate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    OpenPort,
    ClosePort,
}

/// A completion callback for an asynchronous p-call: the assigned (or
/// already-known) port on success, or the error that failed it.
pub type Completion = Box<dyn FnOnce(ClientResult<Port>)>;

/// Client-side record of an in-flight request, keyed by `request_id`
/// in the runtime's pending-request table.
pub struct PendingRequest {
    pub request_id: u32,
    pub kind: PendingKind,
    pub completion: Option<Completion>,
    pub result: Option<ClientResult<Port>>,
}

impl PendingRequest {
    pub fn new(request_id: u32, kind: PendingKind, completion: Option<Completion>) -> Self {
        PendingRequest {
            request_id,
            kind,
            completion,
            result: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("request_id", &self.request_id)
            .field("kind", &self.kind)
            .field("result", &self.result)
            .finish()
    }
}
