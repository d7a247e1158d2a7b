// ABOUTME: pK-side per-connection state: stream, reassembly buffer, owned ports
// ABOUTME: One instance per accepted connection; destroyed on disconnect

use crate::connection::Connection;
use crate::eventloop::SocketToken;
use std::collections::HashSet;
use std::io;

/// Server-side per-connection record. Holds the stream (via
/// [`Connection`], which carries its own inbound/outbound buffers) and
/// the set of ports this session currently owns.
pub struct Session {
    pub token: SocketToken,
    pub connection: Connection,
    pub ports: HashSet<u64>,
}

impl Session {
    pub fn new(token: SocketToken, connection: Connection) -> Self {
        Session {
            token,
            connection,
            ports: HashSet::new(),
        }
    }

    /// Queue `bytes` for delivery to this session's peer, flushing
    /// opportunistically.
    pub fn send_data(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.connection.send_data(bytes)
    }
}
