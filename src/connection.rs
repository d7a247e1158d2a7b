// ABOUTME: Non-blocking frame I/O over a mio TcpStream
// ABOUTME: Shared by the pK router's per-client sessions and the client runtime

use crate::buffer::Buffer;
use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use std::io::{self, ErrorKind, Read, Write};

/// Wraps one non-blocking `TcpStream` with an inbound reassembly
/// buffer and an outbound write-staging buffer. There is no `async fn
/// read_frame` here — readiness is driven externally by the event
/// loop, and the caller decides when to attempt a frame decode against
/// whatever has accumulated so far.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    inbound: Buffer,
    outbound: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            inbound: Buffer::new(),
            outbound: BytesMut::new(),
        }
    }

    /// Obtain the underlying socket as a `mio::event::Source` for
    /// registration with an `EventLoop`.
    pub fn source(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn inbound(&mut self) -> &mut Buffer {
        &mut self.inbound
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Drain everything currently available on the socket into the
    /// inbound buffer. Returns `Ok(false)` once the peer has performed
    /// an orderly shutdown (EOF with no partial frame in flight left
    /// for the caller to worry about beyond the buffer as-is).
    pub fn read_ready(&mut self) -> io::Result<bool> {
        let mut tmp = [0u8; 4096];
        loop {
            match self.stream.read(&mut tmp) {
                Ok(0) => return Ok(false),
                Ok(n) => self.inbound.append(&tmp[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(true),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Write as much of the outbound buffer as the socket will accept
    /// right now, retaining whatever doesn't fit.
    pub fn write_ready(&mut self) -> io::Result<()> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => break,
                Ok(n) => self.outbound.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Queue a frame for sending and opportunistically flush. Per the
    /// send-path contract, correctness does not depend on this flush
    /// succeeding immediately — anything left over is written on the
    /// next writable notification.
    pub fn send_data(&mut self, frame_bytes: &[u8]) -> io::Result<()> {
        self.outbound.extend_from_slice(frame_bytes);
        self.write_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::{TcpListener, TcpStream as MioTcpStream};
    use std::net::TcpStream as StdTcpStream;

    fn loopback_pair() -> (Connection, StdTcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = StdTcpStream::connect(addr).unwrap();
        client.set_nonblocking(true).unwrap();

        // crude accept-spin since the listener isn't registered with a
        // poll in this unit test
        let mut accepted = None;
        for _ in 0..1000 {
            match listener.accept() {
                Ok((stream, _)) => {
                    accepted = Some(stream);
                    break;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => panic!("accept failed: {e}"),
            }
        }
        let server_stream = accepted.expect("connection should have been accepted");
        let server_stream = MioTcpStream::from_std(server_stream.into());
        (Connection::new(server_stream), client)
    }

    #[test]
    fn send_data_is_readable_on_the_peer() {
        let (mut conn, mut client) = loopback_pair();
        conn.send_data(b"hello").unwrap();

        let mut received = Vec::new();
        for _ in 0..1000 {
            let mut buf = [0u8; 64];
            match std::io::Read::read(&mut client, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    received.extend_from_slice(&buf[..n]);
                    break;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => panic!("read failed: {e}"),
            }
        }
        assert_eq!(received, b"hello");
    }

    #[test]
    fn read_ready_accumulates_into_inbound_buffer() {
        let (mut conn, mut client) = loopback_pair();
        std::io::Write::write_all(&mut client, b"abc").unwrap();

        // give the kernel a moment; in non-blocking mode retry a few times
        let mut still_open = true;
        for _ in 0..1000 {
            still_open = conn.read_ready().unwrap();
            if conn.inbound().length() > 0 {
                break;
            }
        }
        assert!(still_open);
        assert_eq!(conn.inbound().peek(3), b"abc");
    }
}
