// ABOUTME: Process-wide client state — the p-call surface — owned by the embedding application
// ABOUTME: An owned handle rather than a module-level singleton, so a process can hold more than one

use crate::buffer::Buffer;
use crate::client::error::{ClientError, ClientResult};
use crate::client::listener::Listener;
use crate::client::types::{Completion, LocalPortState, PendingKind, PendingRequest, Port, PortStatus};
use crate::codec::{CodecError, Encodable};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::eventloop::{EventLoop, LoopEvent, MioEventLoop, SocketToken};
use crate::frame::{decode_frame, ClosePortRequest, Frame, OpenPortRequest, SendMessage};
use crate::result_code;
use bytes::Bytes;
use mio::net::TcpStream as MioTcpStream;
use std::collections::HashMap;
use std::io;
use std::net::TcpStream as StdTcpStream;
use std::time::Duration;

/// Per-process client state: the stream to the pK (lazily connected),
/// the local port table, the pending-request table, the request id
/// counter, the inbound reassembly buffer, and an optional listener.
pub struct Runtime {
    config: ClientConfig,
    event_loop: MioEventLoop,
    connection: Option<Connection>,
    socket_token: Option<SocketToken>,
    ports: HashMap<Port, LocalPortState>,
    pending: HashMap<u32, PendingRequest>,
    next_request_id: u32,
    listener: Option<Box<dyn Listener>>,
}

impl Runtime {
    pub fn new(config: ClientConfig) -> io::Result<Self> {
        Ok(Runtime {
            config,
            event_loop: MioEventLoop::new()?,
            connection: None,
            socket_token: None,
            ports: HashMap::new(),
            pending: HashMap::new(),
            next_request_id: 1,
            listener: None,
        })
    }

    pub fn set_listener(&mut self, listener: Box<dyn Listener>) {
        self.listener = Some(listener);
    }

    fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    /// Establish the stream if it isn't already connected. The first
    /// p-call that needs the stream pays this cost; subsequent calls
    /// are no-ops until the connection is lost.
    pub fn ensure_connected(&mut self) -> ClientResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let std_stream = StdTcpStream::connect(self.config.server_addr)?;
        std_stream.set_nonblocking(true)?;
        let mut mio_stream = MioTcpStream::from_std(std_stream);

        let token = self
            .event_loop
            .add_socket(&mut mio_stream)
            .map_err(io::Error::other)?;
        self.socket_token = Some(token);
        self.connection = Some(Connection::new(mio_stream));
        Ok(())
    }

    fn write_frame_bytes(&mut self, bytes: &[u8]) -> ClientResult<()> {
        let connection = self.connection.as_mut().ok_or(ClientError::ConnectionLost)?;
        connection.send_data(bytes)?;
        Ok(())
    }

    // --- open_port -------------------------------------------------

    pub fn open_port(&mut self, requested: Port) -> ClientResult<Port> {
        let request_id = self.begin_open_port(requested, None)?;
        self.pump_until_complete(request_id)
    }

    pub fn open_port_async(&mut self, requested: Port, completion: Completion) -> ClientResult<()> {
        self.begin_open_port(requested, Some(completion))?;
        Ok(())
    }

    fn begin_open_port(&mut self, requested: Port, completion: Option<Completion>) -> ClientResult<u32> {
        if requested != 0 && self.ports.contains_key(&requested) {
            return Err(ClientError::DuplicatePort);
        }

        self.ensure_connected()?;
        let request_id = self.next_request_id();

        if requested != 0 {
            self.ports
                .insert(requested, LocalPortState::new(requested, PortStatus::HalfOpen));
        }
        self.pending.insert(
            request_id,
            PendingRequest::new(request_id, PendingKind::OpenPort, completion),
        );

        let frame = OpenPortRequest {
            request_id,
            requested_port: requested,
        };
        if let Err(e) = self.write_frame_bytes(&frame.to_bytes()) {
            self.pending.remove(&request_id);
            if requested != 0 {
                self.ports.remove(&requested);
            }
            return Err(e);
        }
        Ok(request_id)
    }

    // --- close_port --------------------------------------------------

    pub fn close_port(&mut self, port: Port) -> ClientResult<()> {
        let request_id = self.begin_close_port(port, None)?;
        self.pump_until_complete(request_id).map(|_| ())
    }

    pub fn close_port_async(&mut self, port: Port, completion: Completion) -> ClientResult<()> {
        self.begin_close_port(port, Some(completion))?;
        Ok(())
    }

    fn begin_close_port(&mut self, port: Port, completion: Option<Completion>) -> ClientResult<u32> {
        {
            let state = self
                .ports
                .get_mut(&port)
                .ok_or(ClientError::NonExistentPort(port))?;
            state.status = PortStatus::HalfClosed;
        }

        self.ensure_connected()?;
        let request_id = self.next_request_id();
        self.pending.insert(
            request_id,
            PendingRequest::new(request_id, PendingKind::ClosePort, completion),
        );

        let frame = ClosePortRequest { request_id, port };
        self.write_frame_bytes(&frame.to_bytes())?;
        Ok(request_id)
    }

    // --- send_message / receive_message -----------------------------

    pub fn send_message(
        &mut self,
        source: Port,
        destination: Port,
        payload: impl Into<Bytes>,
    ) -> ClientResult<()> {
        match self.ports.get(&source) {
            Some(state) if state.status == PortStatus::Open => {}
            _ => return Err(ClientError::NonExistentPort(source)),
        }

        self.ensure_connected()?;
        let frame = SendMessage {
            source,
            destination,
            payload: payload.into(),
        };
        self.write_frame_bytes(&frame.to_bytes())
    }

    pub fn receive_message(&mut self, port: Port, blocking: bool) -> ClientResult<Option<Bytes>> {
        loop {
            match self.ports.get_mut(&port) {
                Some(state) => {
                    if let Some(payload) = state.pending_payloads.pop_front() {
                        return Ok(Some(payload));
                    }
                }
                None => return Err(ClientError::NonExistentPort(port)),
            }

            if !blocking {
                return Ok(None);
            }
            self.pump_once(None)?;
        }
    }

    // --- event loop pumping ------------------------------------------

    fn pump_until_complete(&mut self, request_id: u32) -> ClientResult<Port> {
        loop {
            match self.pending.get(&request_id) {
                Some(pending) if pending.is_complete() => {
                    let pending = self.pending.remove(&request_id).unwrap();
                    return pending.result.unwrap();
                }
                Some(_) => {}
                None => return Err(ClientError::ConnectionLost),
            }
            self.pump_once(None)?;
        }
    }

    /// Drive the event loop through one iteration, dispatching whatever
    /// becomes ready (responses, deliveries, connection loss). The
    /// blocking p-calls use this internally; applications built around
    /// the `_async` p-calls call it themselves to make progress.
    pub fn pump(&mut self, timeout: Option<Duration>) -> ClientResult<()> {
        self.pump_once(timeout)
    }

    fn pump_once(&mut self, timeout: Option<Duration>) -> ClientResult<()> {
        let events = self.event_loop.poll_once(timeout)?;
        for event in events {
            match event {
                LoopEvent::Readable(token) if Some(token) == self.socket_token => {
                    self.on_readable()?
                }
                LoopEvent::Writable(token) if Some(token) == self.socket_token => {
                    self.on_writable()?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn on_readable(&mut self) -> ClientResult<()> {
        let still_open = {
            let connection = self.connection.as_mut().ok_or(ClientError::ConnectionLost)?;
            connection.read_ready()?
        };
        self.drain_frames()?;
        if !still_open {
            self.handle_connection_lost();
        }
        Ok(())
    }

    fn on_writable(&mut self) -> ClientResult<()> {
        let connection = self.connection.as_mut().ok_or(ClientError::ConnectionLost)?;
        connection.write_ready()?;
        Ok(())
    }

    fn drain_frames(&mut self) -> ClientResult<()> {
        loop {
            let decoded = {
                let connection = match self.connection.as_mut() {
                    Some(c) => c,
                    None => return Ok(()),
                };
                decode_frame(connection.inbound().as_slice())
            };

            match decoded {
                Ok((frame, consumed)) => {
                    if let Some(connection) = self.connection.as_mut() {
                        connection.inbound().consume(consumed);
                    }
                    self.handle_incoming_frame(frame);
                }
                Err(CodecError::Incomplete) => return Ok(()),
                Err(e) => {
                    self.report_error(ClientError::MalformedFrame(e));
                    self.handle_connection_lost();
                    return Ok(());
                }
            }
        }
    }

    fn handle_incoming_frame(&mut self, frame: Frame) {
        match frame {
            Frame::OpenPortResponse(resp) => {
                let Some(mut pending) = self.pending.remove(&resp.request_id) else {
                    self.report_error(ClientError::UnknownRequestId(resp.request_id));
                    return;
                };
                if pending.kind != PendingKind::OpenPort {
                    self.report_error(ClientError::UnexpectedResponse {
                        expected: crate::message_type::MessageType::ClosePortResponse,
                        actual: crate::message_type::MessageType::OpenPortResponse,
                    });
                    return;
                }

                let result = if resp.result == result_code::OK {
                    self.ports
                        .entry(resp.port)
                        .or_insert_with(|| LocalPortState::new(resp.port, PortStatus::Open))
                        .status = PortStatus::Open;
                    Ok(resp.port)
                } else {
                    self.ports.remove(&resp.port);
                    Err(ClientError::DuplicatePort)
                };

                if let Some(completion) = pending.completion.take() {
                    completion(result);
                } else {
                    pending.result = Some(result);
                    self.pending.insert(resp.request_id, pending);
                }
            }
            Frame::ClosePortResponse(resp) => {
                let Some(mut pending) = self.pending.remove(&resp.request_id) else {
                    self.report_error(ClientError::UnknownRequestId(resp.request_id));
                    return;
                };
                if pending.kind != PendingKind::ClosePort {
                    self.report_error(ClientError::UnexpectedResponse {
                        expected: crate::message_type::MessageType::OpenPortResponse,
                        actual: crate::message_type::MessageType::ClosePortResponse,
                    });
                    return;
                }

                let result = if resp.result == result_code::OK {
                    self.ports.remove(&resp.port);
                    Ok(resp.port)
                } else {
                    if let Some(state) = self.ports.get_mut(&resp.port) {
                        state.status = PortStatus::Open;
                    }
                    Err(ClientError::NonExistentPort(resp.port))
                };

                if let Some(completion) = pending.completion.take() {
                    completion(result);
                } else {
                    pending.result = Some(result);
                    self.pending.insert(resp.request_id, pending);
                }
            }
            Frame::DeliverMessage(msg) => {
                let delivered = match self.ports.get_mut(&msg.destination) {
                    Some(state) if state.status == PortStatus::Open => {
                        state.pending_payloads.push_back(msg.payload.clone());
                        true
                    }
                    _ => false,
                };
                if delivered {
                    if let Some(listener) = &mut self.listener {
                        listener.on_message(msg.source, msg.destination, msg.payload);
                    }
                } else {
                    self.report_error(ClientError::NonExistentPort(msg.destination));
                }
            }
            other => {
                tracing::warn!(message_type = ?other.message_type(), "unexpected frame from pK");
            }
        }
    }

    fn report_error(&mut self, error: ClientError) {
        if let Some(listener) = &mut self.listener {
            listener.on_error(error);
        } else {
            tracing::error!(%error, "client error with no listener installed");
        }
    }

    fn handle_connection_lost(&mut self) {
        if let (Some(token), Some(connection)) =
            (self.socket_token.take(), self.connection.as_mut())
        {
            let _ = self.event_loop.cancel_socket(token, connection.source());
        }
        self.connection = None;
        for (_, pending) in self.pending.drain() {
            if let Some(completion) = pending.completion {
                completion(Err(ClientError::ConnectionLost));
            }
        }
        self.report_error(ClientError::ConnectionLost);
    }
}
