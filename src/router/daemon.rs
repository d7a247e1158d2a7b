// ABOUTME: pK router — accept loop, port registry, message dispatch, lifecycle
// ABOUTME: Dispatch runs as plain &mut self methods over events poll_once returns as owned data

use crate::codec::{CodecError, Encodable};
use crate::config::RouterConfig;
use crate::connection::Connection;
use crate::eventloop::{EventLoop, LoopEvent, MioEventLoop, SocketToken, StopHandle};
use crate::frame::{
    decode_frame, ClosePortRequest, ClosePortResponse, DeliverMessage, Frame, OpenPortRequest,
    OpenPortResponse, SendMessage,
};
use crate::result_code;
use crate::router::error::RouterError;
use crate::router::registry::PortRegistry;
use crate::router::session::Session;
use crate::service::signals::SignalWatcher;
use mio::net::TcpListener;
use std::collections::HashMap;
use std::io::{self, ErrorKind};

fn detect_platform() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// The pK daemon. Global state lives here directly — sessions and the
/// port registry are owned by the router, not shared behind `Arc<Mutex<_>>`,
/// per the single-threaded cooperative scheduling model.
pub struct Router {
    config: RouterConfig,
    event_loop: MioEventLoop,
    listener: TcpListener,
    listener_token: SocketToken,
    sessions: HashMap<SocketToken, Session>,
    registry: PortRegistry,
    platform_banner: String,
    signal_watcher: Option<SignalWatcher>,
}

impl Router {
    pub fn bind(config: RouterConfig) -> io::Result<Self> {
        let mut event_loop = MioEventLoop::new()?;
        let mut listener = TcpListener::bind(config.bind_addr)?;
        let listener_token = event_loop
            .add_socket(&mut listener)
            .map_err(io::Error::other)?;

        let signal_watcher = match SignalWatcher::register(&mut event_loop) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "failed to install signal handling, SIGTERM/SIGINT will not trigger shutdown");
                None
            }
        };

        let platform_banner = detect_platform();
        tracing::info!(
            bind_addr = %config.bind_addr,
            platform = %platform_banner,
            "pK router listening"
        );

        Ok(Router {
            config,
            event_loop,
            listener,
            listener_token,
            sessions: HashMap::new(),
            registry: PortRegistry::new(),
            platform_banner,
            signal_watcher,
        })
    }

    pub fn platform_banner(&self) -> &str {
        &self.platform_banner
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.event_loop.stop_handle()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Run until a `Shutdown` p-call (or an external `StopHandle`)
    /// stops the loop. Each iteration's events are collected as plain
    /// data by `poll_once` and then dispatched here with ordinary
    /// `&mut self` access — see the `eventloop` module docs for why
    /// this avoids a listener-trait-object callback cycle.
    pub fn run(&mut self) -> io::Result<()> {
        let stop_handle = self.stop_handle();
        while !stop_handle.is_stop_requested() {
            let events = self.event_loop.poll_once(None)?;
            for event in events {
                self.dispatch_event(event);
            }
        }
        Ok(())
    }

    fn dispatch_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Readable(token) if token == self.listener_token => self.accept(),
            LoopEvent::Readable(token) if self.is_signal_token(token) => {
                self.on_signal_readable();
            }
            LoopEvent::Readable(token) => self.on_session_readable(token),
            LoopEvent::Writable(token) => self.on_session_writable(token),
            LoopEvent::Timeout { .. } => {
                tracing::debug!("deferred/timer event fired with no registered handler");
            }
        }
    }

    fn is_signal_token(&self, token: SocketToken) -> bool {
        self.signal_watcher
            .as_ref()
            .is_some_and(|watcher| watcher.token() == token)
    }

    fn on_signal_readable(&mut self) {
        let shutdown = self
            .signal_watcher
            .as_mut()
            .is_some_and(|watcher| watcher.shutdown_requested());
        if shutdown {
            tracing::info!("termination signal received");
            self.handle_shutdown();
        }
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => match self.event_loop.add_socket(&mut stream) {
                    Ok(token) => {
                        tracing::debug!(%addr, "accepted connection");
                        self.sessions
                            .insert(token, Session::new(token, Connection::new(stream)));
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to register accepted socket"),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn on_session_readable(&mut self, token: SocketToken) {
        let outcome = match self.sessions.get_mut(&token) {
            Some(session) => session.connection.read_ready(),
            None => return,
        };

        match outcome {
            Ok(true) => self.drain_session(token),
            Ok(false) => {
                self.drain_session(token);
                self.disconnect(token);
            }
            Err(e) => {
                tracing::debug!(error = %e, "read error, disconnecting session");
                self.disconnect(token);
            }
        }
    }

    fn on_session_writable(&mut self, token: SocketToken) {
        if let Some(session) = self.sessions.get_mut(&token) {
            if let Err(e) = session.connection.write_ready() {
                tracing::debug!(error = %e, "write error, disconnecting session");
                self.disconnect(token);
            }
        }
    }

    /// Drain and dispatch as many complete frames as the session's
    /// reassembly buffer currently holds. A malformed frame terminates
    /// only this session; other sessions are unaffected.
    fn drain_session(&mut self, token: SocketToken) {
        loop {
            let decoded = {
                let session = match self.sessions.get_mut(&token) {
                    Some(s) => s,
                    None => return,
                };
                decode_frame(session.connection.inbound().as_slice())
            };

            match decoded {
                Ok((frame, consumed)) => {
                    if let Some(session) = self.sessions.get_mut(&token) {
                        session.connection.inbound().consume(consumed);
                    }
                    self.handle_frame(token, frame);
                    if !self.sessions.contains_key(&token) {
                        return;
                    }
                }
                Err(CodecError::Incomplete) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed frame, disconnecting session");
                    self.disconnect(token);
                    return;
                }
            }
        }
    }

    fn handle_frame(&mut self, token: SocketToken, frame: Frame) {
        match frame {
            Frame::OpenPortRequest(req) => self.handle_open_port(token, req),
            Frame::ClosePortRequest(req) => self.handle_close_port(token, req),
            Frame::SendMessage(msg) => self.handle_send_message(msg),
            Frame::Reboot(_) => self.handle_reboot(),
            Frame::Shutdown(_) => self.handle_shutdown(),
            other => {
                tracing::warn!(message_type = ?other.message_type(), "unexpected frame, discarding");
            }
        }
    }

    fn handle_open_port(&mut self, token: SocketToken, req: OpenPortRequest) {
        let port = if req.requested_port == 0 {
            match self
                .registry
                .allocate_ephemeral(self.config.ephemeral_range.clone())
            {
                Some(port) => port,
                None => {
                    self.reply(
                        token,
                        OpenPortResponse {
                            request_id: req.request_id,
                            result: result_code::CANNOT_ALLOCATE,
                            port: 0,
                        },
                    );
                    return;
                }
            }
        } else {
            req.requested_port
        };

        match self.registry.register(port, token) {
            Ok(()) => {
                if let Some(session) = self.sessions.get_mut(&token) {
                    session.ports.insert(port);
                }
                self.reply(
                    token,
                    OpenPortResponse {
                        request_id: req.request_id,
                        result: result_code::OK,
                        port,
                    },
                );
            }
            Err(RouterError::DuplicatePort) => {
                self.reply(
                    token,
                    OpenPortResponse {
                        request_id: req.request_id,
                        result: result_code::DUPLICATE_PORT,
                        port,
                    },
                );
            }
            Err(_) => unreachable!("register only returns DuplicatePort"),
        }
    }

    fn handle_close_port(&mut self, token: SocketToken, req: ClosePortRequest) {
        match self.registry.deregister(req.port, token) {
            Ok(()) => {
                if let Some(session) = self.sessions.get_mut(&token) {
                    session.ports.remove(&req.port);
                }
                self.reply(
                    token,
                    ClosePortResponse {
                        request_id: req.request_id,
                        result: result_code::OK,
                        port: req.port,
                    },
                );
            }
            Err(RouterError::BadPort(_)) => {
                self.reply(
                    token,
                    ClosePortResponse {
                        request_id: req.request_id,
                        result: result_code::BAD_PORT,
                        port: req.port,
                    },
                );
            }
            Err(RouterError::NotOwner(_)) => {
                self.reply(
                    token,
                    ClosePortResponse {
                        request_id: req.request_id,
                        result: result_code::NOT_OWNER,
                        port: req.port,
                    },
                );
            }
            Err(_) => unreachable!("deregister only returns BadPort/NotOwner"),
        }
    }

    fn handle_send_message(&mut self, msg: SendMessage) {
        // `source` is not verified against the sending session's port
        // set here; see DESIGN.md open question on source spoofing.
        match self.registry.owner(msg.destination) {
            Some(dest_token) => {
                let deliver = DeliverMessage {
                    source: msg.source,
                    destination: msg.destination,
                    payload: msg.payload,
                };
                let bytes = deliver.to_bytes();
                if let Some(session) = self.sessions.get_mut(&dest_token) {
                    if let Err(e) = session.send_data(&bytes) {
                        tracing::debug!(error = %e, "delivery write failed, disconnecting destination");
                        self.disconnect(dest_token);
                    }
                }
            }
            None => {
                tracing::warn!(
                    destination = msg.destination,
                    "SendMessage to unknown destination, dropping"
                );
            }
        }
    }

    fn handle_reboot(&mut self) {
        tracing::warn!("reboot requested: disconnecting all sessions");
        self.disconnect_all();
        // Re-launching services/tools/lenses is the boot helper's job
        // (out of scope for this core); the deferred callback is where
        // that hook would run.
        self.event_loop.add_deferred();
    }

    fn handle_shutdown(&mut self) {
        tracing::warn!("shutdown requested: disconnecting all sessions and stopping");
        self.disconnect_all();
        self.event_loop.stop();
    }

    fn disconnect_all(&mut self) {
        let tokens: Vec<SocketToken> = self.sessions.keys().copied().collect();
        for token in tokens {
            self.disconnect(token);
        }
    }

    fn reply<T: Encodable>(&mut self, token: SocketToken, response: T) {
        let bytes = response.to_bytes();
        if let Some(session) = self.sessions.get_mut(&token) {
            if let Err(e) = session.send_data(&bytes) {
                tracing::debug!(error = %e, "response write failed, disconnecting session");
                self.disconnect(token);
            }
        }
    }

    fn disconnect(&mut self, token: SocketToken) {
        if let Some(mut session) = self.sessions.remove(&token) {
            let released = self.registry.release_all(token);
            tracing::info!(?released, "session disconnected");
            let _ = self.event_loop.cancel_socket(token, session.connection.source());
        }
    }
}
