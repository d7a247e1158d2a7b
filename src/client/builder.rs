// ABOUTME: Convenience construction for Runtime
// ABOUTME: There is no bind step in this protocol, so `connect`/`quick` just establish the stream

use crate::client::error::ClientResult;
use crate::client::runtime::Runtime;
use crate::config::ClientConfig;
use std::net::SocketAddr;

pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder {
            config: ClientConfig::default(),
        }
    }

    pub fn server_addr(mut self, addr: SocketAddr) -> Self {
        self.config.server_addr = addr;
        self
    }

    /// Build a `Runtime` and eagerly establish its connection to the pK.
    pub fn connect(self) -> ClientResult<Runtime> {
        let mut runtime = Runtime::new(self.config)?;
        runtime.ensure_connected()?;
        Ok(runtime)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Connect to the default local pK (`127.0.0.1:11000`) with no further
/// configuration.
pub fn quick() -> ClientResult<Runtime> {
    ClientBuilder::new().connect()
}
