// ABOUTME: Explicit configuration structs for the router and the client runtime
// ABOUTME: No ambient global state — config is constructed and passed in, per the re-architecture guidance

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::Range;

/// Default pK listen port, shared by both sides as the default target.
pub const DEFAULT_PORT: u16 = 11000;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub bind_addr: SocketAddr,
    pub ephemeral_range: Range<u64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            ephemeral_range: 16384..(1u64 << 32),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
        }
    }
}

/// Well-known port numbers conventionally used by services layered on
/// top of the pK. These are documentation only: the router does not
/// privilege, reserve, or validate against them in any way — any
/// client is free to request one of these numbers like any other.
pub mod well_known {
    pub const STORAGE: u64 = 11001;
    pub const HISTORY: u64 = 11002;
    pub const SECURITY: u64 = 11003;
    pub const METADATA: u64 = 11004;
    pub const TYPE: u64 = 11006;
}
