// ABOUTME: pK — a single-threaded, single-process IPC router and client runtime
// ABOUTME: Library crate; see src/bin/pkd.rs and src/bin/pkctl.rs for the executables built on it

//! pK is a message-passing core: a router process multiplexes a set of
//! client connections, each client opens numbered ports, and messages
//! addressed to a port are delivered to whichever client currently owns
//! it. See [`router`] for the daemon side and [`client`] for the p-call
//! surface embedding applications use to talk to it.

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod eventloop;
pub mod frame;
pub mod message_type;
pub mod result_code;
pub mod router;
pub mod service;

pub use client::{ClientBuilder, ClientError, ClientResult, Port, Runtime as ClientRuntime};
pub use router::Router;
