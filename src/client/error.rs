// ABOUTME: Error taxonomy for client-side p-calls
// ABOUTME: One closed enum rather than mapping result bytes to exception classes at the call site

use crate::codec::CodecError;
use crate::message_type::MessageType;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("port already reserved locally")]
    DuplicatePort,

    #[error("port {0} is not known to this client")]
    NonExistentPort(u64),

    #[error("requested port {0} is out of range")]
    PortNumberOutOfRange(u64),

    #[error("pK could not allocate an ephemeral port")]
    CannotAllocatePort,

    #[error("destination port is unknown to the pK")]
    BadDestination,

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] CodecError),

    #[error("connection to the pK was lost")]
    ConnectionLost,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected response: expected {expected:?}, got {actual:?}")]
    UnexpectedResponse {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("response referenced unknown request id {0}")]
    UnknownRequestId(u32),
}

pub type ClientResult<T> = Result<T, ClientError>;
