// ABOUTME: Error taxonomy for the pK-side of the protocol

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("port already present in the registry")]
    DuplicatePort,

    #[error("port {0} is not in the registry")]
    BadPort(u64),

    #[error("port {0} is not owned by the requesting session")]
    NotOwner(u64),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] CodecError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
