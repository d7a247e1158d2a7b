// ABOUTME: Wire message type codes for the pK IPC frame format
// ABOUTME: Closed enum driving the match-based frame dispatch in frame.rs

use num_enum::TryFromPrimitive;

/// The `type` field of a frame header. Codes 6 and 8 are reserved for
/// chunked streaming (`SendChunk`/`DeliverChunk`) but undefined beyond
/// their reservation; this core does not encode or decode them.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    OpenPortRequest = 1,
    OpenPortResponse = 2,
    ClosePortRequest = 3,
    ClosePortResponse = 4,
    SendMessage = 5,
    // SendChunk = 6, reserved, not implemented
    DeliverMessage = 7,
    // DeliverChunk = 8, reserved, not implemented
    Reboot = 9,
    Shutdown = 10,
}
