// ABOUTME: Application-supplied callback surface for asynchronous deliveries and errors

use crate::client::error::ClientError;
use crate::client::types::Port;
use bytes::Bytes;

/// Supplied by the application embedding a [`crate::client::Runtime`].
/// Invoked from inside event-loop dispatch — implementations must not
/// block.
pub trait Listener {
    /// A `DeliverMessage` arrived for one of this client's open ports.
    fn on_message(&mut self, source: Port, destination: Port, payload: Bytes);

    /// A client-side error occurred that isn't tied to one specific
    /// synchronous p-call (e.g. a delivery to an unknown/closed local
    /// port, a malformed frame, loss of the connection, or a response
    /// naming a request id the runtime has no record of).
    fn on_error(&mut self, error: ClientError);
}
