//! The handler SPI that application code plugs into the server.

use crate::connection::Connection;
use crate::message::Message;
use crate::result::{WebSocketError, WebSocketResult};
use crate::server::Request;
use crate::stream::NetworkStream;

/// Receives connection lifecycle events from the server.
///
/// Handlers are registered on a [`Server`](crate::Server) and invoked in
/// registration order. For `on_handshake`, `on_message` and `on_pong` the
/// first handler to answer `false` stops the chain: later handlers are not
/// invoked for that event, and the server treats the event as a request to
/// refuse the handshake or close the connection. `on_error` and `on_close`
/// are notify-only and always delivered to every handler.
///
/// A handler is shared by every connection thread, so any mutable state it
/// keeps needs its own synchronization.
pub trait Handler<S>: Send + Sync
where
	S: NetworkStream,
{
	/// Approve or reject an upgrade request before the 101 response is
	/// written. All handlers must approve for the handshake to proceed.
	fn on_handshake(&self, request: &Request) -> bool;

	/// Called once the 101 response has been written, before the read loop
	/// starts. Returning an error aborts the connection.
	fn on_connect(&self, connection: &mut Connection<S>) -> WebSocketResult<()>;

	/// A complete data message arrived. Return `false` to close the
	/// connection.
	fn on_message(&self, connection: &mut Connection<S>, message: &Message) -> bool;

	/// A pong control frame arrived. Return `false` to close the
	/// connection.
	fn on_pong(&self, connection: &mut Connection<S>, message: &Message) -> bool;

	/// A protocol or I/O error ended the read loop. The connection is
	/// closed right after every handler has been notified.
	fn on_error(&self, connection: &mut Connection<S>, error: &WebSocketError);

	/// The connection is going away. `error` is `None` for a clean close
	/// (peer close frame or a handler declining to continue).
	fn on_close(&self, connection: &mut Connection<S>, error: Option<&WebSocketError>);
}
