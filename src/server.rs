//! The WebSocket server: upgrade handshake, configuration and handler
//! fan-out.
//!
//! The server does not listen on sockets. An embedding HTTP layer parses
//! the request line and headers, then offers the request to
//! [`Server::handle_upgrade`] together with the raw stream. If the request
//! is not a WebSocket upgrade it is handed straight back so ordinary HTTP
//! handling can continue; otherwise the server completes the handshake,
//! builds a [`Connection`] and runs its read loop on the calling thread.

use crate::connection::Connection;
use crate::handler::Handler;
use crate::header::{WebSocketAccept, WebSocketKey, WebSocketVersion};
use crate::message::Message;
use crate::result::{WebSocketError, WebSocketResult};
use crate::stream::NetworkStream;
use std::io::Write;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use hyper::header::{
	Connection as ConnectionHeader, ConnectionOption, Headers, Protocol, ProtocolName, Upgrade,
};
use hyper::http::h1::Incoming;
use hyper::method::Method;
use hyper::status::StatusCode;
use hyper::uri::RequestUri;
use hyper::version::HttpVersion;
use unicase::UniCase;

/// A parsed incoming HTTP request, as handed over by the embedding layer.
pub type Request = Incoming<(Method, RequestUri)>;

/// A parsed request paired with the stream it arrived on.
pub struct UpgradeRequest<S>
where
	S: NetworkStream,
{
	/// The handshake request.
	pub request: Request,
	/// The raw duplex stream the request was read from. Nothing beyond the
	/// request head may have been consumed from it.
	pub stream: S,
}

/// What became of a request offered to [`Server::handle_upgrade`].
pub enum UpgradeStatus<S>
where
	S: NetworkStream,
{
	/// The request was consumed: either a session ran to completion or a
	/// `400 Bad Request` was written. The caller must not touch the stream
	/// again.
	Handled,
	/// Not a WebSocket upgrade. The request and stream are handed back for
	/// ordinary HTTP processing.
	NotWebSocket(UpgradeRequest<S>),
}

/// Accepts WebSocket upgrades and fans connection events out to an ordered
/// list of handlers.
///
/// Configuration is meant to be fixed before the first request is offered;
/// handlers may be registered at any time and take effect for events
/// dispatched afterwards (connection threads iterate a stable snapshot of
/// the list).
pub struct Server<S>
where
	S: NetworkStream,
{
	// copy-on-write: writers swap the Arc, readers clone it for a snapshot
	handlers: RwLock<Arc<Vec<Arc<dyn Handler<S>>>>>,
	read_timeout: Option<Duration>,
	read_limit: usize,
	accept_any_upgrade: bool,
	force_upgrade: bool,
	answer_close: bool,
}

impl<S> Default for Server<S>
where
	S: NetworkStream,
{
	fn default() -> Server<S> {
		Server::new()
	}
}

impl<S> Server<S>
where
	S: NetworkStream,
{
	/// Creates a server with no handlers, no read timeout, no read limit
	/// and close frames answered.
	pub fn new() -> Server<S> {
		Server {
			handlers: RwLock::new(Arc::new(Vec::new())),
			read_timeout: None,
			read_limit: 0,
			accept_any_upgrade: false,
			force_upgrade: false,
			answer_close: true,
		}
	}

	/// Socket read timeout applied to every accepted connection.
	pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.read_timeout = timeout;
		self
	}

	/// Maximum combined payload of one (possibly fragmented) incoming
	/// message, in bytes. 0 means unlimited.
	pub fn read_limit(mut self, bytes: usize) -> Self {
		self.read_limit = bytes;
		self
	}

	/// Claim upgrade requests without strict `Upgrade`/`Connection`/version
	/// validation. The `Sec-WebSocket-Key` header is still required.
	pub fn accept_any_upgrade(mut self, yes: bool) -> Self {
		self.accept_any_upgrade = yes;
		self
	}

	/// Answer invalid upgrade requests with `400 Bad Request` instead of
	/// handing them back as plain HTTP.
	pub fn force_upgrade(mut self, yes: bool) -> Self {
		self.force_upgrade = yes;
		self
	}

	/// Whether a peer's close frame is answered with a close frame before
	/// the socket is shut down.
	pub fn answer_close(mut self, yes: bool) -> Self {
		self.answer_close = yes;
		self
	}

	/// Appends a handler. Handlers run in registration order.
	pub fn add_handler<H>(&self, handler: H)
	where
		H: Handler<S> + 'static,
	{
		let mut guard = match self.handlers.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let mut list = (**guard).clone();
		list.push(Arc::new(handler));
		*guard = Arc::new(list);
	}

	fn snapshot(&self) -> Arc<Vec<Arc<dyn Handler<S>>>> {
		match self.handlers.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	/// Offers a request to the WebSocket layer, per the flow in the module
	/// docs. The returned status says whether the caller should continue
	/// treating the request as ordinary HTTP.
	///
	/// Errors are only returned for failures writing the handshake
	/// response; everything that goes wrong after the upgrade completes is
	/// reported through the handler callbacks instead.
	pub fn handle_upgrade(&self, upgrade: UpgradeRequest<S>) -> WebSocketResult<UpgradeStatus<S>> {
		let UpgradeRequest { request, mut stream } = upgrade;

		let requested = websocket_requested(&request.headers);
		if !requested && !self.accept_any_upgrade && !self.force_upgrade {
			return Ok(UpgradeStatus::NotWebSocket(UpgradeRequest {
				request,
				stream,
			}));
		}

		if !self.accept_any_upgrade {
			if let Err(_reason) = validate(&request) {
				return if self.force_upgrade {
					send_response(
						&mut stream,
						request.version,
						StatusCode::BadRequest,
						&Headers::new(),
					)?;
					Ok(UpgradeStatus::Handled)
				} else {
					Ok(UpgradeStatus::NotWebSocket(UpgradeRequest {
						request,
						stream,
					}))
				};
			}
		}

		if !self.dispatch_handshake(&request) {
			send_response(
				&mut stream,
				request.version,
				StatusCode::BadRequest,
				&Headers::new(),
			)?;
			return Ok(UpgradeStatus::Handled);
		}

		let key = match request.headers.get::<WebSocketKey>() {
			Some(key) if key.0.len() >= 2 => key.clone(),
			_ => {
				send_response(
					&mut stream,
					request.version,
					StatusCode::BadRequest,
					&Headers::new(),
				)?;
				return Ok(UpgradeStatus::Handled);
			}
		};

		let mut headers = Headers::new();
		headers.set(WebSocketAccept::new(&key));
		headers.set(ConnectionHeader(vec![ConnectionOption::ConnectionHeader(
			UniCase("Upgrade".to_string()),
		)]));
		headers.set(Upgrade(vec![Protocol::new(ProtocolName::WebSocket, None)]));
		send_response(
			&mut stream,
			request.version,
			StatusCode::SwitchingProtocols,
			&headers,
		)?;

		if let Some(tcp) = stream.as_tcp() {
			tcp.set_read_timeout(self.read_timeout)?;
		}

		let mut connection = Connection::new(stream, self.read_limit, self.answer_close);
		if self.notify_connect(&mut connection).is_err() {
			connection.close_silent();
			return Ok(UpgradeStatus::Handled);
		}

		match connection.listen(self) {
			Ok(()) => connection.close(self, None),
			Err(error) => {
				if !connection.is_closed() {
					self.notify_error(&mut connection, &error);
				}
				connection.close(self, Some(&error));
			}
		}
		connection.close_silent();
		Ok(UpgradeStatus::Handled)
	}

	fn dispatch_handshake(&self, request: &Request) -> bool {
		self.snapshot()
			.iter()
			.all(|handler| handler.on_handshake(request))
	}

	fn notify_connect(&self, connection: &mut Connection<S>) -> WebSocketResult<()> {
		for handler in self.snapshot().iter() {
			handler.on_connect(connection)?;
		}
		Ok(())
	}

	/// Fans a message out to the handlers in order; the first `false`
	/// short-circuits the chain and asks the read loop to stop.
	pub(crate) fn dispatch_message(
		&self,
		connection: &mut Connection<S>,
		message: &Message,
	) -> bool {
		for handler in self.snapshot().iter() {
			if !handler.on_message(connection, message) {
				return false;
			}
		}
		true
	}

	pub(crate) fn dispatch_pong(&self, connection: &mut Connection<S>, message: &Message) -> bool {
		for handler in self.snapshot().iter() {
			if !handler.on_pong(connection, message) {
				return false;
			}
		}
		true
	}

	fn notify_error(&self, connection: &mut Connection<S>, error: &WebSocketError) {
		for handler in self.snapshot().iter() {
			handler.on_error(connection, error);
		}
	}

	/// Notify-only: every handler hears about the close, in order.
	pub(crate) fn notify_close(
		&self,
		connection: &mut Connection<S>,
		error: Option<&WebSocketError>,
	) {
		for handler in self.snapshot().iter() {
			handler.on_close(connection, error);
		}
	}
}

/// Whether the request asks for a WebSocket upgrade at all.
fn websocket_requested(headers: &Headers) -> bool {
	match headers.get::<Upgrade>() {
		Some(&Upgrade(ref protocols)) => protocols
			.iter()
			.any(|protocol| protocol.name == ProtocolName::WebSocket),
		None => false,
	}
}

/// Check whether an incoming request is a valid RFC 6455 upgrade attempt.
fn validate(request: &Request) -> Result<(), &'static str> {
	if request.subject.0 != Method::Get {
		return Err("request method must be GET");
	}

	if request.version == HttpVersion::Http09 || request.version == HttpVersion::Http10 {
		return Err("unsupported HTTP version");
	}

	if !websocket_requested(&request.headers) {
		return Err("Upgrade header is not websocket");
	}

	fn connection_contains_upgrade(options: &[ConnectionOption]) -> bool {
		options.iter().any(|option| {
			if let ConnectionOption::ConnectionHeader(ref token) = *option {
				UniCase(token as &str) == UniCase("upgrade")
			} else {
				false
			}
		})
	}

	match request.headers.get::<ConnectionHeader>() {
		Some(&ConnectionHeader(ref options)) if connection_contains_upgrade(options) => {}
		_ => return Err("Connection header does not contain upgrade"),
	}

	match request.headers.get::<WebSocketVersion>() {
		Some(&WebSocketVersion::WebSocket13) => {}
		_ => return Err("unsupported websocket version"),
	}

	Ok(())
}

fn send_response<S>(
	stream: &mut S,
	version: HttpVersion,
	status: StatusCode,
	headers: &Headers,
) -> WebSocketResult<()>
where
	S: NetworkStream,
{
	let data = format!("{} {}\r\n{}\r\n", version, status, headers);
	stream.write_all(data.as_bytes())?;
	stream.flush()?;
	Ok(())
}
