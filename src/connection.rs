//! One accepted, upgraded WebSocket connection and its blocking read loop.

use crate::frame::{Frame, Opcode};
use crate::message::Message;
use crate::result::{WebSocketError, WebSocketResult};
use crate::server::Server;
use crate::stream::{NetworkStream, Shutdown};
use std::io;

/// The lifecycle states of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum State {
	/// The upgrade handshake has completed but the read loop has not
	/// started yet.
	Handshaking,
	/// The read loop is processing frames.
	Open,
	/// A close frame was received or sent; teardown is in progress.
	Closing,
	/// The connection is gone. All further operations are no-ops or fail.
	Closed,
}

/// Owns one upgraded duplex stream for its entire lifetime.
///
/// The read loop runs on the thread that accepted the connection and blocks
/// on the stream. `send` and `ping` write synchronously on the calling
/// thread; the stream write is not locked internally, so concurrent senders
/// need their own synchronization.
pub struct Connection<S>
where
	S: NetworkStream,
{
	stream: Option<S>,
	state: State,
	in_progress: Option<Message>,
	read_limit: usize,
	answer_close: bool,
}

impl<S> Connection<S>
where
	S: NetworkStream,
{
	/// Wraps an upgraded stream. `read_limit` bounds the combined payload
	/// of a fragmented message in bytes, with 0 meaning unlimited.
	pub fn new(stream: S, read_limit: usize, answer_close: bool) -> Connection<S> {
		Connection {
			stream: Some(stream),
			state: State::Handshaking,
			in_progress: None,
			read_limit,
			answer_close,
		}
	}

	/// The current lifecycle state.
	pub fn state(&self) -> State {
		self.state
	}

	/// True once the stream has been torn down or the underlying socket no
	/// longer has a peer.
	pub fn is_closed(&self) -> bool {
		if self.state == State::Closed {
			return true;
		}
		match &self.stream {
			None => true,
			Some(stream) => match stream.as_tcp() {
				Some(tcp) => tcp.peer_addr().is_err(),
				None => false,
			},
		}
	}

	fn stream_mut(&mut self) -> WebSocketResult<&mut S> {
		self.stream.as_mut().ok_or_else(|| {
			WebSocketError::IoError(io::Error::new(
				io::ErrorKind::NotConnected,
				"connection is closed",
			))
		})
	}

	/// Payload bytes still acceptable for the message currently being
	/// assembled, or `None` when no limit is configured.
	fn remaining_limit(&self) -> Option<u64> {
		if self.read_limit == 0 {
			return None;
		}
		let buffered = self.in_progress.as_ref().map_or(0, Message::len);
		Some((self.read_limit.saturating_sub(buffered)) as u64)
	}

	fn read_frame(&mut self) -> WebSocketResult<Frame> {
		let limit = self.remaining_limit();
		// frames from the client must be masked
		Frame::read(self.stream_mut()?, true, limit)
	}

	fn write_frame(&mut self, frame: &Frame) -> WebSocketResult<()> {
		let stream = self.stream_mut()?;
		// server frames go out unmasked, per RFC 6455 section 5.1
		frame.write_to(stream, None)?;
		stream.flush()?;
		Ok(())
	}

	/// Send a data message as a single unfragmented frame.
	pub fn send(&mut self, data: &[u8], is_binary: bool) -> WebSocketResult<()> {
		let opcode = if is_binary {
			Opcode::Binary
		} else {
			Opcode::Text
		};
		self.write_frame(&Frame::new(true, opcode, data.to_vec()))
	}

	/// Send a ping control frame.
	pub fn ping(&mut self, data: &[u8]) -> WebSocketResult<()> {
		self.write_frame(&Frame::new(true, Opcode::Ping, data.to_vec()))
	}

	/// Runs the blocking read loop until the peer closes, a handler asks to
	/// stop, or an error occurs.
	///
	/// Returns `Ok(())` for the two orderly endings (peer close frame,
	/// handler returned `false`) and `Err` for protocol and I/O failures.
	/// The caller is expected to invoke [`close`](Connection::close) in
	/// every case.
	pub fn listen(&mut self, server: &Server<S>) -> WebSocketResult<()> {
		self.state = State::Open;
		loop {
			let frame = self.read_frame()?;
			match frame.opcode {
				Opcode::Continuation => {
					let mut message = self.in_progress.take().ok_or(
						WebSocketError::ProtocolError(
							"continuation frame without a message in progress",
						),
					)?;
					let finished = frame.finished;
					message.append(frame);
					if finished {
						if !server.dispatch_message(self, &message) {
							return Ok(());
						}
					} else {
						self.in_progress = Some(message);
					}
				}
				Opcode::Text | Opcode::Binary => {
					if self.in_progress.is_some() {
						return Err(WebSocketError::ProtocolError(
							"data frame while a fragmented message is in progress",
						));
					}
					let finished = frame.finished;
					let message = Message::from_first_frame(frame);
					if finished {
						if !server.dispatch_message(self, &message) {
							return Ok(());
						}
					} else {
						self.in_progress = Some(message);
					}
				}
				Opcode::Close => {
					self.state = State::Closing;
					return Ok(());
				}
				Opcode::Ping => {
					self.write_frame(&Frame::new(true, Opcode::Pong, frame.payload))?;
				}
				Opcode::Pong => {
					let message = Message::binary(frame.payload);
					if !server.dispatch_pong(self, &message) {
						return Ok(());
					}
				}
			}
		}
	}

	/// Notifies handlers and tears the connection down. Idempotent: the
	/// second and later calls do nothing, so handlers are never notified of
	/// the same close twice.
	///
	/// Teardown is best-effort throughout: a failure in one step never
	/// prevents the following steps from running.
	pub fn close(&mut self, server: &Server<S>, error: Option<&WebSocketError>) {
		if self.state == State::Closed {
			return;
		}
		self.state = State::Closing;
		server.notify_close(self, error);
		self.teardown(error.map_or(true, WebSocketError::stream_usable));
	}

	/// Tears the connection down without notifying any handler and without
	/// answering the peer's close frame. Safe to call at any point,
	/// including after [`close`](Connection::close) already ran.
	pub fn close_silent(&mut self) {
		self.teardown(false);
	}

	fn teardown(&mut self, send_close_frame: bool) {
		self.state = State::Closed;
		self.in_progress = None;
		if let Some(mut stream) = self.stream.take() {
			if self.answer_close && send_close_frame {
				let _ = Frame::new(true, Opcode::Close, Vec::new()).write_to(&mut stream, None);
			}
			let _ = stream.flush();
			if let Some(tcp) = stream.as_tcp() {
				let _ = tcp.shutdown(Shutdown::Both);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler::Handler;
	use crate::server::Request;
	use crate::stream::ReadWritePair;
	use crate::test_util::SharedBuf;
	use std::io::Cursor;
	use std::sync::{Arc, Mutex};

	type TestStream = ReadWritePair<Cursor<Vec<u8>>, SharedBuf>;

	struct Recorder {
		events: Arc<Mutex<Vec<String>>>,
		stop_after_messages: usize,
	}

	impl Recorder {
		fn new(events: Arc<Mutex<Vec<String>>>) -> Recorder {
			Recorder {
				events,
				stop_after_messages: usize::max_value(),
			}
		}
		fn push(&self, event: String) {
			self.events.lock().unwrap().push(event);
		}
	}

	impl Handler<TestStream> for Recorder {
		fn on_handshake(&self, _request: &Request) -> bool {
			self.push("handshake".to_owned());
			true
		}
		fn on_connect(&self, _connection: &mut Connection<TestStream>) -> WebSocketResult<()> {
			self.push("connect".to_owned());
			Ok(())
		}
		fn on_message(&self, _connection: &mut Connection<TestStream>, message: &Message) -> bool {
			self.push(format!(
				"message:{}:{}",
				if message.is_binary { "binary" } else { "text" },
				String::from_utf8_lossy(&message.payload)
			));
			self.events.lock().unwrap().iter().filter(|e| e.starts_with("message")).count()
				< self.stop_after_messages
		}
		fn on_pong(&self, _connection: &mut Connection<TestStream>, message: &Message) -> bool {
			self.push(format!("pong:{}", String::from_utf8_lossy(&message.payload)));
			true
		}
		fn on_error(&self, _connection: &mut Connection<TestStream>, error: &WebSocketError) {
			self.push(format!("error:{}", error));
		}
		fn on_close(&self, _connection: &mut Connection<TestStream>, error: Option<&WebSocketError>) {
			self.push(format!("close:{}", error.is_some()));
		}
	}

	const KEY: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

	fn client_frame(finished: bool, opcode: Opcode, payload: &[u8]) -> Vec<u8> {
		let mut out = Vec::new();
		Frame::new(finished, opcode, payload.to_vec())
			.write_to(&mut out, Some(KEY))
			.unwrap();
		out
	}

	fn connection_over(input: Vec<u8>, read_limit: usize) -> (Connection<TestStream>, SharedBuf) {
		let output = SharedBuf::default();
		let stream = ReadWritePair(Cursor::new(input), output.clone());
		(Connection::new(stream, read_limit, true), output)
	}

	fn server_with_recorder() -> (Server<TestStream>, Arc<Mutex<Vec<String>>>) {
		let events = Arc::new(Mutex::new(Vec::new()));
		let server = Server::new();
		server.add_handler(Recorder::new(events.clone()));
		(server, events)
	}

	fn events_of(events: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
		events.lock().unwrap().clone()
	}

	#[test]
	fn test_single_frame_message_dispatch() {
		let mut input = client_frame(true, Opcode::Text, b"hello");
		input.extend(client_frame(true, Opcode::Close, b""));
		let (server, events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 0);

		connection.listen(&server).unwrap();
		assert_eq!(connection.state(), State::Closing);
		assert_eq!(events_of(&events), vec!["message:text:hello"]);
	}

	#[test]
	fn test_fragmented_message_reassembly() {
		let mut input = client_frame(false, Opcode::Text, b"he");
		input.extend(client_frame(false, Opcode::Continuation, b"ll"));
		input.extend(client_frame(true, Opcode::Continuation, b"o"));
		input.extend(client_frame(true, Opcode::Binary, &[1, 2, 3]));
		input.extend(client_frame(true, Opcode::Close, b""));
		let (server, events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 0);

		connection.listen(&server).unwrap();
		assert_eq!(
			events_of(&events),
			vec!["message:text:hello", "message:binary:\u{1}\u{2}\u{3}"]
		);
	}

	#[test]
	fn test_continuation_without_start_fails() {
		let input = client_frame(true, Opcode::Continuation, b"orphan");
		let (server, _events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 0);

		match connection.listen(&server) {
			Err(WebSocketError::ProtocolError(
				"continuation frame without a message in progress",
			)) => (),
			other => panic!("expected protocol error, got {:?}", other),
		}
	}

	#[test]
	fn test_new_data_frame_mid_fragment_fails() {
		let mut input = client_frame(false, Opcode::Text, b"first");
		input.extend(client_frame(true, Opcode::Text, b"second"));
		let (server, _events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 0);

		match connection.listen(&server) {
			Err(WebSocketError::ProtocolError(
				"data frame while a fragmented message is in progress",
			)) => (),
			other => panic!("expected protocol error, got {:?}", other),
		}
	}

	#[test]
	fn test_cumulative_read_limit() {
		// 6 + 6 bytes against a limit of 10: the continuation frame alone
		// fits, the combined message does not
		let mut input = client_frame(false, Opcode::Binary, &[0u8; 6]);
		input.extend(client_frame(true, Opcode::Continuation, &[0u8; 6]));
		let (server, events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 10);

		match connection.listen(&server) {
			Err(WebSocketError::ProtocolError("message length exceeds read limit")) => (),
			other => panic!("expected protocol error, got {:?}", other),
		}
		// nothing was dispatched
		assert!(events_of(&events).is_empty());
	}

	#[test]
	fn test_message_within_limit_passes() {
		let mut input = client_frame(false, Opcode::Binary, &[0u8; 6]);
		input.extend(client_frame(true, Opcode::Continuation, &[0u8; 4]));
		input.extend(client_frame(true, Opcode::Close, b""));
		let (server, events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 10);

		connection.listen(&server).unwrap();
		assert_eq!(events_of(&events).len(), 1);
	}

	#[test]
	fn test_ping_answered_with_pong() {
		let mut input = client_frame(true, Opcode::Ping, b"tick");
		input.extend(client_frame(true, Opcode::Close, b""));
		let (server, events) = server_with_recorder();
		let (mut connection, output) = connection_over(input, 0);

		connection.listen(&server).unwrap();
		// no handler event for pings
		assert!(events_of(&events).is_empty());

		// the echoed pong is written unmasked before anything else
		let written = output.contents();
		let pong = Frame::read(&mut &written[..], false, None).unwrap();
		assert_eq!(pong.opcode, Opcode::Pong);
		assert_eq!(pong.payload, b"tick".to_vec());
	}

	#[test]
	fn test_pong_dispatched_to_handlers() {
		let mut input = client_frame(true, Opcode::Pong, b"late");
		input.extend(client_frame(true, Opcode::Close, b""));
		let (server, events) = server_with_recorder();
		let (mut connection, _output) = connection_over(input, 0);

		connection.listen(&server).unwrap();
		assert_eq!(events_of(&events), vec!["pong:late"]);
	}

	#[test]
	fn test_handler_false_stops_loop() {
		let mut input = client_frame(true, Opcode::Text, b"one");
		input.extend(client_frame(true, Opcode::Text, b"two"));
		let events = Arc::new(Mutex::new(Vec::new()));
		let server = Server::new();
		let mut recorder = Recorder::new(events.clone());
		recorder.stop_after_messages = 1;
		server.add_handler(recorder);
		let (mut connection, _output) = connection_over(input, 0);

		connection.listen(&server).unwrap();
		// the second message was never read
		assert_eq!(events_of(&events), vec!["message:text:one"]);
	}

	#[test]
	fn test_close_is_idempotent() {
		let input = client_frame(true, Opcode::Close, b"");
		let (server, events) = server_with_recorder();
		let (mut connection, output) = connection_over(input, 0);

		connection.listen(&server).unwrap();
		connection.close(&server, None);
		connection.close(&server, None);

		assert_eq!(connection.state(), State::Closed);
		assert!(connection.is_closed());
		// exactly one close notification
		assert_eq!(events_of(&events), vec!["close:false"]);

		// the close frame answered exactly once
		let written = output.contents();
		let frame = Frame::read(&mut &written[..], false, None).unwrap();
		assert_eq!(frame.opcode, Opcode::Close);
		assert_eq!(written.len(), 2);
	}

	#[test]
	fn test_no_close_frame_after_io_error() {
		// stream ends mid-frame
		let input = client_frame(true, Opcode::Text, b"truncated")[..5].to_vec();
		let (server, events) = server_with_recorder();
		let (mut connection, output) = connection_over(input, 0);

		let error = connection.listen(&server).unwrap_err();
		assert!(!error.stream_usable());
		connection.close(&server, Some(&error));

		assert_eq!(events_of(&events), vec!["close:true"]);
		assert!(output.contents().is_empty());
	}

	#[test]
	fn test_send_after_close_fails() {
		let (server, _events) = server_with_recorder();
		let (mut connection, _output) = connection_over(Vec::new(), 0);
		connection.close(&server, None);

		assert!(connection.send(b"too late", false).is_err());
		assert!(connection.ping(b"too late").is_err());
	}

	#[test]
	fn test_send_writes_unmasked_frame() {
		let (_server, _events) = server_with_recorder();
		let (mut connection, output) = connection_over(Vec::new(), 0);

		connection.send(b"hi", false).unwrap();
		let written = output.contents();
		assert_eq!(&written[..], &[0x81, 0x02, b'h', b'i']);
	}
}
