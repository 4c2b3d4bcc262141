//! The result type used throughout the crate.

use std::error::Error;
use std::fmt;
use std::io;
use std::str::Utf8Error;

/// The type used for WebSocket results
pub type WebSocketResult<T> = Result<T, WebSocketError>;

/// Represents a WebSocket error.
///
/// Protocol violations carry a static description of the rule that was
/// broken; they are always fatal to the single connection they occurred on
/// and never to the server as a whole.
#[derive(Debug)]
pub enum WebSocketError {
	/// A WebSocket protocol error
	ProtocolError(&'static str),
	/// The stream ended before a complete frame could be read
	NoDataAvailable,
	/// An input/output error
	IoError(io::Error),
	/// A UTF-8 error
	Utf8Error(Utf8Error),
	/// Other error raised by application handlers, for downcasting
	Other(Box<dyn Error + Send + Sync + 'static>),
}

impl WebSocketError {
	/// Whether the underlying stream can still be expected to accept writes.
	/// I/O failures and truncated streams leave the socket in an unusable
	/// state; protocol violations do not.
	pub fn stream_usable(&self) -> bool {
		!matches!(
			self,
			WebSocketError::IoError(_) | WebSocketError::NoDataAvailable
		)
	}
}

impl fmt::Display for WebSocketError {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		fmt.write_str("WebSocketError: ")?;
		match self {
			WebSocketError::ProtocolError(msg) => write!(fmt, "protocol error: {}", msg),
			WebSocketError::NoDataAvailable => fmt.write_str("no data available"),
			WebSocketError::IoError(_) => fmt.write_str("I/O failure"),
			WebSocketError::Utf8Error(_) => fmt.write_str("UTF-8 failure"),
			WebSocketError::Other(x) => x.fmt(fmt),
		}
	}
}

impl Error for WebSocketError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match *self {
			WebSocketError::IoError(ref error) => Some(error),
			WebSocketError::Utf8Error(ref error) => Some(error),
			WebSocketError::Other(ref error) => error.source(),
			_ => None,
		}
	}
}

impl From<io::Error> for WebSocketError {
	fn from(err: io::Error) -> WebSocketError {
		if err.kind() == io::ErrorKind::UnexpectedEof {
			return WebSocketError::NoDataAvailable;
		}
		WebSocketError::IoError(err)
	}
}

impl From<Utf8Error> for WebSocketError {
	fn from(err: Utf8Error) -> WebSocketError {
		WebSocketError::Utf8Error(err)
	}
}
