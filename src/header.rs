//! Typed representations of the WebSocket handshake headers.

use crate::result::{WebSocketError, WebSocketResult};
use hyper::header::parsing::from_one_raw_str;
use hyper::header::{Header, HeaderFormat};
use sha1::{Digest, Sha1};
use std::fmt::{self, Debug};
use std::str::FromStr;

static MAGIC_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Represents a Sec-WebSocket-Key header.
///
/// The key is kept as the raw header value; the server only requires it to
/// be present and at least two characters long, and hashes it verbatim when
/// computing the accept token.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct WebSocketKey(pub String);

impl FromStr for WebSocketKey {
	type Err = WebSocketError;

	fn from_str(key: &str) -> WebSocketResult<WebSocketKey> {
		Ok(WebSocketKey(key.trim().to_owned()))
	}
}

impl Header for WebSocketKey {
	fn header_name() -> &'static str {
		"Sec-WebSocket-Key"
	}

	fn parse_header(raw: &[Vec<u8>]) -> hyper::Result<WebSocketKey> {
		from_one_raw_str(raw)
	}
}

impl HeaderFormat for WebSocketKey {
	fn fmt_header(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		write!(fmt, "{}", self.0)
	}
}

/// Represents a Sec-WebSocket-Accept header.
#[derive(PartialEq, Clone, Copy)]
pub struct WebSocketAccept([u8; 20]);

impl Debug for WebSocketAccept {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "WebSocketAccept({})", self.serialize())
	}
}

impl WebSocketAccept {
	/// Create a new WebSocketAccept from the given WebSocketKey.
	pub fn new(key: &WebSocketKey) -> WebSocketAccept {
		let mut concat_key = String::with_capacity(key.0.len() + 36);
		concat_key.push_str(&key.0);
		concat_key.push_str(MAGIC_GUID);
		let hash = Sha1::digest(concat_key.as_bytes());
		WebSocketAccept(hash.into())
	}

	/// Return the Base64 encoding of this WebSocketAccept.
	pub fn serialize(&self) -> String {
		let WebSocketAccept(accept) = *self;
		base64::encode(&accept)
	}
}

impl FromStr for WebSocketAccept {
	type Err = WebSocketError;

	fn from_str(accept: &str) -> WebSocketResult<WebSocketAccept> {
		match base64::decode(accept) {
			Ok(vec) => {
				if vec.len() != 20 {
					return Err(WebSocketError::ProtocolError(
						"Sec-WebSocket-Accept must be 20 bytes",
					));
				}
				let mut array = [0u8; 20];
				array[..20].clone_from_slice(&vec[..20]);
				Ok(WebSocketAccept(array))
			}
			Err(_) => Err(WebSocketError::ProtocolError(
				"Invalid Sec-WebSocket-Accept",
			)),
		}
	}
}

impl Header for WebSocketAccept {
	fn header_name() -> &'static str {
		"Sec-WebSocket-Accept"
	}

	fn parse_header(raw: &[Vec<u8>]) -> hyper::Result<WebSocketAccept> {
		from_one_raw_str(raw)
	}
}

impl HeaderFormat for WebSocketAccept {
	fn fmt_header(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		write!(fmt, "{}", self.serialize())
	}
}

/// Represents a Sec-WebSocket-Version header.
#[derive(PartialEq, Clone, Debug)]
pub enum WebSocketVersion {
	/// The version of WebSocket defined in RFC6455
	WebSocket13,
	/// An unknown version of WebSocket
	Unknown(String),
}

impl FromStr for WebSocketVersion {
	type Err = WebSocketError;

	fn from_str(version: &str) -> WebSocketResult<WebSocketVersion> {
		match version.trim() {
			"13" => Ok(WebSocketVersion::WebSocket13),
			other => Ok(WebSocketVersion::Unknown(other.to_owned())),
		}
	}
}

impl Header for WebSocketVersion {
	fn header_name() -> &'static str {
		"Sec-WebSocket-Version"
	}

	fn parse_header(raw: &[Vec<u8>]) -> hyper::Result<WebSocketVersion> {
		from_one_raw_str(raw)
	}
}

impl HeaderFormat for WebSocketVersion {
	fn fmt_header(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		match self {
			WebSocketVersion::WebSocket13 => write!(fmt, "13"),
			WebSocketVersion::Unknown(version) => write!(fmt, "{}", version),
		}
	}
}
