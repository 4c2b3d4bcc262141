//! The application-level message assembled from one or more frames.

use crate::frame::{Frame, Opcode};
use crate::result::WebSocketResult;
use std::str;

/// Represents one logical application-level send: the concatenated payload
/// of a lead frame and all of its continuation frames.
///
/// A message lives only long enough to be handed to the registered handlers;
/// the connection does not retain it after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	/// Whether the lead frame of this message carried the Binary opcode.
	/// Continuation frames do not carry a type of their own.
	pub is_binary: bool,
	/// The payload bytes, in arrival order.
	pub payload: Vec<u8>,
}

impl Message {
	/// Create a new text message.
	pub fn text<S>(data: S) -> Message
	where
		S: Into<String>,
	{
		Message {
			is_binary: false,
			payload: data.into().into_bytes(),
		}
	}

	/// Create a new binary message.
	pub fn binary<B>(data: B) -> Message
	where
		B: Into<Vec<u8>>,
	{
		Message {
			is_binary: true,
			payload: data.into(),
		}
	}

	/// Start a message from the lead frame of a (possibly fragmented)
	/// sequence. The caller has already ruled out continuation opcodes.
	pub(crate) fn from_first_frame(frame: Frame) -> Message {
		Message {
			is_binary: frame.opcode == Opcode::Binary,
			payload: frame.payload,
		}
	}

	/// Append the payload of a continuation frame.
	pub(crate) fn append(&mut self, frame: Frame) {
		let mut payload = frame.payload;
		self.payload.append(&mut payload);
	}

	/// View the payload as UTF-8 text.
	pub fn as_text(&self) -> WebSocketResult<&str> {
		Ok(str::from_utf8(&self.payload)?)
	}

	/// The payload size in bytes.
	pub fn len(&self) -> usize {
		self.payload.len()
	}

	/// Whether the payload is empty.
	pub fn is_empty(&self) -> bool {
		self.payload.is_empty()
	}
}
