//! Serialization and deserialization of single WebSocket frames.
//!
//! Everything here is stateless: a frame is read from or written to a byte
//! stream in one call, and masking is applied on the way through. Joining
//! frames into application messages is the connection's job.

use crate::result::{WebSocketError, WebSocketResult};
use std::io::{self, Read, Write};

pub mod header;
pub mod mask;

use self::header::{FrameFlags, FrameHeader};

/// Represents a WebSocket frame opcode. All other nibble values are
/// protocol violations.
#[derive(Clone, Debug, Copy, PartialEq)]
pub enum Opcode {
	/// A continuation frame of a fragmented message
	Continuation = 0x0,
	/// A UTF-8 text frame
	Text = 0x1,
	/// A binary frame
	Binary = 0x2,
	/// A close control frame
	Close = 0x8,
	/// A ping control frame
	Ping = 0x9,
	/// A pong control frame
	Pong = 0xA,
}

impl Opcode {
	/// Attempts to form an Opcode from a nibble.
	///
	/// Returns the Opcode, or None for unassigned values.
	pub fn new(op: u8) -> Option<Opcode> {
		Some(match op {
			0x0 => Opcode::Continuation,
			0x1 => Opcode::Text,
			0x2 => Opcode::Binary,
			0x8 => Opcode::Close,
			0x9 => Opcode::Ping,
			0xA => Opcode::Pong,
			_ => return None,
		})
	}

	/// Whether this opcode designates a control frame.
	pub fn is_control(self) -> bool {
		self as u8 >= 8
	}
}

/// Represents a single WebSocket frame.
///
/// The payload held in a Frame is never masked; masking and unmasking happen
/// while the frame is on its way through `read` and `write_to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
	/// Whether this frame is the last frame of its message
	pub finished: bool,
	/// The opcode of this frame
	pub opcode: Opcode,
	/// The unmasked payload of this frame
	pub payload: Vec<u8>,
}

impl Frame {
	/// Creates a new Frame.
	pub fn new(finished: bool, opcode: Opcode, payload: Vec<u8>) -> Frame {
		Frame {
			finished,
			opcode,
			payload,
		}
	}

	/// Reads a Frame from a Reader.
	///
	/// `require_mask` enforces the client-to-server masking rule: an
	/// unmasked frame is then a protocol error. `limit` is the number of
	/// payload bytes the caller is still willing to accept for the message
	/// this frame belongs to; a frame declaring more than that fails before
	/// its payload is read.
	pub fn read<R>(reader: &mut R, require_mask: bool, limit: Option<u64>) -> WebSocketResult<Frame>
	where
		R: Read,
	{
		let header = header::read_header(reader)?;

		let opcode =
			Opcode::new(header.opcode).ok_or(WebSocketError::ProtocolError("unknown opcode"))?;

		if let Some(limit) = limit {
			if !opcode.is_control() && header.len > limit {
				return Err(WebSocketError::ProtocolError(
					"message length exceeds read limit",
				));
			}
		}

		if require_mask && header.mask.is_none() {
			return Err(WebSocketError::ProtocolError("unmasked frame from client"));
		}

		let mut payload: Vec<u8> = Vec::with_capacity(header.len as usize);
		let read = reader.take(header.len).read_to_end(&mut payload)?;
		if (read as u64) < header.len {
			return Err(
				io::Error::new(io::ErrorKind::UnexpectedEof, "incomplete frame payload").into(),
			);
		}

		if let Some(key) = header.mask {
			payload = mask::mask_data(key, &payload);
		}

		Ok(Frame {
			finished: header.flags.contains(FrameFlags::FIN),
			opcode,
			payload,
		})
	}

	/// Writes this Frame to a Writer, masking the payload with `mask_key`
	/// if one is given. Server-originated frames are written unmasked.
	///
	/// The whole frame is buffered and written with a single call so that a
	/// frame never reaches the wire partially.
	pub fn write_to(&self, writer: &mut dyn Write, mask_key: Option<[u8; 4]>) -> WebSocketResult<()> {
		let header = FrameHeader {
			flags: if self.finished {
				FrameFlags::FIN
			} else {
				FrameFlags::empty()
			},
			opcode: self.opcode as u8,
			mask: mask_key,
			len: self.payload.len() as u64,
		};

		let mut data = Vec::with_capacity(10 + self.payload.len());
		header::write_header(&mut data, header)?;

		match mask_key {
			Some(key) => data.append(&mut mask::mask_data(key, &self.payload)),
			None => data.extend_from_slice(&self.payload),
		}

		writer.write_all(data.as_slice())?;
		Ok(())
	}
}
