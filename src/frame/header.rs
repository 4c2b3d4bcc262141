//! Utility functions for reading and writing frame headers.

use crate::result::{WebSocketError, WebSocketResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

bitflags! {
	/// Flags relevant to a WebSocket frame.
	pub struct FrameFlags: u8 {
		/// Marks this frame as the last frame of the message
		const FIN = 0x80;
		/// First reserved bit
		const RSV1 = 0x40;
		/// Second reserved bit
		const RSV2 = 0x20;
		/// Third reserved bit
		const RSV3 = 0x10;
	}
}

/// Represents a frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
	/// The bit flags for the first byte of the header.
	pub flags: FrameFlags,
	/// The opcode of the header - must be <= 16.
	pub opcode: u8,
	/// The masking key, if any.
	pub mask: Option<[u8; 4]>,
	/// The length of the payload.
	pub len: u64,
}

/// Writes a frame header, using the smallest of the three payload length
/// encodings that fits.
pub fn write_header(writer: &mut dyn Write, header: FrameHeader) -> WebSocketResult<()> {
	if header.opcode > 0xF {
		return Err(WebSocketError::ProtocolError("invalid frame opcode"));
	}
	if header.opcode >= 8 && header.len > 125 {
		return Err(WebSocketError::ProtocolError(
			"control frame payload too long",
		));
	}

	// Write 'FIN', 'RSV1', 'RSV2', 'RSV3' and 'opcode'
	writer.write_u8((header.flags.bits) | header.opcode)?;

	writer.write_u8(
		// Write the 'MASK'
		if header.mask.is_some() { 0x80 } else { 0x00 } |
		// Write the 'Payload len'
		if header.len <= 125 { header.len as u8 }
		else if header.len <= 65535 { 126 }
		else { 127 },
	)?;

	// Write 'Extended payload length'
	if header.len >= 126 && header.len <= 65535 {
		writer.write_u16::<BigEndian>(header.len as u16)?;
	} else if header.len > 65535 {
		writer.write_u64::<BigEndian>(header.len)?;
	}

	// Write 'Masking-key'
	if let Some(mask) = header.mask {
		writer.write_all(&mask)?
	}

	Ok(())
}

/// Reads a frame header.
///
/// All three payload length encodings are accepted, including non-minimal
/// ones. A set RSV bit, a 64-bit length with its sign bit set, and an
/// oversized or fragmented control frame are all protocol errors.
pub fn read_header<R>(reader: &mut R) -> WebSocketResult<FrameHeader>
where
	R: Read,
{
	let byte0 = reader.read_u8()?;
	let byte1 = reader.read_u8()?;

	let flags = FrameFlags::from_bits_truncate(byte0);
	let opcode = byte0 & 0x0F;

	if flags.intersects(FrameFlags::RSV1 | FrameFlags::RSV2 | FrameFlags::RSV3) {
		return Err(WebSocketError::ProtocolError("extensions not supported"));
	}

	let len = match byte1 & 0x7F {
		0..=125 => u64::from(byte1 & 0x7F),
		126 => u64::from(reader.read_u16::<BigEndian>()?),
		127 => {
			let len = reader.read_u64::<BigEndian>()?;
			if len & (1 << 63) != 0 {
				return Err(WebSocketError::ProtocolError(
					"negative 64-bit frame length",
				));
			}
			len
		}
		_ => unreachable!(),
	};

	if opcode >= 8 {
		if len > 125 {
			return Err(WebSocketError::ProtocolError(
				"control frame payload too long",
			));
		}
		if !flags.contains(FrameFlags::FIN) {
			return Err(WebSocketError::ProtocolError("fragmented control frame"));
		}
	}

	let mask = if byte1 & 0x80 == 0x80 {
		Some([
			reader.read_u8()?,
			reader.read_u8()?,
			reader.read_u8()?,
			reader.read_u8()?,
		])
	} else {
		None
	};

	Ok(FrameHeader {
		flags,
		opcode,
		mask,
		len,
	})
}
