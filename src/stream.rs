//! Provides the stream abstraction a connection is built over.
//!
//! The core never opens sockets itself; the embedding HTTP layer hands over
//! an already-connected duplex byte stream. Anything `Read + Write` works,
//! which keeps the protocol machinery testable against in-memory buffers.

use std::io::{self, Read, Write};
use std::net::TcpStream;

pub use std::net::Shutdown;

/// Represents a stream that can be read from, and written to.
pub trait Stream: Read + Write {}
impl<S> Stream for S where S: Read + Write {}

/// Access to the TCP socket beneath a stream, when there is one.
///
/// The server uses this to apply the configured read timeout and to shut the
/// socket down during teardown. Streams without a real socket (in-memory
/// pairs used in tests, pipes) return `None` and those steps are skipped.
pub trait AsTcpStream {
	/// Borrow the underlying `TcpStream`, if any.
	fn as_tcp(&self) -> Option<&TcpStream>;
}

impl AsTcpStream for TcpStream {
	fn as_tcp(&self) -> Option<&TcpStream> {
		Some(self)
	}
}

impl<T> AsTcpStream for Box<T>
where
	T: AsTcpStream + ?Sized,
{
	fn as_tcp(&self) -> Option<&TcpStream> {
		(**self).as_tcp()
	}
}

/// The full set of capabilities a connection's stream needs.
pub trait NetworkStream: Stream + AsTcpStream {}
impl<S> NetworkStream for S where S: Stream + AsTcpStream {}

/// Combines an input stream and an output stream into a single duplex
/// stream. Useful when the two directions come from different mediums,
/// and for driving a connection from pre-recorded bytes in tests.
pub struct ReadWritePair<R, W>(pub R, pub W)
where
	R: Read,
	W: Write;

impl<R, W> Read for ReadWritePair<R, W>
where
	R: Read,
	W: Write,
{
	#[inline(always)]
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
	#[inline(always)]
	fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
		self.0.read_to_end(buf)
	}
	#[inline(always)]
	fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
		self.0.read_exact(buf)
	}
}

impl<R, W> Write for ReadWritePair<R, W>
where
	R: Read,
	W: Write,
{
	#[inline(always)]
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.1.write(buf)
	}
	#[inline(always)]
	fn flush(&mut self) -> io::Result<()> {
		self.1.flush()
	}
	#[inline(always)]
	fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
		self.1.write_all(buf)
	}
}

impl<R, W> AsTcpStream for ReadWritePair<R, W>
where
	R: Read,
	W: Write,
{
	fn as_tcp(&self) -> Option<&TcpStream> {
		None
	}
}
