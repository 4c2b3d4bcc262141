//! Small helpers shared by the unit tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// A cloneable write sink, so a test can keep inspecting bytes a connection
/// wrote after handing the stream over.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
	pub fn contents(&self) -> Vec<u8> {
		self.0.lock().unwrap().clone()
	}
}

impl Write for SharedBuf {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}
	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
