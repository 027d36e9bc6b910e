use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// In-memory log sink that tests can read back.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
  pub(crate) fn contents(&self) -> String {
    String::from_utf8(self.0.lock().clone()).unwrap()
  }
}

impl Write for SharedBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}
