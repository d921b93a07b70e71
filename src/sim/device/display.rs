use std::io::Write;
use std::sync::{Arc, RwLock};

use super::DisplayDevice;

/// A display that delegates its output to a buffer.
#[derive(Default, Clone)]
pub struct BufferedDisplay {
    buffer: Arc<RwLock<Vec<u8>>>
}
impl BufferedDisplay {
    /// Creates a new display, wrapping it around a given buffer.
    pub fn new(buffer: Arc<RwLock<Vec<u8>>>) -> Self {
        Self { buffer }
    }

    /// Gets a reference to the internal buffer of this display.
    pub fn get_buffer(&self) -> &Arc<RwLock<Vec<u8>>> {
        &self.buffer
    }
}
impl DisplayDevice for BufferedDisplay {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut out = match self.buffer.write() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        out.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn reset(&mut self) {
        if let Ok(mut out) = self.buffer.try_write() {
            out.clear();
        }
    }
}
impl std::fmt::Debug for BufferedDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedDisplay").finish_non_exhaustive()
    }
}

/// A display that writes to stdout.
///
/// When the terminal is in raw mode, it no longer turns `\n` into `\r\n`.
/// [`StdoutDisplay::with_crlf`] creates a display that does that translation itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutDisplay {
    crlf: bool
}
impl StdoutDisplay {
    /// Creates a display that writes bytes to stdout as-is.
    pub fn new() -> Self {
        Self { crlf: false }
    }

    /// Creates a display that writes to stdout, expanding `\n` to `\r\n` if `crlf` is set.
    pub fn with_crlf(crlf: bool) -> Self {
        Self { crlf }
    }
}
impl DisplayDevice for StdoutDisplay {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        if !self.crlf {
            return out.write_all(bytes);
        }

        for line in bytes.split_inclusive(|&b| b == b'\n') {
            match line.strip_suffix(b"\n") {
                Some(body) => {
                    out.write_all(body)?;
                    out.write_all(b"\r\n")?;
                },
                None => out.write_all(line)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}
