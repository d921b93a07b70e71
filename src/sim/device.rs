//! Handlers for the console devices connected to the Simulator.
//!
//! The simulator talks to two devices:
//! - a keyboard ([`KeyboardDevice`]), which backs the `KBSR`/`KBDR` device registers
//!   and the `GETC` and `IN` traps,
//! - a display ([`DisplayDevice`]), which receives everything written by the
//!   `OUT`, `PUTS`, `PUTSP`, `IN` and `HALT` traps.
//!
//! Both are held by the [`DeviceHandler`] (the Simulator's `device_handler` field).
//!
//! This module also provides some devices:
//! - [`NullDevice`]: No input, discards output.
//! - [`BufferedKeyboard`]: Keyboard device that reads off of an input buffer.
//! - [`BufferedDisplay`]: Display device that writes to an output buffer.
//! - [`ChannelKeyboard`]: Keyboard device fed by a channel (e.g., a stdin reader thread).
//! - [`StdoutDisplay`]: Display device that writes to the process's stdout.

mod keyboard;
mod display;

pub use keyboard::{BufferedKeyboard, ChannelKeyboard};
pub use display::{BufferedDisplay, StdoutDisplay};

/// Keyboard status register (bit 15 is set when a character is ready).
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register (holds the last character polled from the keyboard).
pub const KBDR: u16 = 0xFE02;

/// A source of keyboard input.
pub trait KeyboardDevice: Send + 'static {
    /// Takes a character if one is ready, without waiting for one.
    ///
    /// This is used when a program reads `KBSR`.
    fn poll(&mut self) -> Option<u8>;

    /// Takes a character, waiting until one is ready.
    ///
    /// This returns `None` if the input is closed and no more characters can arrive.
    fn read(&mut self) -> Option<u8>;

    /// Resets device.
    fn reset(&mut self) {}
}

/// A sink for console output.
pub trait DisplayDevice: Send + 'static {
    /// Writes bytes to the display.
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Flushes any output buffered by the display.
    fn flush(&mut self) -> std::io::Result<()>;

    /// Resets device.
    fn reset(&mut self) {}
}

/// The central hub for the Simulator's console devices.
///
/// By default, both devices are [`NullDevice`]s.
pub struct DeviceHandler {
    keyboard: Box<dyn KeyboardDevice>,
    display: Box<dyn DisplayDevice>
}

impl DeviceHandler {
    /// Creates a new device handler.
    pub fn new() -> Self {
        Self {
            keyboard: Box::new(NullDevice),
            display: Box::new(NullDevice)
        }
    }

    /// Set the keyboard device.
    pub fn set_keyboard(&mut self, kb: impl KeyboardDevice) {
        self.keyboard = Box::new(kb);
    }
    /// Set the display device.
    pub fn set_display(&mut self, ds: impl DisplayDevice) {
        self.display = Box::new(ds);
    }

    /// Polls the keyboard without blocking. See [`KeyboardDevice::poll`].
    pub fn poll_key(&mut self) -> Option<u8> {
        self.keyboard.poll()
    }
    /// Reads from the keyboard, blocking. See [`KeyboardDevice::read`].
    pub fn read_key(&mut self) -> Option<u8> {
        self.keyboard.read()
    }

    /// Writes bytes to the display.
    pub fn write_output(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.display.write(bytes)
    }
    /// Flushes the display.
    pub fn flush_output(&mut self) -> std::io::Result<()> {
        self.display.flush()
    }

    /// Resets all the devices connected to this handler.
    pub fn io_reset(&mut self) {
        self.keyboard.reset();
        self.display.reset();
    }
}
impl Default for DeviceHandler {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for DeviceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandler").finish_non_exhaustive()
    }
}

/// Does nothing.
///
/// As a keyboard, it never has input (and is always closed).
/// As a display, it discards everything written to it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullDevice;
impl KeyboardDevice for NullDevice {
    fn poll(&mut self) -> Option<u8> {
        None
    }

    fn read(&mut self) -> Option<u8> {
        None
    }
}
impl DisplayDevice for NullDevice {
    fn write(&mut self, _bytes: &[u8]) -> std::io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
