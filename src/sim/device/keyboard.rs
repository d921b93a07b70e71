use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};

use crossbeam_channel as cbc;

use super::KeyboardDevice;
use crate::sim::InterruptFlag;

/// The byte a raw-mode terminal sends for Ctrl-C.
const CTRL_C: u8 = 0x03;

/// Keyboard that accesses input from a memory buffer.
///
/// Since nothing else is expected to fill the buffer while the simulator runs,
/// a blocking read of an empty buffer is treated as closed input.
#[derive(Default, Clone)]
pub struct BufferedKeyboard {
    buffer: Arc<RwLock<VecDeque<u8>>>
}
impl BufferedKeyboard {
    /// Creates a new keyboard, wrapping it around a given buffer.
    pub fn new(buffer: Arc<RwLock<VecDeque<u8>>>) -> Self {
        Self { buffer }
    }

    /// Gets a reference to the internal buffer of this keyboard.
    pub fn get_buffer(&self) -> &Arc<RwLock<VecDeque<u8>>> {
        &self.buffer
    }

    fn try_input(&self) -> Option<RwLockWriteGuard<'_, VecDeque<u8>>> {
        match self.buffer.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
impl KeyboardDevice for BufferedKeyboard {
    fn poll(&mut self) -> Option<u8> {
        self.try_input()?.pop_front()
    }

    fn read(&mut self) -> Option<u8> {
        let mut input = match self.buffer.write() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        input.pop_front()
    }

    fn reset(&mut self) {
        if let Some(mut inp) = self.try_input() {
            inp.clear();
        }
    }
}
impl std::fmt::Debug for BufferedKeyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedKeyboard").finish_non_exhaustive()
    }
}

/// Keyboard that receives its input from a channel.
///
/// Input is considered closed once every sender of the channel has been dropped.
/// [`ChannelKeyboard::stdin`] creates one of these backed by a thread reading the process's stdin.
#[derive(Debug)]
pub struct ChannelKeyboard {
    input: cbc::Receiver<u8>
}
impl ChannelKeyboard {
    /// Creates a new keyboard which reads from the given receiver.
    pub fn new(input: cbc::Receiver<u8>) -> Self {
        Self { input }
    }

    /// Creates a keyboard fed by a thread which reads stdin one byte at a time.
    ///
    /// See [`ChannelKeyboard::reader`] for how `raw` changes the input.
    ///
    /// The reader thread keeps running (blocked on stdin) until the process exits.
    pub fn stdin(interrupt: InterruptFlag, raw: bool) -> Self {
        Self::reader(std::io::stdin(), interrupt, raw)
    }

    /// Creates a keyboard fed by a thread which reads the given source one byte at a time.
    ///
    /// If `raw` is set, the source is treated as a terminal in raw mode, which delivers
    /// keys untranslated:
    /// - the Ctrl-C byte (`0x03`) sets the provided interrupt flag
    ///   (requesting the simulator to stop) and closes the input,
    /// - Enter (`\r`) is delivered as `\n`.
    ///
    /// The input closes when the source reaches its end or fails.
    pub fn reader(mut source: impl Read + Send + 'static, interrupt: InterruptFlag, raw: bool) -> Self {
        let (tx, rx) = cbc::unbounded();

        std::thread::spawn(move || {
            let mut byte = [0u8];

            loop {
                match source.read(&mut byte) {
                    Ok(0) => {
                        log::debug!("keyboard source reached end of input");
                        return;
                    },
                    Ok(_) => {},
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::error!("failed to read keyboard input: {e}");
                        return;
                    }
                }

                let ch = match byte[0] {
                    CTRL_C if raw => {
                        log::debug!("received Ctrl-C, requesting stop");
                        interrupt.store(true, Ordering::Relaxed);
                        return;
                    },
                    b'\r' if raw => b'\n',
                    b => b
                };
                let Ok(()) = tx.send(ch) else { return };
            }
        });

        Self::new(rx)
    }
}
impl KeyboardDevice for ChannelKeyboard {
    fn poll(&mut self) -> Option<u8> {
        // Disconnected just means no more data will come, which looks the same as no data here.
        self.input.try_recv().ok()
    }

    fn read(&mut self) -> Option<u8> {
        self.input.recv().ok()
    }

    fn reset(&mut self) {
        while self.input.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crossbeam_channel as cbc;

    use crate::sim::InterruptFlag;

    use super::{BufferedKeyboard, ChannelKeyboard, KeyboardDevice};

    #[test]
    fn test_buffered_keyboard() {
        let mut kb = BufferedKeyboard::default();
        assert_eq!(kb.poll(), None);
        assert_eq!(kb.read(), None);

        kb.get_buffer().write().unwrap().extend(b"ab");
        assert_eq!(kb.poll(), Some(b'a'));
        assert_eq!(kb.read(), Some(b'b'));
        assert_eq!(kb.read(), None);

        kb.get_buffer().write().unwrap().extend(b"cd");
        kb.reset();
        assert_eq!(kb.poll(), None);
    }

    #[test]
    fn test_channel_keyboard() {
        let (tx, rx) = cbc::unbounded();
        let mut kb = ChannelKeyboard::new(rx);

        assert_eq!(kb.poll(), None);
        tx.send(b'x').unwrap();
        tx.send(b'y').unwrap();
        assert_eq!(kb.poll(), Some(b'x'));
        assert_eq!(kb.read(), Some(b'y'));

        // input closes once the sender is gone
        std::mem::drop(tx);
        assert_eq!(kb.read(), None);
        assert_eq!(kb.poll(), None);
    }

    #[test]
    fn test_channel_keyboard_blocking_read() {
        let (tx, rx) = cbc::bounded(1);
        let mut kb = ChannelKeyboard::new(rx);

        let sender = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            tx.send(b'!').unwrap();
        });
        assert_eq!(kb.read(), Some(b'!'));
        sender.join().unwrap();
    }

    #[test]
    fn test_raw_reader_translates_enter_and_ctrl_c() {
        let interrupt = InterruptFlag::default();
        let mut kb = ChannelKeyboard::reader(&b"a\r\x03b"[..], interrupt.clone(), true);

        assert_eq!(kb.read(), Some(b'a'));
        assert_eq!(kb.read(), Some(b'\n'));
        // Ctrl-C closes the input, so nothing after it arrives
        assert_eq!(kb.read(), None);
        assert!(interrupt.load(Ordering::Relaxed));
    }

    #[test]
    fn test_cooked_reader_passes_bytes_through() {
        let interrupt = InterruptFlag::default();
        let mut kb = ChannelKeyboard::reader(&b"\r\x03\n"[..], interrupt.clone(), false);

        assert_eq!(kb.read(), Some(b'\r'));
        assert_eq!(kb.read(), Some(0x03));
        assert_eq!(kb.read(), Some(b'\n'));
        assert_eq!(kb.read(), None);
        assert!(!interrupt.load(Ordering::Relaxed));
    }
}
