//! Host terminal configuration.
//!
//! Programs expect to receive keys as soon as they are pressed (without the user pressing Enter)
//! and without the terminal echoing them, so the terminal is put in raw mode while a program runs.
//!
//! [`RawModeGuard`] restores the terminal when it is dropped, so the terminal is restored
//! however the run ends.

/// Keeps the terminal in raw mode for as long as it is alive.
///
/// While raw mode is on:
/// - input is unbuffered and not echoed,
/// - Ctrl-C arrives as the byte `0x03` instead of a signal,
/// - Enter arrives as `\r` instead of `\n`,
/// - `\n` is no longer turned into `\r\n` on output.
///
/// [`ChannelKeyboard::stdin`] (with `raw` set) undoes the input changes
/// and [`StdoutDisplay::with_crlf`] undoes the output change.
///
/// [`ChannelKeyboard::stdin`]: crate::sim::device::ChannelKeyboard::stdin
/// [`StdoutDisplay::with_crlf`]: crate::sim::device::StdoutDisplay::with_crlf
#[derive(Debug)]
pub struct RawModeGuard {
    enabled: bool
}

impl RawModeGuard {
    /// Puts the terminal in raw mode if `enable` is set.
    ///
    /// If `enable` is not set, the guard does nothing.
    pub fn enter(enable: bool) -> std::io::Result<Self> {
        if enable {
            crossterm::terminal::enable_raw_mode()?;
            log::debug!("entered raw mode");
        }
        Ok(Self { enabled: enable })
    }

    /// Creates a guard which leaves the terminal alone.
    pub fn inactive() -> Self {
        Self { enabled: false }
    }

    /// Whether this guard put the terminal in raw mode.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                log::error!("failed to restore terminal: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RawModeGuard;

    #[test]
    fn test_disabled_guard_is_inert() {
        let guard = RawModeGuard::enter(false).unwrap();
        assert!(!guard.is_enabled());
        drop(guard);

        assert!(!RawModeGuard::inactive().is_enabled());
    }
}
