//! The trap service routines.
//!
//! These are implemented natively (rather than as LC-3 routines in memory),
//! talking directly to the simulator's devices.

use crate::ast::reg_consts::{R0, R7};

use super::mem::MEM_SIZE;
use super::{SimErr, Simulator, StepBreak};

macro_rules! int_vect {
    ($(#[$m:meta])* $Type:ident, {$($(#[$vm:meta])* $name:ident = $value:literal), +}) => {
        $(#[$m])*
        pub enum $Type {
            $($(#[$vm])* $name = $value),+
        }
        impl TryFrom<u8> for $Type {
            type Error = ();

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name)),+,
                    _ => Err(())
                }
            }
        }
    }
}
int_vect!(
    /// The trap vectors which have service routines.
    #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
    TrapCode, {
    /// Reads a character into `R0` without echoing it.
    Getc = 0x20,
    /// Writes the character in `R0`.
    Out = 0x21,
    /// Writes the string (one character per word) starting at the address in `R0`.
    Puts = 0x22,
    /// Prompts for a character, echoes it, and reads it into `R0`.
    In = 0x23,
    /// Writes the string (two characters per word) starting at the address in `R0`.
    Putsp = 0x24,
    /// Stops the machine.
    Halt = 0x25
});

/// The prompt the `IN` trap prints.
const IN_PROMPT: &[u8] = b"Enter a character: ";

impl Simulator {
    /// Executes the trap with the given vector.
    ///
    /// `R7` is set to the return address (the current PC) before anything else.
    ///
    /// If the trap is interrupted while waiting for input, the PC and `R7` are put back,
    /// so the `TRAP` instruction runs again when execution resumes.
    pub(super) fn execute_trap(&mut self, vect: u8) -> Result<(), StepBreak> {
        let saved_r7 = self.reg_file[R7];
        let result = self.run_trap(vect);

        if let Err(StepBreak::Interrupt) = result {
            self.reg_file[R7] = saved_r7;
            self.pc = self.prefetch_pc();
            log::debug!("trap x{vect:02X} interrupted, rewound to x{:04X}", self.pc);
        }
        result
    }

    fn run_trap(&mut self, vect: u8) -> Result<(), StepBreak> {
        self.reg_file[R7] = self.pc;

        let Ok(code) = TrapCode::try_from(vect) else {
            return Err(SimErr::InvalidTrapVect(vect).into());
        };

        match code {
            TrapCode::Getc => {
                let ch = self.read_char()?;
                self.reg_file[R0] = u16::from(ch);
                self.set_cc(u16::from(ch));
            },
            TrapCode::Out => {
                let ch = self.reg_file[R0] as u8;
                self.device_handler.write_output(&[ch])?;
                self.device_handler.flush_output()?;
            },
            TrapCode::Puts => {
                let string = self.read_string(self.reg_file[R0], false);
                self.device_handler.write_output(&string)?;
                self.device_handler.flush_output()?;
            },
            TrapCode::In => {
                self.device_handler.write_output(IN_PROMPT)?;
                self.device_handler.flush_output()?;

                let ch = self.read_char()?;
                self.device_handler.write_output(&[ch])?;
                self.device_handler.flush_output()?;

                self.reg_file[R0] = u16::from(ch);
                self.set_cc(u16::from(ch));
            },
            TrapCode::Putsp => {
                let string = self.read_string(self.reg_file[R0], true);
                self.device_handler.write_output(&string)?;
                self.device_handler.flush_output()?;
            },
            TrapCode::Halt => {
                if self.flags.announce_halt {
                    self.device_handler.write_output(b"HALT\n")?;
                }
                self.device_handler.flush_output()?;

                self.halted = true;
                log::debug!("halted at x{:04X}", self.prefetch_pc());
                return Err(StepBreak::Halt);
            },
        }

        Ok(())
    }

    /// Waits for a character from the keyboard.
    ///
    /// If input closes because of an interrupt request, this breaks with an interrupt.
    fn read_char(&mut self) -> Result<u8, StepBreak> {
        match self.device_handler.read_key() {
            Some(ch) => Ok(ch),
            None if self.take_interrupt() => Err(StepBreak::Interrupt),
            None => Err(SimErr::InputClosed.into()),
        }
    }

    /// Collects the string starting at `start`.
    ///
    /// Unpacked strings hold one character per word (in its low byte) and end at a zero word.
    /// Packed strings hold two characters per word (low byte first) and end at a zero byte.
    ///
    /// Strings wrap around the end of memory and are at most one full pass over memory long.
    fn read_string(&self, start: u16, packed: bool) -> Vec<u8> {
        let mut string = vec![];

        for i in 0..MEM_SIZE {
            let word = self.mem[start.wrapping_add(i as u16)];
            let [lo, hi] = word.to_le_bytes();

            if !packed {
                if word == 0 { break; }
                string.push(lo);
            } else {
                if lo == 0 { break; }
                string.push(lo);
                if hi == 0 { break; }
                string.push(hi);
            }
        }

        string
    }
}
