//! Simulating and execution for LC-3 programs.
//!
//! This module is focused on executing loaded program images (i.e., [`ImageFile`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates a loaded program.
//! - [`mem`]: The module handling memory and the register file.
//! - [`device`]: The module handling the keyboard and display connected to the simulator.
//! - [`debug`]: The module handling types of breakpoints for the simulator.
//!
//! # Usage
//!
//! To simulate a program, instantiate a Simulator and load an image into it:
//!
//! ```no_run
//! use lc3_vm::image::ImageFile;
//! use lc3_vm::sim::Simulator;
//!
//! let image = ImageFile::read("program.obj").unwrap();
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_image(&image);
//! simulator.run().unwrap();
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish to fill memory with seeded random garbage instead of zeroes:
//!
//! ```
//! # use lc3_vm::sim::{Simulator, SimFlags};
//! use lc3_vm::sim::mem::MachineInitStrategy;
//!
//! let simulator = Simulator::new(SimFlags {
//!     machine_init: MachineInitStrategy::Seeded { seed: 2110 },
//!     ..Default::default()
//! });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting),
//! there are also:
//! - [`Simulator::step_in`], [`Simulator::step_out`], [`Simulator::step_over`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use lc3_vm::sim::Simulator;
//! use lc3_vm::ast::reg_consts::R0;
//!
//! let mut sim = Simulator::new(Default::default());
//! // ADD R0, R0, #1 (x3)
//! sim.mem.copy_block(0x3000, &[0x1021, 0x1021, 0x1021, 0xF025]);
//!
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 1);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 2);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 3);
//! ```
//!
//! ## Querying State
//!
//! - The PC is the `sim.pc` field and the condition codes are the `sim.cond` field.
//! - The register file is the `sim.reg_file` field, indexed by [`Reg`].
//! - Memory is accessible in two ways:
//!     - Direct access to the memory array (via the `mem` field), which does not trigger IO.
//!     - [`Simulator::read_mem`] and [`Simulator::write_mem`], which behave like a program's loads and stores
//!       (reading `KBSR` polls the keyboard).
//!
//! ## IO
//!
//! Console IO is handled by the devices registered in the Simulator's device handler
//! (the `device_handler` field). By default, there is no input and output is discarded.
//!
//! The best IO for programmatic uses is [`device::BufferedKeyboard`] and [`device::BufferedDisplay`],
//! which expose the IO as memory buffers that can be modified.
//!
//! ```
//! use lc3_vm::sim::Simulator;
//! use lc3_vm::sim::device::{BufferedKeyboard, BufferedDisplay};
//!
//! let mut sim = Simulator::new(Default::default());
//! // LOOP: GETC; OUT; ADD R0, R0, #0; BRnp LOOP; HALT
//! sim.mem.copy_block(0x3000, &[0xF020, 0xF021, 0x1020, 0x0BFC, 0xF025]);
//!
//! let input = BufferedKeyboard::default();
//! let output = BufferedDisplay::default();
//! sim.device_handler.set_keyboard(input.clone());
//! sim.device_handler.set_display(output.clone());
//!
//! input.get_buffer().write().unwrap().extend(b"Hello, World!\0");
//! sim.run().unwrap();
//!
//! assert!(input.get_buffer().read().unwrap().is_empty());
//! assert_eq!(&**output.get_buffer().read().unwrap(), b"Hello, World!\0HALT\n");
//! ```
//!
//! ## Interrupting
//!
//! A running simulator can be asked to stop from outside (e.g. when the user presses Ctrl-C)
//! by setting the flag returned by [`Simulator::interrupt_flag`].
//! The simulator stops before executing its next instruction (or while waiting on input)
//! and [`Simulator::hit_interrupt`] reports it.
//!
//! [`ImageFile`]: crate::image::ImageFile
//! [`Reg`]: crate::ast::Reg
pub mod mem;
pub mod debug;
pub mod device;
mod trap;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ast::reg_consts::R7;
use crate::ast::sim::{Opcode, SimInstr};
use crate::ast::ImmOrReg;
use crate::image::ImageFile;
use debug::Breakpoint;
use device::{DeviceHandler, KBDR, KBSR};

use self::mem::{MemArray, RegFile};

pub use trap::TrapCode;

/// Errors that can occur during simulation.
#[derive(Debug)]
pub enum SimErr {
    /// An instruction with a reserved opcode (`RTI` or the reserved `1101` opcode) was executed.
    IllegalOpcode(Opcode),
    /// A `TRAP` instruction was executed with a vector that has no service routine.
    InvalidTrapVect(u8),
    /// `GETC` or `IN` needed a character, but the keyboard's input was closed.
    InputClosed,
    /// Output could not be written to the display.
    Io(std::io::Error),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalOpcode(op)    => write!(f, "simulator executed illegal opcode {op}"),
            SimErr::InvalidTrapVect(v)   => write!(f, "simulator executed unknown trap x{v:02X}"),
            SimErr::InputClosed          => f.write_str("input was closed while waiting for a character"),
            SimErr::Io(e)                => write!(f, "failed to write output: {e}"),
        }
    }
}
impl std::error::Error for SimErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimErr::Io(e) => Some(e),
            _ => None
        }
    }
}
impl From<std::io::Error> for SimErr {
    fn from(value: std::io::Error) -> Self {
        SimErr::Io(value)
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// The HALT trap was executed.
    Halt,
    /// An external interrupt was requested.
    Interrupt,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}
impl From<std::io::Error> for StepBreak {
    fn from(value: std::io::Error) -> Self {
        Self::Err(SimErr::Io(value))
    }
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// An external interrupt was requested.
    Interrupt,
    /// Program hit a breakpoint.
    Breakpoint,
    /// Program hit a tripwire condition.
    Tripwire,
    /// Program hit an error and did not pause successfully.
    #[default]
    Unsuccessful
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`]
/// and their effects should still apply.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The creation strategy for the initial contents of memory and the register file.
    ///
    /// This flag only goes into effect after a `Simulator::new` or `Simulator::reset` call.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`] (all zeroes).
    ///
    /// [`MachineInitStrategy::default`]: mem::MachineInitStrategy::default
    pub machine_init: mem::MachineInitStrategy,

    /// Whether the `HALT` trap prints `HALT` before stopping.
    ///
    /// By default, this flag is `true`.
    pub announce_halt: bool,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            machine_init: Default::default(),
            announce_halt: true,
        }
    }
}

/// The address the PC starts at.
pub const PC_START: u16 = 0x3000;

/// A shared flag which requests the simulator to stop when set.
///
/// See [`Simulator::interrupt_flag`].
pub type InterruptFlag = Arc<AtomicBool>;

/// Executes LC-3 programs.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    ///
    /// Note that this is held in the heap, as it is too large for the stack.
    pub mem: MemArray,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u16,

    /// The condition code register. See [`Cond`] for more details.
    pub cond: Cond,

    /// How many subroutine calls deep the program currently is.
    ///
    /// `JSR`/`JSRR` increase this by 1 and `RET` decreases it by 1.
    /// This is only used for [`Simulator::step_over`] and [`Simulator::step_out`].
    call_depth: usize,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates whether the PC has been incremented in the fetch stage yet.
    ///
    /// This is just for error handling purposes. It's used to compute
    /// the PC of the instruction that caused an error. See [`Simulator::prefetch_pc`].
    prefetch: bool,

    /// Whether the machine has executed `HALT`.
    ///
    /// Once halted, no further instructions are fetched until [`Simulator::reset`].
    halted: bool,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Set from outside the simulator to request a stop.
    interrupt: InterruptFlag,

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Breakpoints for the simulator.
    pub breakpoints: HashSet<Breakpoint>,

    /// The keyboard and display connected to the simulator.
    pub device_handler: DeviceHandler
}
impl Simulator where Simulator: Send {}

impl Simulator {
    /// Creates a new simulator with the provided flags and interrupt flag.
    fn new_with_interrupt(flags: SimFlags, interrupt: InterruptFlag) -> Self {
        let mut filler = flags.machine_init.generator();

        let mut sim = Self {
            mem: MemArray::new(&mut filler),
            reg_file: RegFile::new(&mut filler),
            pc: PC_START,
            cond: Cond::new(),
            call_depth: 0,
            instructions_run: 0,
            prefetch: false,
            halted: false,
            pause_condition: Default::default(),

            interrupt,
            flags,
            breakpoints: Default::default(),
            device_handler: Default::default()
        };

        sim.mem[KBSR] = 0;
        sim.mem[KBDR] = 0;
        sim
    }

    /// Creates a new simulator with the provided flags.
    ///
    /// The machine starts with the PC at `x3000` and the condition code set to `z`.
    pub fn new(flags: SimFlags) -> Self {
        Self::new_with_interrupt(flags, Arc::default())
    }

    /// Resets the simulator.
    ///
    /// This resets the state of the `Simulator` back to before any execution calls,
    /// while preserving configuration and debug state.
    ///
    /// Note that this function preserves:
    /// - Flags
    /// - Breakpoints
    /// - The interrupt flag (i.e., anything with access to it can still interrupt the Simulator)
    /// - Devices (however, their buffered state is reset)
    ///
    /// This also does not reload images. Any image has to be reloaded into the Simulator.
    pub fn reset(&mut self) {
        let interrupt = Arc::clone(&self.interrupt);
        let flags = self.flags;
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let dev_handler = std::mem::take(&mut self.device_handler);

        *self = Simulator::new_with_interrupt(flags, interrupt);
        self.breakpoints = breakpoints;
        self.device_handler = dev_handler;
        self.device_handler.io_reset();
    }

    /// Reads the word at the provided address, as a program's load would.
    ///
    /// Reading `KBSR` polls the keyboard:
    /// - if a character is ready, `KBSR` is set to `x8000` and `KBDR` is set to the character
    /// - otherwise, `KBSR` is set to `x0000` and `KBDR` is left alone.
    ///
    /// Reads of any other address do not have side effects.
    /// If you would like to query the memory's state without polling, index the `mem` field.
    pub fn read_mem(&mut self, addr: u16) -> u16 {
        if addr == KBSR {
            match self.device_handler.poll_key() {
                Some(ch) => {
                    self.mem[KBSR] = 1 << 15;
                    self.mem[KBDR] = u16::from(ch);
                },
                None => self.mem[KBSR] = 0,
            }
        }

        self.mem[addr]
    }

    /// Writes the word at the provided address, as a program's store would.
    pub fn write_mem(&mut self, addr: u16, data: u16) {
        self.mem[addr] = data;
    }

    /// Loads an image into this simulator.
    ///
    /// This overwrites whatever was previously in the image's region of memory
    /// (including parts of previously loaded images).
    pub fn load_image(&mut self, image: &ImageFile) {
        let copied = self.mem.copy_block(image.origin(), image.words());
        log::debug!("loaded {copied} words at x{:04X}", image.origin());
    }

    /// Sets the condition codes using the provided result.
    fn set_cc(&mut self, result: u16) {
        match (result as i16).cmp(&0) {
            std::cmp::Ordering::Less    => self.cond.set_cc_n(),
            std::cmp::Ordering::Equal   => self.cond.set_cc_z(),
            std::cmp::Ordering::Greater => self.cond.set_cc_p(),
        }
    }

    /// Gets the flag which interrupts the simulator.
    ///
    /// Setting this flag (from any thread) makes a running simulator stop
    /// before its next instruction, or while it is blocked waiting for input
    /// (if the keyboard closes its input at the same time, as [`device::ChannelKeyboard::stdin`] does).
    /// The flag is cleared once the simulator acknowledges it.
    ///
    /// ```
    /// use lc3_vm::sim::Simulator;
    /// use std::sync::atomic::Ordering;
    ///
    /// let mut sim = Simulator::new(Default::default());
    /// sim.mem[0x3000] = 0x0FFF; // BRnzp #-1 (loops forever)
    ///
    /// sim.interrupt_flag().store(true, Ordering::Relaxed);
    /// sim.run().unwrap();
    /// assert!(sim.hit_interrupt());
    /// ```
    pub fn interrupt_flag(&self) -> &InterruptFlag {
        &self.interrupt
    }

    /// Takes a pending interrupt request, if there is one.
    fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::Relaxed)
    }

    /// Adds an offset to the PC.
    fn offset_pc(&mut self, offset: i16) {
        self.pc = self.pc.wrapping_add_signed(offset);
    }
    /// Gets the value of the prefetch PC.
    ///
    /// This function is useful as it returns the location of the currently
    /// executing instruction in memory (for example, the instruction which caused an error).
    pub fn prefetch_pc(&self) -> u16 {
        self.pc.wrapping_sub(u16::from(!self.prefetch))
    }

    /// How many subroutine calls deep the program currently is.
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Whether the machine has halted.
    ///
    /// A halted machine does not execute any more instructions until it is reset.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Indicates whether the last execution of the simulator hit a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Breakpoint)
    }

    /// Indicates whether the last execution of the simulator resulted in a HALT successfully occurring.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Halt)
    }

    /// Indicates whether the last execution of the simulator was stopped by an interrupt request.
    pub fn hit_interrupt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Interrupt)
    }

    /// Calls a subroutine.
    ///
    /// This does all the steps for calling a subroutine, namely:
    /// - Setting R7 to the original PC (return address)
    /// - Setting the PC to the subroutine's start address
    /// - Increasing the call depth
    pub fn call_subroutine(&mut self, addr: u16) {
        self.reg_file[R7] = self.pc;
        self.call_depth += 1;
        self.pc = addr;
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - `HALT` is executed (or the machine was already halted)
    /// - an interrupt is requested
    /// - A breakpoint matches
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        self.pause_condition = PauseCondition::default();

        // event loop
        // run until:
        // 1. the machine halts
        // 2. an interrupt is requested
        // 3. the tripwire condition returns false
        // 4. any of the breakpoints are hit
        let result = loop {
            if self.take_interrupt() {
                break Ok(PauseCondition::Interrupt);
            }
            if self.halted {
                break Ok(PauseCondition::Halt);
            }
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            match self.step() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::Interrupt) => break Ok(PauseCondition::Interrupt),
                Err(StepBreak::Err(e)) => break Err(e)
            }

            // After executing, check that any breakpoints were hit.
            if self.breakpoints.iter().any(|bp| bp.check(self)) {
                break Ok(PauseCondition::Breakpoint);
            }
        };

        if let Ok(cond) = &result {
            log::debug!("simulator paused ({cond:?}) at x{:04X} after {} instructions", self.pc, self.instructions_run);
        }
        self.pause_condition = result?;
        Ok(())
    }

    /// Execute the program.
    ///
    /// This blocks until the program ends.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program ends or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Simulate one step, executing one instruction.
    ///
    /// This is the whole instruction cycle:
    /// the word at the PC is fetched, the PC is incremented,
    /// and the decoded instruction is executed.
    fn step(&mut self) -> Result<(), StepBreak> {
        if self.halted {
            return Err(StepBreak::Halt);
        }

        self.prefetch = true;
        let word = self.read_mem(self.pc);
        let instr = SimInstr::decode(word);

        log::trace!("x{:04X}: {instr}", self.pc);
        self.offset_pc(1);
        self.prefetch = false;

        let result = self.execute(instr);
        if matches!(result, Ok(()) | Err(StepBreak::Halt)) {
            self.instructions_run = self.instructions_run.wrapping_add(1);
        }
        result
    }

    /// Executes a decoded instruction.
    ///
    /// At this point, the PC already points to the next instruction,
    /// so all PC-relative addresses are relative to the next instruction.
    fn execute(&mut self, instr: SimInstr) -> Result<(), StepBreak> {
        match instr {
            SimInstr::BR(cc, off) => {
                if cc & self.cond.cc() != 0 {
                    self.offset_pc(off.get());
                }
            },
            SimInstr::ADD(dr, sr1, sr2) => {
                let val1 = self.reg_file[sr1];
                let val2 = match sr2 {
                    ImmOrReg::Imm(i2) => i2.get() as u16,
                    ImmOrReg::Reg(r2) => self.reg_file[r2],
                };

                let result = val1.wrapping_add(val2);
                self.reg_file[dr] = result;
                self.set_cc(result);
            },
            SimInstr::LD(dr, off) => {
                let ea = self.pc.wrapping_add_signed(off.get());
                let val = self.read_mem(ea);
                self.reg_file[dr] = val;
                self.set_cc(val);
            },
            SimInstr::ST(sr, off) => {
                let ea = self.pc.wrapping_add_signed(off.get());
                self.write_mem(ea, self.reg_file[sr]);
            },
            SimInstr::JSR(op) => {
                // The target is computed before R7 is written,
                // so JSRR R7 jumps to the old value of R7.
                let addr = match op {
                    ImmOrReg::Imm(off) => self.pc.wrapping_add_signed(off.get()),
                    ImmOrReg::Reg(br)  => self.reg_file[br],
                };

                self.call_subroutine(addr);
            },
            SimInstr::AND(dr, sr1, sr2) => {
                let val1 = self.reg_file[sr1];
                let val2 = match sr2 {
                    ImmOrReg::Imm(i2) => i2.get() as u16,
                    ImmOrReg::Reg(r2) => self.reg_file[r2],
                };

                let result = val1 & val2;
                self.reg_file[dr] = result;
                self.set_cc(result);
            },
            SimInstr::LDR(dr, br, off) => {
                let ea = self.reg_file[br].wrapping_add_signed(off.get());
                let val = self.read_mem(ea);
                self.reg_file[dr] = val;
                self.set_cc(val);
            },
            SimInstr::STR(sr, br, off) => {
                let ea = self.reg_file[br].wrapping_add_signed(off.get());
                self.write_mem(ea, self.reg_file[sr]);
            },
            SimInstr::NOT(dr, sr) => {
                let result = !self.reg_file[sr];
                self.reg_file[dr] = result;
                self.set_cc(result);
            },
            SimInstr::LDI(dr, off) => {
                let shifted_pc = self.pc.wrapping_add_signed(off.get());
                let ea = self.read_mem(shifted_pc);
                let val = self.read_mem(ea);
                self.reg_file[dr] = val;
                self.set_cc(val);
            },
            SimInstr::STI(sr, off) => {
                let shifted_pc = self.pc.wrapping_add_signed(off.get());
                let ea = self.read_mem(shifted_pc);
                self.write_mem(ea, self.reg_file[sr]);
            },
            SimInstr::JMP(br) => {
                self.pc = self.reg_file[br];

                // RET leaves the current subroutine.
                if br == R7 {
                    self.call_depth = self.call_depth.saturating_sub(1);
                }
            },
            SimInstr::LEA(dr, off) => {
                let ea = self.pc.wrapping_add_signed(off.get());
                self.reg_file[dr] = ea;
                self.set_cc(ea);
            },
            SimInstr::TRAP(vect) => {
                self.execute_trap(vect.get() as u8)?;
            },
            SimInstr::RTI => return Err(SimErr::IllegalOpcode(Opcode::RTI).into()),
            SimInstr::RES => return Err(SimErr::IllegalOpcode(Opcode::RES).into()),
        }

        Ok(())
    }

    /// Simulate one step, executing one instruction.
    ///
    /// Stepping a halted machine does nothing.
    /// If the step is interrupted while waiting for input, the instruction is not completed
    /// and [`Simulator::hit_interrupt`] reports it.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        self.pause_condition = PauseCondition::default();

        match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt) => {
                self.pause_condition = PauseCondition::Halt;
                Ok(())
            },
            Err(StepBreak::Interrupt) => {
                self.pause_condition = PauseCondition::Interrupt;
                Ok(())
            },
            Err(StepBreak::Err(e)) => Err(e)
        }
    }

    /// Simulate one step, executing one instruction and running through entire subroutines as a single step.
    pub fn step_over(&mut self) -> Result<(), SimErr> {
        let curr_frame = self.call_depth;
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        // this function should do at least one step before checking its condition
        // condition: run until we have landed back in the same frame
        self.run_while(|sim| first.take().is_some() || curr_frame < sim.call_depth)
    }

    /// Run through the simulator's execution until the subroutine is exited.
    pub fn step_out(&mut self) -> Result<(), SimErr> {
        let curr_frame = self.call_depth;
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        // this function should do at least one step before checking its condition
        // condition: run until we've landed in a smaller frame
        if curr_frame != 0 {
            self.run_while(|sim| first.take().is_some() || curr_frame <= sim.call_depth)?;
        }

        Ok(())
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// A wrapper over `u16` in order to facilitate the condition code register.
///
/// Only the low three bits are used, and exactly one of them is set at a time:
///
/// ```text
///                   condition codes
///                   |
///                   V
/// 0x0002: 0000 0000 0000 0010
///                         ~~~
///                         NZP
/// ```
///
/// Each of these are exposed as [`Cond::is_n`], [`Cond::is_z`], and [`Cond::is_p`].
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Cond(u16);

impl Cond {
    /// Creates a condition code register with the `z` condition code set.
    pub fn new() -> Self {
        Cond(0b010)
    }

    /// Checks the condition code of the simulator.
    pub fn cc(&self) -> u8 {
        (self.0 & 0b111) as u8
    }
    /// Checks the condition code of the simulator is `n`.
    pub fn is_n(&self) -> bool {
        self.cc() & 0b100 != 0
    }
    /// Checks the condition code of the simulator is `z`.
    pub fn is_z(&self) -> bool {
        self.cc() & 0b010 != 0
    }
    /// Checks the condition code of the simulator is `p`.
    pub fn is_p(&self) -> bool {
        self.cc() & 0b001 != 0
    }

    /// Gets the bit-representation of the register.
    pub fn get(&self) -> u16 {
        self.0
    }
    /// Sets the condition code of the simulator.
    ///
    /// If `cc` does not have exactly one of its low three bits set, `z` is set instead.
    pub fn set_cc(&mut self, mut cc: u8) {
        // Guard from invalid CC.
        cc &= 0b111;
        if cc.count_ones() != 1 { cc = 0b010 };
        self.0 = u16::from(cc);
    }
    /// Sets the condition code of the simulator to `n`.
    pub fn set_cc_n(&mut self) {
        self.set_cc(0b100)
    }
    /// Sets the condition code of the simulator to `z`.
    pub fn set_cc_z(&mut self) {
        self.set_cc(0b010)
    }
    /// Sets the condition code of the simulator to `p`.
    pub fn set_cc_p(&mut self) {
        self.set_cc(0b001)
    }
}
impl Default for Cond {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for Cond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.cc() {
            0b100 => "N",
            0b010 => "Z",
            0b001 => "P",
            _     => "?",
        };
        f.debug_tuple("Cond").field(&format_args!("{name}")).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::ast::reg_consts::{R0, R1, R2, R3, R6, R7};
    use crate::ast::sim::{Opcode, SimInstr};
    use crate::ast::{IOffset, ImmOrReg, TrapVect8};

    use super::debug::{Breakpoint, Comparator};
    use super::device::{BufferedDisplay, BufferedKeyboard, KBDR, KBSR};
    use super::{SimErr, Simulator, PC_START};

    fn off<const N: u32>(n: i16) -> IOffset<N> {
        IOffset::new(n).unwrap()
    }
    fn imm(n: i16) -> ImmOrReg<5> {
        ImmOrReg::Imm(off(n))
    }
    fn trap(vect: u16) -> SimInstr {
        SimInstr::TRAP(TrapVect8::new(vect).unwrap())
    }
    fn halt() -> SimInstr {
        trap(0x25)
    }

    /// Creates a simulator with the program loaded at x3000 and buffered IO attached.
    fn load(program: &[SimInstr]) -> (Simulator, BufferedKeyboard, BufferedDisplay) {
        let words: Vec<_> = program.iter().map(SimInstr::encode).collect();
        load_words(&words)
    }
    fn load_words(words: &[u16]) -> (Simulator, BufferedKeyboard, BufferedDisplay) {
        let mut sim = Simulator::new(Default::default());
        sim.mem.copy_block(PC_START, words);

        let input = BufferedKeyboard::default();
        let output = BufferedDisplay::default();
        sim.device_handler.set_keyboard(input.clone());
        sim.device_handler.set_display(output.clone());

        (sim, input, output)
    }
    fn output_of(display: &BufferedDisplay) -> Vec<u8> {
        display.get_buffer().read().unwrap().clone()
    }
    fn assert_one_flag(sim: &Simulator) {
        let set = [sim.cond.is_n(), sim.cond.is_z(), sim.cond.is_p()];
        assert_eq!(set.iter().filter(|&&b| b).count(), 1, "condition codes: {:?}", sim.cond);
    }

    #[test]
    fn test_initial_state() {
        let sim = Simulator::new(Default::default());
        assert_eq!(sim.pc, 0x3000);
        assert!(sim.cond.is_z());
        assert_one_flag(&sim);
        assert!(!sim.is_halted());
        assert_eq!(sim.mem[KBSR], 0);
    }

    #[test]
    fn test_add_then_halt() {
        let (mut sim, _, output) = load(&[
            SimInstr::ADD(R0, R0, imm(5)),
            halt(),
        ]);

        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert!(sim.is_halted());
        assert_eq!(sim.reg_file[R0], 5);
        assert!(sim.cond.is_p());
        assert_eq!(sim.instructions_run, 2);
        assert_eq!(output_of(&output), b"HALT\n");
    }

    #[test]
    fn test_halt_is_terminal() {
        let (mut sim, _, output) = load(&[
            halt(),
            SimInstr::ADD(R0, R0, imm(1)),
        ]);

        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.reg_file[R7], 0x3001);

        // PC still points at a valid instruction, but nothing else is fetched.
        sim.run().unwrap();
        assert!(sim.hit_halt());
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.instructions_run, 1);
        assert_eq!(output_of(&output), b"HALT\n");

        // Until it's reset.
        sim.reset();
        assert!(!sim.is_halted());
        assert_eq!(sim.pc, 0x3000);
    }

    #[test]
    fn test_silent_halt() {
        let (mut sim, _, output) = load(&[halt()]);
        sim.flags.announce_halt = false;

        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(output_of(&output), b"");
    }

    #[test]
    fn test_add_and_not_flags() {
        let (mut sim, _, _) = load(&[
            SimInstr::ADD(R1, R1, imm(-1)),             // R1 = xFFFF (n)
            SimInstr::ADD(R2, R1, imm(1)),              // R2 = 0 (z), wraps
            SimInstr::NOT(R3, R2),                      // R3 = xFFFF (n)
            SimInstr::AND(R3, R3, imm(0b01111)),        // R3 = 15 (p)
            SimInstr::AND(R0, R1, ImmOrReg::Reg(R3)),   // R0 = 15 (p)
            SimInstr::ADD(R0, R0, ImmOrReg::Reg(R1)),   // R0 = 14 (p)
        ]);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R1], 0xFFFF);
        assert!(sim.cond.is_n());
        assert_one_flag(&sim);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R2], 0);
        assert!(sim.cond.is_z());
        assert_one_flag(&sim);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R3], 0xFFFF);
        assert!(sim.cond.is_n());

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R3], 15);
        assert!(sim.cond.is_p());

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R0], 15);

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R0], 14);
        assert!(sim.cond.is_p());
        assert_one_flag(&sim);
    }

    #[test]
    fn test_signed_overflow_sets_n() {
        let (mut sim, _, _) = load(&[SimInstr::ADD(R0, R0, imm(1))]);
        sim.reg_file[R0] = 0x7FFF;

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R0], 0x8000);
        assert!(sim.cond.is_n());
    }

    #[test]
    fn test_br_self_loop() {
        let (mut sim, _, _) = load(&[SimInstr::BR(0b010, off(-1))]);

        // z is set at startup, so this branches back onto itself.
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x3000);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x3000);

        // n doesn't match p, so this falls through.
        let (mut sim2, _, _) = load(&[SimInstr::BR(0b100, off(-1))]);
        sim2.cond.set_cc_p();
        sim2.step_in().unwrap();
        assert_eq!(sim2.pc, 0x3001);

        // NOP never branches.
        let (mut sim3, _, _) = load(&[SimInstr::BR(0b000, off(-1))]);
        sim3.step_in().unwrap();
        assert_eq!(sim3.pc, 0x3001);
    }

    #[test]
    fn test_run_with_limit() {
        let (mut sim, _, _) = load(&[SimInstr::BR(0b111, off(-1))]);

        sim.run_with_limit(10).unwrap();
        assert_eq!(sim.instructions_run, 10);
        assert!(!sim.hit_halt());
        assert!(!sim.is_halted());
    }

    #[test]
    fn test_loads() {
        let (mut sim, _, _) = load(&[
            SimInstr::LD(R0, off(4)),        // x3000: R0 = mem[x3005]
            SimInstr::LDI(R1, off(4)),       // x3001: R1 = mem[mem[x3006]]
            SimInstr::LEA(R2, off(-3)),      // x3002: R2 = x3000
            SimInstr::LDR(R3, R2, off(-1)),  // x3003: R3 = mem[x2FFF]
            halt(),                          // x3004
        ]);
        sim.mem[0x3005] = 0x8000;
        sim.mem[0x3006] = 0x4000;
        sim.mem[0x4000] = 0x1234;
        sim.mem[0x2FFF] = 0;

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R0], 0x8000);
        assert!(sim.cond.is_n());

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R1], 0x1234);
        assert!(sim.cond.is_p());

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R2], 0x3000);
        assert!(sim.cond.is_p());

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R3], 0);
        assert!(sim.cond.is_z());
    }

    #[test]
    fn test_stores() {
        let (mut sim, _, _) = load(&[
            SimInstr::ST(R0, off(10)),       // x3000: mem[x300B] = R0
            SimInstr::STI(R1, off(10)),      // x3001: mem[mem[x300C]] = R1
            SimInstr::STR(R2, R6, off(-32)), // x3002: mem[R6 - 32] = R2
            halt(),
        ]);
        sim.reg_file[R0] = 0xAAAA;
        sim.reg_file[R1] = 0xBBBB;
        sim.reg_file[R2] = 0xCCCC;
        sim.reg_file[R6] = 0x0010;
        sim.mem[0x300C] = 0x5000;
        sim.cond.set_cc_p();

        sim.run().unwrap();
        assert_eq!(sim.mem[0x300B], 0xAAAA);
        assert_eq!(sim.mem[0x5000], 0xBBBB);
        assert_eq!(sim.mem[0xFFF0], 0xCCCC);
        // stores don't touch the condition codes
        assert!(sim.cond.is_p());
    }

    #[test]
    fn test_jsr_sets_return_address() {
        // JSR (PC-relative)
        let (mut sim, _, _) = load(&[SimInstr::JSR(ImmOrReg::Imm(off(0x10)))]);
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R7], 0x3001);
        assert_eq!(sim.pc, 0x3011);
        assert_eq!(sim.call_depth(), 1);

        // JSRR
        let (mut sim, _, _) = load(&[SimInstr::JSR(ImmOrReg::Reg(R3))]);
        sim.reg_file[R3] = 0x4000;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R7], 0x3001);
        assert_eq!(sim.pc, 0x4000);

        // JSRR R7 jumps to the old R7
        let (mut sim, _, _) = load(&[SimInstr::JSR(ImmOrReg::Reg(R7))]);
        sim.reg_file[R7] = 0x5000;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R7], 0x3001);
        assert_eq!(sim.pc, 0x5000);
    }

    #[test]
    fn test_jmp_and_ret() {
        let (mut sim, _, _) = load(&[
            SimInstr::JSR(ImmOrReg::Imm(off(2))),  // x3000: call x3003
            halt(),                                // x3001
            halt(),                                // x3002
            SimInstr::ADD(R0, R0, imm(7)),         // x3003
            SimInstr::JMP(R7),                     // x3004: RET
        ]);

        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.reg_file[R0], 7);
        assert_eq!(sim.pc, 0x3002);
        assert_eq!(sim.call_depth(), 0);

        let (mut sim, _, _) = load(&[SimInstr::JMP(R2)]);
        sim.reg_file[R2] = 0x1234;
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x1234);
    }

    #[test]
    fn test_step_over_and_out() {
        let (mut sim, _, _) = load(&[
            SimInstr::JSR(ImmOrReg::Imm(off(2))),  // x3000: call x3003
            SimInstr::ADD(R1, R1, imm(1)),         // x3001
            halt(),                                // x3002
            SimInstr::ADD(R0, R0, imm(1)),         // x3003
            SimInstr::ADD(R0, R0, imm(1)),         // x3004
            SimInstr::JMP(R7),                     // x3005: RET
        ]);

        sim.step_over().unwrap();
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.reg_file[R0], 2);

        sim.reset();
        sim.mem.copy_block(PC_START, &[0x4802, 0x1261, 0xF025, 0x1021, 0x1021, 0xC1C0]);
        sim.step_in().unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R0], 1);
        sim.step_out().unwrap();
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.reg_file[R0], 2);
        assert_eq!(sim.call_depth(), 0);
    }

    #[test]
    fn test_breakpoints() {
        let (mut sim, _, _) = load(&[
            SimInstr::ADD(R0, R0, imm(1)),
            SimInstr::ADD(R0, R0, imm(2)),
            SimInstr::ADD(R0, R0, imm(3)),
            halt(),
        ]);

        sim.breakpoints.insert(Breakpoint::PC(0x3002));
        sim.run().unwrap();
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.pc, 0x3002);
        assert_eq!(sim.reg_file[R0], 3);

        sim.breakpoints.clear();
        sim.breakpoints.insert(Breakpoint::Reg { reg: R0, value: Comparator::Gt(5) });
        sim.run().unwrap();
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.reg_file[R0], 6);
    }

    #[test]
    fn test_illegal_opcodes() {
        for (word, op) in [(0x8000, Opcode::RTI), (0xD000, Opcode::RES)] {
            let (mut sim, _, _) = load_words(&[0x1021, word, 0xF025]);

            let result = sim.run();
            assert!(matches!(result, Err(SimErr::IllegalOpcode(o)) if o == op), "{result:?}");
            assert_eq!(sim.prefetch_pc(), 0x3001);
            assert!(!sim.is_halted());
            // only the ADD ran
            assert_eq!(sim.reg_file[R0], 1);
            assert_eq!(sim.instructions_run, 1);
        }
    }

    #[test]
    fn test_keyboard_status_polling() {
        let (mut sim, input, _) = load(&[
            SimInstr::LDI(R0, off(3)),       // x3000: R0 = mem[KBSR]
            SimInstr::BR(0b011, off(-2)),    // x3001: BRzp x3000
            SimInstr::LDI(R0, off(2)),       // x3002: R0 = mem[KBDR]
            halt(),                          // x3003
        ]);
        sim.mem[0x3004] = KBSR;
        sim.mem[0x3005] = KBDR;

        // no key yet
        sim.run_with_limit(20).unwrap();
        assert!(!sim.hit_halt());
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.mem[KBSR], 0);

        input.get_buffer().write().unwrap().push_back(b'k');
        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.reg_file[R0], u16::from(b'k'));
        assert_eq!(sim.mem[KBSR], 0x8000);
        assert!(input.get_buffer().read().unwrap().is_empty());
    }

    #[test]
    fn test_device_registers_only_poll_on_kbsr() {
        let (mut sim, input, _) = load(&[]);
        input.get_buffer().write().unwrap().extend(b"ab");

        // KBDR reads are pure.
        assert_eq!(sim.read_mem(KBDR), 0);
        assert_eq!(input.get_buffer().read().unwrap().len(), 2);

        assert_eq!(sim.read_mem(KBSR), 0x8000);
        assert_eq!(sim.read_mem(KBDR), u16::from(b'a'));
        assert_eq!(sim.read_mem(KBSR), 0x8000);
        assert_eq!(sim.read_mem(KBDR), u16::from(b'b'));

        // No data: status clears, data register keeps the last character.
        assert_eq!(sim.read_mem(KBSR), 0);
        assert_eq!(sim.read_mem(KBDR), u16::from(b'b'));
    }

    #[test]
    fn test_interrupt_stops_run() {
        let (mut sim, _, _) = load(&[SimInstr::BR(0b111, off(-1))]);
        let flag = sim.interrupt_flag().clone();

        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            flag.store(true, Ordering::Relaxed);
        });
        sim.run().unwrap();
        interrupter.join().unwrap();

        assert!(sim.hit_interrupt());
        assert!(!sim.is_halted());
        // the request is consumed
        assert!(!sim.interrupt_flag().load(Ordering::Relaxed));
    }

    #[test]
    fn test_reset_keeps_config() {
        let (mut sim, _, output) = load(&[halt()]);
        sim.flags.announce_halt = false;
        sim.breakpoints.insert(Breakpoint::PC(0x3005));
        sim.reg_file[R0] = 99;

        sim.reset();
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.mem[0x3000], 0);
        assert!(!sim.flags.announce_halt);
        assert_eq!(sim.breakpoints.len(), 1);

        // display is still attached
        sim.mem[0x3000] = 0xF021; // OUT
        sim.reg_file[R0] = u16::from(b'!');
        sim.step_in().unwrap();
        assert_eq!(output_of(&output), b"!");
    }
}
