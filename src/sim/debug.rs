//! Utilities to debug simulation.
//!
//! The key type here is [`Breakpoint`], which can be inserted into the [`Simulator`]'s
//! `breakpoints` field to cause the simulator to pause after an instruction.
//!
//! ```
//! use lc3_vm::sim::Simulator;
//! use lc3_vm::sim::debug::{Breakpoint, Comparator};
//!
//! let mut sim = Simulator::new(Default::default());
//! // ST R0, #2; ADD R0, R0, #1; BRnzp #-3
//! sim.mem.copy_block(0x3000, &[0x3002, 0x1021, 0x0FFD]);
//!
//! sim.breakpoints.insert(Breakpoint::Mem { addr: 0x3003, value: Comparator::Eq(4) });
//! sim.run().unwrap();
//! assert!(sim.hit_breakpoint());
//! assert_eq!(sim.mem[0x3003], 4);
//! ```
use std::fmt::Write;

use crate::ast::Reg;

use super::Simulator;

/// Common breakpoints.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub enum Breakpoint {
    /// Break when the PC is equal to the given value.
    PC(u16),

    /// Break when the provided register holds a given value.
    Reg {
        /// Register to check.
        reg: Reg,
        /// Predicate to break against.
        value: Comparator
    },
    /// Break when the provided memory address holds a given value.
    Mem {
        /// Address to check.
        addr: u16,
        /// Predicate to break against.
        value: Comparator
    },
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Checks if a break should occur.
    pub fn check(&self, sim: &Simulator) -> bool {
        match self {
            Breakpoint::PC(expected) => expected == &sim.pc,
            Breakpoint::Reg { reg, value: cmp } => cmp.check(sim.reg_file[*reg]),
            Breakpoint::Mem { addr, value: cmp } => cmp.check(sim.mem[*addr]), // do not poll the keyboard
        }
    }
}
impl std::fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PC(expected) => write!(f, "PC == x{expected:04X}"),
            Self::Reg { reg, value } => write!(f, "{reg} {value}"),
            Self::Mem { addr, value } => write!(f, "mem[x{addr:04X}] {value}"),
        }
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        std::fmt::Display::fmt(self, f)?;
        f.write_char(')')
    }
}

/// Predicate comparing the watched value (unsigned) against a fixed one.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Comparator {
    /// Break if the current value is less than the provided value.
    Lt(u16),
    /// Break if the current value is equal to the provided value.
    Eq(u16),
    /// Break if the current value is less than or equal to the provided value.
    Le(u16),
    /// Break if the current value is greater than the provided value.
    Gt(u16),
    /// Break if the current value is not equal to the provided value.
    Ne(u16),
    /// Break if the current value is greater than or equal to the provided value.
    Ge(u16),
}
impl Comparator {
    /// Checks if the operand passes the comparator.
    pub fn check(&self, operand: u16) -> bool {
        match *self {
            Comparator::Lt(r)  => operand < r,
            Comparator::Eq(r)  => operand == r,
            Comparator::Le(r)  => operand <= r,
            Comparator::Gt(r)  => operand > r,
            Comparator::Ne(r)  => operand != r,
            Comparator::Ge(r)  => operand >= r,
        }
    }
}
impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Lt(r)  => write!(f, "< {r}"),
            Comparator::Eq(r)  => write!(f, "== {r}"),
            Comparator::Le(r)  => write!(f, "<= {r}"),
            Comparator::Gt(r)  => write!(f, "> {r}"),
            Comparator::Ne(r)  => write!(f, "!= {r}"),
            Comparator::Ge(r)  => write!(f, ">= {r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::R2;
    use crate::sim::Simulator;

    use super::{Breakpoint, Comparator};

    #[test]
    fn test_comparators() {
        assert!(Comparator::Lt(5).check(4));
        assert!(!Comparator::Lt(5).check(5));
        assert!(Comparator::Le(5).check(5));
        assert!(Comparator::Ge(5).check(5));
        assert!(Comparator::Ne(5).check(6));
        // unsigned: xFFFF is the largest value
        assert!(Comparator::Gt(0x7FFF).check(0xFFFF));
    }

    #[test]
    fn test_check_does_not_poll() {
        let mut sim = Simulator::new(Default::default());
        sim.reg_file[R2] = 12;

        assert!(Breakpoint::PC(0x3000).check(&sim));
        assert!(!Breakpoint::PC(0x3001).check(&sim));
        assert!(Breakpoint::Reg { reg: R2, value: Comparator::Eq(12) }.check(&sim));
        assert!(Breakpoint::Mem { addr: 0xFE00, value: Comparator::Eq(0) }.check(&sim));
    }

    #[test]
    fn test_display() {
        assert_eq!(Breakpoint::PC(0x3000).to_string(), "PC == x3000");
        assert_eq!(Breakpoint::Reg { reg: R2, value: Comparator::Ge(3) }.to_string(), "R2 >= 3");
        assert_eq!(format!("{:?}", Breakpoint::Mem { addr: 0x4000, value: Comparator::Ne(0) }), "Breakpoint(mem[x4000] != 0)");
    }
}
