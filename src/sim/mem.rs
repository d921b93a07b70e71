//! Memory handling for the LC-3 simulator.
//!
//! This module consists of:
//! - [`MemArray`]: The memory array.
//! - [`RegFile`]: The general-purpose register file.
//! - [`MachineInitStrategy`]: How the two are filled before a program is loaded.
//!
//! Both of these only give direct access to their data.
//! Memory accesses with device side effects go through
//! [`Simulator::read_mem`] and [`Simulator::write_mem`].
//!
//! [`Simulator::read_mem`]: super::Simulator::read_mem
//! [`Simulator::write_mem`]: super::Simulator::write_mem

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::Reg;

/// Number of words in memory.
pub const MEM_SIZE: usize = 1 << 16;

/// Trait that describes types that can be used to create the initial data
/// for the memory and register file.
pub trait WordFiller {
    /// Generate the data.
    fn generate(&mut self) -> u16;
}
impl WordFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> u16 {
        rand::random()
    }
}
impl WordFiller for u16 {
    /// Sets each word to the given value.
    fn generate(&mut self) -> u16 {
        *self
    }
}
impl WordFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> u16 {
        self.gen()
    }
}

/// Strategy used to initialize the `reg_file` and `mem` of the [`Simulator`].
///
/// Real hardware powers on with whatever happens to be in memory,
/// so programs should not rely on it. By default, everything starts at zero.
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each word randomly and non-deterministically.
    Unseeded,

    /// Initializes each word randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each word to a known value.
    Known {
        /// The value to initialize each value to.
        value: u16
    }
}
impl Default for MachineInitStrategy {
    fn default() -> Self {
        MachineInitStrategy::Known { value: 0 }
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl WordFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => WCGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => WCGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => WCGenerator::Known(*value),
        }
    }
}

enum WCGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u16)
}
impl WordFiller for WCGenerator {
    fn generate(&mut self) -> u16 {
        match self {
            WCGenerator::Unseeded  => ().generate(),
            WCGenerator::Seeded(r) => r.generate(),
            WCGenerator::Known(k)  => k.generate(),
        }
    }
}

/// The memory array.
///
/// This can be indexed with any `u16` (16-bit address).
/// Indexing reads and writes the stored words directly:
/// it does not trigger device effects (e.g. reading `KBSR` does not poll the keyboard).
///
/// ```
/// use lc3_vm::sim::mem::MemArray;
///
/// let mut mem = MemArray::new(&mut 0u16);
/// mem[0x3000] = 11;
/// assert_eq!(mem[0x3000], 11);
/// ```
pub struct MemArray(Box<[u16; MEM_SIZE]>);
impl MemArray {
    /// Creates a new memory, filling it with the provided filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        let data = std::iter::repeat_with(|| filler.generate())
            .take(MEM_SIZE)
            .collect::<Box<[u16]>>()
            .try_into()
            .unwrap_or_else(|_| unreachable!("iterator should have had {MEM_SIZE} elements"));

        Self(data)
    }

    /// Copies a block of words into memory, starting at `start`.
    ///
    /// Words that would go past the end of memory are not copied.
    /// This returns the number of words that were copied.
    pub fn copy_block(&mut self, start: u16, words: &[u16]) -> usize {
        let si = usize::from(start);
        let len = words.len().min(MEM_SIZE - si);

        self.0[si..(si + len)].copy_from_slice(&words[..len]);
        len
    }

    /// Gets a reference to the underlying slice.
    pub fn as_slice(&self) -> &[u16] {
        &*self.0
    }
    /// Gets a mutable reference to the underlying slice.
    pub fn as_slice_mut(&mut self) -> &mut [u16] {
        &mut *self.0
    }
}
impl std::ops::Index<u16> for MemArray {
    type Output = u16;

    fn index(&self, index: u16) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<u16> for MemArray {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}
impl std::fmt::Debug for MemArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 65536 words is far too much to print.
        f.debug_struct("MemArray").finish_non_exhaustive()
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use lc3_vm::sim::mem::RegFile;
/// use lc3_vm::ast::reg_consts::R0;
///
/// let mut reg = RegFile::new(&mut 0u16);
/// reg[R0] = 11;
/// assert_eq!(reg[R0], 11);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile([u16; 8]);
impl RegFile {
    /// Creates a register file, filling it with the provided filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        Self(std::array::from_fn(|_| filler.generate()))
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u16;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}
