//! Components used to represent LC-3 instructions and their operands.
//!
//! These components together are used to construct
//! [`sim::SimInstr`] (a data structure holding a decoded instruction word).
//!
//! This module also holds [`sign_extend`], the sign-extension primitive
//! every immediate and offset field of the ISA goes through.

pub mod sim;

use std::fmt::Write as _;
use std::num::TryFromIntError;
use offset_base::OffsetBacking;

/// A register. Must be between 0 and 7.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// ## Examples
///
/// ```text
/// AND R0, R0, #0
///     ~~  ~~
/// ADD R1, R1, R0
///     ~~  ~~  ~~
/// LDR R2, R6, #1
///     ~~  ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register in the register file.
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 4th register in the register file.
    pub const R4: Reg = Reg(4);
    /// The 5th register in the register file.
    pub const R5: Reg = Reg(5);
    /// The 6th register in the register file.
    pub const R6: Reg = Reg(6);
    /// The 7th register in the register file (the return address register).
    pub const R7: Reg = Reg(7);
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 7.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Reads the 3-bit register selector that starts at bit `lsb` of an instruction word.
    pub(crate) fn from_field(word: u16, lsb: u32) -> Self {
        Reg(((word >> lsb) & 0b111) as u8)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file.
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _     => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// A condition code (used for `BR`), must be between 0 and 7.
///
/// The condition codes are listed below:
///
/// | instruction   | code (bin) |
/// |---------------|------------|
/// | `NOP`         | `000`      |
/// | `BRn`         | `100`      |
/// | `BRz`         | `010`      |
/// | `BRnz`        | `110`      |
/// | `BRp`         | `001`      |
/// | `BRnp`        | `101`      |
/// | `BRzp`        | `011`      |
/// | `BR`, `BRnzp` | `111`      |
///
pub type CondCode = u8;

/// Sign-extends the low `bits` bits of `value` to a full 16-bit word.
///
/// If bit `bits - 1` is set, every bit above it is set;
/// otherwise every bit above it is cleared.
///
/// ```
/// use lc3_vm::ast::sign_extend;
///
/// assert_eq!(sign_extend(0b01111, 5), 15);
/// assert_eq!(sign_extend(0b10000, 5) as i16, -16);
/// assert_eq!(sign_extend(0x1FF, 9) as i16, -1);
/// assert_eq!(sign_extend(0xFFFF, 16), 0xFFFF);
/// ```
///
/// # Panics
///
/// This panics if `bits` is 0 or greater than 16.
pub fn sign_extend(value: u16, bits: u32) -> u16 {
    assert!((1..=16).contains(&bits), "cannot sign-extend a {bits}-bit field");
    let shift = u16::BITS - bits;
    (((value << shift) as i16) >> shift) as u16
}

/// A value representing a signed offset or a signed immediate value.
///
/// `N` indicates the maximum bit size of this offset/immediate value.
///
/// ## Examples
///
/// `IOffset<5>` is used to represent `ADD`/`AND`'s imm5 operand:
///
/// ```text
/// AND R0, R0, #0
///             ~~
/// ADD R1, R1, #1
///             ~~
/// ```
///
/// They are also used for register or PC offset values:
/// ```text
/// BR #-1
///    ~~~
/// JSR #99
///     ~~~
/// LDR R0, R0, #9
///             ~~
/// ```
pub type IOffset<const N: u32> = Offset<i16, N>;
/// An unsigned 8-bit trap vector (used for `TRAP`).
///
/// ## Examples
///
/// ```text
/// TRAP x25
///      ~~~
/// ```
pub type TrapVect8 = Offset<u16, 8>;

/// A value representing either an immediate value or a register.
///
/// This is used to handle cases where an operand can be either
/// an immediate value or a register (e.g., in `AND` or `ADD`, selected by bit 5).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ImmOrReg<const N: u32> {
    #[allow(missing_docs)]
    Imm(IOffset<N>),
    #[allow(missing_docs)]
    Reg(Reg)
}
impl<const N: u32> std::fmt::Display for ImmOrReg<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmOrReg::Imm(imm) => imm.fmt(f),
            ImmOrReg::Reg(reg) => reg.fmt(f),
        }
    }
}

/// A value representing an offset or an immediate value.
///
/// The `OFF` type represents the backing type of this offset.
/// The signedness of this offset type is dependent on the signedness of the `OFF` type:
/// - `Offset<i16, _>`: signed offset (also aliased as [`IOffset`])
/// - `Offset<u16, _>`: unsigned offset
///
/// `N` indicates the maximum bit size of this offset/immediate value.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Offset<OFF, const N: u32>(OFF);

impl<OFF: std::fmt::Display, const N: u32> std::fmt::Display for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('#')?;
        self.0.fmt(f)
    }
}
impl<OFF: std::fmt::UpperHex, const N: u32> std::fmt::UpperHex for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('x')?;
        self.0.fmt(f)
    }
}

/// The errors that can result from calling [`Offset::new`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum OffsetNewErr {
    /// The provided offset cannot fit an unsigned integer of the given bitsize.
    CannotFitUnsigned(u32),
    /// The provided offset cannot fit a signed integer of the given bitsize.
    CannotFitSigned(u32)
}

impl std::fmt::Display for OffsetNewErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffsetNewErr::CannotFitUnsigned(n) => write!(f, "value is too big for unsigned {n}-bit integer"),
            OffsetNewErr::CannotFitSigned(n) => write!(f, "value is too big for signed {n}-bit integer"),
        }
    }
}
impl std::error::Error for OffsetNewErr {}

mod offset_base {
    use super::OffsetNewErr;

    /// Any type that could store a value for [`Offset`].
    ///
    /// [`Offset`]: super::Offset
    pub trait OffsetBacking: Copy + Eq {
        /// How many bits are contained within this backing.
        const BITS: u32;

        /// Truncates the given value to the provided `bit_size`,
        /// extending the result back to the full backing width.
        fn truncate(self, bit_size: u32) -> Self;

        /// Reinterprets the raw low bits of an instruction word as this backing.
        fn from_field(word: u16, bit_size: u32) -> Self;

        /// The bits of this value, as they would appear in an instruction word.
        fn to_field(self, bit_size: u32) -> u16;

        /// The error to raise if a given value doesn't match
        /// its provided value when truncated to a given `bit_size`.
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr;
    }

    fn mask(bit_size: u32) -> u16 {
        match bit_size {
            16 => u16::MAX,
            n  => (1 << n) - 1,
        }
    }

    impl OffsetBacking for u16 {
        const BITS: u32 = u16::BITS;

        fn truncate(self, bit_size: u32) -> Self {
            self & mask(bit_size)
        }
        fn from_field(word: u16, bit_size: u32) -> Self {
            word & mask(bit_size)
        }
        fn to_field(self, bit_size: u32) -> u16 {
            self & mask(bit_size)
        }
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
            OffsetNewErr::CannotFitUnsigned(bit_size)
        }
    }
    impl OffsetBacking for i16 {
        const BITS: u32 = i16::BITS;

        fn truncate(self, bit_size: u32) -> Self {
            super::sign_extend(self as u16, bit_size) as i16
        }
        fn from_field(word: u16, bit_size: u32) -> Self {
            super::sign_extend(word, bit_size) as i16
        }
        fn to_field(self, bit_size: u32) -> u16 {
            (self as u16) & mask(bit_size)
        }
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
            OffsetNewErr::CannotFitSigned(bit_size)
        }
    }
}

impl<OFF: OffsetBacking, const N: u32> Offset<OFF, N> {
    /// Creates a new offset value.
    /// This must fit within `N` bits of the representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc3_vm::ast::Offset;
    /// #
    /// // Signed:
    /// assert!(Offset::<i16, 5>::new(-5).is_ok());
    /// assert!(Offset::<i16, 5>::new(15).is_ok());
    /// assert!(Offset::<i16, 5>::new(16).is_err());
    ///
    /// // Unsigned:
    /// assert!(Offset::<u16, 5>::new(31).is_ok());
    /// assert!(Offset::<u16, 5>::new(32).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u16`, larger than 16).
    pub fn new(n: OFF) -> Result<Self, OffsetNewErr> {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        match n == n.truncate(N) {
            true  => Ok(Offset(n)),
            false => Err(OFF::does_not_fit_error(N)),
        }
    }

    /// Creates a new offset by extending the first N bits of the integer,
    /// and discarding the rest.
    ///
    /// The extension is considered sign-extended if the offset's backing is signed,
    /// and zero-extended if the offset's backing is unsigned.
    ///
    /// ```
    /// # use lc3_vm::ast::Offset;
    /// #
    /// assert_eq!(Offset::<i16, 5>::new_trunc(15).get(),  15); // 0b01111
    /// assert_eq!(Offset::<i16, 5>::new_trunc(16).get(), -16); // 0b10000
    /// assert_eq!(Offset::<u16, 5>::new_trunc(32).get(),   0); // 0b00000
    /// ```
    pub fn new_trunc(n: OFF) -> Self {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        Self(n.truncate(N))
    }

    /// Extracts this offset from the low `N` bits of an instruction word.
    pub(crate) fn from_word(word: u16) -> Self {
        Self(OFF::from_field(word, N))
    }

    /// The low `N` bits of this offset, ready to be placed in an instruction word.
    pub(crate) fn bits(&self) -> u16 {
        self.0.to_field(N)
    }

    /// Gets the value of the offset.
    pub fn get(&self) -> OFF {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{sign_extend, IOffset, Offset, OffsetNewErr, Reg, TrapVect8};

    #[test]
    fn test_sign_extend_matches_field_value() {
        for bits in [5, 6, 9, 11] {
            let half = 1i32 << (bits - 1);
            for signed in -half..half {
                let field = (signed as u16) & ((1 << bits) - 1);
                assert_eq!(sign_extend(field, bits) as i16 as i32, signed, "{bits}-bit field {field:#b}");
            }
        }
    }

    #[test]
    fn test_sign_extend_ignores_high_garbage() {
        // bits above the field are discarded before extending
        assert_eq!(sign_extend(0xFFE0 | 0b00011, 5), 3);
        assert_eq!(sign_extend(0x0E00 | 0x1FF, 9), 0xFFFF);
    }

    #[test]
    fn test_offset_bounds() {
        assert_eq!(IOffset::<9>::new(255).map(|o| o.get()), Ok(255));
        assert_eq!(IOffset::<9>::new(-256).map(|o| o.get()), Ok(-256));
        assert_eq!(IOffset::<9>::new(256), Err(OffsetNewErr::CannotFitSigned(9)));
        assert_eq!(TrapVect8::new(0x100), Err(OffsetNewErr::CannotFitUnsigned(8)));
        assert_eq!(Offset::<u16, 16>::new(0xFFFF).map(|o| o.get()), Ok(0xFFFF));
    }

    #[test]
    fn test_offset_field_bits() {
        assert_eq!(IOffset::<6>::new_trunc(-1).bits(), 0b111111);
        assert_eq!(IOffset::<6>::from_word(0xFFE0).get(), -32);
        assert_eq!(TrapVect8::from_word(0xF025).get(), 0x25);
    }

    #[test]
    fn test_reg_bounds() {
        assert_eq!(Reg::try_from(7).map(Reg::reg_no), Ok(7));
        assert!(Reg::try_from(8).is_err());
        assert_eq!(Reg::from_field(0b0001_101_000_000000, 9).reg_no(), 5);
    }
}
