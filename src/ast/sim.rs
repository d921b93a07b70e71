//! Decoded instruction words.
//!
//! The key type here is [`SimInstr`], which is produced from a raw word with [`SimInstr::decode`]
//! and can be turned back into a word with [`SimInstr::encode`].
//!
//! Decoding never fails: all 16 opcodes are structurally valid.
//! The reserved opcodes ([`SimInstr::RTI`] and [`SimInstr::RES`]) are rejected
//! by the simulator when it tries to execute them.

use super::{CondCode, IOffset, ImmOrReg, Reg, TrapVect8};

/// The 4-bit opcode of an instruction (bits 15-12).
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Opcode {
    BR   = 0b0000,
    ADD  = 0b0001,
    LD   = 0b0010,
    ST   = 0b0011,
    JSR  = 0b0100,
    AND  = 0b0101,
    LDR  = 0b0110,
    STR  = 0b0111,
    RTI  = 0b1000,
    NOT  = 0b1001,
    LDI  = 0b1010,
    STI  = 0b1011,
    JMP  = 0b1100,
    RES  = 0b1101,
    LEA  = 0b1110,
    TRAP = 0b1111,
}
impl Opcode {
    const ALL: [Opcode; 16] = [
        Opcode::BR,  Opcode::ADD, Opcode::LD,  Opcode::ST,
        Opcode::JSR, Opcode::AND, Opcode::LDR, Opcode::STR,
        Opcode::RTI, Opcode::NOT, Opcode::LDI, Opcode::STI,
        Opcode::JMP, Opcode::RES, Opcode::LEA, Opcode::TRAP,
    ];

    /// Gets the opcode of an instruction word.
    pub fn of(word: u16) -> Self {
        Self::ALL[usize::from(word >> 12)]
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// An instruction, decoded from a word in memory.
///
/// Each variant holds the operand fields of its encoding:
///
/// | variant | encoding |
/// |---------|----------|
/// | `BR(nzp, PCoffset9)` | `0000 nzp PCoffset9` |
/// | `ADD(DR, SR1, SR2 / imm5)` | `0001 DR SR1 0 00 SR2` / `0001 DR SR1 1 imm5` |
/// | `LD(DR, PCoffset9)` | `0010 DR PCoffset9` |
/// | `ST(SR, PCoffset9)` | `0011 SR PCoffset9` |
/// | `JSR(PCoffset11 / BaseR)` | `0100 1 PCoffset11` / `0100 0 00 BaseR 000000` |
/// | `AND(DR, SR1, SR2 / imm5)` | `0101 DR SR1 0 00 SR2` / `0101 DR SR1 1 imm5` |
/// | `LDR(DR, BaseR, offset6)` | `0110 DR BaseR offset6` |
/// | `STR(SR, BaseR, offset6)` | `0111 SR BaseR offset6` |
/// | `RTI` | `1000 000000000000` |
/// | `NOT(DR, SR)` | `1001 DR SR 111111` |
/// | `LDI(DR, PCoffset9)` | `1010 DR PCoffset9` |
/// | `STI(SR, PCoffset9)` | `1011 SR PCoffset9` |
/// | `JMP(BaseR)` | `1100 000 BaseR 000000` |
/// | `RES` | `1101 ????????????` |
/// | `LEA(DR, PCoffset9)` | `1110 DR PCoffset9` |
/// | `TRAP(trapvect8)` | `1111 0000 trapvect8` |
///
/// Bits not covered by an operand are ignored when decoding and cleared when encoding.
#[allow(missing_docs, clippy::upper_case_acronyms)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    BR(CondCode, IOffset<9>),
    ADD(Reg, Reg, ImmOrReg<5>),
    LD(Reg, IOffset<9>),
    ST(Reg, IOffset<9>),
    JSR(ImmOrReg<11>),
    AND(Reg, Reg, ImmOrReg<5>),
    LDR(Reg, Reg, IOffset<6>),
    STR(Reg, Reg, IOffset<6>),
    RTI,
    NOT(Reg, Reg),
    LDI(Reg, IOffset<9>),
    STI(Reg, IOffset<9>),
    JMP(Reg),
    RES,
    LEA(Reg, IOffset<9>),
    TRAP(TrapVect8),
}

impl SimInstr {
    /// Decodes an instruction word.
    ///
    /// ```
    /// use lc3_vm::ast::sim::SimInstr;
    /// use lc3_vm::ast::reg_consts::R0;
    /// use lc3_vm::ast::{ImmOrReg, IOffset};
    ///
    /// let instr = SimInstr::decode(0x1025);
    /// assert_eq!(instr, SimInstr::ADD(R0, R0, ImmOrReg::Imm(IOffset::new_trunc(5))));
    /// ```
    pub fn decode(word: u16) -> Self {
        let dr = Reg::from_field(word, 9);
        let sr1 = Reg::from_field(word, 6);
        let imm_or_reg = || match word & 0x20 != 0 {
            true  => ImmOrReg::Imm(IOffset::from_word(word)),
            false => ImmOrReg::Reg(Reg::from_field(word, 0)),
        };

        match Opcode::of(word) {
            Opcode::BR   => SimInstr::BR(((word >> 9) & 0b111) as CondCode, IOffset::from_word(word)),
            Opcode::ADD  => SimInstr::ADD(dr, sr1, imm_or_reg()),
            Opcode::LD   => SimInstr::LD(dr, IOffset::from_word(word)),
            Opcode::ST   => SimInstr::ST(dr, IOffset::from_word(word)),
            Opcode::JSR  => match word & 0x0800 != 0 {
                true  => SimInstr::JSR(ImmOrReg::Imm(IOffset::from_word(word))),
                false => SimInstr::JSR(ImmOrReg::Reg(sr1)),
            },
            Opcode::AND  => SimInstr::AND(dr, sr1, imm_or_reg()),
            Opcode::LDR  => SimInstr::LDR(dr, sr1, IOffset::from_word(word)),
            Opcode::STR  => SimInstr::STR(dr, sr1, IOffset::from_word(word)),
            Opcode::RTI  => SimInstr::RTI,
            Opcode::NOT  => SimInstr::NOT(dr, sr1),
            Opcode::LDI  => SimInstr::LDI(dr, IOffset::from_word(word)),
            Opcode::STI  => SimInstr::STI(dr, IOffset::from_word(word)),
            Opcode::JMP  => SimInstr::JMP(sr1),
            Opcode::RES  => SimInstr::RES,
            Opcode::LEA  => SimInstr::LEA(dr, IOffset::from_word(word)),
            Opcode::TRAP => SimInstr::TRAP(TrapVect8::from_word(word)),
        }
    }

    /// Encodes this instruction into a word.
    ///
    /// ```
    /// use lc3_vm::ast::sim::SimInstr;
    /// use lc3_vm::ast::TrapVect8;
    ///
    /// let halt = SimInstr::TRAP(TrapVect8::new(0x25).unwrap());
    /// assert_eq!(halt.encode(), 0xF025);
    /// ```
    pub fn encode(&self) -> u16 {
        fn op(opcode: Opcode) -> u16 {
            (opcode as u16) << 12
        }
        fn reg(r: Reg, lsb: u32) -> u16 {
            u16::from(r.reg_no()) << lsb
        }
        fn imm_or_reg<const N: u32>(operand: &ImmOrReg<N>, mode_bit: u16) -> u16 {
            match operand {
                ImmOrReg::Imm(imm) => mode_bit | imm.bits(),
                ImmOrReg::Reg(r)   => reg(*r, 0),
            }
        }

        match self {
            SimInstr::BR(cc, off)         => op(Opcode::BR) | u16::from(cc & 0b111) << 9 | off.bits(),
            SimInstr::ADD(dr, sr1, sr2)   => op(Opcode::ADD) | reg(*dr, 9) | reg(*sr1, 6) | imm_or_reg(sr2, 0x20),
            SimInstr::LD(dr, off)         => op(Opcode::LD) | reg(*dr, 9) | off.bits(),
            SimInstr::ST(sr, off)         => op(Opcode::ST) | reg(*sr, 9) | off.bits(),
            SimInstr::JSR(ImmOrReg::Imm(off)) => op(Opcode::JSR) | 0x0800 | off.bits(),
            SimInstr::JSR(ImmOrReg::Reg(br))  => op(Opcode::JSR) | reg(*br, 6),
            SimInstr::AND(dr, sr1, sr2)   => op(Opcode::AND) | reg(*dr, 9) | reg(*sr1, 6) | imm_or_reg(sr2, 0x20),
            SimInstr::LDR(dr, br, off)    => op(Opcode::LDR) | reg(*dr, 9) | reg(*br, 6) | off.bits(),
            SimInstr::STR(sr, br, off)    => op(Opcode::STR) | reg(*sr, 9) | reg(*br, 6) | off.bits(),
            SimInstr::RTI                 => op(Opcode::RTI),
            SimInstr::NOT(dr, sr)         => op(Opcode::NOT) | reg(*dr, 9) | reg(*sr, 6) | 0x3F,
            SimInstr::LDI(dr, off)        => op(Opcode::LDI) | reg(*dr, 9) | off.bits(),
            SimInstr::STI(sr, off)        => op(Opcode::STI) | reg(*sr, 9) | off.bits(),
            SimInstr::JMP(br)             => op(Opcode::JMP) | reg(*br, 6),
            SimInstr::RES                 => op(Opcode::RES),
            SimInstr::LEA(dr, off)        => op(Opcode::LEA) | reg(*dr, 9) | off.bits(),
            SimInstr::TRAP(vect)          => op(Opcode::TRAP) | vect.bits(),
        }
    }

    /// The opcode of this instruction.
    pub fn opcode(&self) -> Opcode {
        Opcode::of(self.encode())
    }
}

impl std::fmt::Display for SimInstr {
    /// Disassembles the instruction.
    ///
    /// PC offsets are shown as raw signed offsets (e.g. `BRnzp #-1`),
    /// because the address of the instruction is not known here.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimInstr::BR(cc, off) => {
                f.write_str("BR")?;
                if cc & 0b100 != 0 { f.write_str("n")?; }
                if cc & 0b010 != 0 { f.write_str("z")?; }
                if cc & 0b001 != 0 { f.write_str("p")?; }
                write!(f, " {off}")
            },
            SimInstr::ADD(dr, sr1, sr2) => write!(f, "ADD {dr}, {sr1}, {sr2}"),
            SimInstr::LD(dr, off)       => write!(f, "LD {dr}, {off}"),
            SimInstr::ST(sr, off)       => write!(f, "ST {sr}, {off}"),
            SimInstr::JSR(ImmOrReg::Imm(off)) => write!(f, "JSR {off}"),
            SimInstr::JSR(ImmOrReg::Reg(br))  => write!(f, "JSRR {br}"),
            SimInstr::AND(dr, sr1, sr2) => write!(f, "AND {dr}, {sr1}, {sr2}"),
            SimInstr::LDR(dr, br, off)  => write!(f, "LDR {dr}, {br}, {off}"),
            SimInstr::STR(sr, br, off)  => write!(f, "STR {sr}, {br}, {off}"),
            SimInstr::RTI               => f.write_str("RTI"),
            SimInstr::NOT(dr, sr)       => write!(f, "NOT {dr}, {sr}"),
            SimInstr::LDI(dr, off)      => write!(f, "LDI {dr}, {off}"),
            SimInstr::STI(sr, off)      => write!(f, "STI {sr}, {off}"),
            SimInstr::JMP(Reg(7))       => f.write_str("RET"),
            SimInstr::JMP(br)           => write!(f, "JMP {br}"),
            SimInstr::RES               => f.write_str("RES"),
            SimInstr::LEA(dr, off)      => write!(f, "LEA {dr}, {off}"),
            SimInstr::TRAP(vect)        => write!(f, "TRAP x{:02X}", vect.get()),
        }
    }
}
