// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use crate::types::Bytes;

/// Maximum encoded length of a single instruction, in bytes.
pub const MAX_INSN_SIZE: usize = 15;

/// An immediate value in an instruction
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Immediate {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Immediate {
    /// The raw encoded bits, zero-extended.
    pub fn bits(&self) -> u64 {
        match *self {
            Self::U8(v) => u64::from(v),
            Self::U16(v) => u64::from(v),
            Self::U32(v) => u64::from(v),
            Self::U64(v) => v,
        }
    }

    /// The value sign-extended from its encoded width.
    pub fn signed(&self) -> i64 {
        match *self {
            Self::U8(v) => i64::from(v as i8),
            Self::U16(v) => i64::from(v as i16),
            Self::U32(v) => i64::from(v as i32),
            Self::U64(v) => v as i64,
        }
    }

    /// The encoded width of the value.
    pub fn width(&self) -> Bytes {
        match self {
            Self::U8(_) => Bytes::One,
            Self::U16(_) => Bytes::Two,
            Self::U32(_) => Bytes::Four,
            Self::U64(_) => Bytes::Eight,
        }
    }
}

/// A general purpose register in an instruction
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Register {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
}

/// A Segment register in instruction
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegRegister {
    CS,
    SS,
    DS,
    ES,
    FS,
    GS,
}

/// A branch condition code, in encoding order of the low opcode nibble.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cc {
    O,
    No,
    B,
    Ae,
    E,
    Ne,
    Be,
    A,
    S,
    Ns,
    P,
    Np,
    L,
    Ge,
    Le,
    G,
}

impl Cc {
    pub(crate) fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => Self::O,
            0x1 => Self::No,
            0x2 => Self::B,
            0x3 => Self::Ae,
            0x4 => Self::E,
            0x5 => Self::Ne,
            0x6 => Self::Be,
            0x7 => Self::A,
            0x8 => Self::S,
            0x9 => Self::Ns,
            0xA => Self::P,
            0xB => Self::Np,
            0xC => Self::L,
            0xD => Self::Ge,
            0xE => Self::Le,
            _ => Self::G,
        }
    }
}

/// A decoded memory operand. `base` of [`Register::Rip`] denotes
/// RIP-relative addressing; a missing base with a present displacement
/// denotes an absolute address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemOperand {
    pub base: Option<Register>,
    pub index: Option<Register>,
    /// Index multiplier, meaningful only when `index` is present.
    pub scale: u8,
    pub disp: i64,
    /// Width of the base and index registers.
    pub addr_size: Bytes,
    /// Width of the memory access.
    pub size: Bytes,
    /// Explicit segment override, if any was encoded.
    pub seg: Option<SegRegister>,
}

/// An operand in an instruction, which might be a register, a memory
/// location or an immediate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operand {
    /// A general purpose register accessed at the given width.
    Reg(Register, Bytes),
    /// One of the legacy high byte registers; the base register names
    /// the full register whose bits 8..16 are accessed (ah for Rax).
    HighByteReg(Register),
    Mem(MemOperand),
    Imm(Immediate),
}

impl Operand {
    /// The dx register as used for port I/O.
    #[inline]
    pub const fn dx() -> Self {
        Self::Reg(Register::Rdx, Bytes::Two)
    }
}

/// An instruction decoded into its operands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodedInsn {
    Add(Operand, Operand),
    Cmp(Operand, Operand),
    Xor(Operand, Operand),
    Mov(Operand, Operand),
    Movsx(Operand, Operand),
    Movzx(Operand, Operand),
    Push(Operand),
    Pop(Operand),
    Inc(Operand),
    Dec(Operand),
    Call(Immediate),
    Jcc(Cc, Immediate),
    Jmp(Immediate),
    Ret(Option<u16>),
    Nop,
    NopRm(Operand),
    Pause,
    In(Operand, Bytes),
    Out(Operand, Bytes),
    Cpuid,
    Hlt,
    Int(u8),
    Int3,
    Rdmsr,
    Rdtsc,
    Rdtscp,
    Syscall,
    Wrmsr,
    Endbr32,
    Endbr64,
    Icebp,
    Salc,
    Ud2,
}
