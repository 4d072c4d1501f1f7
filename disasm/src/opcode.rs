// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use crate::decode::OpCodeBytes;
use crate::error::DecodeError;
use bitflags::bitflags;

bitflags! {
    /// Defines a set of flags for opcode attributes. These flags provide
    /// information about the characteristics of an opcode, such as the
    /// presence and width of an immediate operand, operand size and
    /// special decoding requirements.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct OpCodeFlags: u64 {
        // Immediate operand of 16 or 32 bit, selected by operand size
        const IMM           = 1 << 0;
        // U8 immediate operand
        const IMM8          = 1 << 1;
        // U16 immediate operand regardless of operand size
        const IMM16         = 1 << 2;
        // Immediate operand at full operand size
        const IMM_FULL      = 1 << 3;
        // No need to decode ModRm
        const NO_MODRM      = 1 << 4;
        // ModRm byte present but carries no operand
        const OP_NONE       = 1 << 5;
        // Operand size is one byte
        const BYTE_OP       = 1 << 6;
        // Operand size defaults to eight bytes in 64-bit mode
        const DEF64         = 1 << 7;
        // Need to decode Moffset
        const MOFFSET       = 1 << 8;
        // Decoded only with the Cet decoder mode enabled
        const CET           = 1 << 9;
        // Decoded only with the Undocumented decoder mode enabled
        const UNDOC         = 1 << 10;
        // Invalid in 64-bit mode
        const I64           = 1 << 11;
        // Valid only in 64-bit mode
        const O64           = 1 << 12;
    }
}

/// Represents the classification of opcodes into distinct categories.
/// Each variant of the enum corresponds to a specific type of opcode
/// or a group of opcodes that share common characteristics or decoding
/// behaviors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OpCodeClass {
    Add,
    Call,
    Cmp,
    Cpuid,
    Dec,
    Endbr32,
    Endbr64,
    EndbrGroup,
    Group7,
    Group7Rm7,
    Hlt,
    Icebp,
    In,
    Inc,
    Int,
    Int3,
    Jcc,
    Jmp,
    Mov,
    Movsx,
    Movzx,
    Nop,
    Out,
    Pop,
    Push,
    Rdmsr,
    Rdtsc,
    Rdtscp,
    Ret,
    Salc,
    Syscall,
    TwoByte,
    Ud2,
    Wrmsr,
    Xor,
}

/// Descriptor for an opcode, which contains the raw instruction opcode
/// value, its corresponding class and flags for fully decoding the
/// instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpCodeDesc {
    /// The opcode value
    pub code: u8,
    /// The type of the opcode
    pub class: OpCodeClass,
    /// The flags for fully decoding the instruction
    pub flags: OpCodeFlags,
}

macro_rules! opcode {
    ($class:expr) => {
        Some(OpCodeDesc {
            code: 0,
            class: $class,
            flags: OpCodeFlags::empty(),
        })
    };
    ($code:expr, $class:expr) => {
        Some(OpCodeDesc {
            code: $code,
            class: $class,
            flags: OpCodeFlags::empty(),
        })
    };
    ($code:expr, $class:expr, $flags:expr) => {
        Some(OpCodeDesc {
            code: $code,
            class: $class,
            flags: OpCodeFlags::from_bits_truncate($flags),
        })
    };
}

static ONE_BYTE_TABLE: [Option<OpCodeDesc>; 256] = {
    let mut table: [Option<OpCodeDesc>; 256] = [None; 256];

    table[0x00] = opcode!(0x00, OpCodeClass::Add, OpCodeFlags::BYTE_OP.bits());
    table[0x01] = opcode!(0x01, OpCodeClass::Add);
    table[0x02] = opcode!(0x02, OpCodeClass::Add, OpCodeFlags::BYTE_OP.bits());
    table[0x03] = opcode!(0x03, OpCodeClass::Add);
    table[0x04] = opcode!(
        0x04,
        OpCodeClass::Add,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0x05] = opcode!(
        0x05,
        OpCodeClass::Add,
        OpCodeFlags::IMM.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0x0F] = opcode!(OpCodeClass::TwoByte);
    table[0x30] = opcode!(0x30, OpCodeClass::Xor, OpCodeFlags::BYTE_OP.bits());
    table[0x31] = opcode!(0x31, OpCodeClass::Xor);
    table[0x32] = opcode!(0x32, OpCodeClass::Xor, OpCodeFlags::BYTE_OP.bits());
    table[0x33] = opcode!(0x33, OpCodeClass::Xor);
    table[0x34] = opcode!(
        0x34,
        OpCodeClass::Xor,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0x35] = opcode!(
        0x35,
        OpCodeClass::Xor,
        OpCodeFlags::IMM.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0x38] = opcode!(0x38, OpCodeClass::Cmp, OpCodeFlags::BYTE_OP.bits());
    table[0x39] = opcode!(0x39, OpCodeClass::Cmp);
    table[0x3A] = opcode!(0x3A, OpCodeClass::Cmp, OpCodeFlags::BYTE_OP.bits());
    table[0x3B] = opcode!(0x3B, OpCodeClass::Cmp);
    table[0x3C] = opcode!(
        0x3C,
        OpCodeClass::Cmp,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0x3D] = opcode!(
        0x3D,
        OpCodeClass::Cmp,
        OpCodeFlags::IMM.bits() | OpCodeFlags::NO_MODRM.bits()
    );

    // 0x40-0x4F decode as inc/dec outside of 64-bit mode only; in 64-bit
    // mode these bytes are REX prefixes and never reach the table.
    let mut code = 0x40;
    while code <= 0x47 {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Inc,
            OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::I64.bits()
        );
        code += 1;
    }
    while code <= 0x4F {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Dec,
            OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::I64.bits()
        );
        code += 1;
    }

    let mut code = 0x50;
    while code <= 0x57 {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Push,
            OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
        );
        code += 1;
    }
    while code <= 0x5F {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Pop,
            OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
        );
        code += 1;
    }

    let mut code = 0x70;
    while code <= 0x7F {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Jcc,
            OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
        );
        code += 1;
    }

    table[0x88] = opcode!(0x88, OpCodeClass::Mov, OpCodeFlags::BYTE_OP.bits());
    table[0x89] = opcode!(0x89, OpCodeClass::Mov);
    table[0x8A] = opcode!(0x8A, OpCodeClass::Mov, OpCodeFlags::BYTE_OP.bits());
    table[0x8B] = opcode!(0x8B, OpCodeClass::Mov);
    table[0x90] = opcode!(0x90, OpCodeClass::Nop, OpCodeFlags::NO_MODRM.bits());
    table[0xA0] = opcode!(
        0xA0,
        OpCodeClass::Mov,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::MOFFSET.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xA1] = opcode!(
        0xA1,
        OpCodeClass::Mov,
        OpCodeFlags::MOFFSET.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xA2] = opcode!(
        0xA2,
        OpCodeClass::Mov,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::MOFFSET.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xA3] = opcode!(
        0xA3,
        OpCodeClass::Mov,
        OpCodeFlags::MOFFSET.bits() | OpCodeFlags::NO_MODRM.bits()
    );

    let mut code = 0xB0;
    while code <= 0xB7 {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Mov,
            OpCodeFlags::BYTE_OP.bits()
                | OpCodeFlags::IMM_FULL.bits()
                | OpCodeFlags::NO_MODRM.bits()
        );
        code += 1;
    }
    while code <= 0xBF {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Mov,
            OpCodeFlags::IMM_FULL.bits() | OpCodeFlags::NO_MODRM.bits()
        );
        code += 1;
    }

    table[0xC2] = opcode!(
        0xC2,
        OpCodeClass::Ret,
        OpCodeFlags::IMM16.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xC3] = opcode!(0xC3, OpCodeClass::Ret, OpCodeFlags::NO_MODRM.bits());
    table[0xC6] = opcode!(
        0xC6,
        OpCodeClass::Mov,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::IMM8.bits()
    );
    table[0xC7] = opcode!(0xC7, OpCodeClass::Mov, OpCodeFlags::IMM.bits());
    table[0xCC] = opcode!(0xCC, OpCodeClass::Int3, OpCodeFlags::NO_MODRM.bits());
    table[0xCD] = opcode!(
        0xCD,
        OpCodeClass::Int,
        OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xD6] = opcode!(
        0xD6,
        OpCodeClass::Salc,
        OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::UNDOC.bits() | OpCodeFlags::I64.bits()
    );
    table[0xE4] = opcode!(
        0xE4,
        OpCodeClass::In,
        OpCodeFlags::IMM8.bits() | OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xE5] = opcode!(
        0xE5,
        OpCodeClass::In,
        OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xE6] = opcode!(
        0xE6,
        OpCodeClass::Out,
        OpCodeFlags::IMM8.bits() | OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xE7] = opcode!(
        0xE7,
        OpCodeClass::Out,
        OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xE8] = opcode!(
        0xE8,
        OpCodeClass::Call,
        OpCodeFlags::IMM.bits() | OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
    );
    table[0xE9] = opcode!(
        0xE9,
        OpCodeClass::Jmp,
        OpCodeFlags::IMM.bits() | OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
    );
    table[0xEB] = opcode!(
        0xEB,
        OpCodeClass::Jmp,
        OpCodeFlags::IMM8.bits() | OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
    );
    table[0xEC] = opcode!(
        0xEC,
        OpCodeClass::In,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xED] = opcode!(0xED, OpCodeClass::In, OpCodeFlags::NO_MODRM.bits());
    table[0xEE] = opcode!(
        0xEE,
        OpCodeClass::Out,
        OpCodeFlags::BYTE_OP.bits() | OpCodeFlags::NO_MODRM.bits()
    );
    table[0xEF] = opcode!(0xEF, OpCodeClass::Out, OpCodeFlags::NO_MODRM.bits());
    table[0xF1] = opcode!(
        0xF1,
        OpCodeClass::Icebp,
        OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::UNDOC.bits()
    );
    table[0xF4] = opcode!(0xF4, OpCodeClass::Hlt, OpCodeFlags::NO_MODRM.bits());

    table
};

static GROUP7_RM7_TABLE: [Option<OpCodeDesc>; 8] = {
    let mut table = [None; 8];

    table[1] = opcode!(0xF9, OpCodeClass::Rdtscp, OpCodeFlags::OP_NONE.bits());

    table
};

static GROUP7_TABLE: [Option<OpCodeDesc>; 16] = {
    let mut table = [None; 16];

    table[15] = opcode!(OpCodeClass::Group7Rm7);

    table
};

static TWO_BYTE_TABLE: [Option<OpCodeDesc>; 256] = {
    let mut table: [Option<OpCodeDesc>; 256] = [None; 256];

    table[0x01] = opcode!(OpCodeClass::Group7);
    table[0x05] = opcode!(
        0x05,
        OpCodeClass::Syscall,
        OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::O64.bits()
    );
    table[0x0B] = opcode!(0x0B, OpCodeClass::Ud2, OpCodeFlags::NO_MODRM.bits());
    table[0x1E] = opcode!(OpCodeClass::EndbrGroup);
    table[0x1F] = opcode!(0x1F, OpCodeClass::Nop);
    table[0x30] = opcode!(0x30, OpCodeClass::Wrmsr, OpCodeFlags::NO_MODRM.bits());
    table[0x31] = opcode!(0x31, OpCodeClass::Rdtsc, OpCodeFlags::NO_MODRM.bits());
    table[0x32] = opcode!(0x32, OpCodeClass::Rdmsr, OpCodeFlags::NO_MODRM.bits());

    let mut code = 0x80;
    while code <= 0x8F {
        table[code] = opcode!(
            code as u8,
            OpCodeClass::Jcc,
            OpCodeFlags::IMM.bits() | OpCodeFlags::NO_MODRM.bits() | OpCodeFlags::DEF64.bits()
        );
        code += 1;
    }

    table[0xA2] = opcode!(0xA2, OpCodeClass::Cpuid, OpCodeFlags::NO_MODRM.bits());
    table[0xB6] = opcode!(0xB6, OpCodeClass::Movzx);
    table[0xB7] = opcode!(0xB7, OpCodeClass::Movzx);
    table[0xBE] = opcode!(0xBE, OpCodeClass::Movsx);
    table[0xBF] = opcode!(0xBF, OpCodeClass::Movsx);

    table
};

impl OpCodeDesc {
    fn one_byte(insn: &mut OpCodeBytes) -> Result<Option<OpCodeDesc>, DecodeError> {
        let byte = insn.0.peek()?;
        // Advance the OpCodeBytes as this is a opcode byte
        insn.0.advance();
        Ok(ONE_BYTE_TABLE.get(byte as usize).copied().flatten())
    }

    fn two_byte(insn: &mut OpCodeBytes) -> Result<Option<OpCodeDesc>, DecodeError> {
        let byte = insn.0.peek()?;
        // Advance the OpCodeBytes as this is a opcode byte
        insn.0.advance();
        Ok(TWO_BYTE_TABLE.get(byte as usize).copied().flatten())
    }

    fn group7(insn: &OpCodeBytes) -> Result<Option<OpCodeDesc>, DecodeError> {
        // Not to advance the OpCodeBytes as this is not a opcode byte
        let modrm = insn.0.peek()?;
        let r#mod = modrm >> 6;
        let offset = (modrm >> 3) & 0x7;
        let idx = if r#mod == 3 { 8 + offset } else { offset };
        Ok(GROUP7_TABLE.get(idx as usize).copied().flatten())
    }

    fn group7_rm7(insn: &OpCodeBytes) -> Result<Option<OpCodeDesc>, DecodeError> {
        // Not to advance the OpCodeBytes as this is not a opcode byte
        let modrm = insn.0.peek()?;
        let idx = modrm & 0x7;
        Ok(GROUP7_RM7_TABLE.get(idx as usize).copied().flatten())
    }

    fn endbr(insn: &OpCodeBytes) -> Result<Option<OpCodeDesc>, DecodeError> {
        // Not to advance the OpCodeBytes as the selector doubles as the
        // ModRm byte
        let modrm = insn.0.peek()?;
        Ok(match modrm {
            0xFA => opcode!(
                0xFA,
                OpCodeClass::Endbr64,
                OpCodeFlags::OP_NONE.bits() | OpCodeFlags::CET.bits()
            ),
            0xFB => opcode!(
                0xFB,
                OpCodeClass::Endbr32,
                OpCodeFlags::OP_NONE.bits() | OpCodeFlags::CET.bits()
            ),
            _ => None,
        })
    }

    /// Decodes an opcode from the given `OpCodeBytes`.
    ///
    /// # Arguments
    ///
    /// * `insn` - A mutable reference to the `OpCodeBytes` representing
    ///   the bytes of the opcode to be decoded.
    ///
    /// # Returns
    ///
    /// The [`OpCodeDesc`] of a supported opcode, [`DecodeError::Truncated`]
    /// if the opcode bytes are exhausted or [`DecodeError::InvalidOpcode`]
    /// otherwise.
    pub(crate) fn decode(insn: &mut OpCodeBytes) -> Result<OpCodeDesc, DecodeError> {
        let mut opdesc = Self::one_byte(insn)?;

        loop {
            if let Some(desc) = opdesc {
                opdesc = match desc.class {
                    OpCodeClass::TwoByte => Self::two_byte(insn)?,
                    OpCodeClass::Group7 => Self::group7(insn)?,
                    OpCodeClass::Group7Rm7 => Self::group7_rm7(insn)?,
                    OpCodeClass::EndbrGroup => Self::endbr(insn)?,
                    _ => return Ok(desc),
                }
            } else {
                return Err(DecodeError::InvalidOpcode);
            }
        }
    }
}
