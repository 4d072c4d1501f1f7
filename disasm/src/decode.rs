// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use crate::decoder::{AddressWidth, Decoder, DecoderModes, MachineMode};
use crate::error::DecodeError;
use crate::insn::{
    Cc, DecodedInsn, Immediate, MemOperand, Operand, Register, SegRegister, MAX_INSN_SIZE,
};
use crate::opcode::{OpCodeClass, OpCodeDesc, OpCodeFlags};
use crate::types::Bytes;
use bitflags::bitflags;

/// A cursor over the byte window a single instruction is decoded from.
/// The window captures at most [`MAX_INSN_SIZE`] bytes; `avail` records
/// how many of them the caller actually supplied.
#[derive(Clone, Copy, Debug)]
pub struct InsnBytes {
    /// The instruction bytes
    bytes: [u8; MAX_INSN_SIZE],
    /// Number of bytes supplied by the caller, capped at MAX_INSN_SIZE
    avail: usize,
    /// Number of bytes processed so far
    nr_processed: usize,
}

impl InsnBytes {
    pub fn new(buf: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_INSN_SIZE];
        let avail = buf.len().min(MAX_INSN_SIZE);
        bytes[..avail].copy_from_slice(&buf[..avail]);

        Self {
            bytes,
            avail,
            nr_processed: 0,
        }
    }

    /// Returns the current byte without consuming it.
    ///
    /// Running past the supplied bytes yields [`DecodeError::Truncated`]
    /// while the window could still grow, and [`DecodeError::TooLong`]
    /// once the architectural length limit is reached. The distinction
    /// matters to streaming callers: a truncated instruction may complete
    /// with more input, an over-long one never will.
    pub fn peek(&self) -> Result<u8, DecodeError> {
        if self.nr_processed < self.avail {
            Ok(self.bytes[self.nr_processed])
        } else if self.avail < MAX_INSN_SIZE {
            Err(DecodeError::Truncated)
        } else {
            Err(DecodeError::TooLong)
        }
    }

    pub fn advance(&mut self) {
        self.nr_processed += 1
    }

    pub fn processed(&self) -> usize {
        self.nr_processed
    }
}

/// The instruction bytes at the opcode decoding stage.
#[derive(Debug)]
pub struct OpCodeBytes(pub InsnBytes);

// The instruction bytes at the prefix decoding stage.
#[derive(Debug)]
struct PrefixBytes(InsnBytes);
// The instruction bytes at the ModR/M decoding stage.
#[derive(Debug)]
struct ModRmBytes(InsnBytes);
// The instruction bytes at the SIB decoding stage.
#[derive(Debug)]
struct SibBytes(InsnBytes);
// The instruction bytes at the displacement decoding stage.
#[derive(Debug)]
struct DisBytes(InsnBytes);
// The instruction bytes at the immediate decoding stage.
#[derive(Debug)]
struct ImmBytes(InsnBytes);
// The instruction bytes at the memory offset decoding stage.
#[derive(Debug)]
struct MoffBytes(InsnBytes);
// The instruction bytes with decoding completed.
#[derive(Debug)]
struct DecodedBytes(InsnBytes);

#[derive(Clone, Copy, Debug)]
struct RegCode(u8);
impl TryFrom<RegCode> for Register {
    type Error = DecodeError;

    fn try_from(val: RegCode) -> Result<Register, Self::Error> {
        match val.0 {
            0 => Ok(Register::Rax),
            1 => Ok(Register::Rcx),
            2 => Ok(Register::Rdx),
            3 => Ok(Register::Rbx),
            4 => Ok(Register::Rsp),
            5 => Ok(Register::Rbp),
            6 => Ok(Register::Rsi),
            7 => Ok(Register::Rdi),
            8 => Ok(Register::R8),
            9 => Ok(Register::R9),
            10 => Ok(Register::R10),
            11 => Ok(Register::R11),
            12 => Ok(Register::R12),
            13 => Ok(Register::R13),
            14 => Ok(Register::R14),
            15 => Ok(Register::R15),
            // Rip is not represented by ModR/M or SIB
            _ => Err(DecodeError::InvalidRegister),
        }
    }
}

const PREFIX_SIZE: usize = 4;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    struct PrefixFlags: u16 {
        const REX_W                 = 1 << 0;
        const REX_R                 = 1 << 1;
        const REX_X                 = 1 << 2;
        const REX_B                 = 1 << 3;
        const REX_P                 = 1 << 4;
        const REPZ_P                = 1 << 5;
        const REPNZ_P               = 1 << 6;
        const OPSIZE_OVERRIDE       = 1 << 7;
        const ADDRSIZE_OVERRIDE     = 1 << 8;
        const LOCK_P                = 1 << 9;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq)]
    struct RexPrefix: u8 {
        const B     = 1 << 0;
        const X     = 1 << 1;
        const R     = 1 << 2;
        const W     = 1 << 3;
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq)]
struct ModRM(u8);

const MOD_INDIRECT: u8 = 0;
const MOD_INDIRECT_DISP8: u8 = 1;
const MOD_INDIRECT_DISP32: u8 = 2;
const MOD_DIRECT: u8 = 3;
const RM_SIB: u8 = 4;
const RM_DISP32: u8 = 5;

impl From<u8> for ModRM {
    fn from(val: u8) -> Self {
        ModRM(val)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum RM {
    Reg(Register),
    Sib,
    Disp32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Mod {
    Indirect,
    IndirectDisp8,
    IndirectDisp32,
    Direct,
}

impl ModRM {
    fn get_mod(&self) -> Mod {
        let v = (self.0 >> 6) & 0x3;

        match v {
            MOD_INDIRECT => Mod::Indirect,
            MOD_INDIRECT_DISP8 => Mod::IndirectDisp8,
            MOD_INDIRECT_DISP32 => Mod::IndirectDisp32,
            MOD_DIRECT => Mod::Direct,
            _ => {
                unreachable!("Mod has only two bits, so its value is always 0 ~ 3");
            }
        }
    }

    fn get_reg(&self) -> u8 {
        (self.0 >> 3) & 0x7
    }

    fn get_rm(&self) -> RM {
        let rm = self.0 & 0x7;
        let r#mod = self.get_mod();

        // RM depends on the Mod value
        if r#mod == Mod::Indirect && rm == RM_DISP32 {
            RM::Disp32
        } else if r#mod != Mod::Direct && rm == RM_SIB {
            RM::Sib
        } else {
            RM::Reg(Register::try_from(RegCode(rm)).unwrap())
        }
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq)]
struct Sib(u8);

impl From<u8> for Sib {
    fn from(val: u8) -> Self {
        Sib(val)
    }
}

impl Sib {
    fn get_scale(&self) -> u8 {
        (self.0 >> 6) & 0x3
    }

    fn get_index(&self) -> u8 {
        (self.0 >> 3) & 0x7
    }

    fn get_base(&self) -> u8 {
        self.0 & 0x7
    }
}

/// The result of decoding one instruction: its materialized form (unless
/// the decode was length-only), its encoded length and the pieces the
/// formatter needs to render it.
#[derive(Clone, Copy, Debug)]
pub struct DecodedInsnCtx {
    insn: Option<DecodedInsn>,
    opdesc: Option<OpCodeDesc>,
    insn_len: usize,
    ip: u64,
    machine_mode: MachineMode,
    modes: DecoderModes,

    // Prefix
    prefix: PrefixFlags,
    override_seg: Option<SegRegister>,

    // Opcode description
    opsize: Bytes,
    addrsize: Bytes,
    modrm: ModRM,
    sib: Sib,
    base_reg: Option<Register>,
    index_reg: Option<Register>,
    scale: u8,
    displacement: i64,
    immediate: i64,
    imm_bytes: Bytes,
}

impl DecodedInsnCtx {
    /// Constructs a new `DecodedInsnCtx` by decoding the given
    /// instruction bytes with the configuration of the given
    /// [`Decoder`].
    pub(crate) fn new(bytes: &[u8], ip: u64, dec: &Decoder) -> Result<Self, DecodeError> {
        let mut ctx = Self {
            insn: None,
            opdesc: None,
            insn_len: 0,
            ip,
            machine_mode: dec.machine_mode(),
            modes: dec.modes(),
            prefix: PrefixFlags::default(),
            override_seg: None,
            opsize: Bytes::Zero,
            addrsize: Bytes::Zero,
            modrm: ModRM::default(),
            sib: Sib::default(),
            base_reg: None,
            index_reg: None,
            scale: 0,
            displacement: 0,
            immediate: 0,
            imm_bytes: Bytes::Zero,
        };

        ctx.decode(bytes, dec).map(|_| ctx)
    }

    /// Retrieves the decoded instruction, if available. A length-only
    /// decode carries no materialized instruction.
    pub fn insn(&self) -> Option<DecodedInsn> {
        self.insn
    }

    /// Retrieves the encoded length of the decoded instruction, in
    /// bytes.
    pub fn size(&self) -> usize {
        self.insn_len
    }

    /// The instruction pointer value the instruction was decoded at.
    pub fn ip(&self) -> u64 {
        self.ip
    }

    /// The effective operand size of the instruction.
    pub fn operand_size(&self) -> Bytes {
        self.opsize
    }

    pub(crate) fn has_lock(&self) -> bool {
        self.prefix.contains(PrefixFlags::LOCK_P)
    }

    fn decode(&mut self, bytes: &[u8], dec: &Decoder) -> Result<(), DecodeError> {
        self.decode_prefixes(bytes, dec)
            .and_then(|insn| self.decode_opcode(insn))
            .and_then(|insn| self.decode_modrm_sib(insn))
            .and_then(|(insn, disp_bytes)| self.decode_displacement(insn, disp_bytes))
            .and_then(|insn| self.decode_immediate(insn))
            .and_then(|insn| self.decode_moffset(insn))
            .and_then(|insn| self.complete_decode(insn))
    }

    fn get_opdesc(&self) -> Result<OpCodeDesc, DecodeError> {
        self.opdesc.ok_or(DecodeError::InvalidOpcode)
    }

    fn decode_rex_prefix(&mut self, code: u8) -> bool {
        if self.machine_mode != MachineMode::Long64 || !(0x40..=0x4F).contains(&code) {
            return false;
        }

        let rex = RexPrefix::from_bits_truncate(code & 0x0F);
        self.prefix.insert(PrefixFlags::REX_P);
        if rex.contains(RexPrefix::W) {
            self.prefix.insert(PrefixFlags::REX_W);
        }
        if rex.contains(RexPrefix::R) {
            self.prefix.insert(PrefixFlags::REX_R);
        }
        if rex.contains(RexPrefix::X) {
            self.prefix.insert(PrefixFlags::REX_X);
        }
        if rex.contains(RexPrefix::B) {
            self.prefix.insert(PrefixFlags::REX_B);
        }

        true
    }

    fn decode_op_addr_size(&mut self, dec: &Decoder) {
        let (def_op, def_addr) = match self.machine_mode {
            MachineMode::Long64 => (Bytes::Four, Bytes::Eight),
            MachineMode::Protected | MachineMode::Compatibility => {
                match dec.address_width() {
                    AddressWidth::Bits16 => (Bytes::Two, Bytes::Two),
                    _ => (Bytes::Four, Bytes::Four),
                }
            }
            MachineMode::Real => (Bytes::Two, Bytes::Two),
        };

        self.opsize = if self.prefix.contains(PrefixFlags::REX_W) {
            Bytes::Eight
        } else if self.prefix.contains(PrefixFlags::OPSIZE_OVERRIDE) {
            if def_op == Bytes::Two {
                Bytes::Four
            } else {
                Bytes::Two
            }
        } else {
            def_op
        };

        self.addrsize = if self.prefix.contains(PrefixFlags::ADDRSIZE_OVERRIDE) {
            match self.machine_mode {
                // In 64-bit mode the override selects 32-bit addressing
                MachineMode::Long64 => Bytes::Four,
                _ => {
                    if def_addr == Bytes::Two {
                        Bytes::Four
                    } else {
                        Bytes::Two
                    }
                }
            }
        } else {
            def_addr
        };
    }

    fn decode_prefixes(&mut self, bytes: &[u8], dec: &Decoder) -> Result<OpCodeBytes, DecodeError> {
        let mut insn = PrefixBytes(InsnBytes::new(bytes));
        let mut ngrp1 = 0u8;
        let mut nseg = 0u8;
        let mut nopsize = 0u8;
        let mut naddrsize = 0u8;

        for _ in 0..PREFIX_SIZE {
            match insn.0.peek()? {
                0x66 => {
                    self.prefix.insert(PrefixFlags::OPSIZE_OVERRIDE);
                    nopsize += 1;
                }
                0x67 => {
                    // Real mode decoding supports 16-bit addressing only
                    if self.machine_mode == MachineMode::Real {
                        return Err(DecodeError::InvalidPrefix);
                    }
                    self.prefix.insert(PrefixFlags::ADDRSIZE_OVERRIDE);
                    naddrsize += 1;
                }
                0xF3 => {
                    self.prefix.insert(PrefixFlags::REPZ_P);
                    ngrp1 += 1;
                }
                0xF2 => {
                    self.prefix.insert(PrefixFlags::REPNZ_P);
                    ngrp1 += 1;
                }
                0xF0 => {
                    self.prefix.insert(PrefixFlags::LOCK_P);
                    ngrp1 += 1;
                }
                0x2E => {
                    self.override_seg = Some(SegRegister::CS);
                    nseg += 1;
                }
                0x36 => {
                    self.override_seg = Some(SegRegister::SS);
                    nseg += 1;
                }
                0x3E => {
                    self.override_seg = Some(SegRegister::DS);
                    nseg += 1;
                }
                0x26 => {
                    self.override_seg = Some(SegRegister::ES);
                    nseg += 1;
                }
                0x64 => {
                    self.override_seg = Some(SegRegister::FS);
                    nseg += 1;
                }
                0x65 => {
                    self.override_seg = Some(SegRegister::GS);
                    nseg += 1;
                }
                _ => break,
            }
            insn.0.advance();
        }

        if self.modes.contains(DecoderModes::STRICT_PREFIXES)
            && (ngrp1 > 1 || nseg > 1 || nopsize > 1 || naddrsize > 1)
        {
            return Err(DecodeError::InvalidPrefix);
        }

        // From section 2.2.1, "REX Prefixes", Intel SDM Vol 2:
        // - Only one REX prefix is allowed per instruction.
        // - The REX prefix must immediately precede the opcode byte or the
        //   escape opcode byte.
        // - If an instruction has a mandatory prefix (0x66, 0xF2 or 0xF3)
        //   the mandatory prefix must come before the REX prefix.
        if self.decode_rex_prefix(insn.0.peek()?) {
            insn.0.advance();
        }

        self.decode_op_addr_size(dec);

        Ok(OpCodeBytes(insn.0))
    }

    fn decode_opcode(&mut self, mut insn: OpCodeBytes) -> Result<ModRmBytes, DecodeError> {
        let opdesc = OpCodeDesc::decode(&mut insn)?;

        if opdesc.flags.contains(OpCodeFlags::CET) && !self.modes.contains(DecoderModes::CET) {
            return Err(DecodeError::InvalidOpcode);
        }
        if opdesc.flags.contains(OpCodeFlags::UNDOC)
            && !self.modes.contains(DecoderModes::UNDOCUMENTED)
        {
            return Err(DecodeError::InvalidOpcode);
        }
        if opdesc.flags.contains(OpCodeFlags::I64) && self.machine_mode == MachineMode::Long64 {
            return Err(DecodeError::InvalidOpcode);
        }
        if opdesc.flags.contains(OpCodeFlags::O64) && self.machine_mode != MachineMode::Long64 {
            return Err(DecodeError::InvalidOpcode);
        }
        // The endbr forms are distinguished from the plain 0x0F 0x1E
        // group by their mandatory repz prefix.
        if matches!(opdesc.class, OpCodeClass::Endbr32 | OpCodeClass::Endbr64)
            && !self.prefix.contains(PrefixFlags::REPZ_P)
        {
            return Err(DecodeError::InvalidOpcode);
        }

        if opdesc.flags.contains(OpCodeFlags::BYTE_OP) {
            self.opsize = Bytes::One;
        } else if opdesc.flags.contains(OpCodeFlags::DEF64)
            && self.machine_mode == MachineMode::Long64
            && !self.prefix.contains(PrefixFlags::OPSIZE_OVERRIDE)
        {
            // SDM Vol 2 Table A-1: near branches and stack operations
            // default to 64-bit operands in 64-bit mode.
            self.opsize = Bytes::Eight;
        }

        self.opdesc = Some(opdesc);

        Ok(ModRmBytes(insn.0))
    }

    fn decode_modrm_sib(&mut self, mut insn: ModRmBytes) -> Result<(DisBytes, Bytes), DecodeError> {
        let opdesc = self.get_opdesc()?;

        if opdesc.flags.contains(OpCodeFlags::NO_MODRM) {
            return Ok((DisBytes(insn.0), Bytes::Zero));
        }

        self.modrm = ModRM::from(insn.0.peek()?);

        if opdesc.flags.contains(OpCodeFlags::OP_NONE) {
            insn.0.advance();
            return Ok((DisBytes(insn.0), Bytes::Zero));
        }

        if self.modrm.get_mod() == Mod::Direct {
            // Register form. The operand registers are resolved from the
            // ModRM copy during materialization.
            insn.0.advance();
            return Ok((DisBytes(insn.0), Bytes::Zero));
        }

        if self.addrsize == Bytes::Two {
            return self.decode_modrm16(insn);
        }

        let r#mod = self.modrm.get_mod();

        // SDM Vol2 Table 2-5: Special Cases of REX Encodings
        // For mod=0 r/m=5 and mod!=3 r/m=4, the 'b' bit in the REX
        // prefix is 'don't care' in these two cases.
        //
        // RM::Disp32 represent mod=0 r/m=5
        // RM::Sib represent mod!=3 r/m=4
        // RM::Reg(r) represent the other cases.
        let disp_bytes = match self.modrm.get_rm() {
            RM::Reg(r) => {
                let ext_r = Register::try_from(RegCode(
                    r as u8 | ((self.prefix.contains(PrefixFlags::REX_B) as u8) << 3),
                ))?;
                self.base_reg = Some(ext_r);
                match r#mod {
                    Mod::IndirectDisp8 => Bytes::One,
                    Mod::IndirectDisp32 => Bytes::Four,
                    Mod::Indirect | Mod::Direct => Bytes::Zero,
                }
            }
            RM::Disp32 => {
                // SDM Vol2 Table 2-7: RIP-Relative Addressing
                // In 64bit mode, mod=0 r/m=5 implies [rip] + disp32
                // whereas in compatibility mode it just implies disp32.
                self.base_reg = if self.machine_mode == MachineMode::Long64 {
                    Some(Register::Rip)
                } else {
                    None
                };
                Bytes::Four
            }
            RM::Sib => {
                insn.0.advance();
                return self.decode_sib(SibBytes(insn.0));
            }
        };

        insn.0.advance();
        Ok((DisBytes(insn.0), disp_bytes))
    }

    // Classic 16-bit effective address forms, reached when the effective
    // address size is two bytes. Direct register forms are handled by
    // the caller.
    fn decode_modrm16(&mut self, mut insn: ModRmBytes) -> Result<(DisBytes, Bytes), DecodeError> {
        let r#mod = self.modrm.get_mod();
        let rm = self.modrm.0 & 0x7;

        let (base, index) = match rm {
            0 => (Some(Register::Rbx), Some(Register::Rsi)),
            1 => (Some(Register::Rbx), Some(Register::Rdi)),
            2 => (Some(Register::Rbp), Some(Register::Rsi)),
            3 => (Some(Register::Rbp), Some(Register::Rdi)),
            4 => (Some(Register::Rsi), None),
            5 => (Some(Register::Rdi), None),
            6 => (Some(Register::Rbp), None),
            _ => (Some(Register::Rbx), None),
        };

        let disp_bytes = match r#mod {
            Mod::Indirect => {
                if rm == 6 {
                    // mod=0 r/m=6 is a bare disp16 with no base register
                    Bytes::Two
                } else {
                    self.base_reg = base;
                    self.index_reg = index;
                    Bytes::Zero
                }
            }
            Mod::IndirectDisp8 => {
                self.base_reg = base;
                self.index_reg = index;
                Bytes::One
            }
            Mod::IndirectDisp32 => {
                // disp16 when the address size is two bytes
                self.base_reg = base;
                self.index_reg = index;
                Bytes::Two
            }
            Mod::Direct => Bytes::Zero,
        };

        if self.index_reg.is_some() {
            self.scale = 1;
        }

        insn.0.advance();
        Ok((DisBytes(insn.0), disp_bytes))
    }

    fn decode_sib(&mut self, mut insn: SibBytes) -> Result<(DisBytes, Bytes), DecodeError> {
        // Process only if SIB byte is present
        if self.modrm.get_rm() != RM::Sib {
            return Err(DecodeError::InvalidModRm);
        }

        self.sib = Sib::from(insn.0.peek()?);
        let index = self.sib.get_index() | ((self.prefix.contains(PrefixFlags::REX_X) as u8) << 3);
        let base = self.sib.get_base() | ((self.prefix.contains(PrefixFlags::REX_B) as u8) << 3);

        let r#mod = self.modrm.get_mod();
        let disp_bytes = match r#mod {
            Mod::IndirectDisp8 => {
                self.base_reg = Some(Register::try_from(RegCode(base))?);
                Bytes::One
            }
            Mod::IndirectDisp32 => {
                self.base_reg = Some(Register::try_from(RegCode(base))?);
                Bytes::Four
            }
            Mod::Indirect => {
                let mut disp_bytes = Bytes::Zero;
                // SDM Vol 2 Table 2-5 Special Cases of REX Encoding
                // Base register is unused if mod=0 base=RBP/R13.
                self.base_reg = if base == Register::Rbp as u8 || base == Register::R13 as u8 {
                    disp_bytes = Bytes::Four;
                    None
                } else {
                    Some(Register::try_from(RegCode(base))?)
                };
                disp_bytes
            }
            Mod::Direct => Bytes::Zero,
        };

        // SDM Vol 2 Table 2-5 Special Cases of REX Encoding
        // Index register not used when index=RSP
        if index != Register::Rsp as u8 {
            self.index_reg = Some(Register::try_from(RegCode(index))?);
            // 'scale' makes sense only in the context of an index register
            self.scale = 1 << self.sib.get_scale();
        }

        insn.0.advance();
        Ok((DisBytes(insn.0), disp_bytes))
    }

    fn decode_displacement(
        &mut self,
        mut insn: DisBytes,
        disp_bytes: Bytes,
    ) -> Result<ImmBytes, DecodeError> {
        match disp_bytes {
            Bytes::Zero => Ok(ImmBytes(insn.0)),
            Bytes::One | Bytes::Two | Bytes::Four => {
                let mut buf = [0; 4];

                for v in buf.iter_mut().take(disp_bytes as usize) {
                    *v = insn.0.peek()?;
                    insn.0.advance();
                }

                self.displacement = match disp_bytes {
                    Bytes::One => buf[0] as i8 as i64,
                    Bytes::Two => i16::from_le_bytes([buf[0], buf[1]]) as i64,
                    _ => i32::from_le_bytes(buf) as i64,
                };

                Ok(ImmBytes(insn.0))
            }
            _ => Err(DecodeError::InvalidModRm),
        }
    }

    fn decode_immediate(&mut self, mut insn: ImmBytes) -> Result<MoffBytes, DecodeError> {
        // Figure out immediate operand size (if any)
        let opdesc = self.get_opdesc()?;
        let imm_bytes = if opdesc.flags.contains(OpCodeFlags::IMM) {
            match self.opsize {
                // SDM Vol 2 2.2.1.5 "Immediates"
                // In 64-bit mode the typical size of immediate operands
                // remains 32-bits. When the operand size is 64-bits, the
                // processor sign-extends all immediates to 64-bits prior
                // to their use.
                Bytes::Four | Bytes::Eight => Bytes::Four,
                _ => Bytes::Two,
            }
        } else if opdesc.flags.contains(OpCodeFlags::IMM_FULL) {
            self.opsize
        } else if opdesc.flags.contains(OpCodeFlags::IMM16) {
            Bytes::Two
        } else if opdesc.flags.contains(OpCodeFlags::IMM8) {
            Bytes::One
        } else {
            // No flags on immediate operand size
            return Ok(MoffBytes(insn.0));
        };

        let mut buf = [0; 8];

        for v in buf.iter_mut().take(imm_bytes as usize) {
            *v = insn.0.peek()?;
            insn.0.advance();
        }

        self.immediate = match imm_bytes {
            Bytes::One => buf[0] as i8 as i64,
            Bytes::Two => i16::from_le_bytes([buf[0], buf[1]]) as i64,
            Bytes::Four => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as i64,
            Bytes::Eight => i64::from_le_bytes(buf),
            Bytes::Zero => 0,
        };
        self.imm_bytes = imm_bytes;

        Ok(MoffBytes(insn.0))
    }

    fn decode_moffset(&mut self, mut insn: MoffBytes) -> Result<DecodedBytes, DecodeError> {
        if !self.get_opdesc()?.flags.contains(OpCodeFlags::MOFFSET) {
            return Ok(DecodedBytes(insn.0));
        }

        match self.addrsize {
            Bytes::Zero | Bytes::One => Err(DecodeError::InvalidModRm),
            _ => {
                // SDM Vol 2 Section 2.2.1.4, "Direct Memory-Offset MOVs"
                // In 64-bit mode, direct memory-offset forms of the MOV
                // instruction are extended to specify a 64-bit immediate
                // absolute address.
                //
                // The memory offset size follows the address-size of the
                // instruction.
                let mut buf = [0; 8];
                for v in buf.iter_mut().take(self.addrsize as usize) {
                    *v = insn.0.peek()?;
                    insn.0.advance();
                }
                self.displacement = i64::from_le_bytes(buf);
                Ok(DecodedBytes(insn.0))
            }
        }
    }

    fn complete_decode(&mut self, insn: DecodedBytes) -> Result<(), DecodeError> {
        self.insn_len = insn.0.processed();

        // A length-only decode skips materialization entirely.
        if self.modes.contains(DecoderModes::MINIMAL) {
            return Ok(());
        }

        self.decoded_insn().map(|decoded| self.insn = Some(decoded))
    }

    fn decoded_insn(&self) -> Result<DecodedInsn, DecodeError> {
        let opdesc = self.get_opdesc()?;
        let code = opdesc.code;

        Ok(match opdesc.class {
            OpCodeClass::Add => {
                let (dst, src) = self.arith_operands()?;
                DecodedInsn::Add(dst, src)
            }
            OpCodeClass::Cmp => {
                let (dst, src) = self.arith_operands()?;
                DecodedInsn::Cmp(dst, src)
            }
            OpCodeClass::Xor => {
                let (dst, src) = self.arith_operands()?;
                DecodedInsn::Xor(dst, src)
            }
            OpCodeClass::Mov => self.mov_insn(code)?,
            OpCodeClass::Movsx | OpCodeClass::Movzx => {
                let src_size = if code == 0xB6 || code == 0xBE {
                    Bytes::One
                } else {
                    Bytes::Two
                };
                let dst = self.modrm_reg_operand()?;
                let src = self.modrm_rm_operand(src_size)?;
                if opdesc.class == OpCodeClass::Movzx {
                    DecodedInsn::Movzx(dst, src)
                } else {
                    DecodedInsn::Movsx(dst, src)
                }
            }
            OpCodeClass::Push => DecodedInsn::Push(self.opcode_reg_operand()?),
            OpCodeClass::Pop => DecodedInsn::Pop(self.opcode_reg_operand()?),
            OpCodeClass::Inc => DecodedInsn::Inc(self.opcode_reg_operand()?),
            OpCodeClass::Dec => DecodedInsn::Dec(self.opcode_reg_operand()?),
            OpCodeClass::Call => DecodedInsn::Call(self.imm_value()),
            OpCodeClass::Jmp => DecodedInsn::Jmp(self.imm_value()),
            OpCodeClass::Jcc => DecodedInsn::Jcc(Cc::from_nibble(code), self.imm_value()),
            OpCodeClass::Ret => {
                if code == 0xC2 {
                    DecodedInsn::Ret(Some(self.immediate as u16))
                } else {
                    DecodedInsn::Ret(None)
                }
            }
            OpCodeClass::Nop => {
                if code == 0x1F {
                    DecodedInsn::NopRm(self.modrm_rm_operand(self.opsize)?)
                } else if self.prefix.contains(PrefixFlags::REPZ_P) {
                    DecodedInsn::Pause
                } else {
                    DecodedInsn::Nop
                }
            }
            OpCodeClass::In => DecodedInsn::In(self.port_operand()?, self.opsize),
            OpCodeClass::Out => DecodedInsn::Out(self.port_operand()?, self.opsize),
            OpCodeClass::Int => DecodedInsn::Int(self.immediate as u8),
            OpCodeClass::Int3 => DecodedInsn::Int3,
            OpCodeClass::Cpuid => DecodedInsn::Cpuid,
            OpCodeClass::Hlt => DecodedInsn::Hlt,
            OpCodeClass::Rdmsr => DecodedInsn::Rdmsr,
            OpCodeClass::Rdtsc => DecodedInsn::Rdtsc,
            OpCodeClass::Rdtscp => DecodedInsn::Rdtscp,
            OpCodeClass::Syscall => DecodedInsn::Syscall,
            OpCodeClass::Wrmsr => DecodedInsn::Wrmsr,
            OpCodeClass::Ud2 => DecodedInsn::Ud2,
            OpCodeClass::Salc => DecodedInsn::Salc,
            OpCodeClass::Icebp => DecodedInsn::Icebp,
            OpCodeClass::Endbr32 => DecodedInsn::Endbr32,
            OpCodeClass::Endbr64 => DecodedInsn::Endbr64,
            // Non-leaf table entries are never stored as the final
            // descriptor.
            OpCodeClass::TwoByte
            | OpCodeClass::Group7
            | OpCodeClass::Group7Rm7
            | OpCodeClass::EndbrGroup => return Err(DecodeError::InvalidOpcode),
        })
    }

    fn mov_insn(&self, code: u8) -> Result<DecodedInsn, DecodeError> {
        Ok(match code {
            0x88..=0x8B => {
                let (dst, src) = self.arith_operands()?;
                DecodedInsn::Mov(dst, src)
            }
            0xA0 | 0xA1 => DecodedInsn::Mov(
                self.accum_operand(),
                Operand::Mem(self.moffs_operand()),
            ),
            0xA2 | 0xA3 => DecodedInsn::Mov(
                Operand::Mem(self.moffs_operand()),
                self.accum_operand(),
            ),
            0xB0..=0xBF => {
                DecodedInsn::Mov(self.opcode_reg_operand()?, Operand::Imm(self.imm_value()))
            }
            0xC6 | 0xC7 => {
                // Only the /0 form of the immediate group is mov
                if self.modrm.get_reg() != 0 {
                    return Err(DecodeError::InvalidOpcode);
                }
                DecodedInsn::Mov(
                    self.modrm_rm_operand(self.opsize)?,
                    Operand::Imm(self.imm_value()),
                )
            }
            _ => return Err(DecodeError::InvalidOpcode),
        })
    }

    // Operand pairing shared by the classic arithmetic opcode layout:
    // low octet 0/1 select rm,reg, 2/3 select reg,rm and 4/5 select the
    // accumulator with an immediate.
    fn arith_operands(&self) -> Result<(Operand, Operand), DecodeError> {
        let code = self.get_opdesc()?.code;
        Ok(match code & 0x07 {
            0x00 | 0x01 => (
                self.modrm_rm_operand(self.opsize)?,
                self.modrm_reg_operand()?,
            ),
            0x02 | 0x03 => (
                self.modrm_reg_operand()?,
                self.modrm_rm_operand(self.opsize)?,
            ),
            _ => (self.accum_operand(), Operand::Imm(self.imm_value())),
        })
    }

    /// Resolves a raw 3-bit register code to an operand, applying the
    /// given REX extension bit and the legacy high byte register rule:
    /// without a REX prefix, byte accesses to codes 4-7 name ah/ch/dh/bh
    /// rather than spl/bpl/sil/dil.
    fn reg_operand(&self, raw: u8, ext: bool, size: Bytes) -> Result<Operand, DecodeError> {
        if size == Bytes::One && !self.prefix.contains(PrefixFlags::REX_P) && (4..=7).contains(&raw)
        {
            return Ok(Operand::HighByteReg(Register::try_from(RegCode(raw - 4))?));
        }

        let code = raw | ((ext as u8) << 3);
        Ok(Operand::Reg(Register::try_from(RegCode(code))?, size))
    }

    fn modrm_reg_operand(&self) -> Result<Operand, DecodeError> {
        self.reg_operand(
            self.modrm.get_reg(),
            self.prefix.contains(PrefixFlags::REX_R),
            self.opsize,
        )
    }

    fn modrm_rm_operand(&self, size: Bytes) -> Result<Operand, DecodeError> {
        if self.modrm.get_mod() == Mod::Direct {
            return self.reg_operand(
                self.modrm.0 & 0x7,
                self.prefix.contains(PrefixFlags::REX_B),
                size,
            );
        }

        Ok(Operand::Mem(self.mem_operand(size)))
    }

    fn opcode_reg_operand(&self) -> Result<Operand, DecodeError> {
        let code = self.get_opdesc()?.code;
        self.reg_operand(
            code & 0x07,
            self.prefix.contains(PrefixFlags::REX_B),
            self.opsize,
        )
    }

    fn mem_operand(&self, size: Bytes) -> MemOperand {
        MemOperand {
            base: self.base_reg,
            index: self.index_reg,
            scale: self.scale,
            disp: self.displacement,
            addr_size: self.addrsize,
            size,
            seg: self.override_seg,
        }
    }

    fn moffs_operand(&self) -> MemOperand {
        MemOperand {
            base: None,
            index: None,
            scale: 0,
            disp: self.displacement,
            addr_size: self.addrsize,
            size: self.opsize,
            seg: self.override_seg,
        }
    }

    fn accum_operand(&self) -> Operand {
        Operand::Reg(Register::Rax, self.opsize)
    }

    fn imm_value(&self) -> Immediate {
        match self.imm_bytes {
            Bytes::One => Immediate::U8(self.immediate as u8),
            Bytes::Two => Immediate::U16(self.immediate as u16),
            Bytes::Eight => Immediate::U64(self.immediate as u64),
            _ => Immediate::U32(self.immediate as u32),
        }
    }

    fn port_operand(&self) -> Result<Operand, DecodeError> {
        Ok(if self.get_opdesc()?.flags.contains(OpCodeFlags::IMM8) {
            Operand::Imm(Immediate::U8(self.immediate as u8))
        } else {
            Operand::dx()
        })
    }
}
