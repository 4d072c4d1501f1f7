// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use crate::decode::DecodedInsnCtx;
use crate::error::{ConfigError, FormatError};
use crate::insn::{Cc, DecodedInsn, Immediate, MemOperand, Operand, Register, SegRegister};
use crate::types::Bytes;

/// Number of selectable [`FormatterAttrib`]s.
pub const FORMATTER_ATTRIB_COUNT: usize = 7;

/// The output dialect of a [`Formatter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatterStyle {
    /// Intel syntax, destination first.
    Intel = 0,
    /// AT&T syntax, source first with % and $ sigils.
    Att = 1,
}

impl TryFrom<u32> for FormatterStyle {
    type Error = ConfigError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(FormatterStyle::Intel),
            1 => Ok(FormatterStyle::Att),
            v => Err(ConfigError::InvalidSelector(v)),
        }
    }
}

/// An individually settable formatter attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatterAttrib {
    /// Render mnemonics, registers and keywords in uppercase.
    Uppercase = 0,
    /// Always spell out the memory operand size keyword.
    ForceMemSize = 1,
    /// How relative addresses are rendered, see [`AddrFormat`].
    AddrFormat = 2,
    /// How displacements are rendered, see [`NumFormat`].
    DispFormat = 3,
    /// How immediates are rendered, see [`NumFormat`].
    ImmFormat = 4,
    /// Render hexadecimal digits in uppercase.
    HexUppercase = 5,
    /// Zero-pad hexadecimal numbers to this many digits, at most 16.
    HexPadding = 6,
}

impl TryFrom<u32> for FormatterAttrib {
    type Error = ConfigError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(FormatterAttrib::Uppercase),
            1 => Ok(FormatterAttrib::ForceMemSize),
            2 => Ok(FormatterAttrib::AddrFormat),
            3 => Ok(FormatterAttrib::DispFormat),
            4 => Ok(FormatterAttrib::ImmFormat),
            5 => Ok(FormatterAttrib::HexUppercase),
            6 => Ok(FormatterAttrib::HexPadding),
            v => Err(ConfigError::InvalidSelector(v)),
        }
    }
}

/// How addresses reached by relative operands are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrFormat {
    /// The resolved target address.
    Absolute = 0,
    /// The relative offset with its sign.
    RelSigned = 1,
    /// The relative offset as an unsigned value of the operand width.
    RelUnsigned = 2,
}

/// How a displacement or immediate value is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumFormat {
    /// Negative values print with a minus sign.
    Signed = 0,
    /// The raw two's complement value of the operand width.
    Unsigned = 1,
}

fn num_format(value: u64) -> Result<NumFormat, ConfigError> {
    match value {
        0 => Ok(NumFormat::Signed),
        1 => Ok(NumFormat::Unsigned),
        _ => Err(ConfigError::InvalidValue),
    }
}

const REG_NAMES_8: [&str; 16] = [
    "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
    "r13b", "r14b", "r15b",
];

const REG_NAMES_16: [&str; 16] = [
    "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w", "r13w",
    "r14w", "r15w",
];

const REG_NAMES_32: [&str; 16] = [
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d", "r12d",
    "r13d", "r14d", "r15d",
];

const REG_NAMES_64: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

fn reg_name(reg: Register, size: Bytes) -> &'static str {
    if reg == Register::Rip {
        return match size {
            Bytes::Eight => "rip",
            Bytes::Four => "eip",
            _ => "ip",
        };
    }

    let i = reg as usize;
    match size {
        Bytes::One => REG_NAMES_8[i],
        Bytes::Two => REG_NAMES_16[i],
        Bytes::Four => REG_NAMES_32[i],
        _ => REG_NAMES_64[i],
    }
}

fn high_byte_name(reg: Register) -> &'static str {
    match reg {
        Register::Rax => "ah",
        Register::Rcx => "ch",
        Register::Rdx => "dh",
        _ => "bh",
    }
}

fn seg_name(seg: SegRegister) -> &'static str {
    match seg {
        SegRegister::CS => "cs",
        SegRegister::SS => "ss",
        SegRegister::DS => "ds",
        SegRegister::ES => "es",
        SegRegister::FS => "fs",
        SegRegister::GS => "gs",
    }
}

fn size_keyword(size: Bytes) -> &'static str {
    match size {
        Bytes::One => "byte ptr ",
        Bytes::Two => "word ptr ",
        Bytes::Four => "dword ptr ",
        _ => "qword ptr ",
    }
}

fn att_suffix(size: Bytes) -> &'static str {
    match size {
        Bytes::One => "b",
        Bytes::Two => "w",
        Bytes::Four => "l",
        _ => "q",
    }
}

fn cc_mnemonic(cc: Cc) -> &'static str {
    match cc {
        Cc::O => "jo",
        Cc::No => "jno",
        Cc::B => "jb",
        Cc::Ae => "jae",
        Cc::E => "je",
        Cc::Ne => "jne",
        Cc::Be => "jbe",
        Cc::A => "ja",
        Cc::S => "js",
        Cc::Ns => "jns",
        Cc::P => "jp",
        Cc::Np => "jnp",
        Cc::L => "jl",
        Cc::Ge => "jge",
        Cc::Le => "jle",
        Cc::G => "jg",
    }
}

// in/out only ever move through al/ax/eax
fn acc_name(size: Bytes) -> &'static str {
    match size {
        Bytes::One => "al",
        Bytes::Two => "ax",
        _ => "eax",
    }
}

/// Byte-wise text sink over a caller supplied buffer. Alphabetic bytes
/// pushed through [`Self::put_str`] are case-mapped, sigils and hex
/// digits go through the raw paths.
#[derive(Debug)]
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    upper: bool,
}

impl SliceWriter<'_> {
    fn push(&mut self, b: u8) -> Result<(), FormatError> {
        if self.pos >= self.buf.len() {
            return Err(FormatError::BufferTooSmall);
        }
        self.buf[self.pos] = b;
        self.pos += 1;
        Ok(())
    }

    fn put_str(&mut self, s: &str) -> Result<(), FormatError> {
        for &b in s.as_bytes() {
            let b = if self.upper { b.to_ascii_uppercase() } else { b };
            self.push(b)?;
        }
        Ok(())
    }

    fn put_raw(&mut self, s: &str) -> Result<(), FormatError> {
        for &b in s.as_bytes() {
            self.push(b)?;
        }
        Ok(())
    }

    fn put_hex(
        &mut self,
        val: u64,
        neg: bool,
        upper_digits: bool,
        padding: u8,
    ) -> Result<(), FormatError> {
        if neg {
            self.push(b'-')?;
        }
        self.put_raw("0x")?;

        let mut digits = [0u8; 16];
        let mut n = 0;
        let mut v = val;
        loop {
            let d = (v & 0xF) as u8;
            digits[n] = match d {
                0..=9 => b'0' + d,
                _ if upper_digits => b'A' + d - 10,
                _ => b'a' + d - 10,
            };
            n += 1;
            v >>= 4;
            if v == 0 {
                break;
            }
        }
        while n < padding as usize {
            digits[n] = b'0';
            n += 1;
        }

        for i in (0..n).rev() {
            self.push(digits[i])?;
        }
        Ok(())
    }
}

/// Renders decoded instructions as text.
///
/// The style is fixed at construction, everything else is adjusted
/// through [`Self::set_attribute`].
#[derive(Clone, Copy, Debug)]
pub struct Formatter {
    style: FormatterStyle,
    uppercase: bool,
    force_mem_size: bool,
    addr_format: AddrFormat,
    disp_format: NumFormat,
    imm_format: NumFormat,
    hex_uppercase: bool,
    hex_padding: u8,
}

impl Formatter {
    pub fn new(style: FormatterStyle) -> Self {
        Self {
            style,
            uppercase: false,
            force_mem_size: false,
            addr_format: AddrFormat::Absolute,
            disp_format: NumFormat::Signed,
            imm_format: NumFormat::Unsigned,
            hex_uppercase: false,
            hex_padding: 0,
        }
    }

    pub fn style(&self) -> FormatterStyle {
        self.style
    }

    /// Sets a formatter attribute. Boolean attributes treat any
    /// non-zero value as true, enumerated and numeric attributes
    /// reject values out of their range.
    pub fn set_attribute(
        &mut self,
        attrib: FormatterAttrib,
        value: u64,
    ) -> Result<(), ConfigError> {
        match attrib {
            FormatterAttrib::Uppercase => self.uppercase = value != 0,
            FormatterAttrib::ForceMemSize => self.force_mem_size = value != 0,
            FormatterAttrib::AddrFormat => {
                self.addr_format = match value {
                    0 => AddrFormat::Absolute,
                    1 => AddrFormat::RelSigned,
                    2 => AddrFormat::RelUnsigned,
                    _ => return Err(ConfigError::InvalidValue),
                }
            }
            FormatterAttrib::DispFormat => self.disp_format = num_format(value)?,
            FormatterAttrib::ImmFormat => self.imm_format = num_format(value)?,
            FormatterAttrib::HexUppercase => self.hex_uppercase = value != 0,
            FormatterAttrib::HexPadding => {
                if value > 16 {
                    return Err(ConfigError::InvalidValue);
                }
                self.hex_padding = value as u8;
            }
        }
        Ok(())
    }

    /// Renders `ctx` into `out` and returns the number of bytes
    /// written. The output is plain ASCII and not NUL terminated.
    pub fn format(&self, ctx: &DecodedInsnCtx, out: &mut [u8]) -> Result<usize, FormatError> {
        let insn = ctx.insn().ok_or(FormatError::NoInsn)?;

        let mut w = SliceWriter {
            buf: out,
            pos: 0,
            upper: self.uppercase,
        };

        if ctx.has_lock() {
            w.put_str("lock ")?;
        }

        match self.style {
            FormatterStyle::Intel => self.format_intel(&insn, ctx, &mut w)?,
            FormatterStyle::Att => self.format_att(&insn, ctx, &mut w)?,
        }

        Ok(w.pos)
    }

    fn put_num(&self, w: &mut SliceWriter<'_>, val: u64, neg: bool) -> Result<(), FormatError> {
        w.put_hex(val, neg, self.hex_uppercase, self.hex_padding)
    }

    fn put_imm(&self, w: &mut SliceWriter<'_>, imm: Immediate) -> Result<(), FormatError> {
        match self.imm_format {
            NumFormat::Signed => {
                let v = imm.signed();
                if v < 0 {
                    self.put_num(w, v.unsigned_abs(), true)
                } else {
                    self.put_num(w, v as u64, false)
                }
            }
            NumFormat::Unsigned => self.put_num(w, imm.bits(), false),
        }
    }

    /// Renders the target of a relative branch. The operand size
    /// bounds the width the target wraps at, matching how the
    /// instruction pointer itself would truncate.
    fn put_target(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        imm: Immediate,
    ) -> Result<(), FormatError> {
        let rel = imm.signed();
        let mask = ctx.operand_size().mask();

        match self.addr_format {
            AddrFormat::Absolute => {
                let target = ctx
                    .ip()
                    .wrapping_add(ctx.size() as u64)
                    .wrapping_add(rel as u64)
                    & mask;
                self.put_num(w, target, false)
            }
            AddrFormat::RelSigned => {
                if rel < 0 {
                    self.put_num(w, rel.unsigned_abs(), true)
                } else {
                    w.push(b'+')?;
                    self.put_num(w, rel as u64, false)
                }
            }
            AddrFormat::RelUnsigned => {
                w.push(b'+')?;
                self.put_num(w, (rel as u64) & mask, false)
            }
        }
    }

    fn put_disp(&self, w: &mut SliceWriter<'_>, m: &MemOperand) -> Result<(), FormatError> {
        match self.disp_format {
            NumFormat::Signed => {
                if m.disp < 0 {
                    self.put_num(w, m.disp.unsigned_abs(), true)
                } else {
                    w.push(b'+')?;
                    self.put_num(w, m.disp as u64, false)
                }
            }
            NumFormat::Unsigned => {
                w.push(b'+')?;
                self.put_num(w, (m.disp as u64) & m.addr_size.mask(), false)
            }
        }
    }

    fn mem_size_shown(&self, other: Option<&Operand>, msize: Bytes) -> bool {
        if self.force_mem_size {
            return true;
        }
        // The keyword is redundant when a register operand already
        // discloses the operation width.
        match other {
            Some(Operand::Reg(_, s)) => *s != msize,
            Some(Operand::HighByteReg(_)) => msize != Bytes::One,
            _ => true,
        }
    }

    fn intel_mem(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        m: &MemOperand,
        show_size: bool,
    ) -> Result<(), FormatError> {
        if show_size {
            w.put_str(size_keyword(m.size))?;
        }
        if let Some(seg) = m.seg {
            w.put_str(seg_name(seg))?;
            w.push(b':')?;
        }
        w.push(b'[')?;

        if m.base == Some(Register::Rip) {
            match self.addr_format {
                AddrFormat::Absolute => {
                    let target = ctx
                        .ip()
                        .wrapping_add(ctx.size() as u64)
                        .wrapping_add(m.disp as u64);
                    self.put_num(w, target, false)?;
                }
                AddrFormat::RelSigned => {
                    w.put_str("rip")?;
                    if m.disp != 0 {
                        self.put_disp(w, m)?;
                    }
                }
                AddrFormat::RelUnsigned => {
                    w.put_str("rip")?;
                    w.push(b'+')?;
                    self.put_num(w, m.disp as u64, false)?;
                }
            }
            return w.push(b']');
        }

        let mut printed = false;
        if let Some(base) = m.base {
            w.put_str(reg_name(base, m.addr_size))?;
            printed = true;
        }
        if let Some(index) = m.index {
            if printed {
                w.push(b'+')?;
            }
            w.put_str(reg_name(index, m.addr_size))?;
            if m.scale > 1 {
                w.push(b'*')?;
                w.push(b'0' + m.scale)?;
            }
            printed = true;
        }

        if !printed {
            // A bare displacement is an absolute address.
            self.put_num(w, (m.disp as u64) & m.addr_size.mask(), false)?;
        } else if m.disp != 0 {
            self.put_disp(w, m)?;
        }

        w.push(b']')
    }

    fn intel_operand(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        op: &Operand,
        other: Option<&Operand>,
    ) -> Result<(), FormatError> {
        match op {
            Operand::Reg(r, size) => w.put_str(reg_name(*r, *size)),
            Operand::HighByteReg(r) => w.put_str(high_byte_name(*r)),
            Operand::Imm(imm) => self.put_imm(w, *imm),
            Operand::Mem(m) => self.intel_mem(w, ctx, m, self.mem_size_shown(other, m.size)),
        }
    }

    fn intel_two(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        dst: &Operand,
        src: &Operand,
    ) -> Result<(), FormatError> {
        w.put_str(mnemonic)?;
        w.push(b' ')?;
        self.intel_operand(w, ctx, dst, Some(src))?;
        w.put_raw(", ")?;
        self.intel_operand(w, ctx, src, Some(dst))
    }

    fn intel_one(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        op: &Operand,
    ) -> Result<(), FormatError> {
        w.put_str(mnemonic)?;
        w.push(b' ')?;
        self.intel_operand(w, ctx, op, None)
    }

    fn intel_branch(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        imm: Immediate,
    ) -> Result<(), FormatError> {
        w.put_str(mnemonic)?;
        w.push(b' ')?;
        self.put_target(w, ctx, imm)
    }

    fn format_intel(
        &self,
        insn: &DecodedInsn,
        ctx: &DecodedInsnCtx,
        w: &mut SliceWriter<'_>,
    ) -> Result<(), FormatError> {
        match *insn {
            DecodedInsn::Add(d, s) => self.intel_two(w, ctx, "add", &d, &s),
            DecodedInsn::Cmp(d, s) => self.intel_two(w, ctx, "cmp", &d, &s),
            DecodedInsn::Xor(d, s) => self.intel_two(w, ctx, "xor", &d, &s),
            DecodedInsn::Mov(d, s) => self.intel_two(w, ctx, "mov", &d, &s),
            DecodedInsn::Movsx(d, s) => self.intel_two(w, ctx, "movsx", &d, &s),
            DecodedInsn::Movzx(d, s) => self.intel_two(w, ctx, "movzx", &d, &s),
            DecodedInsn::Push(op) => self.intel_one(w, ctx, "push", &op),
            DecodedInsn::Pop(op) => self.intel_one(w, ctx, "pop", &op),
            DecodedInsn::Inc(op) => self.intel_one(w, ctx, "inc", &op),
            DecodedInsn::Dec(op) => self.intel_one(w, ctx, "dec", &op),
            DecodedInsn::NopRm(op) => self.intel_one(w, ctx, "nop", &op),
            DecodedInsn::Call(imm) => self.intel_branch(w, ctx, "call", imm),
            DecodedInsn::Jmp(imm) => self.intel_branch(w, ctx, "jmp", imm),
            DecodedInsn::Jcc(cc, imm) => self.intel_branch(w, ctx, cc_mnemonic(cc), imm),
            DecodedInsn::Ret(None) => w.put_str("ret"),
            DecodedInsn::Ret(Some(pop)) => {
                w.put_str("ret ")?;
                self.put_num(w, pop as u64, false)
            }
            DecodedInsn::Int(vector) => {
                w.put_str("int ")?;
                self.put_num(w, vector as u64, false)
            }
            DecodedInsn::In(port, size) => {
                w.put_str("in ")?;
                w.put_str(acc_name(size))?;
                w.put_raw(", ")?;
                self.intel_operand(w, ctx, &port, None)
            }
            DecodedInsn::Out(port, size) => {
                w.put_str("out ")?;
                self.intel_operand(w, ctx, &port, None)?;
                w.put_raw(", ")?;
                w.put_str(acc_name(size))
            }
            DecodedInsn::Nop => w.put_str("nop"),
            DecodedInsn::Pause => w.put_str("pause"),
            DecodedInsn::Int3 => w.put_str("int3"),
            DecodedInsn::Cpuid => w.put_str("cpuid"),
            DecodedInsn::Hlt => w.put_str("hlt"),
            DecodedInsn::Rdmsr => w.put_str("rdmsr"),
            DecodedInsn::Rdtsc => w.put_str("rdtsc"),
            DecodedInsn::Rdtscp => w.put_str("rdtscp"),
            DecodedInsn::Syscall => w.put_str("syscall"),
            DecodedInsn::Wrmsr => w.put_str("wrmsr"),
            DecodedInsn::Endbr32 => w.put_str("endbr32"),
            DecodedInsn::Endbr64 => w.put_str("endbr64"),
            DecodedInsn::Icebp => w.put_str("icebp"),
            DecodedInsn::Salc => w.put_str("salc"),
            DecodedInsn::Ud2 => w.put_str("ud2"),
        }
    }

    fn att_mem(&self, w: &mut SliceWriter<'_>, m: &MemOperand) -> Result<(), FormatError> {
        if let Some(seg) = m.seg {
            w.push(b'%')?;
            w.put_str(seg_name(seg))?;
            w.push(b':')?;
        }

        if m.base.is_none() && m.index.is_none() {
            return self.put_num(w, (m.disp as u64) & m.addr_size.mask(), false);
        }

        if m.disp != 0 {
            match self.disp_format {
                NumFormat::Signed => {
                    if m.disp < 0 {
                        self.put_num(w, m.disp.unsigned_abs(), true)?;
                    } else {
                        self.put_num(w, m.disp as u64, false)?;
                    }
                }
                NumFormat::Unsigned => {
                    self.put_num(w, (m.disp as u64) & m.addr_size.mask(), false)?;
                }
            }
        }

        w.push(b'(')?;
        if let Some(base) = m.base {
            w.push(b'%')?;
            w.put_str(reg_name(base, m.addr_size))?;
        }
        if let Some(index) = m.index {
            w.push(b',')?;
            w.push(b'%')?;
            w.put_str(reg_name(index, m.addr_size))?;
            w.push(b',')?;
            w.push(b'0' + m.scale)?;
        }
        w.push(b')')
    }

    fn att_operand(&self, w: &mut SliceWriter<'_>, op: &Operand) -> Result<(), FormatError> {
        match op {
            Operand::Reg(r, size) => {
                w.push(b'%')?;
                w.put_str(reg_name(*r, *size))
            }
            Operand::HighByteReg(r) => {
                w.push(b'%')?;
                w.put_str(high_byte_name(*r))
            }
            Operand::Imm(imm) => {
                w.push(b'$')?;
                self.put_imm(w, *imm)
            }
            Operand::Mem(m) => self.att_mem(w, m),
        }
    }

    // Two operand form with the AT&T order, source first.
    fn att_two(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        dst: &Operand,
        src: &Operand,
    ) -> Result<(), FormatError> {
        w.put_str(mnemonic)?;
        w.put_str(att_suffix(ctx.operand_size()))?;
        w.push(b' ')?;
        self.att_operand(w, src)?;
        w.put_raw(", ")?;
        self.att_operand(w, dst)
    }

    fn att_one(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        op: &Operand,
    ) -> Result<(), FormatError> {
        w.put_str(mnemonic)?;
        w.put_str(att_suffix(ctx.operand_size()))?;
        w.push(b' ')?;
        self.att_operand(w, op)
    }

    // movzx/movsx spell both width suffixes, source then destination.
    fn att_movx(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        dst: &Operand,
        src: &Operand,
    ) -> Result<(), FormatError> {
        let src_size = match src {
            Operand::Reg(_, s) => *s,
            Operand::Mem(m) => m.size,
            _ => Bytes::One,
        };

        w.put_str(mnemonic)?;
        w.put_str(att_suffix(src_size))?;
        w.put_str(att_suffix(ctx.operand_size()))?;
        w.push(b' ')?;
        self.att_operand(w, src)?;
        w.put_raw(", ")?;
        self.att_operand(w, dst)
    }

    fn att_branch(
        &self,
        w: &mut SliceWriter<'_>,
        ctx: &DecodedInsnCtx,
        mnemonic: &str,
        imm: Immediate,
    ) -> Result<(), FormatError> {
        w.put_str(mnemonic)?;
        w.push(b' ')?;
        self.put_target(w, ctx, imm)
    }

    fn format_att(
        &self,
        insn: &DecodedInsn,
        ctx: &DecodedInsnCtx,
        w: &mut SliceWriter<'_>,
    ) -> Result<(), FormatError> {
        match *insn {
            DecodedInsn::Add(d, s) => self.att_two(w, ctx, "add", &d, &s),
            DecodedInsn::Cmp(d, s) => self.att_two(w, ctx, "cmp", &d, &s),
            DecodedInsn::Xor(d, s) => self.att_two(w, ctx, "xor", &d, &s),
            DecodedInsn::Mov(d, s) => self.att_two(w, ctx, "mov", &d, &s),
            DecodedInsn::Movsx(d, s) => self.att_movx(w, ctx, "movs", &d, &s),
            DecodedInsn::Movzx(d, s) => self.att_movx(w, ctx, "movz", &d, &s),
            DecodedInsn::Push(op) => self.att_one(w, ctx, "push", &op),
            DecodedInsn::Pop(op) => self.att_one(w, ctx, "pop", &op),
            DecodedInsn::Inc(op) => self.att_one(w, ctx, "inc", &op),
            DecodedInsn::Dec(op) => self.att_one(w, ctx, "dec", &op),
            DecodedInsn::NopRm(op) => self.att_one(w, ctx, "nop", &op),
            DecodedInsn::Call(imm) => self.att_branch(w, ctx, "call", imm),
            DecodedInsn::Jmp(imm) => self.att_branch(w, ctx, "jmp", imm),
            DecodedInsn::Jcc(cc, imm) => self.att_branch(w, ctx, cc_mnemonic(cc), imm),
            DecodedInsn::Ret(None) => w.put_str("ret"),
            DecodedInsn::Ret(Some(pop)) => {
                w.put_str("ret ")?;
                w.push(b'$')?;
                self.put_num(w, pop as u64, false)
            }
            DecodedInsn::Int(vector) => {
                w.put_str("int ")?;
                w.push(b'$')?;
                self.put_num(w, vector as u64, false)
            }
            DecodedInsn::In(port, size) => {
                w.put_str("in ")?;
                self.att_operand(w, &port)?;
                w.put_raw(", ")?;
                w.push(b'%')?;
                w.put_str(acc_name(size))
            }
            DecodedInsn::Out(port, size) => {
                w.put_str("out ")?;
                w.push(b'%')?;
                w.put_str(acc_name(size))?;
                w.put_raw(", ")?;
                self.att_operand(w, &port)
            }
            DecodedInsn::Nop => w.put_str("nop"),
            DecodedInsn::Pause => w.put_str("pause"),
            DecodedInsn::Int3 => w.put_str("int3"),
            DecodedInsn::Cpuid => w.put_str("cpuid"),
            DecodedInsn::Hlt => w.put_str("hlt"),
            DecodedInsn::Rdmsr => w.put_str("rdmsr"),
            DecodedInsn::Rdtsc => w.put_str("rdtsc"),
            DecodedInsn::Rdtscp => w.put_str("rdtscp"),
            DecodedInsn::Syscall => w.put_str("syscall"),
            DecodedInsn::Wrmsr => w.put_str("wrmsr"),
            DecodedInsn::Endbr32 => w.put_str("endbr32"),
            DecodedInsn::Endbr64 => w.put_str("endbr64"),
            DecodedInsn::Icebp => w.put_str("icebp"),
            DecodedInsn::Salc => w.put_str("salc"),
            DecodedInsn::Ud2 => w.put_str("ud2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{AddressWidth, Decoder, DecoderMode, MachineMode};

    fn decode64(bytes: &[u8], ip: u64) -> DecodedInsnCtx {
        Decoder::new(MachineMode::Long64, AddressWidth::Bits64)
            .unwrap()
            .decode(bytes, ip)
            .unwrap()
    }

    fn decode16(bytes: &[u8]) -> DecodedInsnCtx {
        Decoder::new(MachineMode::Real, AddressWidth::Bits16)
            .unwrap()
            .decode(bytes, 0)
            .unwrap()
    }

    fn assert_fmt(f: &Formatter, ctx: &DecodedInsnCtx, want: &str) {
        let mut buf = [0u8; 256];
        let n = f.format(ctx, &mut buf).unwrap();
        assert_eq!(core::str::from_utf8(&buf[..n]).unwrap(), want);
    }

    #[test]
    fn test_intel_mov_reg() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x48, 0x89, 0xC8], 0);
        assert_fmt(&f, &ctx, "mov rax, rcx");
    }

    #[test]
    fn test_intel_mem_sib() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x8B, 0x44, 0x8B, 0x10], 0);
        assert_fmt(&f, &ctx, "mov eax, [rbx+rcx*4+0x10]");
    }

    #[test]
    fn test_intel_mem_size_keyword() {
        let f = Formatter::new(FormatterStyle::Intel);
        // An immediate source does not disclose the width
        let ctx = decode64(&[0xC6, 0x00, 0x41], 0);
        assert_fmt(&f, &ctx, "mov byte ptr [rax], 0x41");

        let ctx = decode64(&[0x0F, 0xB6, 0x08], 0);
        assert_fmt(&f, &ctx, "movzx ecx, byte ptr [rax]");

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::ForceMemSize, 1).unwrap();
        let ctx = decode64(&[0x8B, 0x00], 0);
        assert_fmt(&f, &ctx, "mov eax, dword ptr [rax]");
    }

    #[test]
    fn test_intel_seg_override() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x64, 0x8B, 0x00], 0);
        assert_fmt(&f, &ctx, "mov eax, fs:[rax]");
    }

    #[test]
    fn test_intel_negative_disp() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x8B, 0x40, 0xF0], 0);
        assert_fmt(&f, &ctx, "mov eax, [rax-0x10]");

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::DispFormat, 1).unwrap();
        assert_fmt(&f, &ctx, "mov eax, [rax+0xfffffffffffffff0]");
    }

    #[test]
    fn test_intel_imm_formats() {
        let ctx = decode64(&[0xB8, 0xF0, 0xFF, 0xFF, 0xFF], 0);

        let f = Formatter::new(FormatterStyle::Intel);
        assert_fmt(&f, &ctx, "mov eax, 0xfffffff0");

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::ImmFormat, 0).unwrap();
        assert_fmt(&f, &ctx, "mov eax, -0x10");
    }

    #[test]
    fn test_hex_attributes() {
        let ctx = decode64(&[0xB8, 0xFF, 0x00, 0x00, 0x00], 0);

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::HexUppercase, 1).unwrap();
        assert_fmt(&f, &ctx, "mov eax, 0xFF");

        f.set_attribute(FormatterAttrib::HexPadding, 8).unwrap();
        assert_fmt(&f, &ctx, "mov eax, 0x000000FF");
    }

    #[test]
    fn test_uppercase() {
        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::Uppercase, 1).unwrap();

        let ctx = decode64(&[0x48, 0x89, 0xC8], 0);
        assert_fmt(&f, &ctx, "MOV RAX, RCX");

        // Hex digit case stays under the control of its own attribute
        let ctx = decode64(&[0xB8, 0xFF, 0x00, 0x00, 0x00], 0);
        assert_fmt(&f, &ctx, "MOV EAX, 0xff");
    }

    #[test]
    fn test_branch_targets() {
        let ctx = decode64(&[0xEB, 0x10], 0x1000);

        let f = Formatter::new(FormatterStyle::Intel);
        assert_fmt(&f, &ctx, "jmp 0x1012");

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::AddrFormat, 1).unwrap();
        assert_fmt(&f, &ctx, "jmp +0x10");

        let ctx = decode64(&[0xEB, 0xF0], 0x1000);
        let f = Formatter::new(FormatterStyle::Intel);
        assert_fmt(&f, &ctx, "jmp 0xff2");

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::AddrFormat, 1).unwrap();
        assert_fmt(&f, &ctx, "jmp -0x10");

        f.set_attribute(FormatterAttrib::AddrFormat, 2).unwrap();
        assert_fmt(&f, &ctx, "jmp +0xfffffffffffffff0");
    }

    #[test]
    fn test_branch_target_wraps_at_operand_size() {
        // Real mode branches wrap at 16 bits like the ip does
        let ctx = decode16(&[0xEB, 0xF0]);
        let f = Formatter::new(FormatterStyle::Intel);
        let mut buf = [0u8; 256];
        let n = f.format(&ctx, &mut buf).unwrap();
        assert_eq!(core::str::from_utf8(&buf[..n]).unwrap(), "jmp 0xfff2");
    }

    #[test]
    fn test_jcc_mnemonics() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x74, 0x10], 0);
        assert_fmt(&f, &ctx, "je 0x12");

        let ctx = decode64(&[0x7F, 0x02], 0);
        assert_fmt(&f, &ctx, "jg 0x4");
    }

    #[test]
    fn test_rip_relative() {
        let ctx = decode64(&[0x8B, 0x05, 0x10, 0x00, 0x00, 0x00], 0x1000);

        let f = Formatter::new(FormatterStyle::Intel);
        assert_fmt(&f, &ctx, "mov eax, [0x1016]");

        let mut f = Formatter::new(FormatterStyle::Intel);
        f.set_attribute(FormatterAttrib::AddrFormat, 1).unwrap();
        assert_fmt(&f, &ctx, "mov eax, [rip+0x10]");
    }

    #[test]
    fn test_intel_high_byte() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x88, 0xE0], 0);
        assert_fmt(&f, &ctx, "mov al, ah");
    }

    #[test]
    fn test_intel_in_out() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0xE4, 0x41], 0);
        assert_fmt(&f, &ctx, "in al, 0x41");

        let ctx = decode64(&[0x66, 0xEF], 0);
        assert_fmt(&f, &ctx, "out dx, ax");
    }

    #[test]
    fn test_intel_lock() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0xF0, 0x01, 0x08], 0);
        assert_fmt(&f, &ctx, "lock add [rax], ecx");
    }

    #[test]
    fn test_intel_16bit_mem() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode16(&[0x8B, 0x00]);
        assert_fmt(&f, &ctx, "mov ax, [bx+si]");

        let ctx = decode16(&[0x8B, 0x06, 0x34, 0x12]);
        assert_fmt(&f, &ctx, "mov ax, [0x1234]");
    }

    #[test]
    fn test_att_mov() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0x48, 0x89, 0xC8], 0);
        assert_fmt(&f, &ctx, "movq %rcx, %rax");
    }

    #[test]
    fn test_att_mem() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0x8B, 0x44, 0x8B, 0x10], 0);
        assert_fmt(&f, &ctx, "movl 0x10(%rbx,%rcx,4), %eax");

        let ctx = decode64(&[0x8B, 0x40, 0xF0], 0);
        assert_fmt(&f, &ctx, "movl -0x10(%rax), %eax");
    }

    #[test]
    fn test_att_imm() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0xB8, 0xFF, 0x00, 0x00, 0x00], 0);
        assert_fmt(&f, &ctx, "movl $0xff, %eax");
    }

    #[test]
    fn test_att_push() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0x55], 0);
        assert_fmt(&f, &ctx, "pushq %rbp");
    }

    #[test]
    fn test_att_movzx() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0x0F, 0xB6, 0x08], 0);
        assert_fmt(&f, &ctx, "movzbl (%rax), %ecx");
    }

    #[test]
    fn test_att_rip_relative() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0x8B, 0x05, 0x10, 0x00, 0x00, 0x00], 0x1000);
        assert_fmt(&f, &ctx, "movl 0x10(%rip), %eax");
    }

    #[test]
    fn test_att_in_out() {
        let f = Formatter::new(FormatterStyle::Att);
        let ctx = decode64(&[0xE4, 0x41], 0);
        assert_fmt(&f, &ctx, "in $0x41, %al");
    }

    #[test]
    fn test_nop_rm() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x0F, 0x1F, 0x00], 0);
        assert_fmt(&f, &ctx, "nop dword ptr [rax]");

        let f = Formatter::new(FormatterStyle::Att);
        assert_fmt(&f, &ctx, "nopl (%rax)");
    }

    #[test]
    fn test_ret_int() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0xC2, 0x10, 0x00], 0);
        assert_fmt(&f, &ctx, "ret 0x10");

        let ctx = decode64(&[0xCD, 0x80], 0);
        assert_fmt(&f, &ctx, "int 0x80");
    }

    #[test]
    fn test_buffer_too_small() {
        let f = Formatter::new(FormatterStyle::Intel);
        let ctx = decode64(&[0x48, 0x89, 0xC8], 0);

        let mut buf = [0u8; 4];
        assert_eq!(
            f.format(&ctx, &mut buf).unwrap_err(),
            FormatError::BufferTooSmall
        );
    }

    #[test]
    fn test_minimal_decode_has_no_text() {
        let mut dec = Decoder::new(MachineMode::Long64, AddressWidth::Bits64).unwrap();
        dec.set_mode(DecoderMode::Minimal, true);
        let ctx = dec.decode(&[0x90], 0).unwrap();

        let f = Formatter::new(FormatterStyle::Intel);
        let mut buf = [0u8; 256];
        assert_eq!(f.format(&ctx, &mut buf).unwrap_err(), FormatError::NoInsn);
    }

    #[test]
    fn test_attribute_validation() {
        let mut f = Formatter::new(FormatterStyle::Intel);

        assert_eq!(
            f.set_attribute(FormatterAttrib::AddrFormat, 3).unwrap_err(),
            ConfigError::InvalidValue
        );
        assert_eq!(
            f.set_attribute(FormatterAttrib::DispFormat, 2).unwrap_err(),
            ConfigError::InvalidValue
        );
        assert_eq!(
            f.set_attribute(FormatterAttrib::ImmFormat, 9).unwrap_err(),
            ConfigError::InvalidValue
        );
        assert_eq!(
            f.set_attribute(FormatterAttrib::HexPadding, 17).unwrap_err(),
            ConfigError::InvalidValue
        );

        // Booleans accept any value
        assert!(f.set_attribute(FormatterAttrib::Uppercase, u64::MAX).is_ok());
        assert!(f.set_attribute(FormatterAttrib::HexPadding, 16).is_ok());
    }

    #[test]
    fn test_attrib_selector_range() {
        for raw in 0..FORMATTER_ATTRIB_COUNT as u32 {
            assert!(FormatterAttrib::try_from(raw).is_ok());
        }
        assert!(FormatterAttrib::try_from(FORMATTER_ATTRIB_COUNT as u32).is_err());
    }

    #[test]
    fn test_style_selectors() {
        assert_eq!(FormatterStyle::try_from(0).unwrap(), FormatterStyle::Intel);
        assert_eq!(FormatterStyle::try_from(1).unwrap(), FormatterStyle::Att);
        assert_eq!(
            FormatterStyle::try_from(2).unwrap_err(),
            ConfigError::InvalidSelector(2)
        );
    }
}
