// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Decoder and formatter for a subset of the x86 instruction set.
//!
//! A [`Decoder`] is configured once with a machine mode and address
//! width, optionally adjusted with [`DecoderMode`] switches, and then
//! turns byte slices into [`DecodedInsnCtx`] values. A [`Formatter`]
//! renders those as Intel or AT&T syntax text into a caller supplied
//! buffer. Neither side allocates, the whole crate is usable without
//! std.
//!
//! ```
//! use veldis::{AddressWidth, Decoder, Formatter, FormatterStyle, MachineMode};
//!
//! let dec = Decoder::new(MachineMode::Long64, AddressWidth::Bits64).unwrap();
//! let insn = dec.decode(&[0x48, 0x89, 0xC8], 0).unwrap();
//!
//! let mut buf = [0u8; 64];
//! let n = Formatter::new(FormatterStyle::Intel)
//!     .format(&insn, &mut buf)
//!     .unwrap();
//! assert_eq!(core::str::from_utf8(&buf[..n]).unwrap(), "mov rax, rcx");
//! ```

#![no_std]

pub mod decode;
pub mod decoder;
pub mod error;
pub mod formatter;
pub mod insn;
mod opcode;
pub mod types;

pub use decode::DecodedInsnCtx;
pub use decoder::{
    AddressWidth, Decoder, DecoderMode, DecoderModes, MachineMode, DECODER_MODE_COUNT,
};
pub use error::{ConfigError, DecodeError, FormatError};
pub use formatter::{
    AddrFormat, Formatter, FormatterAttrib, FormatterStyle, NumFormat, FORMATTER_ATTRIB_COUNT,
};
pub use insn::{DecodedInsn, Immediate, MemOperand, Operand, Register, SegRegister, MAX_INSN_SIZE};
pub use types::Bytes;

pub const VERSION_MAJOR: u16 = 0;
pub const VERSION_MINOR: u16 = 3;
pub const VERSION_PATCH: u16 = 1;

/// The crate version packed into a single value, with the major number
/// in bits 32-47, the minor number in bits 16-31 and the patch number
/// in bits 0-15.
pub const VERSION: u64 =
    ((VERSION_MAJOR as u64) << 32) | ((VERSION_MINOR as u64) << 16) | (VERSION_PATCH as u64);

/// Returns [`VERSION`].
pub fn version() -> u64 {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_packing() {
        assert_eq!(VERSION >> 32, VERSION_MAJOR as u64);
        assert_eq!((VERSION >> 16) & 0xFFFF, VERSION_MINOR as u64);
        assert_eq!(VERSION & 0xFFFF, VERSION_PATCH as u64);
        assert_eq!(version(), VERSION);
    }
}
