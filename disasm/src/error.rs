// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use core::fmt;

/// Failure while decoding a single instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The byte window ended before the instruction did. Decoding may
    /// succeed once more bytes are available.
    Truncated,
    /// The encoding exceeds [`MAX_INSN_SIZE`](crate::insn::MAX_INSN_SIZE)
    /// bytes and can never become valid, no matter how many bytes follow.
    TooLong,
    /// Malformed or rejected prefix sequence.
    InvalidPrefix,
    /// No instruction is defined for the opcode byte(s).
    InvalidOpcode,
    /// The ModR/M or SIB byte selects an undefined form.
    InvalidModRm,
    /// A register code cannot be mapped in the active machine mode.
    InvalidRegister,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "instruction bytes exhausted"),
            Self::TooLong => write!(f, "instruction exceeds maximum length"),
            Self::InvalidPrefix => write!(f, "invalid prefix sequence"),
            Self::InvalidOpcode => write!(f, "invalid opcode"),
            Self::InvalidModRm => write!(f, "invalid ModR/M or SIB encoding"),
            Self::InvalidRegister => write!(f, "invalid register encoding"),
        }
    }
}

/// Failure while constructing or reconfiguring a decoder or formatter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Raw selector value outside the enumeration it indexes.
    InvalidSelector(u32),
    /// Machine mode and address width do not form a valid pair.
    InvalidWidth,
    /// Attribute value outside the accepted domain of its slot.
    InvalidValue,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSelector(v) => write!(f, "invalid selector value {v}"),
            Self::InvalidWidth => write!(f, "invalid machine-mode/address-width pair"),
            Self::InvalidValue => write!(f, "attribute value out of range"),
        }
    }
}

/// Failure while rendering a decoded instruction as text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormatError {
    /// The output buffer is too small for the rendered text.
    BufferTooSmall,
    /// The context carries no materialized instruction, typically because
    /// it came from a length-only decode.
    NoInsn,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "output buffer too small"),
            Self::NoInsn => write!(f, "no instruction to format"),
        }
    }
}
