// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! The interface the harness drives. The production implementations
//! over veldis live in [`crate::engine`]; the tests substitute
//! scripted stand-ins.

use std::fmt::Debug;

/// Outcome of one decode attempt at the head of a byte window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome<I> {
    /// A complete instruction occupying `len` bytes of the window.
    Insn { insn: I, len: usize },
    /// The window ended before the instruction did. The caller grows
    /// the window and retries.
    ///
    /// Implementations must not report this for a window that already
    /// holds a maximum-length instruction candidate, or a stream whose
    /// working buffer is at least that large could stop making
    /// progress.
    NeedMore,
    /// The head of the window is not a valid instruction.
    Invalid,
}

/// A decoder the harness can configure from raw control block values
/// and feed byte windows.
pub trait DecoderBackend: Sized {
    type Insn;
    type Error: Debug;

    /// Packed library version the harness was compiled against.
    const VERSION: u64;

    /// Packed library version reported at run time. Control block
    /// semantics depend on enum value stability, so a skew against
    /// [`Self::VERSION`] must abort before any input is interpreted.
    fn version() -> u64;

    /// Creates a decoder for the given machine mode and address width
    /// selectors. Selector validation is the decoder's business, the
    /// harness only propagates the failure.
    fn init(machine_mode: u32, address_width: u32) -> Result<Self, Self::Error>;

    /// Enables or disables the decoder mode with the given selector.
    fn set_mode(&mut self, mode: u32, enabled: bool) -> Result<(), Self::Error>;

    /// Attempts to decode one instruction at the head of `bytes`,
    /// assumed to live at address `ip`.
    fn decode(&mut self, bytes: &[u8], ip: u64) -> DecodeOutcome<Self::Insn>;
}

/// A formatter the harness can configure from raw control block values
/// and feed decoded instructions.
pub trait FormatterBackend: Sized {
    type Insn;
    type Error: Debug;

    /// Creates a formatter with the given style selector.
    fn init(style: u32) -> Result<Self, Self::Error>;

    /// Sets the attribute with the given selector to `value`.
    fn set_attribute(&mut self, attrib: u32, value: u64) -> Result<(), Self::Error>;

    /// Renders `insn` into `out` and returns the number of bytes
    /// written.
    fn format(&mut self, insn: &Self::Insn, out: &mut [u8]) -> Result<usize, Self::Error>;
}
