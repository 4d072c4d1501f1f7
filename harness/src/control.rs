// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! The fixed-size configuration record at the head of every input.

use std::io::Read;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::setup::SetupError;

/// Raw decoder and formatter configuration, read verbatim from the
/// stream right after the version guard.
///
/// The layout is packed and native-endian; an input corpus is only
/// meaningful on platforms agreeing on both. Every selector slot is
/// applied whether or not the current library build gives it meaning,
/// so fuzzed values reach the library's own validation.
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct ControlBlock {
    /// Machine mode selector for the decoder.
    pub machine_mode: u32,
    /// Address width for the decoder, in bits.
    pub address_width: u32,
    /// One enable byte per decoder mode selector, non-zero enables.
    pub decoder_modes: [u8; veldis::DECODER_MODE_COUNT],
    /// Style selector for the formatter.
    pub formatter_style: u32,
    /// One value per formatter attribute selector.
    pub formatter_attributes: [u64; veldis::FORMATTER_ATTRIB_COUNT],
}

impl ControlBlock {
    pub const SIZE: usize = size_of::<Self>();

    /// Reads one control block from `input`. Anything short of
    /// [`Self::SIZE`] bytes, including a read error, is fatal.
    pub fn read_from(input: &mut impl Read) -> Result<Self, SetupError> {
        let mut raw = [0u8; Self::SIZE];
        input
            .read_exact(&mut raw)
            .map_err(|_| SetupError::ShortControlBlock)?;

        Self::read_from_bytes(&raw).map_err(|_| SetupError::ShortControlBlock)
    }
}
