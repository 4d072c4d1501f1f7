// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use crate::decode::DecodedInsnCtx;
use crate::error::{ConfigError, DecodeError};
use bitflags::bitflags;

/// Number of selectable [`DecoderMode`]s.
pub const DECODER_MODE_COUNT: usize = 4;

/// The processor operating mode instructions are decoded for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MachineMode {
    /// 16-bit real mode
    Real = 0,
    /// 32-bit protected mode
    Protected = 1,
    /// 32-bit compatibility sub-mode of long mode
    Compatibility = 2,
    /// 64-bit long mode
    Long64 = 3,
}

impl TryFrom<u32> for MachineMode {
    type Error = ConfigError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(MachineMode::Real),
            1 => Ok(MachineMode::Protected),
            2 => Ok(MachineMode::Compatibility),
            3 => Ok(MachineMode::Long64),
            v => Err(ConfigError::InvalidSelector(v)),
        }
    }
}

/// The default width of effective addresses, given as the raw bit count
/// used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressWidth {
    Bits16,
    Bits32,
    Bits64,
}

impl TryFrom<u32> for AddressWidth {
    type Error = ConfigError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            16 => Ok(AddressWidth::Bits16),
            32 => Ok(AddressWidth::Bits32),
            64 => Ok(AddressWidth::Bits64),
            v => Err(ConfigError::InvalidSelector(v)),
        }
    }
}

/// An individually selectable decoder behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderMode {
    /// Compute instruction lengths without materializing operands.
    Minimal = 0,
    /// Reject encodings with duplicated prefixes.
    StrictPrefixes = 1,
    /// Accept the CET branch tracking instructions.
    Cet = 2,
    /// Accept undocumented opcodes.
    Undocumented = 3,
}

impl TryFrom<u32> for DecoderMode {
    type Error = ConfigError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(DecoderMode::Minimal),
            1 => Ok(DecoderMode::StrictPrefixes),
            2 => Ok(DecoderMode::Cet),
            3 => Ok(DecoderMode::Undocumented),
            v => Err(ConfigError::InvalidSelector(v)),
        }
    }
}

impl DecoderMode {
    fn flag(self) -> DecoderModes {
        match self {
            DecoderMode::Minimal => DecoderModes::MINIMAL,
            DecoderMode::StrictPrefixes => DecoderModes::STRICT_PREFIXES,
            DecoderMode::Cet => DecoderModes::CET,
            DecoderMode::Undocumented => DecoderModes::UNDOCUMENTED,
        }
    }
}

bitflags! {
    /// The set of enabled [`DecoderMode`]s.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DecoderModes: u8 {
        const MINIMAL           = 1 << 0;
        const STRICT_PREFIXES   = 1 << 1;
        const CET               = 1 << 2;
        const UNDOCUMENTED      = 1 << 3;
    }
}

/// An instruction decoder configured for one machine mode and address
/// width. Decoding itself is stateless, so one decoder can serve any
/// number of instructions.
#[derive(Clone, Copy, Debug)]
pub struct Decoder {
    machine_mode: MachineMode,
    address_width: AddressWidth,
    modes: DecoderModes,
}

impl Decoder {
    /// Creates a decoder, checking that the address width is one the
    /// machine mode can operate with.
    pub fn new(
        machine_mode: MachineMode,
        address_width: AddressWidth,
    ) -> Result<Self, ConfigError> {
        let valid = match machine_mode {
            MachineMode::Real => matches!(address_width, AddressWidth::Bits16),
            MachineMode::Protected | MachineMode::Compatibility => {
                matches!(address_width, AddressWidth::Bits16 | AddressWidth::Bits32)
            }
            MachineMode::Long64 => matches!(address_width, AddressWidth::Bits64),
        };
        if !valid {
            return Err(ConfigError::InvalidWidth);
        }

        Ok(Self {
            machine_mode,
            address_width,
            modes: DecoderModes::empty(),
        })
    }

    /// Enables or disables a decoder mode.
    pub fn set_mode(&mut self, mode: DecoderMode, enabled: bool) {
        self.modes.set(mode.flag(), enabled);
    }

    pub fn machine_mode(&self) -> MachineMode {
        self.machine_mode
    }

    pub fn address_width(&self) -> AddressWidth {
        self.address_width
    }

    pub fn modes(&self) -> DecoderModes {
        self.modes
    }

    /// Decodes the instruction at the start of `bytes`.
    ///
    /// `ip` is the address the instruction is assumed to live at; it
    /// only affects how relative operands are later formatted. At most
    /// [`crate::MAX_INSN_SIZE`] bytes are examined.
    pub fn decode(&self, bytes: &[u8], ip: u64) -> Result<DecodedInsnCtx, DecodeError> {
        DecodedInsnCtx::new(bytes, ip, self)
    }
}
