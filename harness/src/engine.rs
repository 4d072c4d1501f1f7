// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Backend implementations over the linked veldis library.
//!
//! The control block carries raw selector integers; the mapping into
//! veldis enums happens here, so a selector veldis does not know is
//! surfaced as a configuration failure rather than silently skipped.

use veldis::{
    AddressWidth, ConfigError, DecodeError, DecodedInsnCtx, Decoder, DecoderMode, FormatError,
    Formatter, FormatterAttrib, FormatterStyle, MachineMode,
};

use crate::backend::{DecodeOutcome, DecoderBackend, FormatterBackend};

impl DecoderBackend for Decoder {
    type Insn = DecodedInsnCtx;
    type Error = ConfigError;

    const VERSION: u64 = veldis::VERSION;

    fn version() -> u64 {
        veldis::version()
    }

    fn init(machine_mode: u32, address_width: u32) -> Result<Self, ConfigError> {
        let mode = MachineMode::try_from(machine_mode)?;
        let width = AddressWidth::try_from(address_width)?;
        Decoder::new(mode, width)
    }

    fn set_mode(&mut self, mode: u32, enabled: bool) -> Result<(), ConfigError> {
        let mode = DecoderMode::try_from(mode)?;
        Decoder::set_mode(self, mode, enabled);
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8], ip: u64) -> DecodeOutcome<DecodedInsnCtx> {
        match Decoder::decode(self, bytes, ip) {
            Ok(ctx) => {
                let len = ctx.size();
                DecodeOutcome::Insn { insn: ctx, len }
            }
            // A truncated instruction may complete once the caller
            // supplies a longer window; everything else is a plain
            // reject.
            Err(DecodeError::Truncated) => DecodeOutcome::NeedMore,
            Err(_) => DecodeOutcome::Invalid,
        }
    }
}

/// Configuration and rendering failures funneled through one type so
/// [`Formatter`] can implement [`FormatterBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineError {
    Config(ConfigError),
    Format(FormatError),
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<FormatError> for EngineError {
    fn from(e: FormatError) -> Self {
        EngineError::Format(e)
    }
}

impl FormatterBackend for Formatter {
    type Insn = DecodedInsnCtx;
    type Error = EngineError;

    fn init(style: u32) -> Result<Self, EngineError> {
        let style = FormatterStyle::try_from(style)?;
        Ok(Formatter::new(style))
    }

    fn set_attribute(&mut self, attrib: u32, value: u64) -> Result<(), EngineError> {
        let attrib = FormatterAttrib::try_from(attrib)?;
        Formatter::set_attribute(self, attrib, value)?;
        Ok(())
    }

    fn format(&mut self, insn: &DecodedInsnCtx, out: &mut [u8]) -> Result<usize, EngineError> {
        let n = Formatter::format(self, insn, out)?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veldis::DecoderModes;

    fn decoder() -> Decoder {
        <Decoder as DecoderBackend>::init(3, 64).unwrap()
    }

    fn decoded(bytes: &[u8]) -> DecodedInsnCtx {
        let mut dec = decoder();
        match DecoderBackend::decode(&mut dec, bytes, 0) {
            DecodeOutcome::Insn { insn, .. } => insn,
            other => panic!("expected an instruction, got {other:?}"),
        }
    }

    #[test]
    fn test_init_maps_selectors() {
        let dec = decoder();
        assert_eq!(dec.machine_mode(), MachineMode::Long64);
        assert_eq!(dec.address_width(), AddressWidth::Bits64);
    }

    #[test]
    fn test_init_rejects_bad_selectors() {
        assert_eq!(
            <Decoder as DecoderBackend>::init(4, 64).unwrap_err(),
            ConfigError::InvalidSelector(4)
        );
        assert_eq!(
            <Decoder as DecoderBackend>::init(3, 33).unwrap_err(),
            ConfigError::InvalidSelector(33)
        );
        // Both selectors valid on their own, invalid as a pair.
        assert_eq!(
            <Decoder as DecoderBackend>::init(0, 64).unwrap_err(),
            ConfigError::InvalidWidth
        );
    }

    #[test]
    fn test_set_mode_maps_selector() {
        let mut dec = decoder();
        DecoderBackend::set_mode(&mut dec, 1, true).unwrap();
        assert!(dec.modes().contains(DecoderModes::STRICT_PREFIXES));

        assert_eq!(
            DecoderBackend::set_mode(&mut dec, 9, true).unwrap_err(),
            ConfigError::InvalidSelector(9)
        );
    }

    #[test]
    fn test_version_is_the_library_version() {
        assert_eq!(<Decoder as DecoderBackend>::VERSION, veldis::VERSION);
        assert_eq!(<Decoder as DecoderBackend>::version(), veldis::version());
    }

    #[test]
    fn test_decode_success_reports_length() {
        let mut dec = decoder();
        // mov rax, rcx
        match DecoderBackend::decode(&mut dec, &[0x48, 0x89, 0xC8], 0) {
            DecodeOutcome::Insn { len, .. } => assert_eq!(len, 3),
            other => panic!("expected an instruction, got {other:?}"),
        }
    }

    #[test]
    fn test_truncation_asks_for_more() {
        let mut dec = decoder();
        assert!(matches!(
            DecoderBackend::decode(&mut dec, &[0x48], 0),
            DecodeOutcome::NeedMore
        ));
    }

    #[test]
    fn test_max_length_window_never_asks_for_more() {
        // All prefixes and no opcode cannot complete in any window.
        let mut dec = decoder();
        assert!(matches!(
            DecoderBackend::decode(&mut dec, &[0x66; 15], 0),
            DecodeOutcome::Invalid
        ));
    }

    #[test]
    fn test_undefined_opcode_is_invalid() {
        let mut dec = decoder();
        assert!(matches!(
            DecoderBackend::decode(&mut dec, &[0x06], 0),
            DecodeOutcome::Invalid
        ));
    }

    #[test]
    fn test_format_through_backend() {
        let ctx = decoded(&[0x48, 0x89, 0xC8]);
        let mut fmt = <Formatter as FormatterBackend>::init(0).unwrap();
        let mut out = [0u8; 256];

        let n = FormatterBackend::format(&mut fmt, &ctx, &mut out).unwrap();
        assert_eq!(&out[..n], b"mov rax, rcx");
    }

    #[test]
    fn test_style_selector_switches_dialect() {
        let ctx = decoded(&[0x48, 0x89, 0xC8]);
        let mut fmt = <Formatter as FormatterBackend>::init(1).unwrap();
        let mut out = [0u8; 256];

        let n = FormatterBackend::format(&mut fmt, &ctx, &mut out).unwrap();
        assert_eq!(&out[..n], b"movq %rcx, %rax");
    }

    #[test]
    fn test_bad_style_selector() {
        assert_eq!(
            <Formatter as FormatterBackend>::init(2).unwrap_err(),
            EngineError::Config(ConfigError::InvalidSelector(2))
        );
    }

    #[test]
    fn test_attribute_selector_and_value_checks() {
        let mut fmt = <Formatter as FormatterBackend>::init(0).unwrap();

        FormatterBackend::set_attribute(&mut fmt, 0, 1).unwrap();
        assert_eq!(
            FormatterBackend::set_attribute(&mut fmt, 7, 0).unwrap_err(),
            EngineError::Config(ConfigError::InvalidSelector(7))
        );
        assert_eq!(
            FormatterBackend::set_attribute(&mut fmt, 2, 3).unwrap_err(),
            EngineError::Config(ConfigError::InvalidValue)
        );
    }

    #[test]
    fn test_length_only_decode_has_nothing_to_format() {
        let mut dec = decoder();
        DecoderBackend::set_mode(&mut dec, 0, true).unwrap();
        let ctx = match DecoderBackend::decode(&mut dec, &[0x48, 0x89, 0xC8], 0) {
            DecodeOutcome::Insn { insn, len } => {
                assert_eq!(len, 3);
                insn
            }
            other => panic!("expected an instruction, got {other:?}"),
        };

        let mut fmt = <Formatter as FormatterBackend>::init(0).unwrap();
        let mut out = [0u8; 256];
        assert_eq!(
            FormatterBackend::format(&mut fmt, &ctx, &mut out).unwrap_err(),
            EngineError::Format(FormatError::NoInsn)
        );
    }
}
