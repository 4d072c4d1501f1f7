// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Scripted backend stand-ins and input builders shared by the unit
//! tests.

use std::collections::VecDeque;

use zerocopy::IntoBytes;

use crate::backend::{DecodeOutcome, DecoderBackend, FormatterBackend};
use crate::control::ControlBlock;

/// One recorded [`DecoderBackend::decode`] invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeCall {
    pub ip: u64,
    pub window: usize,
    pub first: u8,
}

/// A decoder that records every call and replays a fixed script of
/// outcomes. Once the script runs dry it keeps answering
/// [`DecodeOutcome::Invalid`].
///
/// `FAIL_MODE` selects a mode slot whose application fails; the
/// default never fails.
#[derive(Debug, Default)]
pub struct FakeDecoder<const FAIL_MODE: u32 = { u32::MAX }> {
    pub init_args: Option<(u32, u32)>,
    pub mode_calls: Vec<(u32, bool)>,
    pub calls: Vec<DecodeCall>,
    script: VecDeque<DecodeOutcome<u8>>,
}

impl<const FAIL_MODE: u32> FakeDecoder<FAIL_MODE> {
    pub fn scripted(outcomes: &[DecodeOutcome<u8>]) -> Self {
        Self {
            script: outcomes.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl<const FAIL_MODE: u32> DecoderBackend for FakeDecoder<FAIL_MODE> {
    type Insn = u8;
    type Error = ();

    const VERSION: u64 = 0x7e57_0000_0003_0001;

    fn version() -> u64 {
        Self::VERSION
    }

    fn init(machine_mode: u32, address_width: u32) -> Result<Self, ()> {
        Ok(Self {
            init_args: Some((machine_mode, address_width)),
            ..Self::default()
        })
    }

    fn set_mode(&mut self, mode: u32, enabled: bool) -> Result<(), ()> {
        assert!(mode <= FAIL_MODE, "set_mode after a failed selector");
        self.mode_calls.push((mode, enabled));
        if mode == FAIL_MODE {
            return Err(());
        }
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8], ip: u64) -> DecodeOutcome<u8> {
        self.calls.push(DecodeCall {
            ip,
            window: bytes.len(),
            first: bytes.first().copied().unwrap_or(0),
        });
        self.script.pop_front().unwrap_or(DecodeOutcome::Invalid)
    }
}

/// A decoder whose construction always fails.
#[derive(Debug)]
pub struct FailingInitDecoder;

impl DecoderBackend for FailingInitDecoder {
    type Insn = u8;
    type Error = ();

    const VERSION: u64 = 0;

    fn version() -> u64 {
        Self::VERSION
    }

    fn init(_machine_mode: u32, _address_width: u32) -> Result<Self, ()> {
        Err(())
    }

    fn set_mode(&mut self, _mode: u32, _enabled: bool) -> Result<(), ()> {
        unreachable!("no instance exists");
    }

    fn decode(&mut self, _bytes: &[u8], _ip: u64) -> DecodeOutcome<u8> {
        unreachable!("no instance exists");
    }
}

/// A decoder whose reported run-time version never matches the
/// compiled-against one.
#[derive(Debug)]
pub struct SkewedVersionDecoder;

impl DecoderBackend for SkewedVersionDecoder {
    type Insn = u8;
    type Error = ();

    const VERSION: u64 = 0x7e57_0000_0003_0001;

    fn version() -> u64 {
        Self::VERSION ^ 1
    }

    fn init(_machine_mode: u32, _address_width: u32) -> Result<Self, ()> {
        unreachable!("the version guard rejects this decoder");
    }

    fn set_mode(&mut self, _mode: u32, _enabled: bool) -> Result<(), ()> {
        unreachable!("no instance exists");
    }

    fn decode(&mut self, _bytes: &[u8], _ip: u64) -> DecodeOutcome<u8> {
        unreachable!("no instance exists");
    }
}

/// A formatter that records its configuration and counts renderings.
///
/// `FAIL_ATTRIB` selects an attribute slot whose application fails;
/// the default never fails.
#[derive(Debug, Default)]
pub struct FakeFormatter<const FAIL_ATTRIB: u32 = { u32::MAX }> {
    pub style: u32,
    pub attrib_calls: Vec<(u32, u64)>,
    pub formats: usize,
    pub out_lens: Vec<usize>,
}

impl<const FAIL_ATTRIB: u32> FormatterBackend for FakeFormatter<FAIL_ATTRIB> {
    type Insn = u8;
    type Error = ();

    fn init(style: u32) -> Result<Self, ()> {
        Ok(Self {
            style,
            ..Self::default()
        })
    }

    fn set_attribute(&mut self, attrib: u32, value: u64) -> Result<(), ()> {
        assert!(attrib <= FAIL_ATTRIB, "set_attribute after a failed selector");
        self.attrib_calls.push((attrib, value));
        if attrib == FAIL_ATTRIB {
            return Err(());
        }
        Ok(())
    }

    fn format(&mut self, _insn: &u8, out: &mut [u8]) -> Result<usize, ()> {
        self.formats += 1;
        self.out_lens.push(out.len());
        Ok(0)
    }
}

/// A formatter that must never come into existence. Pairs with decoder
/// failure tests to show configuration stops early.
#[derive(Debug)]
pub struct PanicFormatter;

impl FormatterBackend for PanicFormatter {
    type Insn = u8;
    type Error = ();

    fn init(_style: u32) -> Result<Self, ()> {
        panic!("formatter constructed despite an earlier failure");
    }

    fn set_attribute(&mut self, _attrib: u32, _value: u64) -> Result<(), ()> {
        unreachable!("no instance exists");
    }

    fn format(&mut self, _insn: &u8, _out: &mut [u8]) -> Result<usize, ()> {
        unreachable!("no instance exists");
    }
}

/// Builds a control block from plain field values.
pub fn control_block(
    machine_mode: u32,
    address_width: u32,
    decoder_modes: [u8; veldis::DECODER_MODE_COUNT],
    formatter_style: u32,
    formatter_attributes: [u64; veldis::FORMATTER_ATTRIB_COUNT],
) -> ControlBlock {
    ControlBlock {
        machine_mode,
        address_width,
        decoder_modes,
        formatter_style,
        formatter_attributes,
    }
}

/// Serializes a complete harness input: control block, then the decode
/// payload.
pub fn harness_input(cb: &ControlBlock, payload: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(ControlBlock::SIZE + payload.len());
    input.extend_from_slice(cb.as_bytes());
    input.extend_from_slice(payload);
    input
}
