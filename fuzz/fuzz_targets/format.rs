// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::{fuzz_target, Corpus};
use std::hint::black_box;
use veldis::{
    AddressWidth, Decoder, Formatter, FormatterAttrib, FormatterStyle, MachineMode,
    FORMATTER_ATTRIB_COUNT, MAX_INSN_SIZE,
};

/// One formatter exercise: an attribute assignment across every slot,
/// an instruction window and an output capacity.
#[derive(Arbitrary, Debug)]
struct Case {
    att: bool,
    attribs: [u64; FORMATTER_ATTRIB_COUNT],
    bytes: [u8; MAX_INSN_SIZE],
    out_len: usize,
}

fuzz_target!(|case: Case| -> Corpus {
    let style = if case.att {
        FormatterStyle::Att
    } else {
        FormatterStyle::Intel
    };
    let mut fmt = Formatter::new(style);
    for (attrib, &value) in case.attribs.iter().enumerate() {
        if let Ok(attrib) = FormatterAttrib::try_from(attrib as u32) {
            // Out-of-range values are rejected; that path is part of
            // the exercise.
            let _ = fmt.set_attribute(attrib, value);
        }
    }

    let Ok(dec) = Decoder::new(MachineMode::Long64, AddressWidth::Bits64) else {
        return Corpus::Reject;
    };
    let Ok(ctx) = dec.decode(&case.bytes, 0) else {
        return Corpus::Reject;
    };

    // Undersized buffers have to fail cleanly, never corrupt output.
    let mut out = [0u8; 256];
    let len = case.out_len % (out.len() + 1);
    let _ = black_box(fmt.format(&ctx, &mut out[..len]));

    Corpus::Keep
});
