#![no_main]

use libfuzzer_sys::fuzz_target;
use std::hint::black_box;
use veldis::{AddressWidth, Decoder, Formatter, FormatterStyle, MachineMode};

fuzz_target!(|data: &[u8]| {
    let Ok(dec) = Decoder::new(MachineMode::Long64, AddressWidth::Bits64) else {
        return;
    };
    let fmt = Formatter::new(FormatterStyle::Intel);
    let mut out = [0u8; 256];

    // Every offset gets a turn as a decode start, the way the stdin
    // harness walks its working buffer.
    let mut offs = 0;
    while offs < data.len() {
        match dec.decode(&data[offs..], offs as u64) {
            Ok(ctx) => {
                let _ = black_box(fmt.format(&ctx, &mut out));
                offs += ctx.size();
            }
            Err(_) => offs += 1,
        }
    }
});
