// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

#![no_main]

use libfuzzer_sys::fuzz_target;
use veldis::{Decoder, Formatter};
use veldis_harness::run;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    // A buffer much smaller than the production one so refill carries
    // happen on realistically short inputs.
    let mut buf = [0u8; 64];
    let _ = run::<Decoder, Formatter>(&mut input, &mut buf);
});
