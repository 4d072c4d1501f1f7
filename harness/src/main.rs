// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Reads one fuzz input from standard input and drives it through the
//! decoder and formatter. The exit status is the whole report: success
//! once the stream is drained, failure when the preamble is rejected.
//! Nothing is written to standard output.

use std::io::stdin;
use std::process::ExitCode;

use veldis_harness::{run, READ_BUF_LEN};

fn main() -> ExitCode {
    let mut input = stdin().lock();
    let mut buf = [0u8; READ_BUF_LEN];

    match run::<veldis::Decoder, veldis::Formatter>(&mut input, &mut buf) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
