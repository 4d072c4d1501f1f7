// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! The streaming decode loop and the full harness run.

use std::io::{ErrorKind, Read};

use crate::backend::{DecodeOutcome, DecoderBackend, FormatterBackend};
use crate::control::ControlBlock;
use crate::setup::{check_version, configure, SetupError};

/// Capacity of the sliding working buffer.
pub const READ_BUF_LEN: usize = veldis::MAX_INSN_SIZE * 1024;

/// Size of the scratch buffer formatted text is rendered into and then
/// dropped from. Truncated renderings are fine, the buffer size is not
/// a correctness parameter.
pub const PRINT_BUF_LEN: usize = 256;

/// Reads until `buf` is full or the stream ends. Interrupted reads are
/// retried, any other error ends the stream, matching what `fread`
/// reports to a caller that only checks the count.
fn refill(input: &mut impl Read, buf: &mut [u8]) -> usize {
    let mut got = 0;
    while got < buf.len() {
        match input.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    got
}

/// Decodes and formats everything in `input`, sliding a window over
/// `buf`.
///
/// Each successful decode advances by the instruction length and its
/// text is rendered and discarded. A rejected byte advances the cursor
/// by exactly one, so every input offset gets its turn as a decode
/// start. An instruction cut off at the end of the window is carried
/// to the front of the buffer and completed after the next refill.
///
/// The loop ends once a refill returns less than it asked for, which
/// is how a fully drained stream presents.
pub fn stream_decode<D, F>(dec: &mut D, fmt: &mut F, input: &mut impl Read, buf: &mut [u8])
where
    D: DecoderBackend,
    F: FormatterBackend<Insn = D::Insn>,
{
    let mut text = [0u8; PRINT_BUF_LEN];
    let mut carry = 0;

    loop {
        let want = buf.len() - carry;
        let got = refill(input, &mut buf[carry..]);
        let len = carry + got;

        let mut offs = 0;
        while offs < len {
            match dec.decode(&buf[offs..len], offs as u64) {
                DecodeOutcome::Insn { insn, len: insn_len } => {
                    // The rendering is discarded, running the formatter
                    // is the point.
                    let _ = fmt.format(&insn, &mut text);
                    offs += insn_len;
                }
                DecodeOutcome::Invalid => offs += 1,
                DecodeOutcome::NeedMore => break,
            }
        }

        if offs < len {
            buf.copy_within(offs..len, 0);
        }
        carry = len - offs;

        if got < want {
            break;
        }
    }
}

/// One full harness run: version guard, then control block and decode
/// stream out of `input`, in that order.
pub fn run<D, F>(input: &mut impl Read, buf: &mut [u8]) -> Result<(), SetupError>
where
    D: DecoderBackend,
    F: FormatterBackend<Insn = D::Insn>,
{
    check_version::<D>()?;
    let cb = ControlBlock::read_from(input)?;
    let (mut dec, mut fmt) = configure::<D, F>(&cb)?;

    stream_decode(&mut dec, &mut fmt, input, buf);
    Ok(())
}
