// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Input preamble validation and fail-fast configuration.

use std::fmt;

use crate::backend::{DecoderBackend, FormatterBackend};
use crate::control::ControlBlock;

/// A fatal condition before streaming starts. Each variant maps to one
/// diagnostic line on stderr and a failure exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupError {
    /// The linked decoder reports a version other than the one the
    /// harness was compiled against.
    VersionMismatch { expected: u64, found: u64 },
    /// Input ended inside the control block.
    ShortControlBlock,
    /// The decoder rejected the machine mode / address width pair.
    DecoderInit,
    /// The decoder rejected a mode selector.
    DecoderMode,
    /// The formatter rejected the style selector.
    FormatterInit,
    /// The formatter rejected an attribute selector or value.
    FormatterAttribute,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::VersionMismatch { expected, found } => write!(
                f,
                "invalid decoder version (expected {expected:#x}, got {found:#x})"
            ),
            SetupError::ShortControlBlock => write!(f, "not enough bytes to fuzz"),
            SetupError::DecoderInit => write!(f, "failed to initialize decoder"),
            SetupError::DecoderMode => write!(f, "failed to adjust decoder mode"),
            SetupError::FormatterInit => write!(f, "failed to initialize instruction formatter"),
            SetupError::FormatterAttribute => write!(f, "failed to set formatter attribute"),
        }
    }
}

/// Compares the run-time version the decoder reports against the one
/// the harness was compiled against. No input is consumed before this
/// passes, so a skewed library fails before a single control block
/// byte is interpreted.
pub fn check_version<D: DecoderBackend>() -> Result<(), SetupError> {
    let found = D::version();
    if found != D::VERSION {
        return Err(SetupError::VersionMismatch {
            expected: D::VERSION,
            found,
        });
    }
    Ok(())
}

/// Builds the decoder and formatter a control block describes.
///
/// Every selector slot is applied in ascending order and the first
/// failure aborts: the decoder is fully configured before the
/// formatter is even constructed.
pub fn configure<D: DecoderBackend, F: FormatterBackend>(
    cb: &ControlBlock,
) -> Result<(D, F), SetupError> {
    let mut dec =
        D::init(cb.machine_mode, cb.address_width).map_err(|_| SetupError::DecoderInit)?;

    let modes = cb.decoder_modes;
    for (mode, &enabled) in modes.iter().enumerate() {
        dec.set_mode(mode as u32, enabled != 0)
            .map_err(|_| SetupError::DecoderMode)?;
    }

    let mut fmt = F::init(cb.formatter_style).map_err(|_| SetupError::FormatterInit)?;

    let attrs = cb.formatter_attributes;
    for (attrib, &value) in attrs.iter().enumerate() {
        fmt.set_attribute(attrib as u32, value)
            .map_err(|_| SetupError::FormatterAttribute)?;
    }

    Ok((dec, fmt))
}
