// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

//! Stdin fuzzing harness for the veldis decoder and formatter.
//!
//! An input is a packed [`ControlBlock`] selecting decoder and
//! formatter settings, followed by an arbitrary byte stream to decode.
//! [`run`] guards against library version skew, applies the control
//! block and drains the stream; the pieces are exported separately so
//! fuzz targets and tests can drive them on their own.

pub mod backend;
pub mod control;
pub mod engine;
pub mod setup;
pub mod stream;

#[cfg(test)]
pub mod testutil;

pub use backend::{DecodeOutcome, DecoderBackend, FormatterBackend};
pub use control::ControlBlock;
pub use engine::EngineError;
pub use setup::{check_version, configure, SetupError};
pub use stream::{run, stream_decode, PRINT_BUF_LEN, READ_BUF_LEN};
