// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2026 Veldis Project Developers

use crate::error::DecodeError;

/// An operand or access width, in bytes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Bytes {
    #[default]
    Zero,
    One,
    Two,
    Four = 4,
    Eight = 8,
}

impl Bytes {
    pub fn mask(&self) -> u64 {
        match self {
            Bytes::Zero => 0,
            Bytes::One => (1 << 8) - 1,
            Bytes::Two => (1 << 16) - 1,
            Bytes::Four => (1 << 32) - 1,
            Bytes::Eight => u64::MAX,
        }
    }
}

impl TryFrom<usize> for Bytes {
    type Error = DecodeError;

    fn try_from(val: usize) -> Result<Bytes, Self::Error> {
        match val {
            0 => Ok(Bytes::Zero),
            1 => Ok(Bytes::One),
            2 => Ok(Bytes::Two),
            4 => Ok(Bytes::Four),
            8 => Ok(Bytes::Eight),
            _ => Err(DecodeError::InvalidRegister),
        }
    }
}
