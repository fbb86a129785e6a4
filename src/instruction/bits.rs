// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Raw instruction encodings

use core::fmt;

use super::Size;

/// Raw encoding of an [`Instruction`][super::Instruction]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bits {
    Bit16(u16),
    Bit32(u32),
}

impl Bits {
    /// Determine the length of an encoding from its lowest halfword
    ///
    /// Returns `None` for encodings longer than 32 bits, which are not
    /// supported.
    pub fn size_of(low: u16) -> Option<Size> {
        if low & 0b11 != 0b11 {
            Some(Size::Compressed)
        } else if low & 0b11100 != 0b11100 {
            Some(Size::Normal)
        } else {
            None
        }
    }

    /// Extract [`Bits`] from the start of little endian code
    ///
    /// Returns the [`Bits`] and the rest of `data`, or `None` if `data` is
    /// too short or does not start with a 16 or 32 bit encoding.
    pub fn extract(data: &[u8]) -> Option<(Self, &[u8])> {
        let (low, rest) = data.split_first_chunk::<2>()?;
        let low = u16::from_le_bytes(*low);
        match Self::size_of(low)? {
            Size::Compressed => Some((Self::Bit16(low), rest)),
            Size::Normal => {
                let (high, rest) = rest.split_first_chunk::<2>()?;
                let high = u16::from_le_bytes(*high);
                Some((Self::Bit32(u32::from(high) << 16 | u32::from(low)), rest))
            }
        }
    }

    /// Retrieve the [`Size`] of the encoding
    pub fn size(self) -> Size {
        match self {
            Self::Bit16(_) => Size::Compressed,
            Self::Bit32(_) => Size::Normal,
        }
    }

    /// Retrieve the raw value, zero-extended
    pub fn raw(self) -> u32 {
        match self {
            Self::Bit16(v) => v.into(),
            Self::Bit32(v) => v,
        }
    }
}

impl TryFrom<u32> for Bits {
    type Error = u32;

    fn try_from(num: u32) -> Result<Self, Self::Error> {
        match Self::size_of(num as u16) {
            Some(Size::Compressed) => u16::try_from(num).map(Self::Bit16).map_err(|_| num),
            Some(Size::Normal) => Ok(Self::Bit32(num)),
            None => Err(num),
        }
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit16(v) => write!(f, "{v:04x}"),
            Self::Bit32(v) => write!(f, "{v:08x}"),
        }
    }
}
