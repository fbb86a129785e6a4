// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Timestamp reconstruction

/// Encoding of a message's timestamp field
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// The lower bits of the timestamp
    Full,
    /// Bits to XOR into the last timestamp
    Relative,
}

/// Reconstruct a timestamp from the last one and a raw timestamp field
///
/// Timestamps are `width` bits wide in the trace. The reconstructed timestamp
/// never falls behind `last`: if it would, the timestamp is assumed to have
/// wrapped around once. A relative timestamp applied before any full one
/// yields `0`.
pub fn reconstruct(kind: Kind, last: u64, raw: u64, width: u8) -> u64 {
    let wrap = 1u64.checked_shl(width.into()).unwrap_or(0);
    let ts = match kind {
        Kind::Full => raw.wrapping_add(last & !wrap.wrapping_sub(1)),
        Kind::Relative if last != 0 => last ^ raw,
        Kind::Relative => 0,
    };
    if ts < last { ts.wrapping_add(wrap) } else { ts }
}
