// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Cycle-accurate trace specific error types

/// Cycle-accurate trace errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read cycle-accurate trace")]
    Io(#[from] std::io::Error),
    /// The trace does not hold another complete block
    #[error("End of cycle-accurate trace")]
    Eof,
    /// The vector trace queue has no room for another word's records
    #[error("Vector trace queue full")]
    QueueFull,
    /// A correlator was requested for [`CaTraceKind::None`][crate::config::CaTraceKind::None]
    #[error("No cycle-accurate trace kind specified")]
    NoTraceKind,
}

impl Error {
    /// Check whether this error marks the regular end of the trace
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}
