// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Configuration and utilities

#[cfg(feature = "serde")]
pub mod serde_utils;


use std::path::Path;

/// Trace settings
///
/// Settings define the layout of some message fields, the capacities of the
/// decoder's per-core state and the optional side-band facilities of the
/// [decoder][crate::decoder::TraceDecoder].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    /// Width of the `src` field identifying the core a message originates from
    pub src_bits: u8,
    /// Width of timestamps after which they wrap around
    pub ts_size: u8,
    /// Maximum number of cores the decoder keeps state for
    pub max_cores: usize,
    /// Capacity of each core's call-return stack
    pub stack_size: usize,
    pub slice_format: SliceFormat,
    pub ca_trace: CaTraceKind,
    /// Number of steps the cycle-accurate trace may be fast-forwarded for
    /// finding the instruction trace's address
    pub ca_sync_budget: u32,
    /// Number of instructions after which a failed cycle-accurate trace
    /// synchronization is abandoned
    pub ca_retry_budget: u32,
    pub itc_print: ItcPrint,
}

impl Settings {
    /// Parse settings from a TOML document
    ///
    /// Keys not present in the document assume their [default][SETTINGS].
    #[cfg(feature = "serde")]
    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let settings: Self = toml::from_str(s).map_err(Error::Toml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Check the settings for values the decoder cannot work with
    pub fn validate(&self) -> Result<(), Error> {
        if self.src_bits > MAX_SRC_BITS {
            return Err(Error::SrcBits(self.src_bits));
        }
        Ok(())
    }

    /// Determine the concrete format of a slice file at the given path
    pub fn slice_format_for(&self, path: impl AsRef<Path>) -> SliceFormat {
        self.slice_format.resolve(path)
    }
}

/// See [SETTINGS] for default values of individual fields
impl Default for Settings {
    fn default() -> Self {
        SETTINGS
    }
}

/// Maximum width of the `src` field, core ids being 8 bit wide
pub const MAX_SRC_BITS: u8 = 8;

/// Default [Settings]
pub const SETTINGS: Settings = Settings {
    src_bits: 0,
    ts_size: 40,
    max_cores: 8,
    stack_size: 32,
    slice_format: SliceFormat::Auto,
    ca_trace: CaTraceKind::None,
    ca_sync_budget: 30,
    ca_retry_budget: 16,
    itc_print: ITC_PRINT,
};

/// Instrumentation trace channel print settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ItcPrint {
    #[cfg_attr(feature = "serde", serde(with = "serde_utils::Flag"))]
    pub enabled: bool,
    /// Stimulus channel print data is written to
    pub channel: u8,
    /// Number of characters buffered per core
    pub buffer_size: usize,
}

impl Default for ItcPrint {
    fn default() -> Self {
        ITC_PRINT
    }
}

/// Default [ItcPrint] settings
pub const ITC_PRINT: ItcPrint = ItcPrint {
    enabled: false,
    channel: 0,
    buffer_size: 4096,
};

/// Format of a slice stream
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SliceFormat {
    /// Pick the format based on the file name
    #[default]
    Auto,
    /// One slice per byte
    Binary,
    /// One slice per line, written as hexadecimal number
    Text,
}

impl SliceFormat {
    /// Resolve [`Self::Auto`] for a file at the given path
    ///
    /// Files ending in `.txt` are considered [`Self::Text`], all others
    /// [`Self::Binary`]. Other formats are returned as is.
    pub fn resolve(self, path: impl AsRef<Path>) -> Self {
        match self {
            Self::Auto => {
                let is_text = path
                    .as_ref()
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
                if is_text { Self::Text } else { Self::Binary }
            }
            format => format,
        }
    }
}

/// Kind of cycle-accurate trace to correlate
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CaTraceKind {
    #[default]
    None,
    /// Scalar pipeline finish flags
    Instruction,
    /// Vector unit flags
    Vector,
}

/// Errors when loading [Settings]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read settings")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("Could not parse settings")]
    Toml(#[source] toml::de::Error),
    #[error("Width of src field {0} exceeds {max} bits", max = MAX_SRC_BITS)]
    SrcBits(u8),
}
