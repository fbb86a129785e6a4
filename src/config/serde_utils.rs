// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Serde adapters for settings

use serde::de::{Error, Unexpected};
use serde::{Deserialize, Deserializer, Serializer};

/// Serde adapter for `bool` settings
///
/// Flags are written as `0` or `1`. Both integers and booleans are accepted
/// when reading settings.
pub struct Flag;

/// Any representation of a flag found in a settings file
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match RawFlag::deserialize(deserializer)? {
            RawFlag::Bool(flag) => Ok(flag),
            RawFlag::Int(0) => Ok(false),
            RawFlag::Int(1) => Ok(true),
            RawFlag::Int(v) => Err(D::Error::invalid_value(Unexpected::Signed(v), &"0 or 1")),
        }
    }
}
