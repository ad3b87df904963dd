// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire constants and codec configuration.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: wire constants shared by every format (sentinel
//!   values, prefix widths). **Never hardcode them elsewhere.**
//! - **Level 2 (Dynamic)**: [`CodecConfig`], carried by every encode/decode
//!   pass (address origin, read limits). Loadable from JSON.
//!
//! # Example
//!
//! ```
//! use fieldwire::config::{CodecConfig, ADDRESS_SIZE};
//!
//! let config = CodecConfig::default().with_max_collection_len(1024);
//! assert_eq!(ADDRESS_SIZE, 8);
//! assert_eq!(config.max_collection_len, 1024);
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};

// =======================================================================
// Wire layout
// =======================================================================

/// Width of a type id written in front of a type-tagged payload.
pub const TYPE_ID_SIZE: u64 = 8;

/// Width of an inline heap address.
pub const ADDRESS_SIZE: u64 = 8;

/// Width of a property bag key.
pub const KEY_SIZE: u64 = 8;

/// Width of a collection / property bag count prefix.
pub const COUNT_SIZE: u64 = 4;

/// Width of a string or block length prefix.
pub const LENGTH_SIZE: u64 = 4;

/// Type id meaning "no value".
pub const NULL_TYPE_ID: u64 = 0;

/// Address meaning "no pointee".
pub const NULL_ADDRESS: u64 = 0;

// =======================================================================
// Defaults
// =======================================================================

/// Default capacity of the process-wide known-string table.
pub const DEFAULT_KNOWN_STRINGS_CAPACITY: usize = 1 << 16;

/// Default upper bound for element counts read from the wire.
pub const DEFAULT_MAX_COLLECTION_LEN: u32 = 1 << 24;

/// Default upper bound for string byte lengths read from the wire.
pub const DEFAULT_MAX_STRING_LEN: u32 = 1 << 20;

/// Default upper bound for one message read from an async stream.
pub const DEFAULT_MAX_STREAM_LEN: u64 = 1 << 28;

/// Runtime configuration of one encode/decode pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Buffer position of address 0. Heap addresses are `position - origin`.
    pub address_origin: u64,
    /// Largest element count accepted for vectors, dictionaries and bags.
    pub max_collection_len: u32,
    /// Largest byte length accepted for strings.
    pub max_string_len: u32,
    /// Largest message the async reader buffers before giving up.
    pub max_stream_len: u64,
    /// Fail a decode when bytes remain after the inline data and the heap.
    pub reject_trailing_bytes: bool,
    /// Capacity used when the known-string table is first initialized.
    pub known_strings_capacity: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            address_origin: 0,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            max_string_len: DEFAULT_MAX_STRING_LEN,
            max_stream_len: DEFAULT_MAX_STREAM_LEN,
            reject_trailing_bytes: false,
            known_strings_capacity: DEFAULT_KNOWN_STRINGS_CAPACITY,
        }
    }
}

impl CodecConfig {
    /// Parse a (possibly partial) JSON configuration; missing keys keep
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_address_origin(mut self, origin: u64) -> Self {
        self.address_origin = origin;
        self
    }

    #[must_use]
    pub fn with_max_collection_len(mut self, len: u32) -> Self {
        self.max_collection_len = len;
        self
    }

    #[must_use]
    pub fn with_max_string_len(mut self, len: u32) -> Self {
        self.max_string_len = len;
        self
    }

    #[must_use]
    pub fn with_max_stream_len(mut self, len: u64) -> Self {
        self.max_stream_len = len;
        self
    }

    #[must_use]
    pub fn with_reject_trailing_bytes(mut self, reject: bool) -> Self {
        self.reject_trailing_bytes = reject;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CodecConfig::from_json_str(r#"{ "max_string_len": 64 }"#)
            .expect("valid config");
        assert_eq!(config.max_string_len, 64);
        assert_eq!(config.max_collection_len, DEFAULT_MAX_COLLECTION_LEN);
        assert_eq!(config.max_stream_len, DEFAULT_MAX_STREAM_LEN);
        assert_eq!(config.address_origin, 0);
        assert!(!config.reject_trailing_bytes);
    }

    #[test]
    fn test_invalid_json_is_catalog_error() {
        let err = CodecConfig::from_json_str("{ nope").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Catalog);
    }
}
