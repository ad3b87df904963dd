// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CRC-64 hashing of logical names and the pluggable key generator.
//!
//! Every hash-keyed identifier on the wire (type ids, property keys,
//! [`crate::StrId`] values) is the CRC-64/ECMA-182 of the UTF-8 bytes of the
//! name: polynomial `0x42F0E1EBA9EA3693`, zero init, no reflection, zero
//! xor-out. Only the hash is ever persisted.

use std::fmt;

/// CRC-64/ECMA-182 generator polynomial.
pub const CRC64_POLY: u64 = 0x42F0_E1EB_A9EA_3693;

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u64) << 56;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & (1 << 63) != 0 {
                (crc << 1) ^ CRC64_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC64_TABLE: [u64; 256] = build_table();
const CRC64_CONST_TABLE: [u64; 256] = build_table();

/// CRC-64 of raw bytes.
pub fn crc64(bytes: &[u8]) -> u64 {
    let mut crc = 0u64;
    for &byte in bytes {
        let index = ((crc >> 56) as u8 ^ byte) as usize;
        crc = CRC64_TABLE[index] ^ (crc << 8);
    }
    crc
}

/// Compile-time CRC-64 of a string, for hash constants.
pub const fn crc64_const(text: &str) -> u64 {
    let bytes = text.as_bytes();
    let mut crc = 0u64;
    let mut i = 0;
    while i < bytes.len() {
        let index = ((crc >> 56) as u8 ^ bytes[i]) as usize;
        crc = CRC64_CONST_TABLE[index] ^ (crc << 8);
        i += 1;
    }
    crc
}

/// CRC-64 of a logical name.
pub fn crc64_str(text: &str) -> u64 {
    crc64(text.as_bytes())
}

/// Derives wire keys from logical property names.
///
/// CRC-64 is the only generator the known formats use, but property bags
/// accept any implementation.
pub trait KeyGenerator: Send + Sync + fmt::Debug {
    /// Key persisted for `name`.
    fn key(&self, name: &str) -> u64;

    /// Short generator name, used in diagnostics.
    fn name(&self) -> &'static str;
}

/// CRC-64 keys, recorded in the process-wide known-string table so read
/// keys can be displayed by name.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc64Keys;

impl KeyGenerator for Crc64Keys {
    fn key(&self, name: &str) -> u64 {
        crate::strid::StrId::new(name).hash()
    }

    fn name(&self) -> &'static str {
        "crc64"
    }
}
