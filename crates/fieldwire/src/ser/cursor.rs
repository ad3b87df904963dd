// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read/write cursors for field buffers.
//!
//! Positions are absolute offsets into the whole buffer so that heap
//! addresses can be resolved from anywhere. A [`Reader`] may be narrowed to
//! a window (`sub_reader`, for length-prefixed blocks) or forked to another
//! absolute position (`fork_at`, for pointees) while still seeing the whole
//! buffer. All overruns are reported as structural errors carrying the
//! offset where the read was attempted. When the read ran off the end of
//! the buffer itself (not the end of a window) the error also carries the
//! number of missing bytes, so a stream reader knows how much to fetch.

use crate::error::{Error, Result};

/// Generate read methods for primitive types
///
/// Each generated method:
/// 1. Checks the window bounds (structural error on overrun)
/// 2. Reads N bytes and converts via `from_le_bytes()`
/// 3. Advances offset
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Generate write methods for primitive types
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> Result<()> {
            self.write_bytes(&value.to_le_bytes())
        }
    };
}

/// Immutable cursor for reading (bounds-checked, zero-copy)
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
    // window ends where the buffer ends
    open: bool,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            end: data.len(),
            open: true,
        }
    }

    /// Reader starting at absolute position `pos` of the same buffer.
    pub fn fork_at(&self, pos: u64) -> Result<Reader<'a>> {
        let pos = usize::try_from(pos)
            .ok()
            .filter(|pos| *pos <= self.data.len())
            .ok_or_else(|| Error::truncated(pos, pos - self.data.len() as u64))?;
        Ok(Reader {
            data: self.data,
            offset: pos,
            end: self.data.len(),
            open: true,
        })
    }

    /// Reader over the next `len` bytes; this reader skips past them.
    pub fn sub_reader(&mut self, len: u64) -> Result<Reader<'a>> {
        let start = self.offset;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.ensure(len)?;
        self.offset += len;
        Ok(Reader {
            data: self.data,
            offset: start,
            end: start + len,
            open: false,
        })
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16_le, u16, 2);
    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_u64_le, u64, 8);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_i16_le, i16, 2);
    impl_read_le!(read_i32_le, i32, 4);
    impl_read_le!(read_i64_le, i64, 8);

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64_le()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Bytes up to (excluding) the next NUL; the NUL is consumed.
    pub fn read_until_nul(&mut self) -> Result<&'a [u8]> {
        let window = &self.data[self.offset..self.end];
        match window.iter().position(|b| *b == 0) {
            Some(len) => {
                let slice = &window[..len];
                self.offset += len + 1;
                Ok(slice)
            }
            None if self.open => Err(Error::truncated(self.position(), 1)),
            None => Err(Error::structural(
                self.position(),
                "unterminated string",
            )),
        }
    }

    pub fn skip(&mut self, len: u64) -> Result<()> {
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.ensure(len)?;
        self.offset += len;
        Ok(())
    }

    /// Absolute position in the buffer.
    pub fn position(&self) -> u64 {
        self.offset as u64
    }

    /// Bytes left in the current window.
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.end
    }

    /// Total length of the underlying buffer.
    pub fn buffer_len(&self) -> u64 {
        self.data.len() as u64
    }

    fn ensure(&self, len: usize) -> Result<()> {
        if len > self.remaining() {
            if self.open {
                let missing = self.offset.saturating_add(len) - self.data.len();
                return Err(Error::truncated(self.position(), missing as u64));
            }
            return Err(Error::structural(
                self.position(),
                "unexpected end of window",
            ));
        }
        Ok(())
    }
}

/// Growable cursor for writing, with an optional size cap.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buffer: Vec<u8>,
    limit: Option<usize>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            limit: None,
        }
    }

    /// Writer failing once more than `limit` bytes would be written.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit: Some(limit),
        }
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_u16_le, u16);
    impl_write_le!(write_u32_le, u32);
    impl_write_le!(write_u64_le, u64);
    impl_write_le!(write_i8, i8);
    impl_write_le!(write_i16_le, i16);
    impl_write_le!(write_i32_le, i32);
    impl_write_le!(write_i64_le, i64);

    pub fn write_f32_le(&mut self, value: f32) -> Result<()> {
        self.write_u32_le(value.to_bits())
    }

    pub fn write_f64_le(&mut self, value: f64) -> Result<()> {
        self.write_u64_le(value.to_bits())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.buffer.len() + data.len() > limit {
                return Err(Error::structural(self.position(), "buffer too small"));
            }
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    pub fn write_zeros(&mut self, len: u64) -> Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| Error::structural(self.position(), "buffer too small"))?;
        if let Some(limit) = self.limit {
            if self.buffer.len() + len > limit {
                return Err(Error::structural(self.position(), "buffer too small"));
            }
        }
        self.buffer.resize(self.buffer.len() + len, 0);
        Ok(())
    }

    /// Absolute position (bytes written so far).
    pub fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}
