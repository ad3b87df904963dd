// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Variable-size leaves: strings, hashed identifiers, raw bytes, padding.

use super::{Context, Field, FieldKind, FieldValue};
use crate::config::{KEY_SIZE, LENGTH_SIZE};
use crate::error::{Error, MisuseError, Result};
use crate::ser::{Reader, Writer};
use crate::strid::StrId;

/// Wire layout of a [`StringField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// `u32` byte length, then UTF-8 bytes.
    #[default]
    LengthPrefixed,
    /// UTF-8 bytes followed by a NUL byte.
    NullTerminated,
}

/// UTF-8 string leaf.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringField {
    pub value: String,
    default: String,
    encoding: StringEncoding,
}

impl StringField {
    pub fn new(default: impl Into<String>) -> Self {
        let default = default.into();
        Self {
            value: default.clone(),
            default,
            encoding: StringEncoding::LengthPrefixed,
        }
    }

    pub fn null_terminated() -> Self {
        Self {
            encoding: StringEncoding::NullTerminated,
            ..Self::default()
        }
    }

    pub fn encoding(&self) -> StringEncoding {
        self.encoding
    }
}

impl Field for StringField {
    fn kind(&self) -> FieldKind {
        FieldKind::String
    }

    fn size(&self, _start: u64) -> u64 {
        let len = self.value.len() as u64;
        match self.encoding {
            StringEncoding::LengthPrefixed => LENGTH_SIZE + len,
            StringEncoding::NullTerminated => len + 1,
        }
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        let offset = reader.position();
        let limit = ctx.config().max_string_len;
        let bytes = match self.encoding {
            StringEncoding::LengthPrefixed => {
                let len = reader.read_u32_le()?;
                if len > limit {
                    return Err(Error::structural(
                        offset,
                        format!("string length {} exceeds limit {}", len, limit),
                    ));
                }
                reader.read_bytes(len as usize)?
            }
            StringEncoding::NullTerminated => {
                let bytes = reader.read_until_nul()?;
                if bytes.len() as u64 > u64::from(limit) {
                    return Err(Error::structural(
                        offset,
                        format!("string length {} exceeds limit {}", bytes.len(), limit),
                    ));
                }
                bytes
            }
        };
        self.value = std::str::from_utf8(bytes)
            .map_err(|e| Error::structural(offset, format!("invalid UTF-8: {}", e)))?
            .to_string();
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        let offset = writer.position();
        match self.encoding {
            StringEncoding::LengthPrefixed => {
                let len = u32::try_from(self.value.len()).map_err(|_| {
                    Error::structural(offset, "string longer than a u32 length prefix")
                })?;
                writer.write_u32_le(len)?;
                writer.write_bytes(self.value.as_bytes())
            }
            StringEncoding::NullTerminated => {
                if self.value.as_bytes().contains(&0) {
                    return Err(Error::structural(
                        offset,
                        "NUL byte inside a null-terminated string",
                    ));
                }
                writer.write_bytes(self.value.as_bytes())?;
                writer.write_u8(0)
            }
        }
    }

    fn reset(&mut self) {
        self.value.clone_from(&self.default);
    }

    crate::field_any!();
}

/// 8-byte hashed identifier leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrIdField {
    pub value: StrId,
    default: StrId,
}

impl StrIdField {
    pub fn new(default: StrId) -> Self {
        Self {
            value: default,
            default,
        }
    }
}

impl Field for StrIdField {
    fn kind(&self) -> FieldKind {
        FieldKind::StrId
    }

    fn size(&self, _start: u64) -> u64 {
        KEY_SIZE
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        self.value = StrId::from_hash(reader.read_u64_le()?);
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        writer.write_u64_le(self.value.hash())
    }

    fn reset(&mut self) {
        self.value = self.default;
    }

    crate::field_any!();
}

/// Fixed-length opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BytesField {
    data: Vec<u8>,
    len: usize,
}

impl BytesField {
    /// `len` zero bytes.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0; len],
            len,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the content; the length is fixed by the declaration.
    pub fn set(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.len {
            return Err(MisuseError::SizeMismatch {
                description: self.describe(),
                reported: self.len as u64,
                written: data.len() as u64,
            }
            .into());
        }
        self.data.copy_from_slice(data);
        Ok(())
    }
}

impl Field for BytesField {
    fn kind(&self) -> FieldKind {
        FieldKind::Bytes
    }

    fn size(&self, _start: u64) -> u64 {
        self.len as u64
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        self.data = reader.read_bytes(self.len)?.to_vec();
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        writer.write_bytes(&self.data)
    }

    fn reset(&mut self) {
        self.data.clear();
        self.data.resize(self.len, 0);
    }

    fn describe(&self) -> String {
        format!("bytes[{}]", self.len)
    }

    crate::field_any!();
}

/// Alignment filler; its size depends on where it starts.
///
/// Bytes read are kept and written back so that non-zero filler survives a
/// round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddingField {
    alignment: u64,
    bytes: Vec<u8>,
}

impl PaddingField {
    pub fn new(alignment: u64) -> Self {
        Self {
            alignment: alignment.max(1),
            bytes: Vec::new(),
        }
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }
}

impl Default for PaddingField {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Field for PaddingField {
    fn kind(&self) -> FieldKind {
        FieldKind::Padding
    }

    fn size(&self, start: u64) -> u64 {
        (self.alignment - start % self.alignment) % self.alignment
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        let len = self.size(reader.position()) as usize;
        self.bytes = reader.read_bytes(len)?.to_vec();
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        let len = self.size(writer.position());
        if self.bytes.len() as u64 == len {
            writer.write_bytes(&self.bytes)
        } else {
            writer.write_zeros(len)
        }
    }

    fn reset(&mut self) {
        self.bytes.clear();
    }

    fn describe(&self) -> String {
        format!("padding({})", self.alignment)
    }

    crate::field_any!();
}

impl FieldValue for String {
    fn extract(field: &dyn Field) -> Option<Self> {
        field.downcast_ref::<StringField>().map(|f| f.value.clone())
    }

    fn assign(self, field: &mut dyn Field) -> bool {
        match field.downcast_mut::<StringField>() {
            Some(f) => {
                f.value = self;
                true
            }
            None => false,
        }
    }
}

impl FieldValue for StrId {
    fn extract(field: &dyn Field) -> Option<Self> {
        field.downcast_ref::<StrIdField>().map(|f| f.value)
    }

    fn assign(self, field: &mut dyn Field) -> bool {
        match field.downcast_mut::<StrIdField>() {
            Some(f) => {
                f.value = self;
                true
            }
            None => false,
        }
    }
}
