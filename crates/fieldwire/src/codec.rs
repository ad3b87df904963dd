// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Top-level encode/decode drivers.
//!
//! Encoding a root field:
//!
//! 1. measure the inline size at the writer position,
//! 2. start the heap right after it (`base = start + inline - origin`),
//! 3. write the inline data (pointers allocate as they go),
//! 4. check the inline size, then emit the heap in allocation order.
//!
//! Decoding resets the root, reads it and reports how far the data went,
//! including pointees that lie past the inline region.

use crate::config::CodecConfig;
use crate::error::{Error, MisuseError, Result};
use crate::field::{Context, Field};
use crate::mapper::DataMapper;
use crate::ser::{Reader, Writer};
use crate::strid::init_known_strings;
use crate::types::TypeRegistry;

/// Encode `root` with the default configuration.
pub fn encode(root: &dyn Field, registry: &TypeRegistry) -> Result<Vec<u8>> {
    Encoder::new(registry).encode(root)
}

/// Decode `bytes` into `root` with the default configuration.
pub fn decode(root: &mut dyn Field, bytes: &[u8], registry: &TypeRegistry) -> Result<Decoded> {
    Decoder::new(registry).decode(root, bytes)
}

/// Extent of a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes consumed by the root itself.
    pub inline_len: u64,
    /// Furthest byte reached, heap included.
    pub end: u64,
}

/// Writes a root field followed by its heap.
#[derive(Debug)]
pub struct Encoder<'r> {
    registry: &'r TypeRegistry,
    config: CodecConfig,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: &'r TypeRegistry, config: CodecConfig) -> Self {
        init_known_strings(config.known_strings_capacity);
        Self { registry, config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn encode(&self, root: &dyn Field) -> Result<Vec<u8>> {
        let mut writer = Writer::with_capacity(root.size(0) as usize);
        self.encode_into(root, &mut writer)?;
        Ok(writer.into_inner())
    }

    /// Encode while reporting named ranges to `mapper`.
    pub fn encode_mapped(&self, root: &dyn Field, mapper: &mut dyn DataMapper) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        let ctx = Context::with_config(self.registry, self.config.clone()).with_mapper(mapper);
        self.run(root, &mut writer, ctx)?;
        Ok(writer.into_inner())
    }

    /// Append the encoding of `root` to `writer`; returns the bytes written.
    pub fn encode_into(&self, root: &dyn Field, writer: &mut Writer) -> Result<u64> {
        let ctx = Context::with_config(self.registry, self.config.clone());
        self.run(root, writer, ctx)
    }

    fn run(&self, root: &dyn Field, writer: &mut Writer, mut ctx: Context<'_>) -> Result<u64> {
        let start = writer.position();
        let inline = root.size(start);
        // an origin past the inline end leaves base 0, which the first
        // allocation rejects as the null address
        let base = (start + inline).saturating_sub(self.config.address_origin);
        ctx.heap_mut().reset_to(base)?;

        let label = root.type_name().map_or_else(|| root.describe(), str::to_string);
        ctx.push_range(&label, start);
        root.write(writer, &mut ctx)?;
        let written = writer.position() - start;
        if written != inline {
            return Err(MisuseError::SizeMismatch {
                description: root.describe(),
                reported: inline,
                written,
            }
            .into());
        }
        ctx.write_allocated_fields(writer)?;
        ctx.pop_range(writer.position());

        let total = writer.position() - start;
        log::debug!(
            "[codec] encoded {} ({} inline bytes, {} heap entries, {} total)",
            label,
            inline,
            ctx.heap().len(),
            total
        );
        Ok(total)
    }
}

/// Reads a root field and its pointees.
#[derive(Debug)]
pub struct Decoder<'r> {
    registry: &'r TypeRegistry,
    config: CodecConfig,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: &'r TypeRegistry, config: CodecConfig) -> Self {
        init_known_strings(config.known_strings_capacity);
        Self { registry, config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn decode(&self, root: &mut dyn Field, bytes: &[u8]) -> Result<Decoded> {
        root.reset();
        let mut ctx = Context::with_config(self.registry, self.config.clone());
        let mut reader = Reader::new(bytes);
        root.read(&mut reader, &mut ctx)?;

        let inline_len = reader.position();
        let end = inline_len.max(ctx.high_water());
        let len = bytes.len() as u64;
        if self.config.reject_trailing_bytes && end < len {
            return Err(Error::structural(
                end,
                format!("{} trailing bytes after the decoded data", len - end),
            ));
        }
        log::debug!(
            "[codec] decoded {} ({} inline bytes, end {:#x})",
            root.describe(),
            inline_len,
            end
        );
        Ok(Decoded { inline_len, end })
    }
}
