// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed sub-record.

use super::{Context, Field, FieldKind};
use crate::config::LENGTH_SIZE;
use crate::error::{Error, MisuseError, Position, Result};
use crate::ser::{Reader, Writer};

/// `u32` byte length followed by the inner field.
///
/// The inner size is computed before the prefix is written. Reading checks
/// that the inner field consumed exactly the declared length. An optional
/// block encodes absence as a zero length.
#[derive(Debug)]
pub struct Block {
    inner: Box<dyn Field>,
    optional: bool,
    present: bool,
}

impl Block {
    pub fn new(inner: Box<dyn Field>) -> Self {
        Self {
            inner,
            optional: false,
            present: true,
        }
    }

    /// Block that may be absent (zero length on the wire). Starts absent.
    pub fn optional(inner: Box<dyn Field>) -> Self {
        Self {
            inner,
            optional: true,
            present: false,
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Mark an optional block present or absent.
    pub fn set_present(&mut self, present: bool) {
        self.present = present || !self.optional;
    }

    pub fn inner(&self) -> &dyn Field {
        self.inner.as_ref()
    }

    pub fn inner_mut(&mut self) -> &mut dyn Field {
        self.inner.as_mut()
    }
}

impl Field for Block {
    fn kind(&self) -> FieldKind {
        FieldKind::Block
    }

    fn size(&self, start: u64) -> u64 {
        if self.present {
            LENGTH_SIZE + self.inner.size(start + LENGTH_SIZE)
        } else {
            LENGTH_SIZE
        }
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        let len = u64::from(reader.read_u32_le()?);
        let start = reader.position();
        if self.optional && len == 0 {
            self.inner.reset();
            self.present = false;
            return Ok(());
        }

        let mut content = reader.sub_reader(len)?;
        self.inner
            .read(&mut content, ctx)
            .map_err(|e| e.within(Position::Block, start))?;
        if !content.is_eof() {
            return Err(Error::structural(
                content.position(),
                format!(
                    "block declares {} bytes but its content used {}",
                    len,
                    content.position() - start
                ),
            ));
        }
        self.present = true;
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        if !self.present {
            return writer.write_u32_le(0);
        }

        let start = writer.position() + LENGTH_SIZE;
        let inner_size = self.inner.size(start);
        let prefix = u32::try_from(inner_size).map_err(|_| {
            Error::structural(writer.position(), "block longer than a u32 length prefix")
        })?;
        writer.write_u32_le(prefix)?;
        self.inner
            .write(writer, ctx)
            .map_err(|e| e.within(Position::Block, start))?;

        let written = writer.position() - start;
        if written != inner_size {
            return Err(MisuseError::SizeMismatch {
                description: self.inner.describe(),
                reported: inner_size,
                written,
            }
            .into());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.present = !self.optional;
    }

    fn describe(&self) -> String {
        if self.optional {
            format!("optional block<{}>", self.inner.describe())
        } else {
            format!("block<{}>", self.inner.describe())
        }
    }

    crate::field_any!();
}
