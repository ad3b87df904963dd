// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Values prefixed by their 64-bit type id.
//!
//! ```text
//! u64 type id (0 = null, nothing follows) | payload of that type
//! ```

use crate::config::{NULL_TYPE_ID, TYPE_ID_SIZE};
use crate::error::{Error, MisuseError, Position, Result};
use crate::field::{Context, Field, FieldKind};
use crate::ser::{Reader, Writer};
use std::sync::Arc;

/// Polymorphic slot resolved through the [`super::TypeRegistry`] on read.
#[derive(Debug, Default)]
pub struct TypeTagged {
    tag: u64,
    value: Option<Box<dyn Field>>,
}

impl TypeTagged {
    /// Null value.
    pub fn null() -> Self {
        Self::default()
    }

    /// Tag `value` with its own type id.
    pub fn new(value: Box<dyn Field>) -> Result<Self> {
        let mut tagged = Self::null();
        tagged.set(value)?;
        Ok(tagged)
    }

    /// Tag `value` with an explicit id (registry entries whose field does not
    /// report a type of its own, such as primitives).
    pub fn with_id(tag: u64, value: Box<dyn Field>) -> Self {
        Self {
            tag,
            value: Some(value),
        }
    }

    /// Replace the value, taking the id from [`Field::type_hash`].
    pub fn set(&mut self, value: Box<dyn Field>) -> Result<()> {
        let tag = value
            .type_hash()
            .ok_or_else(|| MisuseError::UntaggedValue(value.describe()))?;
        self.tag = tag;
        self.value = Some(value);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tag = NULL_TYPE_ID;
        self.value = None;
    }

    /// Type id written in front of the payload (0 when null).
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<&dyn Field> {
        self.value.as_deref()
    }

    pub fn value_mut(&mut self) -> Option<&mut dyn Field> {
        match &mut self.value {
            Some(value) => Some(value.as_mut()),
            None => None,
        }
    }

    /// The payload as a concrete type.
    pub fn downcast_ref<T: Field>(&self) -> Option<&T> {
        self.value()?.downcast_ref::<T>()
    }

    /// Registered name of the payload's type, if the payload has one.
    pub fn type_name(&self) -> Option<&str> {
        self.value.as_ref()?.type_name()
    }
}

impl Field for TypeTagged {
    fn kind(&self) -> FieldKind {
        FieldKind::Tagged
    }

    fn size(&self, start: u64) -> u64 {
        match &self.value {
            Some(value) => TYPE_ID_SIZE + value.size(start + TYPE_ID_SIZE),
            None => TYPE_ID_SIZE,
        }
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        let offset = reader.position();
        let tag = reader.read_u64_le()?;
        if tag == NULL_TYPE_ID {
            self.clear();
            return Ok(());
        }

        let entry = ctx
            .registry()
            .lookup(tag)
            .ok_or(Error::UnknownType { id: tag })?;
        let mut value = entry.create();
        let start = reader.position();
        value.read(reader, ctx).map_err(|e| {
            e.within(
                Position::Tagged {
                    type_id: tag,
                    type_name: Arc::clone(entry.name_arc()),
                },
                start,
            )
        })?;
        log::trace!("[registry] read tagged `{}` at {:#x}", entry.name(), offset);
        self.tag = tag;
        self.value = Some(value);
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        match &self.value {
            None => writer.write_u64_le(NULL_TYPE_ID),
            Some(value) => {
                writer.write_u64_le(self.tag)?;
                value.write(writer, ctx)
            }
        }
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn describe(&self) -> String {
        match self.type_name() {
            Some(name) => format!("tagged<{}>", name),
            None => "tagged".to_string(),
        }
    }

    crate::field_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{factory, ScalarField};
    use crate::types::TypeRegistry;

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register_factory("float", factory::<ScalarField<f32>>())
            .expect("fresh name");
        registry
    }

    #[test]
    fn test_null_is_eight_zero_bytes() {
        let registry = registry();
        let mut ctx = Context::new(&registry);
        let mut writer = Writer::new();
        TypeTagged::null().write(&mut writer, &mut ctx).expect("write");
        assert_eq!(writer.into_inner(), vec![0u8; 8]);

        let mut tagged = TypeTagged::with_id(7, Box::new(ScalarField::new(1u8)));
        tagged
            .read(&mut Reader::new(&[0u8; 8]), &mut ctx)
            .expect("null read");
        assert!(tagged.is_null());
        assert_eq!(tagged.tag(), 0);
    }

    #[test]
    fn test_read_dispatches_through_registry() {
        let registry = registry();
        let mut bytes = 0xBAE4_CBD7_7F13_9A91u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&2.5f32.to_le_bytes());

        let mut ctx = Context::new(&registry);
        let mut tagged = TypeTagged::null();
        tagged.read(&mut Reader::new(&bytes), &mut ctx).expect("read");
        assert_eq!(
            tagged.downcast_ref::<ScalarField<f32>>().map(|f| f.value),
            Some(2.5)
        );
        assert_eq!(tagged.size(0), 12);

        let mut writer = Writer::new();
        tagged.write(&mut writer, &mut ctx).expect("write");
        assert_eq!(writer.into_inner(), bytes);
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let registry = registry();
        let mut ctx = Context::new(&registry);
        let bytes = 0xDEAD_BEEFu64.to_le_bytes();
        let err = TypeTagged::null()
            .read(&mut Reader::new(&bytes), &mut ctx)
            .unwrap_err();
        assert_eq!(err.unknown_hash(), Some(0xDEAD_BEEF));
    }

    #[test]
    fn test_untyped_value_cannot_be_tagged() {
        let err = TypeTagged::new(Box::new(ScalarField::new(1u32))).unwrap_err();
        assert!(matches!(
            err,
            Error::Misuse(MisuseError::UntaggedValue(_))
        ));
    }
}
