// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The field contract and the per-pass context.
//!
//! Every wire element is a [`Field`]: it reports its serialized size for a
//! given start position, reads itself from a [`Reader`] and writes itself to
//! a [`Writer`]. Composites ([`crate::DataStructure`], [`crate::PropertyBag`],
//! collections) own boxed child fields and drive them in order.
//!
//! # Architecture
//!
//! ```text
//! Field ──┬── leaves      ScalarField<T>, StringField, StrIdField, BytesField, PaddingField
//!         ├── enums       EnumField<R>, FlagsField<R>, EnumCodec<E>
//!         ├── composites  DataStructure, PropertyBag, Block
//!         ├── collections VectorField, ArrayField, DictionaryField
//!         └── indirect    HeapPtr (heap address), TypeTagged (type id)
//! ```
//!
//! A [`Context`] travels with one read or write pass. It carries the type
//! registry, the heap allocator for pointer fields, the codec limits and an
//! optional [`DataMapper`].

pub mod block;
pub mod collection;
pub mod enums;
pub mod scalar;
pub mod string;

use crate::config::CodecConfig;
use crate::error::{Error, MisuseError, Position, Result};
use crate::heap::{HeapManager, HeapState};
use crate::mapper::DataMapper;
use crate::ser::{Reader, Writer};
use crate::types::TypeRegistry;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

pub use block::Block;
pub use collection::{ArrayField, DictView, DictionaryField, VecView, VecViewMut, VectorField};
pub use enums::{EnumCodec, EnumDescriptor, EnumField, EnumRepr, EnumVariant, FlagsField, WireEnum};
pub use scalar::{Scalar, ScalarField, ScalarKind};
pub use string::{BytesField, PaddingField, StrIdField, StringEncoding, StringField};

/// Implements the `as_any` / `as_any_mut` members of [`Field`].
#[macro_export]
macro_rules! field_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Shape of a field, used by typed accessors and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarKind),
    String,
    StrId,
    Bytes,
    Padding,
    Enum(ScalarKind),
    Flags(ScalarKind),
    Struct,
    Bag,
    Vector,
    Array,
    Dictionary,
    Pointer,
    Tagged,
    Block,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(kind) => write!(f, "{}", kind),
            FieldKind::String => write!(f, "string"),
            FieldKind::StrId => write!(f, "strid"),
            FieldKind::Bytes => write!(f, "bytes"),
            FieldKind::Padding => write!(f, "padding"),
            FieldKind::Enum(kind) => write!(f, "enum<{}>", kind),
            FieldKind::Flags(kind) => write!(f, "flags<{}>", kind),
            FieldKind::Struct => write!(f, "struct"),
            FieldKind::Bag => write!(f, "bag"),
            FieldKind::Vector => write!(f, "vector"),
            FieldKind::Array => write!(f, "array"),
            FieldKind::Dictionary => write!(f, "dictionary"),
            FieldKind::Pointer => write!(f, "pointer"),
            FieldKind::Tagged => write!(f, "tagged"),
            FieldKind::Block => write!(f, "block"),
        }
    }
}

/// A self-describing wire element.
///
/// `size` must equal the number of bytes `write` produces when called at
/// the same `start` position; drivers verify it.
pub trait Field: Any + Send + Sync + fmt::Debug {
    fn kind(&self) -> FieldKind;

    /// Serialized size when written at absolute position `start`.
    fn size(&self, start: u64) -> u64;

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()>;

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()>;

    /// Restore the declared default value.
    fn reset(&mut self);

    /// Human-readable description used in error positions.
    fn describe(&self) -> String {
        self.kind().to_string()
    }

    /// Registered type name, for fields standing for a named type.
    fn type_name(&self) -> Option<&str> {
        None
    }

    /// Registered type id (CRC-64 of [`Field::type_name`]).
    fn type_hash(&self) -> Option<u64> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn Field + 'a {
    pub fn is<T: Field>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Field>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Field>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Downcast, failing with [`MisuseError::TypeMismatch`].
    pub fn cast<T: Field>(&self) -> Result<&T> {
        let found = self.describe();
        self.downcast_ref::<T>().ok_or_else(|| mismatch::<T>(found))
    }

    /// Mutable downcast, failing with [`MisuseError::TypeMismatch`].
    pub fn cast_mut<T: Field>(&mut self) -> Result<&mut T> {
        let found = self.describe();
        self.downcast_mut::<T>().ok_or_else(|| mismatch::<T>(found))
    }

    /// `TypeId` of the concrete field type.
    pub fn concrete_type(&self) -> TypeId {
        Any::type_id(self.as_any())
    }
}

fn mismatch<T>(found: String) -> Error {
    MisuseError::TypeMismatch {
        expected: std::any::type_name::<T>().to_string(),
        found,
    }
    .into()
}

/// Zero-argument constructor of a field.
pub type FieldFactory = Arc<dyn Fn() -> Box<dyn Field> + Send + Sync>;

/// Factory producing `F::default()`.
pub fn factory<F: Field + Default>() -> FieldFactory {
    Arc::new(|| Box::new(F::default()))
}

/// Factory cloning a prototype.
pub fn factory_from<F: Field + Clone>(prototype: F) -> FieldFactory {
    Arc::new(move || Box::new(prototype.clone()))
}

/// Plain values that can be read from / stored into a field.
///
/// Implemented for scalars (through [`ScalarField`] and, for integers, the
/// enum fields), `String` ([`StringField`]) and [`crate::StrId`]
/// ([`StrIdField`]).
pub trait FieldValue: Sized {
    fn extract(field: &dyn Field) -> Option<Self>;

    /// Store `self`; returns `false` when the field has another type.
    fn assign(self, field: &mut dyn Field) -> bool;
}

/// Read a plain value, failing with a type mismatch.
pub fn extract_value<T: FieldValue>(field: &dyn Field) -> Result<T> {
    T::extract(field).ok_or_else(|| mismatch::<T>(field.describe()))
}

/// Store a plain value, failing with a type mismatch.
pub fn assign_value<T: FieldValue>(field: &mut dyn Field, value: T) -> Result<()> {
    if value.assign(field) {
        Ok(())
    } else {
        Err(mismatch::<T>(field.describe()))
    }
}

/// State of one read or write pass.
pub struct Context<'a> {
    registry: &'a TypeRegistry,
    heap: HeapManager,
    config: CodecConfig,
    mapper: Option<&'a mut dyn DataMapper>,
    high_water: u64,
}

impl<'a> Context<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: &'a TypeRegistry, config: CodecConfig) -> Self {
        let heap = HeapManager::with_origin(0, config.address_origin);
        Self {
            registry,
            heap,
            config,
            mapper: None,
            high_water: 0,
        }
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: &'a mut dyn DataMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn heap(&self) -> &HeapManager {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut HeapManager {
        &mut self.heap
    }

    /// Absolute buffer position of heap `address`.
    pub fn position_of(&self, address: u64) -> u64 {
        self.config.address_origin.saturating_add(address)
    }

    /// Record that a read reached `end` (pointees may lie past inline data).
    pub fn note_extent(&mut self, end: u64) {
        self.high_water = self.high_water.max(end);
    }

    /// Furthest position reached by any pointee read.
    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// Open a named range in the mapper, if any.
    pub fn push_range(&mut self, name: &str, offset: u64) {
        if let Some(mapper) = self.mapper.as_deref_mut() {
            mapper.push(name, offset);
        }
    }

    pub fn pop_range(&mut self, offset: u64) {
        if let Some(mapper) = self.mapper.as_deref_mut() {
            mapper.pop(offset);
        }
    }

    /// Reject `count` when it exceeds the configured collection limit.
    pub fn check_count(&self, count: u32, offset: u64) -> Result<()> {
        if count > self.config.max_collection_len {
            return Err(Error::structural(
                offset,
                format!(
                    "count {} exceeds limit {}",
                    count, self.config.max_collection_len
                ),
            ));
        }
        Ok(())
    }

    /// Emit every allocated field after the inline data, in allocation order.
    ///
    /// Each entry must start at `origin + address` and write exactly the
    /// size reserved for it. Pointers met while draining may append new
    /// entries at the tail; they are emitted in the same pass.
    pub fn write_allocated_fields(&mut self, writer: &mut Writer) -> Result<()> {
        if self.heap.state() == HeapState::Writing {
            return Err(MisuseError::HeapBusy {
                operation: "write_allocated_fields",
            }
            .into());
        }
        self.heap.begin_write();
        let result = self.drain_heap(writer);
        self.heap.end_write();
        result
    }

    fn drain_heap(&mut self, writer: &mut Writer) -> Result<()> {
        let mut index = 0;
        while let Some((allocation, field)) = self.heap.entry(index) {
            let expected = self.position_of(allocation.address);
            let actual = writer.position();
            if actual != expected {
                return Err(MisuseError::HeapOutOfPlace {
                    address: allocation.address,
                    expected,
                    actual,
                }
                .into());
            }

            let label = format!("heap[{}]", index);
            self.push_range(&label, actual);
            let guard = field.read_recursive();
            guard.write(writer, self).map_err(|e| {
                e.within(
                    Position::Heap {
                        index,
                        address: allocation.address,
                    },
                    actual,
                )
            })?;
            let written = writer.position() - actual;
            if written != allocation.size {
                return Err(MisuseError::SizeMismatch {
                    description: guard.describe(),
                    reported: allocation.size,
                    written,
                }
                .into());
            }
            drop(guard);
            self.pop_range(writer.position());
            index += 1;
        }
        if index > 0 {
            log::debug!("[heap] drained {} allocated fields", index);
        }
        Ok(())
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("heap", &self.heap)
            .field("config", &self.config)
            .field("mapped", &self.mapper.is_some())
            .field("high_water", &self.high_water)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_mismatch_is_misuse() {
        let field: Box<dyn Field> = Box::new(ScalarField::<f32>::new(0.5));
        assert!(field.is::<ScalarField<f32>>());
        assert_eq!(field.cast::<ScalarField<f32>>().map(|f| f.value).ok(), Some(0.5));

        let err = field.cast::<StringField>().unwrap_err();
        match err {
            Error::Misuse(MisuseError::TypeMismatch { found, .. }) => assert_eq!(found, "f32"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_extract_and_assign_values() {
        let mut field: Box<dyn Field> = Box::new(ScalarField::<u32>::default());
        assign_value(field.as_mut(), 7u32).expect("same type");
        assert_eq!(extract_value::<u32>(field.as_ref()).expect("same type"), 7);
        assert!(assign_value(field.as_mut(), 1.0f64).is_err());
        assert!(extract_value::<String>(field.as_ref()).is_err());
    }

    #[test]
    fn test_factory_builds_defaults() {
        let make = factory::<ScalarField<i16>>();
        let field = make();
        assert_eq!(field.kind(), FieldKind::Scalar(ScalarKind::I16));
        assert_eq!(field.size(0), 2);
        assert_eq!(field.concrete_type(), TypeId::of::<ScalarField<i16>>());
    }

    #[test]
    fn test_check_count_limit() {
        let registry = TypeRegistry::new();
        let ctx = Context::with_config(
            &registry,
            CodecConfig::default().with_max_collection_len(4),
        );
        assert!(ctx.check_count(4, 0).is_ok());
        let err = ctx.check_count(5, 12).unwrap_err();
        assert!(matches!(err, Error::Structural { offset: 12, .. }));
    }
}
