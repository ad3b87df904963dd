// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size numeric leaves.

use super::enums::{EnumField, FlagsField};
use super::{Context, Field, FieldKind, FieldValue};
use crate::error::{Error, Result};
use crate::ser::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    pub const fn size(self) -> u64 {
        match self {
            ScalarKind::Bool | ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
        }
    }

    /// Whether the kind can back an enum or flag set.
    pub const fn is_integer(self) -> bool {
        !matches!(self, ScalarKind::Bool | ScalarKind::F32 | ScalarKind::F64)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive with a fixed little-endian encoding.
pub trait Scalar: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const SIZE: u64;
    const KIND: ScalarKind;

    fn read_from(reader: &mut Reader<'_>) -> Result<Self>;

    fn write_to(self, writer: &mut Writer) -> Result<()>;
}

/// Generate `Scalar` impls mapping a type onto its cursor methods
macro_rules! impl_scalar {
    ($type:ty, $kind:ident, $read:ident, $write:ident) => {
        impl Scalar for $type {
            const SIZE: u64 = ScalarKind::$kind.size();
            const KIND: ScalarKind = ScalarKind::$kind;

            fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
                reader.$read()
            }

            fn write_to(self, writer: &mut Writer) -> Result<()> {
                writer.$write(self)
            }
        }
    };
}

impl_scalar!(u8, U8, read_u8, write_u8);
impl_scalar!(u16, U16, read_u16_le, write_u16_le);
impl_scalar!(u32, U32, read_u32_le, write_u32_le);
impl_scalar!(u64, U64, read_u64_le, write_u64_le);
impl_scalar!(i8, I8, read_i8, write_i8);
impl_scalar!(i16, I16, read_i16_le, write_i16_le);
impl_scalar!(i32, I32, read_i32_le, write_i32_le);
impl_scalar!(i64, I64, read_i64_le, write_i64_le);
impl_scalar!(f32, F32, read_f32_le, write_f32_le);
impl_scalar!(f64, F64, read_f64_le, write_f64_le);

impl Scalar for bool {
    const SIZE: u64 = 1;
    const KIND: ScalarKind = ScalarKind::Bool;

    fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        let offset = reader.position();
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::structural(
                offset,
                format!("invalid bool value {}", other),
            )),
        }
    }

    fn write_to(self, writer: &mut Writer) -> Result<()> {
        writer.write_u8(u8::from(self))
    }
}

/// A single numeric value with a declared default.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScalarField<T: Scalar> {
    pub value: T,
    default: T,
}

impl<T: Scalar> ScalarField<T> {
    /// Field whose value and default are `default`.
    pub fn new(default: T) -> Self {
        Self {
            value: default,
            default,
        }
    }

    pub fn default_value(&self) -> T {
        self.default
    }
}

impl<T: Scalar> Field for ScalarField<T> {
    fn kind(&self) -> FieldKind {
        FieldKind::Scalar(T::KIND)
    }

    fn size(&self, _start: u64) -> u64 {
        T::SIZE
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        self.value = T::read_from(reader)?;
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        self.value.write_to(writer)
    }

    fn reset(&mut self) {
        self.value = self.default;
    }

    crate::field_any!();
}

/// `FieldValue` for types only ever stored in a `ScalarField`
macro_rules! impl_plain_value {
    ($($type:ty),*) => {$(
        impl FieldValue for $type {
            fn extract(field: &dyn Field) -> Option<Self> {
                field.downcast_ref::<ScalarField<$type>>().map(|f| f.value)
            }

            fn assign(self, field: &mut dyn Field) -> bool {
                match field.downcast_mut::<ScalarField<$type>>() {
                    Some(f) => {
                        f.value = self;
                        true
                    }
                    None => false,
                }
            }
        }
    )*};
}

/// `FieldValue` for integers, which may also back enum and flag fields
macro_rules! impl_integer_value {
    ($($type:ty),*) => {$(
        impl FieldValue for $type {
            fn extract(field: &dyn Field) -> Option<Self> {
                if let Some(f) = field.downcast_ref::<ScalarField<$type>>() {
                    return Some(f.value);
                }
                if let Some(f) = field.downcast_ref::<EnumField<$type>>() {
                    return Some(f.value());
                }
                field.downcast_ref::<FlagsField<$type>>().map(|f| f.bits())
            }

            fn assign(self, field: &mut dyn Field) -> bool {
                if let Some(f) = field.downcast_mut::<ScalarField<$type>>() {
                    f.value = self;
                    return true;
                }
                if let Some(f) = field.downcast_mut::<EnumField<$type>>() {
                    f.set_value(self);
                    return true;
                }
                match field.downcast_mut::<FlagsField<$type>>() {
                    Some(f) => {
                        f.set_bits(self);
                        true
                    }
                    None => false,
                }
            }
        }
    )*};
}

impl_plain_value!(bool, f32, f64);
impl_integer_value!(u8, u16, u32, u64, i8, i16, i32, i64);
