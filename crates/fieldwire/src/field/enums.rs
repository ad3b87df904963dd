// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Enum and flag-set codecs, generic over the integer width.
//!
//! - [`EnumField<R>`] / [`FlagsField<R>`]: runtime-described enums (catalog
//!   types), unknown values are kept so data round-trips unchanged.
//! - [`EnumCodec<E>`]: hand-written Rust enums implementing [`WireEnum`];
//!   an undeclared value is a structural error.

use super::scalar::{Scalar, ScalarKind};
use super::{Context, Field, FieldKind};
use crate::error::{Error, MisuseError, Result};
use crate::hash::crc64_str;
use crate::ser::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Integer type able to carry an enum or flag value.
pub trait EnumRepr: Scalar + Eq {
    /// Sign-extending (or bit-preserving for `u64`) widening.
    fn to_i64(self) -> i64;

    /// Truncating narrowing.
    fn from_i64(value: i64) -> Self;
}

macro_rules! impl_enum_repr {
    ($($type:ty),*) => {$(
        impl EnumRepr for $type {
            fn to_i64(self) -> i64 {
                self as i64
            }

            fn from_i64(value: i64) -> Self {
                value as $type
            }
        }
    )*};
}

impl_enum_repr!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Named enum value (or flag mask).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

impl EnumVariant {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Runtime description of an enum or flag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    name: String,
    id: u64,
    underlying: ScalarKind,
    variants: Vec<EnumVariant>,
}

impl EnumDescriptor {
    pub fn new(name: impl Into<String>, underlying: ScalarKind, variants: Vec<EnumVariant>) -> Self {
        let name = name.into();
        Self {
            id: crc64_str(&name),
            name,
            underlying,
            variants,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn underlying(&self) -> ScalarKind {
        self.underlying
    }

    pub fn variants(&self) -> &[EnumVariant] {
        &self.variants
    }

    /// Get variant by name.
    pub fn variant(&self, name: &str) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Get variant by value.
    pub fn variant_by_value(&self, value: i64) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.value == value)
    }

    fn require(&self, name: &str) -> Result<&EnumVariant> {
        self.variant(name).ok_or_else(|| {
            MisuseError::NoSuchVariant {
                name: self.name.clone(),
                variant: name.to_string(),
            }
            .into()
        })
    }
}

/// Enum value described at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumField<R: EnumRepr> {
    value: R,
    default: R,
    descriptor: Arc<EnumDescriptor>,
}

impl<R: EnumRepr> EnumField<R> {
    /// Field defaulting to the first declared variant (or zero).
    pub fn new(descriptor: Arc<EnumDescriptor>) -> Self {
        let default = descriptor
            .variants
            .first()
            .map_or_else(R::default, |v| R::from_i64(v.value));
        Self {
            value: default,
            default,
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &Arc<EnumDescriptor> {
        &self.descriptor
    }

    pub fn value(&self) -> R {
        self.value
    }

    /// Store a raw value, declared or not.
    pub fn set_value(&mut self, value: R) {
        self.value = value;
    }

    /// Name of the current value, `None` for undeclared values.
    pub fn variant(&self) -> Option<&str> {
        self.descriptor
            .variant_by_value(self.value.to_i64())
            .map(|v| v.name.as_str())
    }

    pub fn set_variant(&mut self, name: &str) -> Result<()> {
        let value = self.descriptor.require(name)?.value;
        self.value = R::from_i64(value);
        Ok(())
    }
}

impl<R: EnumRepr> Field for EnumField<R> {
    fn kind(&self) -> FieldKind {
        FieldKind::Enum(R::KIND)
    }

    fn size(&self, _start: u64) -> u64 {
        R::SIZE
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        self.value = R::read_from(reader)?;
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        self.value.write_to(writer)
    }

    fn reset(&mut self) {
        self.value = self.default;
    }

    fn describe(&self) -> String {
        format!("enum {}", self.descriptor.name)
    }

    fn type_name(&self) -> Option<&str> {
        Some(&self.descriptor.name)
    }

    fn type_hash(&self) -> Option<u64> {
        Some(self.descriptor.id)
    }

    crate::field_any!();
}

/// Flag set described at runtime; variant values are bit masks.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagsField<R: EnumRepr> {
    bits: R,
    descriptor: Arc<EnumDescriptor>,
}

impl<R: EnumRepr> FlagsField<R> {
    pub fn new(descriptor: Arc<EnumDescriptor>) -> Self {
        Self {
            bits: R::default(),
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &Arc<EnumDescriptor> {
        &self.descriptor
    }

    pub fn bits(&self) -> R {
        self.bits
    }

    pub fn set_bits(&mut self, bits: R) {
        self.bits = bits;
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        let mask = self.descriptor.require(name)?.value as u64;
        Ok(self.raw() & mask == mask)
    }

    pub fn insert(&mut self, name: &str) -> Result<()> {
        let mask = self.descriptor.require(name)?.value as u64;
        self.bits = R::from_i64((self.raw() | mask) as i64);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let mask = self.descriptor.require(name)?.value as u64;
        self.bits = R::from_i64((self.raw() & !mask) as i64);
        Ok(())
    }

    /// Names of the declared flags that are set.
    pub fn names(&self) -> Vec<&str> {
        let raw = self.raw();
        self.descriptor
            .variants
            .iter()
            .filter(|v| v.value != 0 && raw & (v.value as u64) == v.value as u64)
            .map(|v| v.name.as_str())
            .collect()
    }

    fn raw(&self) -> u64 {
        self.bits.to_i64() as u64
    }
}

impl<R: EnumRepr> Field for FlagsField<R> {
    fn kind(&self) -> FieldKind {
        FieldKind::Flags(R::KIND)
    }

    fn size(&self, _start: u64) -> u64 {
        R::SIZE
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        self.bits = R::read_from(reader)?;
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        self.bits.write_to(writer)
    }

    fn reset(&mut self) {
        self.bits = R::default();
    }

    fn describe(&self) -> String {
        format!("flags {}", self.descriptor.name)
    }

    fn type_name(&self) -> Option<&str> {
        Some(&self.descriptor.name)
    }

    fn type_hash(&self) -> Option<u64> {
        Some(self.descriptor.id)
    }

    crate::field_any!();
}

/// A Rust enum with a fixed integer encoding.
pub trait WireEnum: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    type Repr: EnumRepr;

    const NAME: &'static str;

    fn to_repr(self) -> Self::Repr;

    fn from_repr(repr: Self::Repr) -> Option<Self>;
}

/// Field wrapping a [`WireEnum`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnumCodec<E: WireEnum> {
    pub value: E,
    default: E,
}

impl<E: WireEnum> EnumCodec<E> {
    pub fn new(default: E) -> Self {
        Self {
            value: default,
            default,
        }
    }
}

impl<E: WireEnum> Field for EnumCodec<E> {
    fn kind(&self) -> FieldKind {
        FieldKind::Enum(E::Repr::KIND)
    }

    fn size(&self, _start: u64) -> u64 {
        E::Repr::SIZE
    }

    fn read(&mut self, reader: &mut Reader<'_>, _ctx: &mut Context<'_>) -> Result<()> {
        let offset = reader.position();
        let repr = E::Repr::read_from(reader)?;
        self.value = E::from_repr(repr).ok_or_else(|| {
            Error::structural(offset, format!("invalid {} value {:?}", E::NAME, repr))
        })?;
        Ok(())
    }

    fn write(&self, writer: &mut Writer, _ctx: &mut Context<'_>) -> Result<()> {
        self.value.to_repr().write_to(writer)
    }

    fn reset(&mut self) {
        self.value = self.default;
    }

    fn describe(&self) -> String {
        format!("enum {}", E::NAME)
    }

    crate::field_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    fn team() -> Arc<EnumDescriptor> {
        Arc::new(EnumDescriptor::new(
            "ETeam",
            ScalarKind::U8,
            vec![
                EnumVariant::new("Neutral", 0),
                EnumVariant::new("Red", 1),
                EnumVariant::new("Blue", 2),
            ],
        ))
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum Stance {
        #[default]
        Standing,
        Crouching,
    }

    impl WireEnum for Stance {
        type Repr = u16;
        const NAME: &'static str = "Stance";

        fn to_repr(self) -> u16 {
            self as u16
        }

        fn from_repr(repr: u16) -> Option<Self> {
            match repr {
                0 => Some(Stance::Standing),
                1 => Some(Stance::Crouching),
                _ => None,
            }
        }
    }

    #[test]
    fn test_enum_variant_lookup() {
        let mut field = EnumField::<u8>::new(team());
        assert_eq!(field.variant(), Some("Neutral"));
        field.set_variant("Blue").expect("declared");
        assert_eq!(field.value(), 2);
        assert!(field.set_variant("Green").is_err());
        assert_eq!(field.type_hash(), Some(crc64_str("ETeam")));
    }

    #[test]
    fn test_undeclared_enum_value_round_trips() {
        let registry = TypeRegistry::new();
        let mut ctx = Context::new(&registry);
        let mut field = EnumField::<u8>::new(team());
        field.read(&mut Reader::new(&[7]), &mut ctx).expect("raw value");
        assert_eq!(field.variant(), None);

        let mut writer = Writer::new();
        field.write(&mut writer, &mut ctx).expect("write");
        assert_eq!(writer.as_slice(), &[7]);
    }

    #[test]
    fn test_flags_masks() {
        let descriptor = Arc::new(EnumDescriptor::new(
            "EFlags",
            ScalarKind::U32,
            vec![
                EnumVariant::new("Visible", 1),
                EnumVariant::new("Solid", 2),
                EnumVariant::new("Static", 8),
            ],
        ));
        let mut flags = FlagsField::<u32>::new(descriptor);
        flags.insert("Visible").expect("declared");
        flags.insert("Static").expect("declared");
        assert_eq!(flags.bits(), 9);
        assert!(flags.contains("Static").expect("declared"));
        assert!(!flags.contains("Solid").expect("declared"));
        assert_eq!(flags.names(), vec!["Visible", "Static"]);
        flags.remove("Visible").expect("declared");
        assert_eq!(flags.bits(), 8);
    }

    #[test]
    fn test_wire_enum_rejects_unknown_value() {
        let registry = TypeRegistry::new();
        let mut ctx = Context::new(&registry);
        let mut field = EnumCodec::<Stance>::default();
        field.read(&mut Reader::new(&[1, 0]), &mut ctx).expect("declared");
        assert_eq!(field.value, Stance::Crouching);

        let err = field.read(&mut Reader::new(&[5, 0]), &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "structural error at offset 0x0: invalid Stance value 5");
    }
}
