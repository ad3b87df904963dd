// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hash-keyed records with per-property presence.
//!
//! # Wire format
//!
//! ```text
//! u32 count
//! count × ( u64 key | value bytes )
//! ```
//!
//! Keys are produced from declared property names by a [`KeyGenerator`]
//! (CRC-64 by default). Value layout is fixed by the declared property, the
//! stream does not describe it. Only present properties are written.
//!
//! Presence is tracked separately from the value: a property can be
//! [`Presence::Unset`] (never assigned), [`Presence::Present`] or
//! [`Presence::Cleared`] (explicitly removed). Properties read from a stream
//! remember their stream order so that re-writing a read record reproduces
//! the same bytes; properties set afterwards are appended.

use crate::config::{COUNT_SIZE, KEY_SIZE};
use crate::error::{Error, MisuseError, Position, Result};
use crate::field::{
    assign_value, extract_value, factory, Context, DictionaryField, Field, FieldFactory,
    FieldKind, FieldValue, Scalar, ScalarField, StrIdField, StringField, VectorField,
};
use crate::hash::{crc64_str, Crc64Keys, KeyGenerator};
use crate::ser::{Reader, Writer};
use crate::strid::known_strings;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Presence of a property, orthogonal to its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    #[default]
    Unset,
    Present,
    Cleared,
}

struct PropertyDecl {
    name: Arc<str>,
    key: u64,
    factory: FieldFactory,
}

/// Declared properties of a bag type.
pub struct BagSchema {
    name: Arc<str>,
    id: u64,
    generator: Arc<dyn KeyGenerator>,
    properties: Vec<PropertyDecl>,
    by_key: HashMap<u64, usize>,
    by_name: HashMap<Arc<str>, usize>,
}

impl BagSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn generator(&self) -> &dyn KeyGenerator {
        self.generator.as_ref()
    }

    /// Wire key of a declared property.
    pub fn key_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).map(|&i| self.properties[i].key)
    }

    /// Declared property name for a wire key.
    pub fn name_of(&self, key: u64) -> Option<&str> {
        self.by_key.get(&key).map(|&i| self.properties[i].name.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_ref())
    }
}

impl fmt::Debug for BagSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BagSchema")
            .field("name", &self.name)
            .field("generator", &self.generator.name())
            .field("properties", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`BagSchema`].
pub struct BagSchemaBuilder {
    name: String,
    generator: Arc<dyn KeyGenerator>,
    properties: Vec<(String, FieldFactory)>,
}

impl BagSchemaBuilder {
    /// Derive keys with `generator` instead of CRC-64.
    pub fn with_generator(mut self, generator: Arc<dyn KeyGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn property(mut self, name: impl Into<String>, factory: FieldFactory) -> Self {
        self.properties.push((name.into(), factory));
        self
    }

    pub fn scalar<T: Scalar>(self, name: impl Into<String>) -> Self {
        self.property(name, factory::<ScalarField<T>>())
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.property(name, factory::<StringField>())
    }

    pub fn strid(self, name: impl Into<String>) -> Self {
        self.property(name, factory::<StrIdField>())
    }

    pub fn vector(self, name: impl Into<String>, element: FieldFactory) -> Self {
        self.property(
            name,
            Arc::new(move || Box::new(VectorField::new(Arc::clone(&element)))),
        )
    }

    pub fn dictionary(self, name: impl Into<String>, key: FieldFactory, value: FieldFactory) -> Self {
        self.property(
            name,
            Arc::new(move || {
                Box::new(DictionaryField::new(Arc::clone(&key), Arc::clone(&value)))
            }),
        )
    }

    /// Build the schema; two names with the same key are rejected.
    pub fn build(self) -> Result<Arc<BagSchema>> {
        self.check_keys()?;
        Ok(self.build_unchecked())
    }

    fn check_keys(&self) -> Result<()> {
        let mut keys: HashMap<u64, &str> = HashMap::new();
        for (name, _) in &self.properties {
            let key = self.generator.key(name);
            match keys.get(&key) {
                Some(existing) if *existing == name.as_str() => {
                    return Err(MisuseError::DuplicateName(format!("{}.{}", self.name, name)).into());
                }
                Some(existing) => {
                    return Err(Error::HashCollision {
                        hash: key,
                        existing: existing.to_string(),
                        incoming: name.clone(),
                    });
                }
                None => {
                    keys.insert(key, name.as_str());
                }
            }
        }
        Ok(())
    }

    /// Build without the uniqueness checks (catalog bags are validated
    /// before they are instantiated).
    pub(crate) fn build_unchecked(self) -> Arc<BagSchema> {
        let mut properties = Vec::with_capacity(self.properties.len());
        let mut by_key = HashMap::new();
        let mut by_name = HashMap::new();

        for (index, (name, factory)) in self.properties.into_iter().enumerate() {
            let name: Arc<str> = Arc::from(name);
            let key = self.generator.key(&name);
            // only CRC-64 keys share the known-string hash space
            if key == crc64_str(&name) {
                known_strings().pin(&name);
            }
            by_key.insert(key, index);
            by_name.insert(Arc::clone(&name), index);
            properties.push(PropertyDecl { name, key, factory });
        }

        log::debug!(
            "[bag] built `{}` with {} properties ({} keys)",
            self.name,
            properties.len(),
            self.generator.name()
        );
        Arc::new(BagSchema {
            id: crc64_str(&self.name),
            name: Arc::from(self.name),
            generator: self.generator,
            properties,
            by_key,
            by_name,
        })
    }
}

struct Slot {
    field: Box<dyn Field>,
    presence: Presence,
    order: u64,
}

/// Instance of a [`BagSchema`].
pub struct PropertyBag {
    schema: Arc<BagSchema>,
    slots: Vec<Slot>,
    next_order: u64,
}

impl PropertyBag {
    /// Start declaring a bag type.
    pub fn builder(name: impl Into<String>) -> BagSchemaBuilder {
        BagSchemaBuilder {
            name: name.into(),
            generator: Arc::new(Crc64Keys),
            properties: Vec::new(),
        }
    }

    /// Empty bag (every property unset).
    pub fn new(schema: &Arc<BagSchema>) -> Self {
        let slots = schema
            .properties
            .iter()
            .map(|p| Slot {
                field: (p.factory)(),
                presence: Presence::Unset,
                order: 0,
            })
            .collect();
        Self {
            schema: Arc::clone(schema),
            slots,
            next_order: 0,
        }
    }

    pub fn factory(schema: &Arc<BagSchema>) -> FieldFactory {
        let schema = Arc::clone(schema);
        Arc::new(move || Box::new(PropertyBag::new(&schema)))
    }

    pub fn schema(&self) -> &Arc<BagSchema> {
        &self.schema
    }

    pub fn presence(&self, name: &str) -> Result<Presence> {
        Ok(self.slots[self.require(name)?].presence)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.schema
            .by_name
            .get(name)
            .is_some_and(|&i| self.slots[i].presence == Presence::Present)
    }

    /// Number of present properties.
    pub fn present_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.presence == Presence::Present)
            .count()
    }

    /// Present properties in write order.
    pub fn iter_present(&self) -> impl Iterator<Item = (&str, &dyn Field)> {
        self.present_order().into_iter().map(move |i| {
            let field: &dyn Field = self.slots[i].field.as_ref();
            (self.schema.properties[i].name.as_ref(), field)
        })
    }

    /// Value of a property, `None` when not present. The declared type is
    /// checked whether or not the property is present.
    pub fn get<T: FieldValue>(&self, name: &str) -> Result<Option<T>> {
        let slot = &self.slots[self.require(name)?];
        let value = extract_value::<T>(slot.field.as_ref())?;
        Ok((slot.presence == Presence::Present).then_some(value))
    }

    pub fn set<T: FieldValue>(&mut self, name: &str, value: T) -> Result<()> {
        let index = self.require(name)?;
        assign_value(self.slots[index].field.as_mut(), value)?;
        self.mark_present(index);
        Ok(())
    }

    pub fn text(&self, name: &str) -> Result<Option<&str>> {
        let index = self.require(name)?;
        let slot = &self.slots[index];
        let field = slot.field.cast::<StringField>()?;
        Ok((slot.presence == Presence::Present).then_some(field.value.as_str()))
    }

    pub fn set_text(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        let index = self.require(name)?;
        self.slots[index].field.cast_mut::<StringField>()?.value = text.into();
        self.mark_present(index);
        Ok(())
    }

    /// Remove a property from the written set and reset its value.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let index = self.require(name)?;
        let slot = &mut self.slots[index];
        slot.field.reset();
        slot.presence = Presence::Cleared;
        Ok(())
    }

    /// The property's field, present or not.
    pub fn field(&self, name: &str) -> Result<&dyn Field> {
        let index = self.require(name)?;
        Ok(self.slots[index].field.as_ref())
    }

    /// The property's field for in-place edits; marks it present.
    pub fn field_mut(&mut self, name: &str) -> Result<&mut dyn Field> {
        let index = self.require(name)?;
        self.mark_present(index);
        Ok(self.slots[index].field.as_mut())
    }

    pub fn vector(&self, name: &str) -> Result<&VectorField> {
        self.field(name)?.cast::<VectorField>()
    }

    /// Marks the property present.
    pub fn vector_mut(&mut self, name: &str) -> Result<&mut VectorField> {
        self.typed_mut::<VectorField>(name)
    }

    pub fn dictionary(&self, name: &str) -> Result<&DictionaryField> {
        self.field(name)?.cast::<DictionaryField>()
    }

    /// Marks the property present.
    pub fn dictionary_mut(&mut self, name: &str) -> Result<&mut DictionaryField> {
        self.typed_mut::<DictionaryField>(name)
    }

    fn typed_mut<F: Field>(&mut self, name: &str) -> Result<&mut F> {
        let index = self.require(name)?;
        // check before marking so a mismatch leaves presence untouched
        self.slots[index].field.cast::<F>()?;
        self.mark_present(index);
        self.slots[index].field.cast_mut::<F>()
    }

    fn mark_present(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if slot.presence != Presence::Present {
            slot.presence = Presence::Present;
            slot.order = self.next_order;
            self.next_order += 1;
        }
    }

    fn present_order(&self) -> Vec<usize> {
        let mut present: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].presence == Presence::Present)
            .collect();
        present.sort_by_key(|&i| self.slots[i].order);
        present
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.schema.by_name.get(name).copied().ok_or_else(|| {
            MisuseError::NoSuchProperty(format!("{}.{}", self.schema.name, name)).into()
        })
    }

    fn property_position(&self, index: usize, key: u64, slot: Option<usize>) -> Position {
        Position::Property {
            index,
            key,
            name: slot.map(|i| Arc::clone(&self.schema.properties[i].name)),
        }
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        for (name, field) in self.iter_present() {
            s.field(name, &field);
        }
        s.finish()
    }
}

impl Field for PropertyBag {
    fn kind(&self) -> FieldKind {
        FieldKind::Bag
    }

    fn size(&self, start: u64) -> u64 {
        let mut pos = start + COUNT_SIZE;
        for index in self.present_order() {
            pos += KEY_SIZE;
            pos += self.slots[index].field.size(pos);
        }
        pos - start
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        for slot in &mut self.slots {
            slot.field.reset();
            slot.presence = Presence::Unset;
            slot.order = 0;
        }

        let offset = reader.position();
        let count = reader.read_u32_le()?;
        ctx.check_count(count, offset)?;

        for entry in 0..count as usize {
            let start = reader.position();
            let key = reader
                .read_u64_le()
                .map_err(|e| e.within(self.property_position(entry, 0, None), start))?;
            let index = match self.schema.by_key.get(&key) {
                Some(&index) => index,
                None => {
                    return Err(Error::UnknownKey { key }
                        .within(self.property_position(entry, key, None), start))
                }
            };
            if self.slots[index].presence == Presence::Present {
                return Err(Error::structural(start, "property key repeated in one record")
                    .within(self.property_position(entry, key, Some(index)), start));
            }

            if let Err(e) = self.slots[index].field.read(reader, ctx) {
                return Err(e.within(self.property_position(entry, key, Some(index)), start));
            }
            let slot = &mut self.slots[index];
            slot.presence = Presence::Present;
            slot.order = entry as u64;
        }
        self.next_order = u64::from(count);
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        let order = self.present_order();
        let count = u32::try_from(order.len())
            .map_err(|_| MisuseError::CountOverflow { len: order.len() })?;
        writer.write_u32_le(count)?;

        for (entry, index) in order.into_iter().enumerate() {
            let decl = &self.schema.properties[index];
            let start = writer.position();
            ctx.push_range(&decl.name, start);
            writer
                .write_u64_le(decl.key)
                .and_then(|()| self.slots[index].field.write(writer, ctx))
                .map_err(|e| e.within(self.property_position(entry, decl.key, Some(index)), start))?;
            ctx.pop_range(writer.position());
        }
        Ok(())
    }

    fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.field.reset();
            slot.presence = Presence::Unset;
            slot.order = 0;
        }
        self.next_order = 0;
    }

    fn describe(&self) -> String {
        format!("bag {}", self.schema.name)
    }

    fn type_name(&self) -> Option<&str> {
        Some(&self.schema.name)
    }

    fn type_hash(&self) -> Option<u64> {
        Some(self.schema.id)
    }

    crate::field_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    fn position() -> Arc<BagSchema> {
        PropertyBag::builder("Position")
            .scalar::<f32>("X")
            .scalar::<f32>("Y")
            .build()
            .expect("valid bag")
    }

    fn encode(bag: &PropertyBag) -> Vec<u8> {
        let registry = TypeRegistry::new();
        let mut ctx = Context::new(&registry);
        let mut writer = Writer::new();
        bag.write(&mut writer, &mut ctx).expect("write");
        assert_eq!(writer.position(), bag.size(0));
        writer.into_inner()
    }

    fn decode(bag: &mut PropertyBag, bytes: &[u8]) -> Result<()> {
        let registry = TypeRegistry::new();
        let mut ctx = Context::new(&registry);
        bag.read(&mut Reader::new(bytes), &mut ctx)
    }

    #[test]
    fn test_only_present_properties_are_written() {
        let schema = position();
        let mut bag = PropertyBag::new(&schema);
        assert_eq!(encode(&bag), vec![0, 0, 0, 0]);

        bag.set("X", 1.0f32).expect("f32");
        let bytes = encode(&bag);
        assert_eq!(bytes.len(), 4 + 8 + 4);
        assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..12], &0x2E5E_B660_6608_7D7Eu64.to_le_bytes());
    }

    #[test]
    fn test_set_then_clear_removes_property() {
        let schema = position();
        let mut bag = PropertyBag::new(&schema);
        bag.set("Y", 2.0f32).expect("f32");
        bag.clear("Y").expect("declared");
        assert_eq!(bag.presence("Y").expect("declared"), Presence::Cleared);
        assert_eq!(bag.presence("X").expect("declared"), Presence::Unset);
        assert_eq!(bag.get::<f32>("Y").expect("f32"), None);
        assert_eq!(encode(&bag), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_read_preserves_stream_order() {
        let schema = position();
        let mut bag = PropertyBag::new(&schema);
        bag.set("Y", 2.0f32).expect("f32");
        bag.set("X", 1.0f32).expect("f32");
        let bytes = encode(&bag);

        let mut copy = PropertyBag::new(&schema);
        decode(&mut copy, &bytes).expect("read");
        assert_eq!(encode(&copy), bytes);
        let names: Vec<&str> = copy.iter_present().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Y", "X"]);
    }

    #[test]
    fn test_unknown_key_is_rejected_with_hash() {
        let schema = position();
        let mut bytes = vec![1, 0, 0, 0];
        bytes.extend_from_slice(&0x1234u64.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);

        let mut bag = PropertyBag::new(&schema);
        let err = decode(&mut bag, &bytes).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnknownType);
        assert_eq!(err.unknown_hash(), Some(0x1234));
        assert!(err.to_string().contains("unrecognized key 0x0000000000001234"));
    }

    #[test]
    fn test_duplicate_key_is_structural() {
        let schema = position();
        let key = schema.key_of("X").expect("declared");
        let mut bytes = vec![2, 0, 0, 0];
        for _ in 0..2 {
            bytes.extend_from_slice(&key.to_le_bytes());
            bytes.extend_from_slice(&1.0f32.to_le_bytes());
        }
        let mut bag = PropertyBag::new(&schema);
        let err = decode(&mut bag, &bytes).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Structural);
        assert!(matches!(
            err.path().first(),
            Some(Position::Property { index: 1, .. })
        ));
    }

    #[test]
    fn test_typed_accessors_enforce_declared_type() {
        let schema = PropertyBag::builder("Inventory")
            .string("Owner")
            .vector("Slots", factory::<StrIdField>())
            .build()
            .expect("valid bag");
        let mut bag = PropertyBag::new(&schema);

        assert!(bag.set("Owner", 3u32).is_err());
        assert!(bag.get::<f32>("Owner").is_err());
        assert!(bag.dictionary_mut("Slots").is_err());
        assert_eq!(bag.presence("Slots").expect("declared"), Presence::Unset);

        bag.vector_mut("Slots")
            .expect("vector")
            .set_values([crate::StrId::new("Sword")])
            .expect("strid elements");
        assert!(bag.is_present("Slots"));
        bag.set_text("Owner", "hero").expect("string");
        assert_eq!(bag.text("Owner").expect("string"), Some("hero"));
    }

    #[test]
    fn test_colliding_names_rejected_at_build() {
        #[derive(Debug)]
        struct FirstByte;
        impl KeyGenerator for FirstByte {
            fn key(&self, name: &str) -> u64 {
                u64::from(name.as_bytes()[0])
            }
            fn name(&self) -> &'static str {
                "first-byte"
            }
        }

        let err = PropertyBag::builder("Broken")
            .with_generator(Arc::new(FirstByte))
            .scalar::<u8>("Alpha")
            .scalar::<u8>("Apex")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Integrity);
    }

    #[test]
    fn test_only_crc64_keys_pin_property_names() {
        #[derive(Debug)]
        struct Salted;
        impl KeyGenerator for Salted {
            fn key(&self, name: &str) -> u64 {
                crc64_str(name) ^ 0x5a5a
            }
            fn name(&self) -> &'static str {
                "salted"
            }
        }

        let salted = PropertyBag::builder("SaltedBag")
            .with_generator(Arc::new(Salted))
            .scalar::<u8>("SaltedOnlyProperty")
            .build()
            .expect("valid bag");
        assert_eq!(
            salted.name_of(crc64_str("SaltedOnlyProperty") ^ 0x5a5a),
            Some("SaltedOnlyProperty")
        );
        assert!(known_strings()
            .lookup(crc64_str("SaltedOnlyProperty"))
            .is_none());

        PropertyBag::builder("PlainBag")
            .scalar::<u8>("PlainPinnedProperty")
            .build()
            .expect("valid bag");
        assert_eq!(
            known_strings()
                .lookup(crc64_str("PlainPinnedProperty"))
                .as_deref(),
            Some("PlainPinnedProperty")
        );
    }
}
