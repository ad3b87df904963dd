// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Homogeneous collections and their typed adapters.
//!
//! Collections hold boxed elements built by a [`FieldFactory`]. The element
//! type is probed lazily from the factory (never at construction, so a type
//! may contain a vector of itself). Typed views check the requested field
//! type against the probed one and fail with a type mismatch otherwise.

use super::{
    assign_value, extract_value, Context, Field, FieldFactory, FieldKind, FieldValue,
};
use crate::config::COUNT_SIZE;
use crate::error::{MisuseError, Position, Result};
use crate::ser::{Reader, Writer};
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
struct ElementInfo {
    kind: FieldKind,
    type_id: TypeId,
    description: String,
}

fn probe(factory: &FieldFactory) -> ElementInfo {
    let sample = factory();
    ElementInfo {
        kind: sample.kind(),
        type_id: Any::type_id(sample.as_any()),
        description: sample.describe(),
    }
}

fn check_type<F: Field>(info: &ElementInfo) -> Result<()> {
    if TypeId::of::<F>() == info.type_id {
        Ok(())
    } else {
        Err(MisuseError::TypeMismatch {
            expected: std::any::type_name::<F>().to_string(),
            found: info.description.clone(),
        }
        .into())
    }
}

fn count_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| MisuseError::CountOverflow { len }.into())
}

/// Size of `fields` written back to back from `start`.
fn run_size<'a>(fields: impl Iterator<Item = &'a dyn Field>, start: u64) -> u64 {
    fields.fold(start, |pos, field| pos + field.size(pos)) - start
}

/// `u32` count followed by that many elements.
pub struct VectorField {
    elements: Vec<Box<dyn Field>>,
    factory: FieldFactory,
    info: OnceLock<ElementInfo>,
}

impl VectorField {
    pub fn new(factory: FieldFactory) -> Self {
        Self {
            elements: Vec::new(),
            factory,
            info: OnceLock::new(),
        }
    }

    fn info(&self) -> &ElementInfo {
        self.info.get_or_init(|| probe(&self.factory))
    }

    pub fn element_kind(&self) -> FieldKind {
        self.info().kind
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Field> {
        self.elements.get(index).map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut dyn Field> {
        let element = self.elements.get_mut(index)?;
        Some(element.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Field> {
        self.elements.iter().map(|e| e.as_ref())
    }

    /// Append a default element and return it.
    pub fn push_default(&mut self) -> &mut dyn Field {
        self.elements.push((self.factory)());
        let last = self.elements.len() - 1;
        self.elements[last].as_mut()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn truncate(&mut self, len: usize) {
        self.elements.truncate(len);
    }

    pub fn view<F: Field>(&self) -> Result<VecView<'_, F>> {
        check_type::<F>(self.info())?;
        Ok(VecView {
            elements: &self.elements,
            _marker: PhantomData,
        })
    }

    pub fn view_mut<F: Field>(&mut self) -> Result<VecViewMut<'_, F>> {
        check_type::<F>(self.info())?;
        Ok(VecViewMut {
            inner: self,
            _marker: PhantomData,
        })
    }

    /// Element values, for vectors of plain values.
    pub fn values<T: FieldValue>(&self) -> Result<Vec<T>> {
        self.iter().map(extract_value::<T>).collect()
    }

    /// Replace the content with `values`.
    pub fn set_values<T: FieldValue>(&mut self, values: impl IntoIterator<Item = T>) -> Result<()> {
        let mut elements = Vec::new();
        for value in values {
            let mut element = (self.factory)();
            assign_value(element.as_mut(), value)?;
            elements.push(element);
        }
        self.elements = elements;
        Ok(())
    }
}

impl fmt::Debug for VectorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorField")
            .field("elements", &self.elements)
            .finish_non_exhaustive()
    }
}

impl Field for VectorField {
    fn kind(&self) -> FieldKind {
        FieldKind::Vector
    }

    fn size(&self, start: u64) -> u64 {
        COUNT_SIZE + run_size(self.iter(), start + COUNT_SIZE)
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        let offset = reader.position();
        let count = reader.read_u32_le()?;
        ctx.check_count(count, offset)?;

        self.elements.clear();
        for index in 0..count as usize {
            let start = reader.position();
            let mut element = (self.factory)();
            element
                .read(reader, ctx)
                .map_err(|e| e.within(Position::Element { index }, start))?;
            self.elements.push(element);
        }
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        writer.write_u32_le(count_prefix(self.elements.len())?)?;
        for (index, element) in self.elements.iter().enumerate() {
            let start = writer.position();
            element
                .write(writer, ctx)
                .map_err(|e| e.within(Position::Element { index }, start))?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.elements.clear();
    }

    fn describe(&self) -> String {
        format!("vector<{}>", self.info().description)
    }

    crate::field_any!();
}

/// Exactly `len` elements, no count prefix.
pub struct ArrayField {
    elements: Vec<Box<dyn Field>>,
    factory: FieldFactory,
    info: OnceLock<ElementInfo>,
}

impl ArrayField {
    pub fn new(factory: FieldFactory, len: usize) -> Self {
        let elements = (0..len).map(|_| factory()).collect();
        Self {
            elements,
            factory,
            info: OnceLock::new(),
        }
    }

    fn info(&self) -> &ElementInfo {
        self.info.get_or_init(|| probe(&self.factory))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Field> {
        self.elements.get(index).map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut dyn Field> {
        let element = self.elements.get_mut(index)?;
        Some(element.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Field> {
        self.elements.iter().map(|e| e.as_ref())
    }

    pub fn view<F: Field>(&self) -> Result<VecView<'_, F>> {
        check_type::<F>(self.info())?;
        Ok(VecView {
            elements: &self.elements,
            _marker: PhantomData,
        })
    }

    pub fn values<T: FieldValue>(&self) -> Result<Vec<T>> {
        self.iter().map(extract_value::<T>).collect()
    }

    /// Assign element `index` a plain value.
    pub fn set_value<T: FieldValue>(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.elements.len();
        let element = self.elements.get_mut(index).ok_or_else(|| {
            MisuseError::NoSuchField(format!("index {} of array[{}]", index, len))
        })?;
        assign_value(element.as_mut(), value)
    }
}

impl fmt::Debug for ArrayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayField")
            .field("elements", &self.elements)
            .finish_non_exhaustive()
    }
}

impl Field for ArrayField {
    fn kind(&self) -> FieldKind {
        FieldKind::Array
    }

    fn size(&self, start: u64) -> u64 {
        run_size(self.iter(), start)
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        for (index, element) in self.elements.iter_mut().enumerate() {
            let start = reader.position();
            element
                .read(reader, ctx)
                .map_err(|e| e.within(Position::Element { index }, start))?;
        }
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        for (index, element) in self.elements.iter().enumerate() {
            let start = writer.position();
            element
                .write(writer, ctx)
                .map_err(|e| e.within(Position::Element { index }, start))?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
    }

    fn describe(&self) -> String {
        format!("{}[{}]", self.info().description, self.elements.len())
    }

    crate::field_any!();
}

/// Read-only typed view of a vector or array.
pub struct VecView<'a, F: Field> {
    elements: &'a [Box<dyn Field>],
    _marker: PhantomData<&'a F>,
}

impl<'a, F: Field> VecView<'a, F> {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a F> {
        self.elements.get(index).and_then(|e| e.downcast_ref::<F>())
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a F> + 'a {
        self.elements.iter().filter_map(|e| e.downcast_ref::<F>())
    }
}

/// Mutable typed view of a vector.
pub struct VecViewMut<'a, F: Field> {
    inner: &'a mut VectorField,
    _marker: PhantomData<&'a mut F>,
}

impl<F: Field> VecViewMut<'_, F> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut F> {
        self.inner
            .elements
            .get_mut(index)
            .and_then(|e| e.downcast_mut::<F>())
    }

    /// Append a default element.
    pub fn push(&mut self) -> Option<&mut F> {
        self.inner.push_default().downcast_mut::<F>()
    }

    pub fn remove(&mut self, index: usize) -> bool {
        if index < self.inner.elements.len() {
            self.inner.elements.remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// `u32` count followed by that many key/value pairs.
pub struct DictionaryField {
    entries: Vec<(Box<dyn Field>, Box<dyn Field>)>,
    key_factory: FieldFactory,
    value_factory: FieldFactory,
    key_info: OnceLock<ElementInfo>,
    value_info: OnceLock<ElementInfo>,
}

impl DictionaryField {
    pub fn new(key_factory: FieldFactory, value_factory: FieldFactory) -> Self {
        Self {
            entries: Vec::new(),
            key_factory,
            value_factory,
            key_info: OnceLock::new(),
            value_info: OnceLock::new(),
        }
    }

    fn key_info(&self) -> &ElementInfo {
        self.key_info.get_or_init(|| probe(&self.key_factory))
    }

    fn value_info(&self) -> &ElementInfo {
        self.value_info.get_or_init(|| probe(&self.value_factory))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&dyn Field, &dyn Field)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn view<K: Field, V: Field>(&self) -> Result<DictView<'_, K, V>> {
        check_type::<K>(self.key_info())?;
        check_type::<V>(self.value_info())?;
        Ok(DictView {
            entries: &self.entries,
            _marker: PhantomData,
        })
    }

    /// Value stored under a plain key.
    pub fn get_value<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: FieldValue + PartialEq,
        V: FieldValue,
    {
        for (k, v) in &self.entries {
            if extract_value::<K>(k.as_ref())? == *key {
                return extract_value::<V>(v.as_ref()).map(Some);
            }
        }
        Ok(None)
    }

    /// Insert or replace the entry for a plain key, keeping entry order.
    pub fn insert_value<K, V>(&mut self, key: K, value: V) -> Result<()>
    where
        K: FieldValue + PartialEq,
        V: FieldValue,
    {
        for (k, v) in &mut self.entries {
            if extract_value::<K>(k.as_ref())? == key {
                return assign_value(v.as_mut(), value);
            }
        }
        let mut k = (self.key_factory)();
        assign_value(k.as_mut(), key)?;
        let mut v = (self.value_factory)();
        assign_value(v.as_mut(), value)?;
        self.entries.push((k, v));
        Ok(())
    }

    /// Remove the entry for a plain key.
    pub fn remove_value<K>(&mut self, key: &K) -> Result<bool>
    where
        K: FieldValue + PartialEq,
    {
        for index in 0..self.entries.len() {
            if extract_value::<K>(self.entries[index].0.as_ref())? == *key {
                self.entries.remove(index);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Debug for DictionaryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryField")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Field for DictionaryField {
    fn kind(&self) -> FieldKind {
        FieldKind::Dictionary
    }

    fn size(&self, start: u64) -> u64 {
        let mut pos = start + COUNT_SIZE;
        for (key, value) in &self.entries {
            pos += key.size(pos);
            pos += value.size(pos);
        }
        pos - start
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        let offset = reader.position();
        let count = reader.read_u32_le()?;
        ctx.check_count(count, offset)?;

        self.entries.clear();
        for index in 0..count as usize {
            let start = reader.position();
            let mut key = (self.key_factory)();
            let mut value = (self.value_factory)();
            key.read(reader, ctx)
                .and_then(|()| value.read(reader, ctx))
                .map_err(|e| e.within(Position::Entry { index }, start))?;
            self.entries.push((key, value));
        }
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        writer.write_u32_le(count_prefix(self.entries.len())?)?;
        for (index, (key, value)) in self.entries.iter().enumerate() {
            let start = writer.position();
            key.write(writer, ctx)
                .and_then(|()| value.write(writer, ctx))
                .map_err(|e| e.within(Position::Entry { index }, start))?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.entries.clear();
    }

    fn describe(&self) -> String {
        format!(
            "dictionary<{}, {}>",
            self.key_info().description,
            self.value_info().description
        )
    }

    crate::field_any!();
}

/// Read-only typed view of a dictionary.
pub struct DictView<'a, K: Field, V: Field> {
    entries: &'a [(Box<dyn Field>, Box<dyn Field>)],
    _marker: PhantomData<(&'a K, &'a V)>,
}

impl<'a, K: Field, V: Field> DictView<'a, K, V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a K, &'a V)> + 'a {
        self.entries
            .iter()
            .filter_map(|(k, v)| Some((k.downcast_ref::<K>()?, v.downcast_ref::<V>()?)))
    }

    /// First value whose key satisfies `predicate`.
    pub fn find(&self, predicate: impl Fn(&K) -> bool) -> Option<&'a V> {
        self.iter().find(|(k, _)| predicate(k)).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{factory, ScalarField, StrIdField, StringField};
    use crate::strid::StrId;
    use crate::types::TypeRegistry;
    use crate::Error;

    fn encode(field: &dyn Field) -> Vec<u8> {
        let registry = TypeRegistry::new();
        let mut ctx = Context::new(&registry);
        let mut writer = Writer::new();
        field.write(&mut writer, &mut ctx).expect("write");
        assert_eq!(writer.position(), field.size(0));
        writer.into_inner()
    }

    #[test]
    fn test_vector_layout_and_values() {
        let mut vector = VectorField::new(factory::<ScalarField<u16>>());
        vector.set_values([1u16, 2, 3]).expect("u16 elements");
        assert_eq!(
            encode(&vector),
            vec![3, 0, 0, 0, 1, 0, 2, 0, 3, 0]
        );
        assert_eq!(vector.values::<u16>().expect("u16"), vec![1, 2, 3]);
        assert_eq!(vector.describe(), "vector<u16>");
    }

    #[test]
    fn test_vector_view_rejects_wrong_type() {
        let mut vector = VectorField::new(factory::<ScalarField<f32>>());
        assert!(vector.view::<ScalarField<f32>>().is_ok());
        let err = vector.view::<StringField>().err().expect("mismatch");
        assert!(matches!(err, Error::Misuse(MisuseError::TypeMismatch { .. })));

        let mut view = vector.view_mut::<ScalarField<f32>>().expect("f32");
        if let Some(element) = view.push() {
            element.value = 2.5;
        }
        assert_eq!(vector.values::<f32>().expect("f32"), vec![2.5]);
    }

    #[test]
    fn test_vector_element_error_is_positioned() {
        let registry = TypeRegistry::new();
        let mut ctx = Context::new(&registry);
        let bytes = [2u8, 0, 0, 0, 1, 0, 0, 0, 9];
        let mut vector = VectorField::new(factory::<ScalarField<u32>>());
        let err = vector.read(&mut Reader::new(&bytes), &mut ctx).unwrap_err();
        assert_eq!(err.path(), vec![&Position::Element { index: 1 }]);
        assert!(matches!(err.root_cause(), Error::Structural { offset: 8, .. }));
    }

    #[test]
    fn test_array_has_no_count() {
        let mut array = ArrayField::new(factory::<ScalarField<u8>>(), 3);
        array.set_value(1, 7u8).expect("in range");
        assert!(array.set_value(3, 1u8).is_err());
        assert_eq!(encode(&array), vec![0, 7, 0]);
        assert_eq!(array.describe(), "u8[3]");
    }

    #[test]
    fn test_dictionary_insert_replace_and_view() {
        let mut dict = DictionaryField::new(factory::<StrIdField>(), factory::<ScalarField<i32>>());
        let armor = StrId::new("Armor");
        dict.insert_value(armor, 5i32).expect("types match");
        dict.insert_value(StrId::new("Speed"), 2i32).expect("types match");
        dict.insert_value(armor, 6i32).expect("replace");
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get_value::<StrId, i32>(&armor).expect("types"), Some(6));

        let view = dict.view::<StrIdField, ScalarField<i32>>().expect("types");
        assert_eq!(view.find(|k| k.value == armor).map(|v| v.value), Some(6));
        assert!(dict.view::<StringField, ScalarField<i32>>().is_err());

        assert!(dict.remove_value(&armor).expect("types"));
        assert_eq!(encode(&dict).len(), 4 + 8 + 4);
    }

    #[test]
    fn test_count_limit_is_enforced() {
        let registry = TypeRegistry::new();
        let config = crate::CodecConfig::default().with_max_collection_len(1);
        let mut ctx = Context::with_config(&registry, config);
        let bytes = [2u8, 0, 0, 0, 1, 2];
        let mut vector = VectorField::new(factory::<ScalarField<u8>>());
        let err = vector.read(&mut Reader::new(&bytes), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Structural);
    }
}
