// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-shape records.
//!
//! A [`Schema`] is declared once per record type and shared by every
//! [`DataStructure`] instance. Members are read and written in declaration
//! order; a failure is wrapped with the member index, name and description
//! and the offset where the member started.
//!
//! # Example
//!
//! ```rust
//! use fieldwire::{codec, DataStructure, Schema, TypeRegistry};
//!
//! let header = Schema::builder("Header")
//!     .scalar::<u32>("version")
//!     .string("name")
//!     .field_when("flags", |s| s.value::<u32>("version").is_some_and(|v| v >= 2),
//!         fieldwire::field::factory::<fieldwire::field::ScalarField<u16>>())
//!     .build()
//!     .unwrap();
//!
//! let mut record = DataStructure::new(&header);
//! record.set("version", 1u32).unwrap();
//! record.set_text("name", "hero").unwrap();
//!
//! let bytes = codec::encode(&record, &TypeRegistry::new()).unwrap();
//! assert_eq!(bytes.len(), 4 + 4 + 4);
//! ```

mod builder;

pub use builder::SchemaBuilder;

use crate::error::{MisuseError, Position, Result};
use crate::field::{
    assign_value, extract_value, Context, Field, FieldFactory, FieldKind, FieldValue, StringField,
};
use crate::ser::{Reader, Writer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over the members preceding a conditional member.
pub type Condition = Arc<dyn Fn(&StructView<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Member {
    name: Arc<str>,
    factory: FieldFactory,
    condition: Option<Condition>,
}

/// Shape of a record type.
pub struct Schema {
    name: Arc<str>,
    id: u64,
    parent: Option<Arc<str>>,
    members: Vec<Member>,
    index: HashMap<Arc<str>, usize>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// CRC-64 of the name.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the schema this one was extended from.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Member names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_ref())
    }

    pub fn is_conditional(&self, index: usize) -> bool {
        self.members
            .get(index)
            .is_some_and(|m| m.condition.is_some())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("members", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// The members of a record that precede a conditional member.
pub struct StructView<'a> {
    schema: &'a Schema,
    fields: &'a [Box<dyn Field>],
}

impl StructView<'_> {
    pub fn field(&self, name: &str) -> Option<&dyn Field> {
        let index = self.schema.index_of(name)?;
        let field = self.fields.get(index)?;
        Some(field.as_ref())
    }

    /// Plain value of a preceding member (`None` if absent or mistyped).
    pub fn value<T: FieldValue>(&self, name: &str) -> Option<T> {
        T::extract(self.field(name)?)
    }
}

/// Instance of a [`Schema`].
pub struct DataStructure {
    schema: Arc<Schema>,
    fields: Vec<Box<dyn Field>>,
}

impl DataStructure {
    pub fn new(schema: &Arc<Schema>) -> Self {
        let fields = schema.members.iter().map(|m| (m.factory)()).collect();
        Self {
            schema: Arc::clone(schema),
            fields,
        }
    }

    /// Factory producing fresh instances of `schema`.
    pub fn factory(schema: &Arc<Schema>) -> FieldFactory {
        let schema = Arc::clone(schema);
        Arc::new(move || Box::new(DataStructure::new(&schema)))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Whether member `index` takes part in the wire layout, given the
    /// current values of the members before it.
    pub fn is_active(&self, index: usize) -> bool {
        match self.schema.members.get(index) {
            Some(Member {
                condition: Some(condition),
                ..
            }) => condition(&StructView {
                schema: &self.schema,
                fields: &self.fields[..index],
            }),
            Some(_) => true,
            None => false,
        }
    }

    /// Members in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Field)> {
        self.schema
            .members
            .iter()
            .zip(self.fields.iter())
            .map(|(m, f)| (m.name.as_ref(), f.as_ref()))
    }

    pub fn field(&self, name: &str) -> Result<&dyn Field> {
        let index = self.require(name)?;
        Ok(self.fields[index].as_ref())
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut dyn Field> {
        let index = self.require(name)?;
        Ok(self.fields[index].as_mut())
    }

    pub fn get<F: Field>(&self, name: &str) -> Result<&F> {
        self.field(name)?.cast::<F>()
    }

    pub fn get_mut<F: Field>(&mut self, name: &str) -> Result<&mut F> {
        self.field_mut(name)?.cast_mut::<F>()
    }

    pub fn value<T: FieldValue>(&self, name: &str) -> Result<T> {
        extract_value(self.field(name)?)
    }

    pub fn set<T: FieldValue>(&mut self, name: &str, value: T) -> Result<()> {
        assign_value(self.field_mut(name)?, value)
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        Ok(self.get::<StringField>(name)?.value.as_str())
    }

    pub fn set_text(&mut self, name: &str, text: impl Into<String>) -> Result<()> {
        self.get_mut::<StringField>(name)?.value = text.into();
        Ok(())
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| MisuseError::NoSuchField(format!("{}.{}", self.schema.name, name)).into())
    }

    fn position(&self, index: usize) -> Position {
        Position::Field {
            index,
            name: Arc::clone(&self.schema.members[index].name),
            description: self.fields[index].describe(),
        }
    }
}

impl fmt::Debug for DataStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        for (name, field) in self.iter() {
            s.field(name, &field);
        }
        s.finish()
    }
}

impl Field for DataStructure {
    fn kind(&self) -> FieldKind {
        FieldKind::Struct
    }

    fn size(&self, start: u64) -> u64 {
        let mut pos = start;
        for (index, field) in self.fields.iter().enumerate() {
            if self.is_active(index) {
                pos += field.size(pos);
            }
        }
        pos - start
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        for index in 0..self.fields.len() {
            if !self.is_active(index) {
                self.fields[index].reset();
                continue;
            }
            let start = reader.position();
            if let Err(e) = self.fields[index].read(reader, ctx) {
                return Err(e.within(self.position(index), start));
            }
        }
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        for (index, field) in self.fields.iter().enumerate() {
            if !self.is_active(index) {
                continue;
            }
            let start = writer.position();
            ctx.push_range(&self.schema.members[index].name, start);
            field
                .write(writer, ctx)
                .map_err(|e| e.within(self.position(index), start))?;
            ctx.pop_range(writer.position());
        }
        Ok(())
    }

    fn reset(&mut self) {
        for field in &mut self.fields {
            field.reset();
        }
    }

    fn describe(&self) -> String {
        format!("struct {}", self.schema.name)
    }

    fn type_name(&self) -> Option<&str> {
        Some(&self.schema.name)
    }

    fn type_hash(&self) -> Option<u64> {
        Some(self.schema.id)
    }

    crate::field_any!();
}
