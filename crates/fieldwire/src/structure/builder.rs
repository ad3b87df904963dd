// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for [`Schema`].

use super::{Condition, DataStructure, Member, Schema, StructView};
use crate::bag::{BagSchema, PropertyBag};
use crate::error::{MisuseError, Result};
use crate::field::{
    factory, ArrayField, Block, BytesField, DictionaryField, FieldFactory, PaddingField, Scalar,
    ScalarField, StrIdField, StringField, VectorField,
};
use crate::hash::crc64_str;
use crate::heap::HeapPtr;
use crate::types::TypeTagged;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for creating [`Schema`] instances.
///
/// Members are laid out on the wire in declaration order.
pub struct SchemaBuilder {
    name: String,
    parent: Option<Arc<str>>,
    members: Vec<Member>,
}

impl SchemaBuilder {
    pub(super) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            members: Vec::new(),
        }
    }

    /// Add a member built by `factory`.
    pub fn field(mut self, name: impl Into<String>, factory: FieldFactory) -> Self {
        self.members.push(Member {
            name: Arc::from(name.into()),
            factory,
            condition: None,
        });
        self
    }

    /// Add a member present only when `condition` holds for the members
    /// declared before it. Inactive members take no bytes.
    pub fn field_when<C>(mut self, name: impl Into<String>, condition: C, factory: FieldFactory) -> Self
    where
        C: Fn(&StructView<'_>) -> bool + Send + Sync + 'static,
    {
        let condition: Condition = Arc::new(condition);
        self.members.push(Member {
            name: Arc::from(name.into()),
            factory,
            condition: Some(condition),
        });
        self
    }

    /// Copy every member of `parent` (call before declaring own members).
    pub fn extend(mut self, parent: &Arc<Schema>) -> Self {
        self.parent = Some(Arc::clone(&parent.name));
        self.members.extend(parent.members.iter().cloned());
        self
    }

    pub fn scalar<T: Scalar>(self, name: impl Into<String>) -> Self {
        self.field(name, factory::<ScalarField<T>>())
    }

    pub fn scalar_default<T: Scalar>(self, name: impl Into<String>, default: T) -> Self {
        self.field(name, Arc::new(move || Box::new(ScalarField::new(default))))
    }

    /// Length-prefixed UTF-8 string.
    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, factory::<StringField>())
    }

    /// NUL-terminated UTF-8 string.
    pub fn cstring(self, name: impl Into<String>) -> Self {
        self.field(name, Arc::new(|| Box::new(StringField::null_terminated())))
    }

    pub fn strid(self, name: impl Into<String>) -> Self {
        self.field(name, factory::<StrIdField>())
    }

    pub fn bytes(self, name: impl Into<String>, len: usize) -> Self {
        self.field(name, Arc::new(move || Box::new(BytesField::new(len))))
    }

    pub fn padding(self, name: impl Into<String>, alignment: u64) -> Self {
        self.field(name, Arc::new(move || Box::new(PaddingField::new(alignment))))
    }

    pub fn structure(self, name: impl Into<String>, schema: &Arc<Schema>) -> Self {
        self.field(name, DataStructure::factory(schema))
    }

    pub fn bag(self, name: impl Into<String>, schema: &Arc<BagSchema>) -> Self {
        self.field(name, PropertyBag::factory(schema))
    }

    pub fn vector(self, name: impl Into<String>, element: FieldFactory) -> Self {
        self.field(
            name,
            Arc::new(move || Box::new(VectorField::new(Arc::clone(&element)))),
        )
    }

    pub fn array(self, name: impl Into<String>, element: FieldFactory, len: usize) -> Self {
        self.field(
            name,
            Arc::new(move || Box::new(ArrayField::new(Arc::clone(&element), len))),
        )
    }

    pub fn dictionary(self, name: impl Into<String>, key: FieldFactory, value: FieldFactory) -> Self {
        self.field(
            name,
            Arc::new(move || {
                Box::new(DictionaryField::new(Arc::clone(&key), Arc::clone(&value)))
            }),
        )
    }

    /// 8-byte type id followed by the payload of that type.
    pub fn tagged(self, name: impl Into<String>) -> Self {
        self.field(name, factory::<TypeTagged>())
    }

    /// Heap pointer to a field built by `pointee`.
    pub fn pointer(self, name: impl Into<String>, pointee: FieldFactory) -> Self {
        self.field(name, HeapPtr::factory(pointee))
    }

    /// Heap pointer to a type-tagged value.
    pub fn polymorphic_pointer(self, name: impl Into<String>) -> Self {
        self.field(name, Arc::new(|| Box::new(HeapPtr::polymorphic())))
    }

    /// Length-prefixed block around a field built by `inner`.
    pub fn block(self, name: impl Into<String>, inner: FieldFactory) -> Self {
        self.field(name, Arc::new(move || Box::new(Block::new(inner()))))
    }

    /// Length-prefixed block that may be absent (zero length).
    pub fn optional_block(self, name: impl Into<String>, inner: FieldFactory) -> Self {
        self.field(name, Arc::new(move || Box::new(Block::optional(inner()))))
    }

    /// Build the schema, rejecting duplicate member names.
    pub fn build(self) -> Result<Arc<Schema>> {
        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(Arc::clone(&member.name)) {
                return Err(MisuseError::DuplicateName(format!(
                    "{}.{}",
                    self.name, member.name
                ))
                .into());
            }
        }
        Ok(self.build_unchecked())
    }

    /// Build without the duplicate check (callers validated the names).
    pub(crate) fn build_unchecked(self) -> Arc<Schema> {
        let index: HashMap<Arc<str>, usize> = self
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| (Arc::clone(&m.name), i))
            .collect();
        log::debug!(
            "[schema] built `{}` with {} members",
            self.name,
            self.members.len()
        );
        Arc::new(Schema {
            id: crc64_str(&self.name),
            name: Arc::from(self.name),
            parent: self.parent,
            members: self.members,
            index,
        })
    }
}
