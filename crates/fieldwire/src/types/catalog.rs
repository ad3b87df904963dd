// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative type catalogs.
//!
//! A catalog lists named types, each referring to others by name:
//!
//! ```json
//! { "types": [
//!     { "kind": "primitive", "name": "float", "primitive": "f32" },
//!     { "kind": "struct", "name": "Vec2",
//!       "fields": [ { "name": "X", "type": "float" }, { "name": "Y", "type": "float" } ] },
//!     { "kind": "vector", "name": "Path", "element": "Vec2" }
//! ] }
//! ```
//!
//! [`Catalog::new`] validates the whole set up front (unique names and ids,
//! resolvable references, acyclic inheritance and by-value containment).
//! Struct, bag and enum descriptors are built once during validation and
//! shared by every instance, so instantiating a validated entry cannot fail.
//!
//! References through vectors, dictionaries and pointers are resolved
//! lazily, so a type may contain a collection of itself.

use crate::bag::{BagSchema, PropertyBag};
use crate::error::{Error, MisuseError, Result};
use crate::field::{
    ArrayField, DictionaryField, EnumDescriptor, EnumField, EnumVariant, Field, FieldFactory,
    FlagsField, ScalarField, ScalarKind, StrIdField, StringField, VectorField,
};
use crate::hash::{crc64_str, Crc64Keys, KeyGenerator};
use crate::heap::HeapPtr;
use crate::structure::{DataStructure, Schema};
use crate::types::TypeTagged;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Build `$field::<R>::new($descriptor)` for the integer width of `$kind`.
macro_rules! by_repr {
    ($kind:expr, $field:ident, $descriptor:expr) => {
        match $kind {
            ScalarKind::U8 => Box::new($field::<u8>::new($descriptor)) as Box<dyn Field>,
            ScalarKind::U16 => Box::new($field::<u16>::new($descriptor)),
            ScalarKind::U64 => Box::new($field::<u64>::new($descriptor)),
            ScalarKind::I8 => Box::new($field::<i8>::new($descriptor)),
            ScalarKind::I16 => Box::new($field::<i16>::new($descriptor)),
            ScalarKind::I32 => Box::new($field::<i32>::new($descriptor)),
            ScalarKind::I64 => Box::new($field::<i64>::new($descriptor)),
            // non-integer kinds are rejected by validation
            ScalarKind::U32 | ScalarKind::Bool | ScalarKind::F32 | ScalarKind::F64 => {
                Box::new($field::<u32>::new($descriptor))
            }
        }
    };
}

/// Leaf types a catalog can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
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
    /// Length-prefixed UTF-8.
    String,
    /// NUL-terminated UTF-8.
    Cstring,
    Strid,
}

/// Named reference to another catalog type (struct member or bag property).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl MemberDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Bag properties are declared like struct members.
pub type PropertyDef = MemberDecl;

/// One catalog type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogEntry {
    Primitive {
        name: String,
        primitive: PrimitiveKind,
    },
    /// Members of `parent` come first on the wire.
    Struct {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default)]
        fields: Vec<MemberDecl>,
    },
    Enum {
        name: String,
        underlying: ScalarKind,
        variants: Vec<EnumVariant>,
    },
    Flags {
        name: String,
        underlying: ScalarKind,
        bits: Vec<EnumVariant>,
    },
    Vector {
        name: String,
        element: String,
    },
    Array {
        name: String,
        element: String,
        len: usize,
    },
    Dictionary {
        name: String,
        key: String,
        value: String,
    },
    /// Alias with the same encoding as `target`.
    Typedef {
        name: String,
        target: String,
    },
    /// Heap pointer to `target`, or to a type-tagged value when polymorphic.
    Pointer {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default)]
        polymorphic: bool,
    },
    Tagged {
        name: String,
    },
    Bag {
        name: String,
        properties: Vec<PropertyDef>,
    },
}

/// Discriminant of a [`CatalogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Primitive,
    Struct,
    Enum,
    Flags,
    Vector,
    Array,
    Dictionary,
    Typedef,
    Pointer,
    Tagged,
    Bag,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CatalogKind::Primitive => "primitive",
            CatalogKind::Struct => "struct",
            CatalogKind::Enum => "enum",
            CatalogKind::Flags => "flags",
            CatalogKind::Vector => "vector",
            CatalogKind::Array => "array",
            CatalogKind::Dictionary => "dictionary",
            CatalogKind::Typedef => "typedef",
            CatalogKind::Pointer => "pointer",
            CatalogKind::Tagged => "tagged",
            CatalogKind::Bag => "bag",
        };
        f.write_str(name)
    }
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        match self {
            CatalogEntry::Primitive { name, .. }
            | CatalogEntry::Struct { name, .. }
            | CatalogEntry::Enum { name, .. }
            | CatalogEntry::Flags { name, .. }
            | CatalogEntry::Vector { name, .. }
            | CatalogEntry::Array { name, .. }
            | CatalogEntry::Dictionary { name, .. }
            | CatalogEntry::Typedef { name, .. }
            | CatalogEntry::Pointer { name, .. }
            | CatalogEntry::Tagged { name }
            | CatalogEntry::Bag { name, .. } => name,
        }
    }

    pub fn kind(&self) -> CatalogKind {
        match self {
            CatalogEntry::Primitive { .. } => CatalogKind::Primitive,
            CatalogEntry::Struct { .. } => CatalogKind::Struct,
            CatalogEntry::Enum { .. } => CatalogKind::Enum,
            CatalogEntry::Flags { .. } => CatalogKind::Flags,
            CatalogEntry::Vector { .. } => CatalogKind::Vector,
            CatalogEntry::Array { .. } => CatalogKind::Array,
            CatalogEntry::Dictionary { .. } => CatalogKind::Dictionary,
            CatalogEntry::Typedef { .. } => CatalogKind::Typedef,
            CatalogEntry::Pointer { .. } => CatalogKind::Pointer,
            CatalogEntry::Tagged { .. } => CatalogKind::Tagged,
            CatalogEntry::Bag { .. } => CatalogKind::Bag,
        }
    }

    /// Every type name this entry refers to, with whether the referenced
    /// value is stored inline (a containment edge).
    fn references(&self) -> Vec<(&str, bool)> {
        match self {
            CatalogEntry::Primitive { .. }
            | CatalogEntry::Enum { .. }
            | CatalogEntry::Flags { .. }
            | CatalogEntry::Tagged { .. } => Vec::new(),
            CatalogEntry::Struct { parent, fields, .. } => parent
                .iter()
                .map(|p| (p.as_str(), true))
                .chain(fields.iter().map(|m| (m.ty.as_str(), true)))
                .collect(),
            CatalogEntry::Vector { element, .. } => vec![(element.as_str(), false)],
            CatalogEntry::Array { element, .. } => vec![(element.as_str(), true)],
            CatalogEntry::Dictionary { key, value, .. } => {
                vec![(key.as_str(), false), (value.as_str(), false)]
            }
            CatalogEntry::Typedef { target, .. } => vec![(target.as_str(), true)],
            CatalogEntry::Pointer { target, .. } => {
                target.iter().map(|t| (t.as_str(), false)).collect()
            }
            CatalogEntry::Bag { properties, .. } => {
                properties.iter().map(|p| (p.ty.as_str(), true)).collect()
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    types: Vec<CatalogEntry>,
}

/// Descriptor built once per entry.
enum Shape {
    Struct(Arc<Schema>),
    Bag(Arc<BagSchema>),
    Enum(Arc<EnumDescriptor>),
}

struct CatalogInner {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    shapes: Vec<OnceLock<Shape>>,
}

/// Validated set of named types. Cheap to clone.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

impl Catalog {
    /// Validate `entries` and build the catalog.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        let mut ids: HashMap<u64, &str> = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let name = entry.name();
            if index.insert(name.to_string(), i).is_some() {
                return Err(Error::Catalog(format!("type `{}` is declared twice", name)));
            }
            let id = crc64_str(name);
            if let Some(existing) = ids.insert(id, name) {
                return Err(Error::HashCollision {
                    hash: id,
                    existing: existing.to_string(),
                    incoming: name.to_string(),
                });
            }
        }

        let shapes = entries.iter().map(|_| OnceLock::new()).collect();
        let catalog = Self {
            inner: Arc::new(CatalogInner {
                entries,
                index,
                shapes,
            }),
        };
        catalog.validate()?;
        log::debug!("[catalog] validated {} types", catalog.len());
        Ok(catalog)
    }

    /// Parse `{ "types": [...] }`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.types)
    }

    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self> {
        let file: CatalogFile = serde_json::from_reader(reader)?;
        Self::new(file.types)
    }

    /// Load a JSON catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let catalog = Self::from_json_reader(BufReader::new(File::open(path)?))?;
        log::debug!("[catalog] loaded {} types from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Serialize back to the JSON form accepted by [`Catalog::from_json_str`].
    pub fn to_json_string(&self) -> Result<String> {
        let file = CatalogFile {
            types: self.inner.entries.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Type names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.iter().map(CatalogEntry::name)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.inner.entries
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.inner.index.get(name).map(|&i| &self.inner.entries[i])
    }

    pub fn kind_of(&self, name: &str) -> Option<CatalogKind> {
        self.get(name).map(CatalogEntry::kind)
    }

    /// Factory for `name`, resolved when called.
    pub fn factory(&self, name: &str) -> Result<FieldFactory> {
        Ok(self.lazy(self.require(name)?))
    }

    /// Default instance of `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Field>> {
        self.instantiate(self.require(name)?)
    }

    /// Flattened schema of a struct entry.
    pub fn schema(&self, name: &str) -> Result<Arc<Schema>> {
        match self.shape(self.require(name)?) {
            Some(Shape::Struct(schema)) => Ok(Arc::clone(schema)),
            _ => Err(self.wrong_kind(name, "struct")),
        }
    }

    pub fn bag_schema(&self, name: &str) -> Result<Arc<BagSchema>> {
        match self.shape(self.require(name)?) {
            Some(Shape::Bag(schema)) => Ok(Arc::clone(schema)),
            _ => Err(self.wrong_kind(name, "bag")),
        }
    }

    /// Descriptor of an enum or flags entry.
    pub fn enum_descriptor(&self, name: &str) -> Result<Arc<EnumDescriptor>> {
        match self.shape(self.require(name)?) {
            Some(Shape::Enum(descriptor)) => Ok(Arc::clone(descriptor)),
            _ => Err(self.wrong_kind(name, "enum")),
        }
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.inner
            .index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTypeName(name.to_string()))
    }

    fn wrong_kind(&self, name: &str, expected: &str) -> Error {
        MisuseError::TypeMismatch {
            expected: expected.to_string(),
            found: self
                .kind_of(name)
                .map_or_else(|| "unknown".to_string(), |k| k.to_string()),
        }
        .into()
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    fn validate(&self) -> Result<()> {
        let entries = &self.inner.entries;
        for entry in entries {
            for (target, _) in entry.references() {
                if !self.inner.index.contains_key(target) {
                    return Err(Error::Catalog(format!(
                        "`{}` references unknown type `{}`",
                        entry.name(),
                        target
                    )));
                }
            }
        }
        for entry in entries {
            self.validate_entry(entry)?;
        }
        self.check_containment()?;
        self.check_shapes()
    }

    /// Build every descriptor now, so instantiation cannot fail later.
    fn check_shapes(&self) -> Result<()> {
        for index in 0..self.inner.entries.len() {
            let matches = match &self.inner.entries[index] {
                CatalogEntry::Struct { .. } => matches!(self.shape(index), Some(Shape::Struct(_))),
                CatalogEntry::Bag { .. } => matches!(self.shape(index), Some(Shape::Bag(_))),
                CatalogEntry::Enum { .. } | CatalogEntry::Flags { .. } => {
                    matches!(self.shape(index), Some(Shape::Enum(_)))
                }
                _ => true,
            };
            if !matches {
                return Err(self.shape_mismatch(index));
            }
        }
        Ok(())
    }

    fn shape_mismatch(&self, index: usize) -> Error {
        let entry = &self.inner.entries[index];
        Error::Catalog(format!(
            "descriptor of `{}` does not match its {} entry",
            entry.name(),
            entry.kind()
        ))
    }

    fn validate_entry(&self, entry: &CatalogEntry) -> Result<()> {
        match entry {
            CatalogEntry::Struct { name, .. } => {
                let chain = self.inheritance_chain(name)?;
                let mut seen = HashSet::new();
                for level in chain.iter().rev() {
                    if let CatalogEntry::Struct { fields, .. } = &self.inner.entries[*level] {
                        for member in fields {
                            if !seen.insert(member.name.as_str()) {
                                return Err(Error::Catalog(format!(
                                    "`{}` declares member `{}` twice (including inherited members)",
                                    name, member.name
                                )));
                            }
                        }
                    }
                }
                Ok(())
            }
            CatalogEntry::Enum {
                name, underlying, ..
            }
            | CatalogEntry::Flags {
                name, underlying, ..
            } => {
                if underlying.is_integer() {
                    Ok(())
                } else {
                    Err(Error::Catalog(format!(
                        "`{}` has non-integer underlying type {}",
                        name, underlying
                    )))
                }
            }
            CatalogEntry::Pointer {
                name,
                target: None,
                polymorphic: false,
            } => Err(Error::Catalog(format!(
                "pointer `{}` has no target and is not polymorphic",
                name
            ))),
            CatalogEntry::Bag { name, properties } => {
                let mut keys: HashMap<u64, &str> = HashMap::new();
                for property in properties {
                    let key = Crc64Keys.key(&property.name);
                    if let Some(existing) = keys.insert(key, property.name.as_str()) {
                        if existing == property.name {
                            return Err(Error::Catalog(format!(
                                "`{}` declares property `{}` twice",
                                name, property.name
                            )));
                        }
                        return Err(Error::HashCollision {
                            hash: key,
                            existing: existing.to_string(),
                            incoming: property.name.clone(),
                        });
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Indices from `name` up to its root ancestor.
    fn inheritance_chain(&self, name: &str) -> Result<Vec<usize>> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            let index = self.inner.index[type_name];
            if chain.contains(&index) {
                return Err(Error::Catalog(format!(
                    "inheritance cycle through `{}`",
                    type_name
                )));
            }
            chain.push(index);
            current = match &self.inner.entries[index] {
                CatalogEntry::Struct { parent, .. } => parent.as_deref(),
                _ => {
                    return Err(Error::Catalog(format!(
                        "`{}` inherits from `{}`, which is not a struct",
                        name, type_name
                    )))
                }
            };
        }
        Ok(chain)
    }

    /// Reject types that would contain themselves by value.
    fn check_containment(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(catalog: &Catalog, index: usize, marks: &mut [Mark]) -> Result<()> {
            match marks[index] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(Error::Catalog(format!(
                        "`{}` contains itself by value",
                        catalog.inner.entries[index].name()
                    )))
                }
                Mark::New => {}
            }
            marks[index] = Mark::Active;
            for (target, inline) in catalog.inner.entries[index].references() {
                if inline {
                    visit(catalog, catalog.inner.index[target], marks)?;
                }
            }
            marks[index] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.len()];
        for index in 0..self.len() {
            visit(self, index, &mut marks)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Instantiation (cannot fail once validated)
    // ---------------------------------------------------------------------

    fn lazy(&self, index: usize) -> FieldFactory {
        let catalog = self.clone();
        Arc::new(move || {
            let field = catalog.instantiate(index);
            debug_assert!(field.is_ok(), "validated catalog failed to instantiate");
            field.unwrap_or_else(|err| {
                log::error!("[catalog] {}", err);
                let fallback: Box<dyn Field> = Box::new(TypeTagged::null());
                fallback
            })
        })
    }

    fn lazy_named(&self, name: &str) -> FieldFactory {
        self.lazy(self.inner.index[name])
    }

    fn instantiate(&self, index: usize) -> Result<Box<dyn Field>> {
        let field: Box<dyn Field> = match &self.inner.entries[index] {
            CatalogEntry::Primitive { primitive, .. } => primitive_field(*primitive),
            CatalogEntry::Struct { .. } => match self.shape(index) {
                Some(Shape::Struct(schema)) => Box::new(DataStructure::new(schema)),
                _ => return Err(self.shape_mismatch(index)),
            },
            CatalogEntry::Bag { .. } => match self.shape(index) {
                Some(Shape::Bag(schema)) => Box::new(PropertyBag::new(schema)),
                _ => return Err(self.shape_mismatch(index)),
            },
            CatalogEntry::Enum { underlying, .. } => match self.shape(index) {
                Some(Shape::Enum(descriptor)) => {
                    by_repr!(*underlying, EnumField, Arc::clone(descriptor))
                }
                _ => return Err(self.shape_mismatch(index)),
            },
            CatalogEntry::Flags { underlying, .. } => match self.shape(index) {
                Some(Shape::Enum(descriptor)) => {
                    by_repr!(*underlying, FlagsField, Arc::clone(descriptor))
                }
                _ => return Err(self.shape_mismatch(index)),
            },
            CatalogEntry::Vector { element, .. } => {
                Box::new(VectorField::new(self.lazy_named(element)))
            }
            CatalogEntry::Array { element, len, .. } => {
                Box::new(ArrayField::new(self.lazy_named(element), *len))
            }
            CatalogEntry::Dictionary { key, value, .. } => Box::new(DictionaryField::new(
                self.lazy_named(key),
                self.lazy_named(value),
            )),
            CatalogEntry::Typedef { target, .. } => {
                return self.instantiate(self.inner.index[target.as_str()]);
            }
            CatalogEntry::Pointer {
                target,
                polymorphic,
                ..
            } => match target {
                Some(target) if !polymorphic => {
                    Box::new(HeapPtr::named(self.lazy_named(target), target))
                }
                _ => Box::new(HeapPtr::polymorphic()),
            },
            CatalogEntry::Tagged { .. } => Box::new(TypeTagged::null()),
        };
        Ok(field)
    }

    fn shape(&self, index: usize) -> Option<&Shape> {
        let build = || match &self.inner.entries[index] {
            CatalogEntry::Struct {
                name,
                parent,
                fields,
            } => {
                let mut builder = Schema::builder(name.as_str());
                if let Some(parent) = parent {
                    if let Some(Shape::Struct(parent)) = self.shape(self.inner.index[parent.as_str()]) {
                        builder = builder.extend(parent);
                    }
                }
                for member in fields {
                    builder = builder.field(member.name.as_str(), self.lazy_named(&member.ty));
                }
                Some(Shape::Struct(builder.build_unchecked()))
            }
            CatalogEntry::Bag { name, properties } => {
                let mut builder = PropertyBag::builder(name.as_str());
                for property in properties {
                    builder = builder.property(property.name.as_str(), self.lazy_named(&property.ty));
                }
                Some(Shape::Bag(builder.build_unchecked()))
            }
            CatalogEntry::Enum {
                name,
                underlying,
                variants,
            } => Some(Shape::Enum(Arc::new(EnumDescriptor::new(
                name.as_str(),
                *underlying,
                variants.clone(),
            )))),
            CatalogEntry::Flags {
                name,
                underlying,
                bits,
            } => Some(Shape::Enum(Arc::new(EnumDescriptor::new(
                name.as_str(),
                *underlying,
                bits.clone(),
            )))),
            _ => None,
        };

        let cell = &self.inner.shapes[index];
        if let Some(shape) = cell.get() {
            return Some(shape);
        }
        let shape = build()?;
        // a concurrent builder may have won; its descriptor is equivalent
        Some(cell.get_or_init(|| shape))
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("types", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

fn primitive_field(kind: PrimitiveKind) -> Box<dyn Field> {
    match kind {
        PrimitiveKind::Bool => Box::new(ScalarField::<bool>::default()),
        PrimitiveKind::U8 => Box::new(ScalarField::<u8>::default()),
        PrimitiveKind::U16 => Box::new(ScalarField::<u16>::default()),
        PrimitiveKind::U32 => Box::new(ScalarField::<u32>::default()),
        PrimitiveKind::U64 => Box::new(ScalarField::<u64>::default()),
        PrimitiveKind::I8 => Box::new(ScalarField::<i8>::default()),
        PrimitiveKind::I16 => Box::new(ScalarField::<i16>::default()),
        PrimitiveKind::I32 => Box::new(ScalarField::<i32>::default()),
        PrimitiveKind::I64 => Box::new(ScalarField::<i64>::default()),
        PrimitiveKind::F32 => Box::new(ScalarField::<f32>::default()),
        PrimitiveKind::F64 => Box::new(ScalarField::<f64>::default()),
        PrimitiveKind::String => Box::new(StringField::default()),
        PrimitiveKind::Cstring => Box::new(StringField::null_terminated()),
        PrimitiveKind::Strid => Box::new(StrIdField::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const GAME: &str = r#"{ "types": [
        { "kind": "primitive", "name": "float", "primitive": "f32" },
        { "kind": "primitive", "name": "uint", "primitive": "u32" },
        { "kind": "primitive", "name": "name", "primitive": "strid" },
        { "kind": "struct", "name": "Entity", "fields": [ { "name": "Id", "type": "uint" } ] },
        { "kind": "struct", "name": "Actor", "parent": "Entity",
          "fields": [ { "name": "Speed", "type": "float" }, { "name": "Children", "type": "ActorList" } ] },
        { "kind": "vector", "name": "ActorList", "element": "Actor" },
        { "kind": "enum", "name": "Team", "underlying": "u8",
          "variants": [ { "name": "Red", "value": 1 }, { "name": "Blue", "value": 2 } ] },
        { "kind": "typedef", "name": "Speed", "target": "float" },
        { "kind": "pointer", "name": "ActorRef", "target": "Actor" },
        { "kind": "bag", "name": "Stats", "properties": [ { "name": "Health", "type": "float" } ] }
    ] }"#;

    fn err_of(json: &str) -> Error {
        Catalog::from_json_str(json).unwrap_err()
    }

    #[test]
    fn test_mismatched_descriptor_fails_creation() {
        let entries = vec![CatalogEntry::Struct {
            name: "Lone".into(),
            parent: None,
            fields: Vec::new(),
        }];
        let shapes: Vec<OnceLock<Shape>> = vec![OnceLock::new()];
        assert!(shapes[0]
            .set(Shape::Enum(Arc::new(EnumDescriptor::new("Lone", ScalarKind::U8, Vec::new()))))
            .is_ok());
        let catalog = Catalog {
            inner: Arc::new(CatalogInner {
                entries,
                index: HashMap::from([("Lone".to_string(), 0)]),
                shapes,
            }),
        };

        let err = catalog.create("Lone").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Catalog);
        assert!(err.to_string().contains("`Lone`"));
        assert_eq!(catalog.validate().unwrap_err().kind(), ErrorKind::Catalog);
    }

    #[test]
    fn test_every_validated_entry_instantiates() {
        let catalog = Catalog::from_json_str(GAME).expect("valid catalog");
        for name in catalog.names() {
            catalog.create(name).expect("validated entries instantiate");
        }
    }

    #[test]
    fn test_struct_inherits_parent_members_first() {
        let catalog = Catalog::from_json_str(GAME).expect("valid catalog");
        let schema = catalog.schema("Actor").expect("struct");
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["Id", "Speed", "Children"]);
        assert_eq!(schema.parent(), Some("Entity"));
        assert!(Arc::ptr_eq(&schema, &catalog.schema("Actor").expect("cached")));
    }

    #[test]
    fn test_self_containing_vector_is_allowed() {
        let catalog = Catalog::from_json_str(GAME).expect("valid catalog");
        let actor = catalog.create("Actor").expect("declared");
        let actor = actor.cast::<DataStructure>().expect("struct");
        assert_eq!(actor.get::<VectorField>("Children").map(|v| v.len()).ok(), Some(0));
        assert_eq!(actor.size(0), 4 + 4 + 4);
    }

    #[test]
    fn test_entry_kinds_instantiate() {
        let catalog = Catalog::from_json_str(GAME).expect("valid catalog");
        let team = catalog.create("Team").expect("declared");
        assert_eq!(team.cast::<EnumField<u8>>().map(|e| e.value()).ok(), Some(1));
        assert!(catalog.create("Speed").expect("typedef").is::<ScalarField<f32>>());
        assert!(catalog.create("ActorRef").expect("pointer").is::<HeapPtr>());
        assert!(catalog.create("Stats").expect("bag").is::<PropertyBag>());
        assert_eq!(catalog.kind_of("ActorList"), Some(CatalogKind::Vector));
        assert!(catalog.schema("Team").is_err());
        assert_eq!(
            catalog.create("Ghost").unwrap_err().kind(),
            ErrorKind::UnknownType
        );
    }

    #[test]
    fn test_invalid_catalogs_are_rejected() {
        let unresolved = err_of(r#"{ "types": [ { "kind": "vector", "name": "V", "element": "Nope" } ] }"#);
        assert_eq!(unresolved.kind(), ErrorKind::Catalog);

        let duplicate = err_of(
            r#"{ "types": [ { "kind": "tagged", "name": "T" }, { "kind": "tagged", "name": "T" } ] }"#,
        );
        assert_eq!(duplicate.kind(), ErrorKind::Catalog);

        let bad_parent = err_of(
            r#"{ "types": [ { "kind": "tagged", "name": "T" },
                            { "kind": "struct", "name": "S", "parent": "T" } ] }"#,
        );
        assert!(bad_parent.to_string().contains("not a struct"));

        let cycle = err_of(
            r#"{ "types": [ { "kind": "struct", "name": "A", "parent": "B" },
                            { "kind": "struct", "name": "B", "parent": "A" } ] }"#,
        );
        assert!(cycle.to_string().contains("inheritance cycle"));

        let float_enum = err_of(
            r#"{ "types": [ { "kind": "enum", "name": "E", "underlying": "f32", "variants": [] } ] }"#,
        );
        assert_eq!(float_enum.kind(), ErrorKind::Catalog);

        let dangling = err_of(r#"{ "types": [ { "kind": "pointer", "name": "P" } ] }"#);
        assert!(dangling.to_string().contains("no target"));
    }

    #[test]
    fn test_by_value_containment_cycle_is_rejected() {
        let err = err_of(
            r#"{ "types": [
                { "kind": "struct", "name": "Node", "fields": [ { "name": "Next", "type": "Alias" } ] },
                { "kind": "typedef", "name": "Alias", "target": "Node" }
            ] }"#,
        );
        assert!(err.to_string().contains("contains itself by value"));

        // the same shape through a pointer is fine
        Catalog::from_json_str(
            r#"{ "types": [
                { "kind": "struct", "name": "Node", "fields": [ { "name": "Next", "type": "NodeRef" } ] },
                { "kind": "pointer", "name": "NodeRef", "target": "Node" }
            ] }"#,
        )
        .expect("pointer breaks the cycle");
    }

    #[test]
    fn test_inherited_member_redeclared_is_rejected() {
        let err = err_of(
            r#"{ "types": [
                { "kind": "primitive", "name": "u", "primitive": "u8" },
                { "kind": "struct", "name": "Base", "fields": [ { "name": "A", "type": "u" } ] },
                { "kind": "struct", "name": "Derived", "parent": "Base", "fields": [ { "name": "A", "type": "u" } ] }
            ] }"#,
        );
        assert!(err.to_string().contains("declares member `A` twice"));
    }

    #[test]
    fn test_json_round_trip() {
        let catalog = Catalog::from_json_str(GAME).expect("valid catalog");
        let json = catalog.to_json_string().expect("serialize");
        let again = Catalog::from_json_str(&json).expect("reparse");
        assert_eq!(again.entries(), catalog.entries());
    }
}
