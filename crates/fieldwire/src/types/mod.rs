// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: 64-bit type ids to field factories.
//!
//! # Architecture
//!
//! ```text
//! Catalog (declarative, JSON) ──┐
//!                               ├──> TypeRegistry ──> TypeTagged::read
//! register_concrete::<T>() ─────┘     id = crc64(name)
//! ```
//!
//! Ids are the CRC-64 of the type name. Registering a second name with an
//! id already in use is a [`Error::HashCollision`]; registering the same
//! name twice is [`MisuseError::DuplicateType`].
//!
//! Registries are plain values passed by reference. For programs that want
//! one process-wide registry, [`init_registry`] installs it once and
//! [`registry`] returns it.

pub mod catalog;
pub mod tagged;

pub use catalog::{Catalog, CatalogEntry, CatalogKind, MemberDecl, PrimitiveKind, PropertyDef};
pub use tagged::TypeTagged;

use crate::error::{Error, MisuseError, Result};
use crate::field::{factory, Field, FieldFactory};
use crate::hash::crc64_str;
use crate::strid::known_strings;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Where a registered type comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOrigin {
    Catalog(CatalogKind),
    Concrete,
}

/// One registered type.
pub struct TypeEntry {
    id: u64,
    name: Arc<str>,
    factory: FieldFactory,
    origin: TypeOrigin,
}

impl TypeEntry {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn origin(&self) -> TypeOrigin {
        self.origin
    }

    pub fn factory(&self) -> &FieldFactory {
        &self.factory
    }

    /// Fresh default instance.
    pub fn create(&self) -> Box<dyn Field> {
        (self.factory)()
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("id", &format_args!("{:#018x}", self.id))
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Id and name indexed type table.
#[derive(Default)]
pub struct TypeRegistry {
    by_id: DashMap<u64, Arc<TypeEntry>>,
    by_name: DashMap<Arc<str>, u64>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hand-written field type under `name`.
    ///
    /// When `T` reports its own type id, it must be the id of `name`.
    pub fn register_concrete<T: Field + Default>(&self, name: &str) -> Result<u64> {
        let probe = T::default();
        if let Some(hash) = probe.type_hash() {
            if hash != crc64_str(name) {
                return Err(MisuseError::TypeMismatch {
                    expected: name.to_string(),
                    found: probe.describe(),
                }
                .into());
            }
        }
        self.insert(name, factory::<T>(), TypeOrigin::Concrete)
    }

    /// Register an arbitrary factory under `name`.
    pub fn register_factory(&self, name: &str, factory: FieldFactory) -> Result<u64> {
        self.insert(name, factory, TypeOrigin::Concrete)
    }

    /// Register every type of a validated catalog; returns how many.
    ///
    /// All or nothing: when any name is already taken, no catalog type is
    /// registered.
    pub fn register_catalog(&self, catalog: &Catalog) -> Result<usize> {
        let mut pending = Vec::with_capacity(catalog.len());
        for name in catalog.names() {
            let id = crc64_str(name);
            if let Some(existing) = self.by_id.get(&id) {
                return Err(conflict(id, existing.name(), name));
            }
            let kind = catalog
                .kind_of(name)
                .ok_or_else(|| Error::UnknownTypeName(name.to_string()))?;
            pending.push((name, catalog.factory(name)?, kind));
        }

        // a concurrent registration may still win a slot
        let mut inserted = Vec::with_capacity(pending.len());
        for (name, factory, kind) in pending {
            match self.insert(name, factory, TypeOrigin::Catalog(kind)) {
                Ok(id) => inserted.push(id),
                Err(err) => {
                    self.remove_ids(&inserted);
                    return Err(err);
                }
            }
        }
        log::debug!("[registry] registered {} catalog types", inserted.len());
        Ok(inserted.len())
    }

    fn insert(&self, name: &str, factory: FieldFactory, origin: TypeOrigin) -> Result<u64> {
        let id = crc64_str(name);
        match self.by_id.entry(id) {
            Entry::Occupied(existing) => {
                return Err(conflict(id, existing.get().name(), name));
            }
            Entry::Vacant(slot) => {
                let name: Arc<str> = Arc::from(name);
                slot.insert(Arc::new(TypeEntry {
                    id,
                    name: Arc::clone(&name),
                    factory,
                    origin,
                }));
                known_strings().pin(&name);
                self.by_name.insert(name, id);
            }
        }
        log::debug!("[registry] registered `{}` as {:#018x} ({:?})", name, id, origin);
        Ok(id)
    }

    fn remove_ids(&self, ids: &[u64]) {
        for id in ids {
            if let Some((_, entry)) = self.by_id.remove(id) {
                self.by_name.remove(entry.name());
            }
        }
        log::debug!("[registry] rolled back {} catalog types", ids.len());
    }

    /// O(1) lookup by id.
    pub fn lookup(&self, id: u64) -> Option<Arc<TypeEntry>> {
        self.by_id.get(&id).map(|entry| Arc::clone(&entry))
    }

    pub fn lookup_name(&self, name: &str) -> Option<Arc<TypeEntry>> {
        let id = *self.by_name.get(name)?;
        self.lookup(id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }

    /// New instance of the type registered as `id`.
    pub fn create(&self, id: u64) -> Result<Box<dyn Field>> {
        self.lookup(id)
            .map(|entry| entry.create())
            .ok_or(Error::UnknownType { id })
    }

    /// New instance of the type registered as `name`.
    pub fn create_by_name(&self, name: &str) -> Result<Box<dyn Field>> {
        self.lookup_name(name)
            .map(|entry| entry.create())
            .ok_or_else(|| Error::UnknownTypeName(name.to_string()))
    }

    /// Default instance of `name` wrapped with its type id.
    pub fn create_tagged(&self, name: &str) -> Result<TypeTagged> {
        let entry = self
            .lookup_name(name)
            .ok_or_else(|| Error::UnknownTypeName(name.to_string()))?;
        Ok(TypeTagged::with_id(entry.id, entry.create()))
    }

    /// Registered names, unordered.
    pub fn names(&self) -> Vec<Arc<str>> {
        self.by_name.iter().map(|e| Arc::clone(e.key())).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn conflict(id: u64, existing: &str, incoming: &str) -> Error {
    if existing == incoming {
        return MisuseError::DuplicateType(incoming.to_string()).into();
    }
    Error::HashCollision {
        hash: id,
        existing: existing.to_string(),
        incoming: incoming.to_string(),
    }
}

static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// Install the process-wide registry. The first call wins; later calls
/// return the installed registry and drop `registry`.
pub fn init_registry(registry: TypeRegistry) -> &'static TypeRegistry {
    let mut installed = false;
    let global = REGISTRY.get_or_init(|| {
        installed = true;
        registry
    });
    if installed {
        log::debug!("[registry] global registry installed ({} types)", global.len());
    } else {
        log::warn!("[registry] global registry already installed, ignoring replacement");
    }
    global
}

/// The process-wide registry, if installed.
pub fn registry() -> Option<&'static TypeRegistry> {
    REGISTRY.get()
}
