// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Out-of-line allocator turning a graph of referenced fields into inline
//! addresses plus an appended heap region.
//!
//! # Layout
//!
//! ```text
//! [ inline data ........ ][ heap #0 ][ heap #1 ][ heap #2 ] ...
//!        ^ 8-byte address  ^ base      ^ base + size(#0)
//! ```
//!
//! While writing, pointer fields ask the [`HeapManager`] for the address of
//! their target. The first request places the target at the next free
//! address; later requests for the same shared field return that address
//! (shared references are written once). After the inline data,
//! [`Context::write_allocated_fields`](crate::Context::write_allocated_fields)
//! emits the targets in allocation order.
//!
//! While reading, a pointer registers the address it found before visiting
//! the payload; a repeated address resolves to the same shared field.
//!
//! Addresses are relative to the configured origin (`position - origin`)
//! and address 0 is the null sentinel.

use crate::config::{ADDRESS_SIZE, NULL_ADDRESS};
use crate::error::{MisuseError, Position, Result};
use crate::field::{Context, Field, FieldFactory, FieldKind};
use crate::ser::{Reader, Writer};
use crate::types::TypeTagged;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A field that may be referenced from several pointers.
pub type SharedField = Arc<RwLock<Box<dyn Field>>>;

/// Wrap a field for use as a pointer target.
pub fn share(field: Box<dyn Field>) -> SharedField {
    Arc::new(RwLock::new(field))
}

fn identity(field: &SharedField) -> usize {
    Arc::as_ptr(field) as usize
}

/// Allocator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapState {
    Idle,
    /// Allocated fields are being emitted; the table is frozen except for
    /// tail appends from pointers met during the drain.
    Writing,
}

/// One reserved heap slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub address: u64,
    pub size: u64,
}

/// Field <-> address table plus the ordered allocation list.
pub struct HeapManager {
    base: u64,
    next: u64,
    origin: u64,
    state: HeapState,
    allocations: Vec<Allocation>,
    fields: HashMap<u64, SharedField>,
    addresses: HashMap<usize, u64>,
}

impl HeapManager {
    /// Allocator handing out addresses from `base`.
    pub fn new(base: u64) -> Self {
        Self::with_origin(base, 0)
    }

    /// Allocator whose address 0 sits at absolute position `origin`.
    pub fn with_origin(base: u64, origin: u64) -> Self {
        Self {
            base,
            next: base,
            origin,
            state: HeapState::Idle,
            allocations: Vec::new(),
            fields: HashMap::new(),
            addresses: HashMap::new(),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Address the next allocation will receive.
    pub fn next_address(&self) -> u64 {
        self.next
    }

    pub fn origin(&self) -> u64 {
        self.origin
    }

    pub fn state(&self) -> HeapState {
        self.state
    }

    /// Allocations in placement (and write) order.
    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Total bytes reserved so far.
    pub fn heap_size(&self) -> u64 {
        self.next - self.base
    }

    /// Place `field` at the next free address (first time only).
    pub fn allocate(&mut self, field: &SharedField) -> Result<u64> {
        self.ensure_idle("allocate")?;
        if let Some(&address) = self.addresses.get(&identity(field)) {
            return Err(MisuseError::AlreadyAllocated { address }.into());
        }
        self.place(field)
    }

    /// Existing address of `field`, or a fresh allocation.
    pub fn get_address_or_allocate(&mut self, field: &SharedField) -> Result<u64> {
        match self.addresses.get(&identity(field)) {
            Some(&address) => Ok(address),
            None => self.place(field),
        }
    }

    /// Bind `field` to an address found while reading.
    pub fn register(&mut self, address: u64, field: &SharedField) -> Result<()> {
        self.ensure_idle("register")?;
        if address == NULL_ADDRESS {
            return Err(MisuseError::NullAddress { address }.into());
        }
        if let Some(existing) = self.fields.get(&address) {
            if Arc::ptr_eq(existing, field) {
                return Ok(());
            }
            return Err(MisuseError::AddressInUse { address }.into());
        }
        self.fields.insert(address, Arc::clone(field));
        self.addresses.insert(identity(field), address);
        Ok(())
    }

    /// Field bound to `address`, if any.
    pub fn field_at(&self, address: u64) -> Option<SharedField> {
        self.fields.get(&address).cloned()
    }

    /// Address bound to `field`, if any.
    pub fn address_of(&self, field: &SharedField) -> Option<u64> {
        self.addresses.get(&identity(field)).copied()
    }

    /// Clear all state, keeping the base address.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle("reset")?;
        self.clear();
        Ok(())
    }

    /// Clear all state and rebase (fresh pass or nested heap).
    pub fn reset_to(&mut self, base: u64) -> Result<()> {
        self.ensure_idle("reset_to")?;
        self.base = base;
        self.clear();
        Ok(())
    }

    pub(crate) fn begin_write(&mut self) {
        self.state = HeapState::Writing;
    }

    pub(crate) fn end_write(&mut self) {
        self.state = HeapState::Idle;
    }

    pub(crate) fn entry(&self, index: usize) -> Option<(Allocation, SharedField)> {
        let allocation = *self.allocations.get(index)?;
        let field = self.fields.get(&allocation.address)?;
        Some((allocation, Arc::clone(field)))
    }

    fn place(&mut self, field: &SharedField) -> Result<u64> {
        let address = self.next;
        if address == NULL_ADDRESS {
            return Err(MisuseError::NullAddress { address }.into());
        }
        let size = field.read_recursive().size(self.origin + address);
        if size == 0 {
            return Err(MisuseError::EmptyAllocation.into());
        }

        self.next += size;
        self.allocations.push(Allocation { address, size });
        self.fields.insert(address, Arc::clone(field));
        self.addresses.insert(identity(field), address);
        log::trace!("[heap] allocated {} bytes @{:#x}", size, address);
        Ok(address)
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        match self.state {
            HeapState::Idle => Ok(()),
            HeapState::Writing => Err(MisuseError::HeapBusy { operation }.into()),
        }
    }

    fn clear(&mut self) {
        self.next = self.base;
        self.allocations.clear();
        self.fields.clear();
        self.addresses.clear();
    }
}

impl Default for HeapManager {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for HeapManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapManager")
            .field("base", &self.base)
            .field("next", &self.next)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .field("allocations", &self.allocations)
            .finish_non_exhaustive()
    }
}

/// Inline 8-byte heap address pointing at a field of a fixed type.
pub struct HeapPtr {
    target: Option<SharedField>,
    factory: FieldFactory,
    target_name: Option<Arc<str>>,
}

impl HeapPtr {
    /// Null pointer whose pointee is built by `factory` when read.
    pub fn new(factory: FieldFactory) -> Self {
        Self {
            target: None,
            factory,
            target_name: None,
        }
    }

    /// Null pointer with a target type name for diagnostics.
    pub fn named(factory: FieldFactory, target_name: &str) -> Self {
        Self {
            target_name: Some(Arc::from(target_name)),
            ..Self::new(factory)
        }
    }

    /// Pointer to a type-tagged value (the pointee carries its type id).
    pub fn polymorphic() -> Self {
        Self::new(crate::field::factory::<TypeTagged>())
    }

    /// Factory producing null pointers to `factory`'s type.
    pub fn factory(factory: FieldFactory) -> FieldFactory {
        Arc::new(move || Box::new(HeapPtr::new(Arc::clone(&factory))))
    }

    pub fn is_null(&self) -> bool {
        self.target.is_none()
    }

    pub fn target(&self) -> Option<&SharedField> {
        self.target.as_ref()
    }

    /// Point at a new field built by the factory, and return it.
    pub fn make_target(&mut self) -> SharedField {
        let field = share((self.factory)());
        self.target = Some(Arc::clone(&field));
        field
    }

    /// Point at `field`.
    pub fn set(&mut self, field: Box<dyn Field>) -> SharedField {
        let field = share(field);
        self.target = Some(Arc::clone(&field));
        field
    }

    /// Point at an already shared field (shared reference).
    pub fn set_shared(&mut self, field: SharedField) {
        self.target = Some(field);
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Whether two pointers reference the same field.
    pub fn same_target(&self, other: &HeapPtr) -> bool {
        match (&self.target, &other.target) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for HeapPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapPtr")
            .field("target", &self.target.as_ref().map(identity))
            .field("target_name", &self.target_name)
            .finish_non_exhaustive()
    }
}

impl Field for HeapPtr {
    fn kind(&self) -> FieldKind {
        FieldKind::Pointer
    }

    fn size(&self, _start: u64) -> u64 {
        ADDRESS_SIZE
    }

    fn read(&mut self, reader: &mut Reader<'_>, ctx: &mut Context<'_>) -> Result<()> {
        let address = reader.read_u64_le()?;
        if address == NULL_ADDRESS {
            self.target = None;
            return Ok(());
        }
        if let Some(existing) = ctx.heap().field_at(address) {
            self.target = Some(existing);
            return Ok(());
        }

        let field = share((self.factory)());
        ctx.heap_mut().register(address, &field)?;
        let position = ctx.position_of(address);
        let mut pointee = reader
            .fork_at(position)
            .map_err(|e| e.within(Position::Pointee { address }, position))?;
        {
            let mut pointee_field = field.write();
            pointee_field
                .read(&mut pointee, ctx)
                .map_err(|e| e.within(Position::Pointee { address }, position))?;
        }
        ctx.note_extent(pointee.position());
        self.target = Some(field);
        Ok(())
    }

    fn write(&self, writer: &mut Writer, ctx: &mut Context<'_>) -> Result<()> {
        let address = match &self.target {
            Some(field) => ctx.heap_mut().get_address_or_allocate(field)?,
            None => NULL_ADDRESS,
        };
        writer.write_u64_le(address)
    }

    fn reset(&mut self) {
        self.target = None;
    }

    fn describe(&self) -> String {
        match &self.target_name {
            Some(name) => format!("pointer<{}>", name),
            None => "pointer".to_string(),
        }
    }

    crate::field_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::field::{factory, ScalarField};

    fn scalar(value: u32) -> SharedField {
        share(Box::new(ScalarField::new(value)))
    }

    #[test]
    fn test_addresses_increase_in_allocation_order() {
        let mut heap = HeapManager::new(16);
        let a = scalar(1);
        let b = share(Box::new(ScalarField::<u64>::default()));
        let c = scalar(3);

        assert_eq!(heap.allocate(&a).expect("first"), 16);
        assert_eq!(heap.allocate(&b).expect("second"), 20);
        assert_eq!(heap.allocate(&c).expect("third"), 28);
        assert_eq!(heap.heap_size(), 16);
        assert_eq!(
            heap.allocations(),
            &[
                Allocation { address: 16, size: 4 },
                Allocation { address: 20, size: 8 },
                Allocation { address: 28, size: 4 },
            ]
        );
    }

    #[test]
    fn test_get_address_or_allocate_memoizes() {
        let mut heap = HeapManager::new(8);
        let a = scalar(1);
        let first = heap.get_address_or_allocate(&a).expect("allocate");
        let second = heap.get_address_or_allocate(&a).expect("memoized");
        assert_eq!(first, second);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_double_allocate_is_misuse() {
        let mut heap = HeapManager::new(8);
        let a = scalar(1);
        heap.allocate(&a).expect("first");
        let err = heap.allocate(&a).unwrap_err();
        assert!(matches!(
            err,
            Error::Misuse(MisuseError::AlreadyAllocated { address: 8 })
        ));
    }

    #[test]
    fn test_register_conflicts() {
        let mut heap = HeapManager::new(8);
        let a = scalar(1);
        let b = scalar(2);
        heap.register(40, &a).expect("free address");
        heap.register(40, &a).expect("same binding");
        assert!(matches!(
            heap.register(40, &b).unwrap_err(),
            Error::Misuse(MisuseError::AddressInUse { address: 40 })
        ));
        assert!(matches!(
            heap.register(0, &b).unwrap_err(),
            Error::Misuse(MisuseError::NullAddress { .. })
        ));
        assert!(heap.field_at(40).is_some_and(|f| Arc::ptr_eq(&f, &a)));
        assert_eq!(heap.address_of(&a), Some(40));
    }

    #[test]
    fn test_busy_heap_rejects_mutation() {
        let mut heap = HeapManager::new(8);
        let a = scalar(1);
        heap.begin_write();
        assert!(matches!(
            heap.allocate(&a).unwrap_err(),
            Error::Misuse(MisuseError::HeapBusy { operation: "allocate" })
        ));
        assert!(heap.reset().is_err());
        assert!(heap.reset_to(64).is_err());
        assert!(heap.register(8, &a).is_err());

        // pointers met while draining may still append
        assert_eq!(heap.get_address_or_allocate(&a).expect("tail append"), 8);
        heap.end_write();
        heap.reset_to(64).expect("idle again");
        assert_eq!(heap.next_address(), 64);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_empty_and_null_allocations_rejected() {
        let mut heap = HeapManager::new(8);
        let empty = share(Box::new(crate::field::VectorField::new(factory::<ScalarField<u8>>())));
        // an empty vector still has its 4-byte count
        assert!(heap.allocate(&empty).is_ok());

        let padding = share(Box::new(crate::field::PaddingField::new(4)));
        let mut aligned = HeapManager::new(8);
        assert!(matches!(
            aligned.allocate(&padding).unwrap_err(),
            Error::Misuse(MisuseError::EmptyAllocation)
        ));

        let mut zero_base = HeapManager::new(0);
        assert!(matches!(
            zero_base.allocate(&scalar(1)).unwrap_err(),
            Error::Misuse(MisuseError::NullAddress { address: 0 })
        ));
    }
}
