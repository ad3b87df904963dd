// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pointers to type-tagged values resolve the concrete type by id.

use fieldwire::{
    codec, Catalog, DataStructure, ErrorKind, HeapPtr, Position, Schema, TypeRegistry, TypeTagged,
};
use std::sync::Arc;

const SHAPES: &str = r#"{ "types": [
    { "kind": "primitive", "name": "uint", "primitive": "u32" },
    { "kind": "struct", "name": "Foo", "fields": [ { "name": "Value", "type": "uint" } ] },
    { "kind": "struct", "name": "Bar", "fields": [ { "name": "Value", "type": "uint" } ] }
] }"#;

fn setup() -> (TypeRegistry, Catalog, Arc<Schema>) {
    let catalog = Catalog::from_json_str(SHAPES).expect("valid catalog");
    let registry = TypeRegistry::new();
    assert_eq!(registry.register_catalog(&catalog).expect("register"), 3);
    let holder = Schema::builder("Holder")
        .polymorphic_pointer("Item")
        .build()
        .expect("valid schema");
    (registry, catalog, holder)
}

fn holder_with(registry: &TypeRegistry, holder: &Arc<Schema>, type_name: &str, value: u32) -> DataStructure {
    let mut tagged = registry.create_tagged(type_name).expect("registered");
    tagged
        .value_mut()
        .and_then(|v| v.downcast_mut::<DataStructure>())
        .expect("struct payload")
        .set("Value", value)
        .expect("u32");

    let mut record = DataStructure::new(holder);
    record
        .get_mut::<HeapPtr>("Item")
        .expect("pointer")
        .set(Box::new(tagged));
    record
}

fn read_back(registry: &TypeRegistry, holder: &Arc<Schema>, bytes: &[u8]) -> (String, u32) {
    let mut record = DataStructure::new(holder);
    codec::decode(&mut record, bytes, registry).expect("decode");
    let target = record
        .get::<HeapPtr>("Item")
        .expect("pointer")
        .target()
        .cloned()
        .expect("non-null");
    let guard = target.read();
    let tagged = guard.cast::<TypeTagged>().expect("tagged pointee");
    let payload = tagged
        .downcast_ref::<DataStructure>()
        .expect("struct payload");
    (
        payload.name().to_string(),
        payload.value::<u32>("Value").expect("u32"),
    )
}

#[test]
fn foo_reads_back_as_foo_not_bar() {
    let (registry, _catalog, holder) = setup();

    let foo = codec::encode(&holder_with(&registry, &holder, "Foo", 5), &registry).expect("encode");
    let bar = codec::encode(&holder_with(&registry, &holder, "Bar", 5), &registry).expect("encode");

    // identical layouts, different type ids
    assert_eq!(foo.len(), 8 + 8 + 4);
    assert_eq!(&foo[8..16], &0x877A_7761_0DF2_6F51u64.to_le_bytes());
    assert_eq!(&bar[8..16], &0xA1BC_9175_E5A4_31D7u64.to_le_bytes());
    assert_eq!(foo[16..], bar[16..]);

    assert_eq!(read_back(&registry, &holder, &foo), ("Foo".to_string(), 5));
    assert_eq!(read_back(&registry, &holder, &bar), ("Bar".to_string(), 5));
}

#[test]
fn unknown_type_id_fails_with_its_hash() {
    let (registry, _catalog, holder) = setup();
    let mut bytes = 8u64.to_le_bytes().to_vec();
    bytes.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
    bytes.extend_from_slice(&5u32.to_le_bytes());

    let mut record = DataStructure::new(&holder);
    let err = codec::decode(&mut record, &bytes, &registry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownType);
    assert_eq!(err.unknown_hash(), Some(0x1122_3344_5566_7788));
    assert!(matches!(err.path()[..], [Position::Field { .. }, Position::Pointee { address: 8 }]));
}

#[test]
fn registering_a_catalog_twice_is_rejected() {
    let (registry, catalog, _) = setup();
    let before = registry.len();
    let err = registry.register_catalog(&catalog).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Misuse);
    assert_eq!(registry.len(), before);
}
