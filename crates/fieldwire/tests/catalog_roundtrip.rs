// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Catalog files loaded from disk drive registration, encoding and decoding.

use fieldwire::field::{DictionaryField, EnumField, FlagsField, StrIdField};
use fieldwire::{codec, Catalog, DataStructure, ErrorKind, PropertyBag, StrId, TypeRegistry};
use std::io::Write;

const INVENTORY: &str = r#"{ "types": [
    { "kind": "primitive", "name": "uint", "primitive": "u32" },
    { "kind": "primitive", "name": "float", "primitive": "f32" },
    { "kind": "primitive", "name": "text", "primitive": "string" },
    { "kind": "primitive", "name": "name", "primitive": "strid" },
    { "kind": "enum", "name": "Rarity", "underlying": "u8",
      "variants": [ { "name": "Common", "value": 0 }, { "name": "Epic", "value": 3 } ] },
    { "kind": "flags", "name": "ItemFlags", "underlying": "u16",
      "bits": [ { "name": "Stackable", "value": 1 }, { "name": "Quest", "value": 4 } ] },
    { "kind": "bag", "name": "Stats",
      "properties": [ { "name": "Health", "type": "float" }, { "name": "Armor", "type": "float" } ] },
    { "kind": "dictionary", "name": "Counts", "key": "name", "value": "uint" },
    { "kind": "struct", "name": "Item",
      "fields": [ { "name": "Id", "type": "name" }, { "name": "Rarity", "type": "Rarity" },
                  { "name": "Flags", "type": "ItemFlags" }, { "name": "Stats", "type": "Stats" } ] },
    { "kind": "struct", "name": "Inventory",
      "fields": [ { "name": "Owner", "type": "text" }, { "name": "Counts", "type": "Counts" },
                  { "name": "Main", "type": "Item" } ] }
] }"#;

fn load() -> Catalog {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(INVENTORY.as_bytes()).expect("write catalog");
    Catalog::load(file.path()).expect("valid catalog file")
}

#[test]
fn catalog_file_registers_every_type() {
    let catalog = load();
    let registry = TypeRegistry::new();
    assert_eq!(registry.register_catalog(&catalog).expect("register"), catalog.len());
    assert!(registry.lookup_name("Inventory").is_some());
    let health = registry.lookup(0x822B_7328_27A9_418C);
    assert!(health.is_none(), "property names are not types");
}

#[test]
fn inventory_round_trips() {
    let catalog = load();
    let registry = TypeRegistry::new();
    registry.register_catalog(&catalog).expect("register");

    let mut inventory = registry.create_by_name("Inventory").expect("registered");
    {
        let record = inventory.cast_mut::<DataStructure>().expect("struct");
        record.set_text("Owner", "hero").expect("string");
        record
            .get_mut::<DictionaryField>("Counts")
            .expect("dictionary")
            .insert_value(StrId::new("Potion"), 3u32)
            .expect("strid -> u32");

        let item = record.get_mut::<DataStructure>("Main").expect("struct");
        item.set("Id", StrId::new("Sword")).expect("strid");
        item.get_mut::<EnumField<u8>>("Rarity")
            .expect("enum")
            .set_variant("Epic")
            .expect("declared variant");
        let flags = item.get_mut::<FlagsField<u16>>("Flags").expect("flags");
        flags.insert("Stackable").expect("declared bit");
        flags.insert("Quest").expect("declared bit");
        item.get_mut::<PropertyBag>("Stats")
            .expect("bag")
            .set("Armor", 12.5f32)
            .expect("f32");
    }

    let bytes = codec::encode(inventory.as_ref(), &registry).expect("encode");
    // owner 4+4 | counts 4+(8+4) | id 8 | rarity 1 | flags 2 | stats 4+(8+4)
    assert_eq!(bytes.len(), 8 + 16 + 8 + 1 + 2 + 16);

    let mut decoded = catalog.create("Inventory").expect("declared");
    codec::decode(decoded.as_mut(), &bytes, &registry).expect("decode");
    let record = decoded.cast::<DataStructure>().expect("struct");
    assert_eq!(record.text("Owner").expect("string"), "hero");
    assert_eq!(
        record
            .get::<DictionaryField>("Counts")
            .and_then(|d| d.get_value::<StrId, u32>(&StrId::new("Potion")))
            .expect("typed entries"),
        Some(3)
    );

    let item = record.get::<DataStructure>("Main").expect("struct");
    assert_eq!(item.get::<StrIdField>("Id").map(|f| f.value.to_string()).ok(), Some("Sword".into()));
    assert_eq!(item.get::<EnumField<u8>>("Rarity").ok().and_then(|e| e.variant()), Some("Epic"));
    assert_eq!(item.get::<FlagsField<u16>>("Flags").map(|f| f.bits()).ok(), Some(5));
    let stats = item.get::<PropertyBag>("Stats").expect("bag");
    assert_eq!(stats.get::<f32>("Armor").expect("f32"), Some(12.5));
    assert_eq!(stats.get::<f32>("Health").expect("f32"), None);

    assert_eq!(codec::encode(decoded.as_ref(), &registry).expect("re-encode"), bytes);
}

#[test]
fn serialized_catalog_reloads_identically() {
    let catalog = load();
    let json = catalog.to_json_string().expect("serialize");
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write catalog");
    let reloaded = Catalog::load(file.path()).expect("reload");
    assert_eq!(reloaded.entries(), catalog.entries());
    assert!(reloaded.create("Owner").is_err());
    assert!(reloaded.create("Inventory").expect("declared").is::<DataStructure>());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = Catalog::load(dir.path().join("absent.json")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn malformed_json_is_catalog_error() {
    let err = Catalog::from_json_str(r#"{ "types": [ { "kind": "mystery", "name": "M" } ] }"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Catalog);
}
