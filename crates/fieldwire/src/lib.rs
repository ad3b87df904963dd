// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # fieldwire - binary serialization core for game file formats
//!
//! Format readers describe their records with schemas and get byte-exact
//! reading and writing of fixed structures, hash-keyed property bags,
//! heap-indirected pointer graphs and type-tagged polymorphic values.
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldwire::{codec, PropertyBag, TypeRegistry};
//!
//! let schema = PropertyBag::builder("Position")
//!     .scalar::<f32>("X")
//!     .scalar::<f32>("Y")
//!     .build()?;
//!
//! let mut bag = PropertyBag::new(&schema);
//! bag.set("X", 1.0f32)?;
//!
//! let registry = TypeRegistry::new();
//! let bytes = codec::encode(&bag, &registry)?;
//! assert_eq!(bytes.len(), 4 + 8 + 4);
//! # Ok::<(), fieldwire::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  codec (Encoder / Decoder)               aio (feature "async")      |
//! +---------------------------------------------------------------------+
//! |  DataStructure (Schema)  |  PropertyBag (BagSchema)  |  TypeTagged  |
//! +---------------------------------------------------------------------+
//! |  field: scalars, strings, enums, collections, blocks  |  HeapPtr    |
//! +---------------------------------------------------------------------+
//! |  TypeRegistry / Catalog  |  HeapManager  |  StrId / KnownStrings    |
//! +---------------------------------------------------------------------+
//! |  ser (Reader / Writer)   |  hash (CRC-64)  |  config  |  error      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Field`] | Contract every wire element implements |
//! | [`DataStructure`] | Ordered members described by a [`Schema`] |
//! | [`PropertyBag`] | CRC-64 keyed properties with per-property presence |
//! | [`HeapPtr`] | Inline address of a field written to the heap region |
//! | [`TypeTagged`] | Value prefixed with its registered type id |
//! | [`TypeRegistry`] | Type id to factory table, filled from a [`Catalog`] or by hand |
//! | [`StrId`] | Hashed identifier with best-effort reverse lookup |

/// Top-level encode/decode drivers.
pub mod codec;
/// Wire constants and codec configuration.
pub mod config;
/// Error taxonomy.
pub mod error;
/// The field contract and leaf/collection fields.
pub mod field;
/// CRC-64 and property key generation.
pub mod hash;
/// Heap allocator and pointer field.
pub mod heap;
/// Named range recording during writes.
pub mod mapper;
/// Little-endian binary cursors.
pub mod ser;
/// Hashed string identifiers.
pub mod strid;
/// Type registry, catalogs and type-tagged values.
pub mod types;

/// Hash-keyed property bags.
pub mod bag;
/// Fixed-layout structures and the schema builder.
pub mod structure;

/// Async stream mirror of [`codec`].
#[cfg(feature = "async")]
pub mod aio;

pub use bag::{BagSchema, Presence, PropertyBag};
pub use codec::{Decoded, Decoder, Encoder};
pub use config::CodecConfig;
pub use error::{Error, ErrorKind, MisuseError, Position, Result};
pub use field::{Context, Field, FieldFactory, FieldKind, FieldValue};
pub use heap::{HeapManager, HeapPtr, SharedField};
pub use mapper::{DataMapper, RangeRecorder};
pub use strid::{Resolved, StrId};
pub use structure::{DataStructure, Schema, SchemaBuilder};
pub use types::{init_registry, registry, Catalog, TypeRegistry, TypeTagged};

/// fieldwire version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
