// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for reading and writing fields.
//!
//! Leaf errors (cursor overruns, bad encodings, unknown hashes) are raised
//! without context. Each composite boundary (structure, property bag,
//! collection, pointer) wraps the error it receives in [`Error::Context`]
//! with a [`Position`] and the byte offset where the failing child started,
//! so a failure can be traced down to a concrete wire location.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], independent of context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Premature end of data, length violation or invalid encoding.
    Structural,
    /// A type id, property key or type name has no matching entry.
    UnknownType,
    /// API contract violation (schema-definition bug, not bad data).
    Misuse,
    /// Two distinct names hash to the same identifier.
    Integrity,
    /// Invalid declarative catalog.
    Catalog,
    /// Underlying stream failure.
    Io,
}

/// Location of a child inside its enclosing composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Member of a [`crate::DataStructure`].
    Field {
        index: usize,
        name: Arc<str>,
        description: String,
    },
    /// Entry of a [`crate::PropertyBag`] in stream (or write) order.
    Property {
        index: usize,
        key: u64,
        name: Option<Arc<str>>,
    },
    /// Element of a vector or fixed array.
    Element { index: usize },
    /// Key/value pair of a dictionary.
    Entry { index: usize },
    /// Payload reached through a heap pointer while reading.
    Pointee { address: u64 },
    /// Payload of a type-tagged value.
    Tagged { type_id: u64, type_name: Arc<str> },
    /// Heap entry being emitted by the allocator.
    Heap { index: usize, address: u64 },
    /// Content of a length-prefixed block.
    Block,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Field {
                index,
                name,
                description,
            } => write!(f, "field #{} `{}` ({})", index, name, description),
            Position::Property { index, key, name } => match name {
                Some(name) => write!(f, "property #{} `{}`", index, name),
                None => write!(f, "property #{} {:#018x}", index, key),
            },
            Position::Element { index } => write!(f, "element #{}", index),
            Position::Entry { index } => write!(f, "entry #{}", index),
            Position::Pointee { address } => write!(f, "pointee @{:#x}", address),
            Position::Tagged { type_id, type_name } => {
                write!(f, "tagged `{}` ({:#018x})", type_name, type_id)
            }
            Position::Heap { index, address } => {
                write!(f, "heap entry #{} @{:#x}", index, address)
            }
            Position::Block => write!(f, "block"),
        }
    }
}

/// Local API contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MisuseError {
    #[error("field is already allocated at address {address:#x}")]
    AlreadyAllocated { address: u64 },

    #[error("address {address:#x} is already bound to another field")]
    AddressInUse { address: u64 },

    #[error("address {address:#x} is reserved as the null sentinel")]
    NullAddress { address: u64 },

    #[error("heap table cannot be mutated while writing allocated fields ({operation})")]
    HeapBusy { operation: &'static str },

    #[error("zero-size payloads cannot be allocated; write a null pointer instead")]
    EmptyAllocation,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("no field named `{0}`")]
    NoSuchField(String),

    #[error("no property named `{0}`")]
    NoSuchProperty(String),

    #[error("no variant named `{variant}` in `{name}`")]
    NoSuchVariant { name: String, variant: String },

    #[error("`{0}` is declared twice")]
    DuplicateName(String),

    #[error("type `{0}` is already registered")]
    DuplicateType(String),

    #[error("value of kind {0} carries no registered type id")]
    UntaggedValue(String),

    #[error("{description} reported {reported} bytes but wrote {written}")]
    SizeMismatch {
        description: String,
        reported: u64,
        written: u64,
    },

    #[error("heap entry @{address:#x} expected at position {expected}, writer is at {actual}")]
    HeapOutOfPlace {
        address: u64,
        expected: u64,
        actual: u64,
    },

    #[error("collection holds {len} elements, more than the u32 count prefix allows")]
    CountOverflow { len: usize },
}

/// Errors raised while defining schemas or reading/writing fields.
#[derive(Debug, Error)]
pub enum Error {
    /// `missing` is set when the data simply ran out: the number of further
    /// bytes the buffer needed at `offset`.
    #[error("structural error at offset {offset:#x}: {reason}")]
    Structural {
        offset: u64,
        reason: String,
        missing: Option<u64>,
    },

    #[error("unknown type id {id:#018x}")]
    UnknownType { id: u64 },

    #[error("unrecognized key {key:#018x}")]
    UnknownKey { key: u64 },

    #[error("unknown type name `{0}`")]
    UnknownTypeName(String),

    #[error(transparent)]
    Misuse(#[from] MisuseError),

    #[error("hash collision on {hash:#018x}: `{existing}` and `{incoming}`")]
    HashCollision {
        hash: u64,
        existing: String,
        incoming: String,
    },

    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{position} at offset {offset:#x}: {source}")]
    Context {
        position: Position,
        offset: u64,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a structural error at `offset`.
    pub fn structural(offset: u64, reason: impl Into<String>) -> Self {
        Error::Structural {
            offset,
            reason: reason.into(),
            missing: None,
        }
    }

    /// Build the error for a read at `offset` that needed `missing` bytes
    /// past the end of the buffer.
    pub fn truncated(offset: u64, missing: u64) -> Self {
        Error::Structural {
            offset,
            reason: "unexpected end of buffer".to_string(),
            missing: Some(missing),
        }
    }

    /// Wrap this error with the position of the child that raised it.
    #[must_use]
    pub fn within(self, position: Position, offset: u64) -> Self {
        Error::Context {
            position,
            offset,
            source: Box::new(self),
        }
    }

    /// Innermost error, with all context layers removed.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Positions from the outermost composite down to the failing leaf.
    pub fn path(&self) -> Vec<&Position> {
        let mut path = Vec::new();
        let mut current = self;
        while let Error::Context {
            position, source, ..
        } = current
        {
            path.push(position);
            current = source.as_ref();
        }
        path
    }

    /// Classification of the root cause.
    pub fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            Error::Structural { .. } => ErrorKind::Structural,
            Error::UnknownType { .. } | Error::UnknownKey { .. } | Error::UnknownTypeName(_) => {
                ErrorKind::UnknownType
            }
            Error::Misuse(_) => ErrorKind::Misuse,
            Error::HashCollision { .. } => ErrorKind::Integrity,
            Error::Catalog(_) | Error::Json(_) => ErrorKind::Catalog,
            Error::Io(_) => ErrorKind::Io,
            // root_cause never returns a context layer
            Error::Context { .. } => ErrorKind::Structural,
        }
    }

    /// Bytes the buffer lacked when the root cause is a truncation.
    pub fn missing_bytes(&self) -> Option<u64> {
        match self.root_cause() {
            Error::Structural { missing, .. } => *missing,
            _ => None,
        }
    }

    /// Raw hash carried by an unknown type id or property key.
    pub fn unknown_hash(&self) -> Option<u64> {
        match self.root_cause() {
            Error::UnknownType { id } => Some(*id),
            Error::UnknownKey { key } => Some(*key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chain_preserves_root_kind() {
        let err = Error::structural(12, "unexpected end of buffer")
            .within(Position::Element { index: 3 }, 8)
            .within(
                Position::Field {
                    index: 1,
                    name: Arc::from("points"),
                    description: "vector<f32>".into(),
                },
                4,
            );

        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.path().len(), 2);
        assert_eq!(
            err.to_string(),
            "field #1 `points` (vector<f32>) at offset 0x4: element #3 at offset 0x8: \
             structural error at offset 0xc: unexpected end of buffer"
        );
    }

    #[test]
    fn test_truncation_reports_missing_bytes_through_context() {
        let err = Error::truncated(6, 2).within(Position::Element { index: 0 }, 4);
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.missing_bytes(), Some(2));
        assert_eq!(
            err.to_string(),
            "element #0 at offset 0x4: structural error at offset 0x6: unexpected end of buffer"
        );
        assert_eq!(Error::structural(6, "invalid bool").missing_bytes(), None);
    }

    #[test]
    fn test_unknown_key_is_reported_in_hex() {
        let err = Error::UnknownKey {
            key: 0x2e5e_b660_6608_7d7e,
        };
        assert_eq!(err.to_string(), "unrecognized key 0x2e5eb66066087d7e");
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        assert_eq!(err.unknown_hash(), Some(0x2e5e_b660_6608_7d7e));
    }

    #[test]
    fn test_misuse_converts() {
        let err: Error = MisuseError::HeapBusy {
            operation: "allocate",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Misuse);
        assert!(matches!(
            err.root_cause(),
            Error::Misuse(MisuseError::HeapBusy { .. })
        ));
    }
}
