// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Little-endian binary cursors used by every field.

pub mod cursor;

pub use cursor::{Reader, Writer};
