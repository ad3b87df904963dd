// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named byte ranges recorded while writing.
//!
//! Structures, property bags and the heap drain call [`DataMapper::push`]
//! before each member and [`DataMapper::pop`] after it, so a mapper sees
//! the nesting of the output buffer (useful for hex viewers and diffing).

/// Receives range boundaries during a write pass.
pub trait DataMapper {
    /// A range named `name` starts at absolute `offset`.
    fn push(&mut self, name: &str, offset: u64);

    /// The innermost open range ends at `offset` (exclusive).
    fn pop(&mut self, offset: u64);
}

/// One closed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRange {
    /// Dot-separated names from the outermost range.
    pub path: String,
    pub start: u64,
    pub end: u64,
    pub depth: usize,
}

impl MappedRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Mapper collecting every range, in closing order.
#[derive(Debug, Default)]
pub struct RangeRecorder {
    open: Vec<(String, u64)>,
    ranges: Vec<MappedRange>,
}

impl RangeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[MappedRange] {
        &self.ranges
    }

    /// Ranges sorted by start offset, outer ranges first.
    pub fn sorted(&self) -> Vec<&MappedRange> {
        let mut sorted: Vec<&MappedRange> = self.ranges.iter().collect();
        sorted.sort_by_key(|r| (r.start, r.depth));
        sorted
    }

    /// Closed range with exactly this path.
    pub fn find(&self, path: &str) -> Option<&MappedRange> {
        self.ranges.iter().find(|r| r.path == path)
    }

    /// Number of ranges still open (non-zero after a failed write).
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    pub fn into_ranges(self) -> Vec<MappedRange> {
        self.ranges
    }
}

impl DataMapper for RangeRecorder {
    fn push(&mut self, name: &str, offset: u64) {
        let path = match self.open.last() {
            Some((parent, _)) => format!("{}.{}", parent, name),
            None => name.to_string(),
        };
        self.open.push((path, offset));
    }

    fn pop(&mut self, offset: u64) {
        match self.open.pop() {
            Some((path, start)) => self.ranges.push(MappedRange {
                path,
                start,
                end: offset,
                depth: self.open.len(),
            }),
            None => log::warn!("[mapper] pop at {:#x} without an open range", offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_paths() {
        let mut recorder = RangeRecorder::new();
        recorder.push("header", 0);
        recorder.push("version", 0);
        recorder.pop(4);
        recorder.push("name", 4);
        recorder.pop(12);
        recorder.pop(12);

        let header = recorder.find("header").expect("closed");
        assert_eq!((header.start, header.end, header.depth), (0, 12, 0));
        assert_eq!(recorder.find("header.name").map(MappedRange::len), Some(8));
        let order: Vec<&str> = recorder.sorted().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(order, vec!["header", "header.version", "header.name"]);
        assert_eq!(recorder.open_len(), 0);
    }

    #[test]
    fn test_unbalanced_pop_is_ignored() {
        let mut recorder = RangeRecorder::new();
        recorder.pop(3);
        assert!(recorder.ranges().is_empty());
    }
}
