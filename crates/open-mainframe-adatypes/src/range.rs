//! Occurrence ranges for period groups and multiple fields.
//!
//! A range is a closed 1-based interval `[from, to]`. `N` stands for the
//! last occurrence known at read time, `1-N` for all occurrences.

use std::sync::LazyLock;

use regex::Regex;

/// Sentinel for "no range".
pub const NO_ENTRY: i32 = -1;
/// Sentinel for the last occurrence (`N`).
pub const LAST_ENTRY: i32 = -2;
/// Multiplier returned for unbounded ranges.
pub const ALL_ENTRIES: i32 = -3;

static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(N|\d*)-?(N|\d*)?$").expect("range pattern"));

/// Occurrence range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdaRange {
    from: i32,
    to: i32,
}

impl Default for AdaRange {
    fn default() -> Self {
        Self::empty()
    }
}

impl AdaRange {
    /// Range `[from, to]`; `to` may be [`LAST_ENTRY`].
    pub fn new(from: i32, to: i32) -> Self {
        Self { from, to }
    }

    /// No range.
    pub fn empty() -> Self {
        Self {
            from: NO_ENTRY,
            to: NO_ENTRY,
        }
    }

    /// Exactly one occurrence.
    pub fn single(index: i32) -> Self {
        Self {
            from: index,
            to: index,
        }
    }

    /// Last occurrence only (`N`).
    pub fn last() -> Self {
        Self {
            from: LAST_ENTRY,
            to: LAST_ENTRY,
        }
    }

    /// All occurrences (`1-N`).
    pub fn all() -> Self {
        Self {
            from: 1,
            to: LAST_ENTRY,
        }
    }

    /// Parse `"3"`, `"N"`, `"2-5"` or `"1-N"`.
    ///
    /// Inverted ranges return `None`, except when `to` is `N`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = RANGE_PATTERN.captures(text)?;
        let from = match caps.get(1).map(|m| m.as_str()).unwrap_or("") {
            "" => return None,
            "N" => LAST_ENTRY,
            digits => digits.parse::<i32>().ok()?,
        };
        let to = match caps.get(2).map(|m| m.as_str()).unwrap_or("") {
            "" => from,
            "N" => LAST_ENTRY,
            digits => digits.parse::<i32>().ok()?,
        };
        if from == LAST_ENTRY && to != LAST_ENTRY {
            return None;
        }
        if to != LAST_ENTRY && to < from {
            return None;
        }
        if from == 0 {
            return None;
        }
        Some(Self { from, to })
    }

    /// Lower bound.
    pub fn from(&self) -> i32 {
        self.from
    }

    /// Upper bound.
    pub fn to(&self) -> i32 {
        self.to
    }

    /// No range set.
    pub fn is_empty(&self) -> bool {
        self.from == NO_ENTRY && self.to == NO_ENTRY
    }

    /// Only the last occurrence.
    pub fn is_last(&self) -> bool {
        self.from == LAST_ENTRY
    }

    /// Range collapses to one occurrence.
    pub fn is_single_index(&self) -> bool {
        !self.is_empty() && self.from == self.to
    }

    /// Format buffer rendering: `""`, `"N"`, `"3"`, `"2-5"` or `"1-N"`.
    pub fn format_buffer(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        if self.from == LAST_ENTRY {
            return "N".to_string();
        }
        if self.from == self.to {
            return self.from.to_string();
        }
        if self.to == LAST_ENTRY {
            return format!("{}-N", self.from);
        }
        format!("{}-{}", self.from, self.to)
    }

    /// Number of occurrences covered, [`ALL_ENTRIES`] when unbounded.
    pub fn multiplier(&self) -> i32 {
        if self.is_empty() {
            return 0;
        }
        if self.from == LAST_ENTRY {
            return 1;
        }
        if self.to == LAST_ENTRY {
            return ALL_ENTRIES;
        }
        self.to - self.from + 1
    }

    /// Resolve the `pos`-th (1-based) occurrence given `max` occurrences read.
    ///
    /// A `pos` of 0 resolves like 1.
    pub fn index(&self, pos: u32, max: u32) -> u32 {
        if self.from == LAST_ENTRY {
            return max;
        }
        let pos = pos.max(1);
        if self.from < 1 {
            return pos;
        }
        self.from as u32 + pos - 1
    }
}

impl std::fmt::Display for AdaRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_buffer())
    }
}

// ── PartialRange ───────────────────────────────────────────────────

/// Byte slice `[start, start+length)` of a field, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartialRange {
    /// First byte, 1-based.
    pub start: u32,
    /// Number of bytes.
    pub length: u32,
}

impl PartialRange {
    /// Slice starting at `start` with `length` bytes.
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Format buffer rendering `(start,length)`.
    pub fn format_buffer(&self) -> String {
        format!("({},{})", self.start, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_buffer() {
        assert_eq!(AdaRange::new(1, 2).format_buffer(), "1-2");
        assert_eq!(AdaRange::new(1, LAST_ENTRY).format_buffer(), "1-N");
        assert_eq!(AdaRange::single(3).format_buffer(), "3");
        assert_eq!(AdaRange::last().format_buffer(), "N");
        assert_eq!(AdaRange::empty().format_buffer(), "");
    }

    #[test]
    fn test_parse() {
        assert_eq!(AdaRange::parse("1"), Some(AdaRange::single(1)));
        assert_eq!(AdaRange::parse("N"), Some(AdaRange::last()));
        assert_eq!(AdaRange::parse("1-N"), Some(AdaRange::all()));
        assert_eq!(AdaRange::parse("2-5"), Some(AdaRange::new(2, 5)));
        assert_eq!(AdaRange::parse("N-N"), Some(AdaRange::last()));
        assert_eq!(AdaRange::parse("N-2"), None);
        assert_eq!(AdaRange::parse("3-2"), None);
        assert_eq!(AdaRange::parse("X"), None);
    }

    #[test]
    fn test_parse_format_round_trip() {
        for text in ["1", "N", "1-N", "2-5", "17"] {
            let range = AdaRange::parse(text).unwrap();
            assert_eq!(range.format_buffer(), text);
        }
    }

    #[test]
    fn test_multiplier_and_index() {
        assert_eq!(AdaRange::new(2, 5).multiplier(), 4);
        assert_eq!(AdaRange::last().multiplier(), 1);
        assert_eq!(AdaRange::all().multiplier(), ALL_ENTRIES);
        assert_eq!(AdaRange::last().index(1, 7), 7);
        assert_eq!(AdaRange::new(3, 5).index(2, 7), 4);
        assert_eq!(AdaRange::all().index(5, 7), 5);
        assert_eq!(AdaRange::new(3, 5).index(0, 7), 3);
        assert_eq!(AdaRange::all().index(0, 7), 1);
    }

    #[test]
    fn test_single_index() {
        assert!(AdaRange::single(2).is_single_index());
        assert!(AdaRange::last().is_single_index());
        assert!(!AdaRange::empty().is_single_index());
        assert!(!AdaRange::all().is_single_index());
    }

    #[test]
    fn test_partial_range() {
        assert_eq!(PartialRange::new(4097, 995904).format_buffer(), "(4097,995904)");
    }
}
