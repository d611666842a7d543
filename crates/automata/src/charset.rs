//! Disjoint, sorted interval sets over 32-bit code points.
//!
//! This is the edge-label alphabet for the whole pipeline: expanding a class
//! like `[a-zA-Z0-9]` into one edge per character would make a `.`-style rule
//! explode into thousands of parallel edges, so every stage (Thompson
//! synthesis, subset construction, Hopcroft minimization) operates on these
//! ranges directly.

use btree_range_map::RangeSet;
use std::fmt;

/// A closed interval `[min, max]` over 32-bit code points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CharRange {
    min: u32,
    max: u32,
}

impl CharRange {
    /// Builds a range, rejecting `min > max`.
    pub fn new(min: u32, max: u32) -> Result<Self, MalformedRange> {
        if min > max {
            return Err(MalformedRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// A range containing exactly one code point.
    pub fn single(value: u32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }

    /// The code point immediately after `max`, if it exists.
    pub fn next(&self) -> Option<u32> {
        self.max.checked_add(1)
    }

    /// The code point immediately before `min`, if it exists.
    pub fn prev(&self) -> Option<u32> {
        self.min.checked_sub(1)
    }

    fn as_inclusive(&self) -> std::ops::RangeInclusive<u32> {
        self.min..=self.max
    }
}

impl fmt::Display for CharRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", render_code_point(self.min))
        } else {
            write!(
                f,
                "{}-{}",
                render_code_point(self.min),
                render_code_point(self.max)
            )
        }
    }
}

fn render_code_point(value: u32) -> String {
    match char::from_u32(value) {
        Some(c) if !c.is_control() => c.to_string(),
        _ => format!("\\u{{{value:x}}}"),
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("malformed range: lower bound {min} is greater than upper bound {max}")]
pub struct MalformedRange {
    pub min: u32,
    pub max: u32,
}

/// A set of [`CharRange`]s, kept internally as disjoint, sorted ranges.
///
/// Overlapping or adjacent insertions are coalesced automatically. Negation
/// is a cosmetic concern at the AST level only (see [`CharRangeSet::render`]);
/// by the time a set reaches the automaton pipeline it is always stored in
/// positive (enumerated) form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CharRangeSet {
    ranges: RangeSet<u32>,
}

impl CharRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_range(range: CharRange) -> Self {
        let mut set = Self::new();
        set.insert(range);
        set
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = CharRange>) -> Self {
        let mut set = Self::new();
        for range in ranges {
            set.insert(range);
        }
        set
    }

    /// Merges `range` into the set, coalescing with anything adjacent or
    /// overlapping. Idempotent.
    pub fn insert(&mut self, range: CharRange) {
        self.ranges.insert(range.as_inclusive());
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for range in other.ranges.iter() {
            out.ranges.insert(*range);
        }
        out
    }

    /// Intersection, computed as `self - complement(other)`.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for gap in other.ranges.gaps() {
            out.ranges.remove(gap.cloned());
        }
        out
    }

    pub fn subtract(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for range in other.ranges.iter() {
            out.ranges.remove(*range);
        }
        out
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges.contains(&value)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterates the disjoint ranges in ascending order.
    pub fn ranges(&self) -> impl Iterator<Item = CharRange> + '_ {
        self.ranges.iter().filter_map(|r| {
            let min = *r.first()?;
            let max = r.last().copied().unwrap_or(min);
            Some(CharRange { min, max })
        })
    }

    /// Partitions the union of `sets` into maximal ranges such that each
    /// resulting range is either fully contained in or fully disjoint from
    /// every input set (the atomic symbols, or *minterms*, of the
    /// determinized alphabet). Implemented as a sweep over every range
    /// endpoint contributed by any input set.
    pub fn minterms<'a>(sets: impl IntoIterator<Item = &'a CharRangeSet>) -> Vec<CharRangeSet> {
        let sets: Vec<&CharRangeSet> = sets.into_iter().collect();

        // Exclusive end-of-range markers are tracked as `u64` so that a range
        // whose `max` is `u32::MAX` still contributes a division point one
        // past it; using `u32` there would overflow and silently drop the
        // top minterm.
        let mut divisions = std::collections::BTreeSet::new();
        for set in &sets {
            for range in set.ranges() {
                divisions.insert(range.min as u64);
                divisions.insert(range.max as u64 + 1);
            }
        }

        let points: Vec<u64> = divisions.into_iter().collect();
        let mut minterms = Vec::new();
        for window in points.windows(2) {
            let (lo, hi_exclusive) = (window[0], window[1]);
            let lo32 = lo as u32;
            let hi = (hi_exclusive - 1) as u32;
            if sets.iter().any(|set| set.contains(lo32)) {
                minterms.push(CharRangeSet::from_range(CharRange { min: lo32, max: hi }));
            }
        }
        minterms
    }

    /// Renders the set in human-readable character-class form, e.g.
    /// `[a-z0-9]` or, when `negated` is set, `[^a-z0-9]`.
    pub fn render(&self, negated: bool) -> String {
        let mut s = String::from("[");
        if negated {
            s.push('^');
        }
        for range in self.ranges() {
            s.push_str(&range.to_string());
        }
        s.push(']');
        s
    }
}

impl fmt::Display for CharRangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for CharRangeSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(u32, u32)> = self.ranges().map(|r| (r.min(), r.max())).collect();
        pairs.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for CharRangeSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(u32, u32)>::deserialize(deserializer)?;
        let mut set = CharRangeSet::new();
        for (min, max) in pairs {
            let range = CharRange::new(min, max).map_err(serde::de::Error::custom)?;
            set.insert(range);
        }
        Ok(set)
    }
}
