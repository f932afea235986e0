use std::fmt;
use std::ops::Range;

/// Ordered set of disjoint half-open `[start, end)` intervals.
///
/// Ranges that overlap or touch are coalesced on insert, so the stored list is
/// always sorted by start with a gap between neighbours. Empty ranges carry no
/// content and are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<Range<usize>>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `[start, end)`, merging with every range it overlaps or touches
    pub fn append_range(&mut self, start: usize, end: usize) -> &mut Self {
        if start >= end {
            return self;
        }

        // First range that reaches `start`, and one past the last range that begins by `end`.
        let first = self.ranges.partition_point(|r| r.end < start);
        let last = self.ranges.partition_point(|r| r.start <= end);

        if first == last {
            self.ranges.insert(first, start..end);
        } else {
            let merged_start = start.min(self.ranges[first].start);
            let merged_end = end.max(self.ranges[last - 1].end);
            self.ranges
                .splice(first..last, std::iter::once(merged_start..merged_end));
        }

        self
    }

    /// Merge every range of `other` into this set
    pub fn union(&mut self, other: &RangeSet) -> &mut Self {
        for range in &other.ranges {
            self.append_range(range.start, range.end);
        }
        self
    }

    /// Keep only the portions that also lie inside `other`
    pub fn intersect(&mut self, other: &RangeSet) -> &mut Self {
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);

        while i < self.ranges.len() && j < other.ranges.len() {
            let a = &self.ranges[i];
            let b = &other.ranges[j];

            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start < end {
                result.push(start..end);
            }

            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }

        self.ranges = result;
        self
    }

    /// Remove every portion that lies inside `other`, splitting ranges as needed
    pub fn subtract(&mut self, other: &RangeSet) -> &mut Self {
        if other.is_empty() || self.is_empty() {
            return self;
        }

        let mut result = Vec::with_capacity(self.ranges.len());
        let mut j = 0;

        for range in &self.ranges {
            let mut cursor = range.start;

            while j < other.ranges.len() && other.ranges[j].end <= cursor {
                j += 1;
            }

            // `other` ranges may straddle into the next one of ours, so scan with a local index.
            let mut k = j;
            while k < other.ranges.len() && other.ranges[k].start < range.end {
                let cut = &other.ranges[k];
                if cut.start > cursor {
                    result.push(cursor..cut.start);
                }
                cursor = cursor.max(cut.end);
                k += 1;
            }

            if cursor < range.end {
                result.push(cursor..range.end);
            }
        }

        self.ranges = result;
        self
    }

    /// Clip every range to `[0, limit)`
    pub fn clamp(&mut self, limit: usize) -> &mut Self {
        self.ranges.retain(|r| r.start < limit);
        if let Some(last) = self.ranges.last_mut() {
            last.end = last.end.min(limit);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint ranges (not the number of covered offsets)
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn contains(&self, offset: usize) -> bool {
        let idx = self.ranges.partition_point(|r| r.end <= offset);
        self.ranges
            .get(idx)
            .map_or(false, |r| r.start <= offset)
    }
}

impl From<Range<usize>> for RangeSet {
    fn from(range: Range<usize>) -> Self {
        let mut set = Self::new();
        set.append_range(range.start, range.end);
        set
    }
}

impl FromIterator<Range<usize>> for RangeSet {
    fn from_iter<I: IntoIterator<Item = Range<usize>>>(iter: I) -> Self {
        let mut set = Self::new();
        for range in iter {
            set.append_range(range.start, range.end);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = &'a Range<usize>;
    type IntoIter = std::slice::Iter<'a, Range<usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|r| format!("{}-{}", r.start, r.end))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}
