use std::fmt;

/// Closed interval of file sizes in bytes, `low..=high`.
///
/// Ranges queued for querying are pairwise disjoint and their union equals
/// the originally requested size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeRange {
    pub low: u64,
    pub high: u64,
}

impl SizeRange {
    /// Create a range. `low` must be at least 1 and not exceed `high`.
    pub fn new(low: u64, high: u64) -> Self {
        assert!(low >= 1, "size range low bound must be positive");
        assert!(low <= high, "size range low bound must not exceed high");
        Self { low, high }
    }

    /// Number of distinct sizes covered by the range.
    pub fn width(&self) -> u64 {
        self.high - self.low + 1
    }

    /// A range covering exactly one size cannot be split further.
    pub fn is_unit(&self) -> bool {
        self.low == self.high
    }

    pub fn contains(&self, other: &SizeRange) -> bool {
        self.low <= other.low && other.high <= self.high
    }

    /// Split the range at its midpoint, rounding toward the lower half
    /// when the length is odd. Must not be called on a unit range.
    pub fn bisect(&self) -> (SizeRange, SizeRange) {
        debug_assert!(!self.is_unit(), "cannot bisect a unit range");
        let mid = self.low + (self.high - self.low) / 2;
        (
            SizeRange::new(self.low, mid),
            SizeRange::new(mid + 1, self.high),
        )
    }
}

impl fmt::Display for SizeRange {
    /// Renders as the search qualifier syntax: `"42"` or `"1..100"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unit() {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}..{}", self.low, self.high)
        }
    }
}

/// Partition `bounds` into contiguous strata of length `width`; the final
/// stratum may be shorter. The returned ranges are disjoint, ascending, and
/// their union equals `bounds`.
pub fn partition(bounds: SizeRange, width: u64) -> Vec<SizeRange> {
    assert!(width >= 1, "stratum width must be positive");
    let mut strata = Vec::new();
    let mut low = bounds.low;
    while low <= bounds.high {
        let high = bounds.high.min(low.saturating_add(width - 1));
        strata.push(SizeRange::new(low, high));
        if high == u64::MAX {
            break;
        }
        low = high + 1;
    }
    strata
}

/// A stratum reporting more matches than the provider can exhaustively
/// paginate must be subdivided.
pub fn should_split(result_count: u64, ceiling: u64) -> bool {
    result_count > ceiling
}
