//! The tier partition of the top-10k global rankings.

use std::fmt;

/// A tier of the top-10k global rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankRange {
    /// Ranks 1 to 100.
    First,
    /// Ranks 101 to 1,000.
    Second,
    /// Ranks 1,001 to 10,000.
    Third,
}

impl RankRange {
    /// Every tier, best ranks first.
    pub const ALL: [RankRange; 3] = [RankRange::First, RankRange::Second, RankRange::Third];

    /// The inclusive `(min, max)` global-rank bounds of the tier.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            RankRange::First => (1, 100),
            RankRange::Second => (101, 1_000),
            RankRange::Third => (1_001, 10_000),
        }
    }
}

impl fmt::Display for RankRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, max) = self.bounds();
        write!(f, "#{min}-#{max}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_partition_the_top_10k() {
        let mut next = 1;
        for range in RankRange::ALL {
            let (min, max) = range.bounds();
            assert_eq!(min, next);
            assert!(max > min);
            next = max + 1;
        }
        assert_eq!(next, 10_001);
    }
}
