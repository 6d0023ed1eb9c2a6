//! Intervals over order-encoded keys.
//!
//! A sparse-index granule is described by the closed segment
//! `[min, max]` of the key values it can contain; a predicate atom is an
//! [`OrderKeyRange`] with inclusive or exclusive bounds. Pruning only needs
//! two questions answered: can the range and the segment overlap, and does
//! the range swallow the segment whole.

use std::fmt;
use std::ops::Bound;

/// Interval over order-encoded `u64` keys with explicit bound kinds.
#[derive(Clone, Copy, Debug)]
pub struct OrderKeyRange {
    pub lower: Bound<u64>,
    pub upper: Bound<u64>,
}

impl OrderKeyRange {
    /// The full key domain.
    pub const fn unbounded() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// `(-inf, value]` or `(-inf, value)`.
    pub fn right_bounded(value: u64, inclusive: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: if inclusive {
                Bound::Included(value)
            } else {
                Bound::Excluded(value)
            },
        }
    }

    /// `[value, +inf)` or `(value, +inf)`.
    pub fn left_bounded(value: u64, inclusive: bool) -> Self {
        Self {
            lower: if inclusive {
                Bound::Included(value)
            } else {
                Bound::Excluded(value)
            },
            upper: Bound::Unbounded,
        }
    }

    /// Closed interval `[lo, hi]`.
    pub fn closed(lo: u64, hi: u64) -> Self {
        Self {
            lower: Bound::Included(lo),
            upper: Bound::Included(hi),
        }
    }

    /// Degenerate interval `[value, value]`.
    pub fn point(value: u64) -> Self {
        Self::closed(value, value)
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self.lower, Bound::Unbounded) && matches!(self.upper, Bound::Unbounded)
    }

    /// Can this range intersect the closed segment `[min, max]`?
    ///
    /// `max == None` means the segment extends to the top of the key
    /// domain. May answer `true` for a disjoint pair, never `false` for an
    /// overlapping one.
    pub fn overlaps_segment(&self, min: u64, max: Option<u64>) -> bool {
        // Range entirely below the segment.
        match self.upper {
            Bound::Included(u) => {
                if u < min {
                    return false;
                }
            }
            Bound::Excluded(u) => {
                if u <= min {
                    return false;
                }
            }
            Bound::Unbounded => {}
        }

        // Range entirely above the segment.
        if let Some(max) = max {
            match self.lower {
                Bound::Included(l) => {
                    if l > max {
                        return false;
                    }
                }
                Bound::Excluded(l) => {
                    if l >= max {
                        return false;
                    }
                }
                Bound::Unbounded => {}
            }
        }

        true
    }

    /// Does this range contain every point of the closed segment
    /// `[min, max]`?
    pub fn contains_segment(&self, min: u64, max: Option<u64>) -> bool {
        match self.lower {
            Bound::Included(l) => {
                if l > min {
                    return false;
                }
            }
            Bound::Excluded(l) => {
                if l >= min {
                    return false;
                }
            }
            Bound::Unbounded => {}
        }
        match self.upper {
            Bound::Included(u) => match max {
                Some(max) => max <= u,
                None => false,
            },
            Bound::Excluded(u) => match max {
                Some(max) => max < u,
                None => false,
            },
            Bound::Unbounded => true,
        }
    }
}

impl fmt::Display for OrderKeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lower {
            Bound::Included(l) => write!(f, "[{l}, ")?,
            Bound::Excluded(l) => write!(f, "({l}, ")?,
            Bound::Unbounded => write!(f, "(-inf, ")?,
        }
        match self.upper {
            Bound::Included(u) => write!(f, "{u}]"),
            Bound::Excluded(u) => write!(f, "{u})"),
            Bound::Unbounded => write!(f, "+inf)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_respects_bound_kinds() {
        let r = OrderKeyRange::right_bounded(10, true);
        assert!(r.overlaps_segment(10, Some(20)));
        assert!(!r.overlaps_segment(11, Some(20)));

        let r = OrderKeyRange::right_bounded(10, false);
        assert!(!r.overlaps_segment(10, Some(20)));
        assert!(r.overlaps_segment(9, Some(20)));

        let r = OrderKeyRange::left_bounded(10, false);
        assert!(!r.overlaps_segment(0, Some(10)));
        assert!(r.overlaps_segment(0, Some(11)));
        assert!(r.overlaps_segment(0, None));
    }

    #[test]
    fn containment_is_strict() {
        let r = OrderKeyRange::closed(5, 15);
        assert!(r.contains_segment(5, Some(15)));
        assert!(r.contains_segment(6, Some(14)));
        assert!(!r.contains_segment(4, Some(15)));
        assert!(!r.contains_segment(5, Some(16)));
        assert!(!r.contains_segment(5, None));
        assert!(OrderKeyRange::unbounded().contains_segment(0, None));
    }

    #[test]
    fn display_renders_bounds() {
        assert_eq!(OrderKeyRange::closed(1, 2).to_string(), "[1, 2]");
        assert_eq!(
            OrderKeyRange::right_bounded(7, false).to_string(),
            "(-inf, 7)"
        );
        assert_eq!(OrderKeyRange::unbounded().to_string(), "(-inf, +inf)");
    }
}
