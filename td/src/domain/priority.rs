//! Job priority and priority bands
//!
//! Priority is a plain integer, lower is more urgent (§3 of the design:
//! default 5). Bands are a derived, coarse view used for dispatch ordering
//! and starvation avoidance; the stored value is always the integer.

use serde::{Deserialize, Serialize};

/// Default priority assigned to a job that doesn't specify one.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Coarse dispatch band derived from a job's integer priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBand {
    High,
    Normal,
    Low,
}

impl PriorityBand {
    /// Classify a raw priority integer into a band.
    ///
    /// high: priority <= 2, normal: 3..=5, low: > 5.
    pub fn of(priority: i32) -> Self {
        if priority <= 2 {
            PriorityBand::High
        } else if priority <= 5 {
            PriorityBand::Normal
        } else {
            PriorityBand::Low
        }
    }

    pub fn all() -> [PriorityBand; 3] {
        [PriorityBand::High, PriorityBand::Normal, PriorityBand::Low]
    }
}

impl std::fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityBand::High => write!(f, "high"),
            PriorityBand::Normal => write!(f, "normal"),
            PriorityBand::Low => write!(f, "low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_match_spec_boundaries() {
        assert_eq!(PriorityBand::of(1), PriorityBand::High);
        assert_eq!(PriorityBand::of(2), PriorityBand::High);
        assert_eq!(PriorityBand::of(3), PriorityBand::Normal);
        assert_eq!(PriorityBand::of(5), PriorityBand::Normal);
        assert_eq!(PriorityBand::of(6), PriorityBand::Low);
        assert_eq!(PriorityBand::of(100), PriorityBand::Low);
    }

    #[test]
    fn band_ordering_is_high_first() {
        assert!(PriorityBand::High < PriorityBand::Normal);
        assert!(PriorityBand::Normal < PriorityBand::Low);
    }
}
