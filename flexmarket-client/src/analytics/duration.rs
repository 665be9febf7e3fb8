use std::fmt;

use time::Duration;

use super::grouping::{group_by, GroupStat};
use crate::domain::Observation;

/// Half-open duration buckets. A duration equal to a boundary belongs to
/// the bucket that starts there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DurationBucket {
    UnderOneHour,
    OneToTwoHours,
    TwoToFourHours,
    FourToEightHours,
    EightToTwentyFourHours,
    DayOrLonger,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 6] = [
        Self::UnderOneHour,
        Self::OneToTwoHours,
        Self::TwoToFourHours,
        Self::FourToEightHours,
        Self::EightToTwentyFourHours,
        Self::DayOrLonger,
    ];

    /// Negative durations (end before start) land in the first bucket.
    pub fn from_duration(duration: Duration) -> Self {
        const HOUR: i64 = 3600;
        match duration.whole_seconds() {
            s if s < HOUR => Self::UnderOneHour,
            s if s < 2 * HOUR => Self::OneToTwoHours,
            s if s < 4 * HOUR => Self::TwoToFourHours,
            s if s < 8 * HOUR => Self::FourToEightHours,
            s if s < 24 * HOUR => Self::EightToTwentyFourHours,
            _ => Self::DayOrLonger,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UnderOneHour => "< 1 hour",
            Self::OneToTwoHours => "1-2 hours",
            Self::TwoToFourHours => "2-4 hours",
            Self::FourToEightHours => "4-8 hours",
            Self::EightToTwentyFourHours => "8-24 hours",
            Self::DayOrLonger => "> 24 hours",
        }
    }
}

impl fmt::Display for DurationBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bucket each row (or event) by its end-minus-start duration.
pub fn by_duration<R: Observation>(rows: &[R]) -> Vec<GroupStat<DurationBucket>> {
    group_by(rows, |r| DurationBucket::from_duration(r.duration()))
}
