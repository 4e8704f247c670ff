/// Time primitives. Timestamps are milliseconds since the Unix epoch.
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Information at most this old is `Fresh`.
pub const FRESH_WITHIN_DAYS: u64 = 30;
/// Information at most this old (and not fresh) is `Aging`.
pub const AGING_WITHIN_DAYS: u64 = 90;

/// How old a piece of information is.
///
/// Shared by cell search staleness and lead enrichment, so both answer "how old
/// is this" the same way.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Freshness {
    Fresh,
    Aging,
    Stale,
}

impl Freshness {
    pub fn from_age_ms(age_ms: u64) -> Self {
        if age_ms <= FRESH_WITHIN_DAYS * DAY_MS {
            Freshness::Fresh
        } else if age_ms <= AGING_WITHIN_DAYS * DAY_MS {
            Freshness::Aging
        } else {
            Freshness::Stale
        }
    }

    /// Timestamps in the future (clock skew) count as fresh.
    pub fn classify(then_ms: u64, now_ms: u64) -> Self {
        Self::from_age_ms(now_ms.saturating_sub(then_ms))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Aging => "aging",
            Freshness::Stale => "stale",
        }
    }
}

/// Current wall-clock time.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{DAY_MS, Freshness};

    #[test]
    fn bucket_boundaries() {
        assert_eq!(Freshness::from_age_ms(0), Freshness::Fresh);
        assert_eq!(Freshness::from_age_ms(30 * DAY_MS), Freshness::Fresh);
        assert_eq!(Freshness::from_age_ms(30 * DAY_MS + 1), Freshness::Aging);
        assert_eq!(Freshness::from_age_ms(90 * DAY_MS), Freshness::Aging);
        assert_eq!(Freshness::from_age_ms(90 * DAY_MS + 1), Freshness::Stale);
    }

    #[test]
    fn future_timestamps_are_fresh() {
        assert_eq!(Freshness::classify(10 * DAY_MS, DAY_MS), Freshness::Fresh);
        assert_eq!(Freshness::classify(0, 100 * DAY_MS), Freshness::Stale);
    }
}
