use chrono::{DateTime, TimeDelta, Utc};

use crate::config::{ConfigError, ExpirationConfig};

/// How long audited messages are kept before they become eligible for
/// expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    hours_to_keep: i64,
    window: TimeDelta,
}

impl RetentionPolicy {
    /// Build a policy keeping messages for `hours_to_keep` hours.
    ///
    /// Negative or unrepresentable windows are configuration errors.
    pub fn new(hours_to_keep: i64) -> Result<Self, ConfigError> {
        if hours_to_keep < 0 {
            return Err(ConfigError::Validation(format!(
                "hours to keep must not be negative (got {hours_to_keep})"
            )));
        }
        let window = TimeDelta::try_hours(hours_to_keep).ok_or_else(|| {
            ConfigError::Validation(format!("hours to keep is out of range (got {hours_to_keep})"))
        })?;
        Ok(Self {
            hours_to_keep,
            window,
        })
    }

    pub fn from_config(config: &ExpirationConfig) -> Result<Self, ConfigError> {
        Self::new(config.hours_to_keep)
    }

    pub fn hours_to_keep(&self) -> i64 {
        self.hours_to_keep
    }

    /// Instant at or before which a message is old enough to expire.
    ///
    /// Windows reaching before the earliest representable instant keep
    /// everything.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(24, 24)]
    #[case(720, 720)]
    fn test_cutoff_subtracts_hours(#[case] hours: i64, #[case] expected_hours: i64) {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let policy = RetentionPolicy::new(hours).unwrap();
        assert_eq!(policy.cutoff(now), now - Duration::hours(expected_hours));
    }

    #[test]
    fn test_cutoff_crosses_day_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 1, 30, 0).unwrap();
        let policy = RetentionPolicy::new(24).unwrap();
        assert_eq!(
            policy.cutoff(now),
            Utc.with_ymd_and_hms(2026, 2, 28, 1, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_cutoff_tracks_now() {
        let policy = RetentionPolicy::new(24).unwrap();
        let first = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let later = first + Duration::hours(3);
        assert_eq!(policy.cutoff(later) - policy.cutoff(first), Duration::hours(3));
    }

    #[test]
    fn test_negative_hours_rejected() {
        let err = RetentionPolicy::new(-1).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_out_of_range_hours_rejected() {
        assert!(RetentionPolicy::new(i64::MAX).is_err());
    }

    #[test]
    fn test_huge_window_saturates() {
        // Roughly 300k years: representable as a TimeDelta, but reaches past
        // the earliest DateTime chrono supports
        let policy = RetentionPolicy::new(24 * 365 * 300_000).unwrap();
        assert_eq!(policy.cutoff(Utc::now()), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_from_config() {
        let config = ExpirationConfig {
            hours_to_keep: 48,
            ..Default::default()
        };
        let policy = RetentionPolicy::from_config(&config).unwrap();
        assert_eq!(policy.hours_to_keep(), 48);
    }
}
