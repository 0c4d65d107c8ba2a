//! The scheduling gate: should this feed run now?
//!
//! Two independent checks. The frequency gate compares elapsed time since
//! the last run against the configured interval. Change detection
//! compares the feed's cache validators from a HEAD probe against the
//! last successful run's, suppressing a run when the feed is provably
//! unchanged.

use chrono::{DateTime, Utc};
use feedsync_core::Frequency;
use feedsync_feed::FeedSignature;

/// Whether enough time has elapsed for another run. A feed that has never
/// run is always due.
#[must_use]
pub fn should_run(
    last_run_at: Option<DateTime<Utc>>,
    frequency: Frequency,
    now: DateTime<Utc>,
) -> bool {
    match last_run_at {
        None => true,
        Some(last) => now.signed_duration_since(last) >= frequency.interval(),
    }
}

/// Whether the feed content has changed since the previous probe.
///
/// Validator precedence: ETag, then Last-Modified, then Content-Length.
/// The first validator present on *both* sides decides; when no validator
/// is comparable, the feed is assumed changed.
#[must_use]
pub fn feed_changed(current: &FeedSignature, previous: Option<&FeedSignature>) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    if let (Some(current_etag), Some(previous_etag)) = (&current.etag, &previous.etag) {
        return current_etag != previous_etag;
    }
    if let (Some(current_lm), Some(previous_lm)) =
        (&current.last_modified, &previous.last_modified)
    {
        return current_lm != previous_lm;
    }
    if let (Some(current_len), Some(previous_len)) =
        (current.content_length, previous.content_length)
    {
        // Weak heuristic: identical byte counts almost always mean an
        // unchanged export for these vendors.
        return current_len != previous_len;
    }

    true
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, hour, minute, 0).unwrap()
    }

    #[test]
    fn never_run_is_always_due() {
        assert!(should_run(None, Frequency::Weekly, at(8, 0)));
    }

    #[test]
    fn frequency_threshold_is_inclusive() {
        let last = at(8, 0);
        assert!(!should_run(
            Some(last),
            Frequency::Hourly,
            at(8, 59)
        ));
        assert!(should_run(Some(last), Frequency::Hourly, at(9, 0)));
        assert!(should_run(Some(last), Frequency::Hourly, at(10, 30)));
    }

    #[test]
    fn short_frequencies_elapse_quickly() {
        let last = at(8, 0);
        assert!(should_run(Some(last), Frequency::Every5Minutes, at(8, 5)));
        assert!(!should_run(Some(last), Frequency::Every15Minutes, at(8, 10)));
        assert!(should_run(Some(last), Frequency::Every30Minutes, at(8, 30)));
    }

    #[test]
    fn daily_and_weekly_intervals() {
        let last = at(8, 0);
        assert!(!should_run(Some(last), Frequency::Daily, at(23, 59)));
        assert!(should_run(
            Some(last),
            Frequency::Daily,
            last + Duration::days(1)
        ));
        assert!(!should_run(
            Some(last),
            Frequency::Weekly,
            last + Duration::days(6)
        ));
        assert!(should_run(
            Some(last),
            Frequency::Weekly,
            last + Duration::weeks(1)
        ));
    }

    fn signature(
        etag: Option<&str>,
        last_modified: Option<&str>,
        content_length: Option<u64>,
    ) -> FeedSignature {
        FeedSignature {
            etag: etag.map(str::to_owned),
            last_modified: last_modified.map(str::to_owned),
            content_length,
        }
    }

    #[test]
    fn no_previous_signature_means_changed() {
        let current = signature(Some("\"a\""), None, None);
        assert!(feed_changed(&current, None));
    }

    #[test]
    fn matching_etag_suppresses_the_run() {
        let current = signature(Some("\"a\""), Some("Tue"), Some(10));
        let previous = signature(Some("\"a\""), Some("Wed"), Some(99));
        // ETag wins even though the weaker validators differ.
        assert!(!feed_changed(&current, Some(&previous)));
    }

    #[test]
    fn differing_etag_forces_the_run() {
        let current = signature(Some("\"b\""), None, None);
        let previous = signature(Some("\"a\""), None, None);
        assert!(feed_changed(&current, Some(&previous)));
    }

    #[test]
    fn last_modified_decides_when_etag_is_one_sided() {
        let current = signature(Some("\"a\""), Some("Tue"), None);
        let previous = signature(None, Some("Tue"), None);
        assert!(!feed_changed(&current, Some(&previous)));
    }

    #[test]
    fn content_length_is_the_last_resort() {
        let current = signature(None, None, Some(4096));
        let previous = signature(None, None, Some(4096));
        assert!(!feed_changed(&current, Some(&previous)));

        let grown = signature(None, None, Some(5000));
        assert!(feed_changed(&grown, Some(&previous)));
    }

    #[test]
    fn incomparable_signatures_assume_changed() {
        let current = signature(None, None, None);
        let previous = signature(Some("\"a\""), Some("Tue"), Some(10));
        assert!(feed_changed(&current, Some(&previous)));
    }
}
