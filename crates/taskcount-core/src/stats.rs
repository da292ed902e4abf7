//! Elapsed-time statistics and human-readable duration formatting.

use std::time::Duration;

use statrs::statistics::Statistics;

use crate::records::{Record, dedupe};

/// Aggregate statistics over a collection of task elapsed times.
///
/// Empty input is well defined: zero count, zero total and mean, and no
/// spread or range. `stdev` needs at least two samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStats {
    pub count: usize,
    pub total: Duration,
    pub mean: Duration,
    pub stdev: Option<Duration>,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl TimeStats {
    pub fn empty() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            mean: Duration::ZERO,
            stdev: None,
            min: None,
            max: None,
        }
    }

    /// Statistics over the distinct records in `records`.
    pub fn from_records(records: &[Record]) -> Self {
        let elapsed: Vec<Duration> = dedupe(records).iter().map(|r| r.elapsed).collect();
        Self::from_durations(&elapsed)
    }

    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::empty();
        }
        let secs: Vec<f64> = durations.iter().map(Duration::as_secs_f64).collect();
        let total: Duration = durations.iter().sum();
        let mean = Statistics::mean(secs.iter());
        let stdev = (secs.len() > 1)
            .then(|| Statistics::std_dev(secs.iter()))
            .and_then(secs_to_duration);

        Self {
            count: durations.len(),
            total,
            mean: secs_to_duration(mean).unwrap_or_default(),
            stdev,
            min: secs_to_duration(Statistics::min(secs.iter())),
            max: secs_to_duration(Statistics::max(secs.iter())),
        }
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `HH:MM:SS`, or `Nd HH:MM:SS` from one day up. Sub-second parts are
/// truncated.
pub fn format_std(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (day, rem) = (secs / 86_400, secs % 86_400);
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    if day > 0 {
        format!("{day}d {h:02}:{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}")
    }
}

/// The largest whole unit only: `2d`, `5h`, `45m` or `30s`.
pub fn format_short(secs: u64) -> String {
    match secs {
        86_400.. => format!("{}d", secs / 86_400),
        3600.. => format!("{}h", secs / 3600),
        60.. => format!("{}m", secs / 60),
        _ => format!("{secs}s"),
    }
}

/// [`format_std`] for optional values; absent values render as `na`.
pub fn format_opt(duration: Option<Duration>) -> String {
    duration.map_or_else(|| "na".to_string(), format_std)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(v: &[u64]) -> Vec<Duration> {
        v.iter().map(|&s| Duration::from_secs(s)).collect()
    }

    // -----------------------------------------------------------------------
    // TimeStats tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_empty_input_is_zeroed() {
        let stats = TimeStats::from_durations(&[]);
        assert_eq!(stats, TimeStats::empty());
        assert_eq!(stats.total, Duration::ZERO);
        assert_eq!(stats.mean, Duration::ZERO);
        assert!(stats.min.is_none() && stats.max.is_none() && stats.stdev.is_none());
    }

    #[test]
    fn test_single_sample_has_no_stdev() {
        let stats = TimeStats::from_durations(&secs(&[3600]));
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total, Duration::from_secs(3600));
        assert_eq!(stats.mean, Duration::from_secs(3600));
        assert_eq!(stats.min, Some(Duration::from_secs(3600)));
        assert_eq!(stats.max, Some(Duration::from_secs(3600)));
        assert!(stats.stdev.is_none());
    }

    #[test]
    fn test_basic_aggregates() {
        let stats = TimeStats::from_durations(&secs(&[100, 200, 300, 400]));
        assert_eq!(stats.count, 4);
        assert_eq!(stats.total, Duration::from_secs(1000));
        assert_eq!(stats.mean.as_secs(), 250);
        assert_eq!(stats.min, Some(Duration::from_secs(100)));
        assert_eq!(stats.max, Some(Duration::from_secs(400)));
        // sample stdev of 100..400 step 100 is ~129.1
        let sd = stats.stdev.unwrap().as_secs_f64();
        assert!((sd - 129.099).abs() < 0.01, "stdev was {sd}");
    }

    #[test]
    fn test_from_records_dedupes() {
        let records = vec![
            Record::named("a", Duration::from_secs(10)),
            Record::named("a", Duration::from_secs(10)),
            Record::named("b", Duration::from_secs(30)),
        ];
        let stats = TimeStats::from_records(&records);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total, Duration::from_secs(40));
    }

    // -----------------------------------------------------------------------
    // Formatting tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_std() {
        assert_eq!(format_std(Duration::ZERO), "00:00:00");
        assert_eq!(format_std(Duration::from_secs_f64(3725.9)), "01:02:05");
        assert_eq!(format_std(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[test]
    fn test_format_short() {
        assert_eq!(format_short(0), "0s");
        assert_eq!(format_short(59), "59s");
        assert_eq!(format_short(60), "1m");
        assert_eq!(format_short(3599), "59m");
        assert_eq!(format_short(7200), "2h");
        assert_eq!(format_short(172_800), "2d");
    }

    #[test]
    fn test_format_opt_na() {
        assert_eq!(format_opt(None), "na");
        assert_eq!(format_opt(Some(Duration::from_secs(61))), "00:01:01");
    }
}
