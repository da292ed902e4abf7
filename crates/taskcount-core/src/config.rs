//! Run configuration: count cadence, summary cadence, cycle budget, and where
//! to find `boinccmd`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CountError, Result};
use crate::stall::RECOVERY_SETTLE;

/// Optional configuration file read from the working directory.
pub const CONFIG_FILE: &str = "countCFG.txt";
/// Default append-only report log.
pub const LOG_FILE: &str = "count-tasks_log.txt";

/// The client only lists tasks reported within the past hour, so counting
/// less often than this would miss some.
pub const MAX_INTERVAL_MINUTES: u32 = 60;
pub const INTERVAL_STEP_MINUTES: u32 = 5;

/// Cadence and budget of a count run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountConfig {
    /// Time between counts.
    pub interval: Duration,
    /// Time between summaries; an exact multiple of `interval`.
    pub summary: Duration,
    /// Summary period as the user wrote it, e.g. `1d`.
    pub summary_label: String,
    /// Counts to run before exiting. Zero means a single status report.
    pub count_limit: u32,
    /// Wait after a recovery request.
    pub recovery_settle: Duration,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            summary: Duration::from_secs(24 * 60 * 60),
            summary_label: "1d".to_string(),
            count_limit: 1008,
            recovery_settle: RECOVERY_SETTLE,
        }
    }
}

impl CountConfig {
    /// Build from command-line style values, enforcing the allowed interval
    /// choices.
    pub fn new(interval_minutes: u32, summary: &str, count_limit: u32) -> Result<Self> {
        let interval = parse_interval_minutes(interval_minutes)?;
        let summary_period = parse_time_unit(summary)?;
        let mut config = Self::with_periods(interval, summary_period, count_limit)?;
        config.summary_label = summary.trim().to_string();
        Ok(config)
    }

    /// Build from raw periods. The summary must be longer than the interval
    /// and an exact multiple of it.
    pub fn with_periods(interval: Duration, summary: Duration, count_limit: u32) -> Result<Self> {
        if interval.is_zero() {
            return Err(CountError::Config("interval must be greater than zero".into()));
        }
        if summary <= interval {
            return Err(CountError::Config(
                "summary time must be greater than interval time".into(),
            ));
        }
        if summary.as_nanos() % interval.as_nanos() != 0 {
            return Err(CountError::Config(format!(
                "summary time ({}s) must be a whole multiple of interval time ({}s)",
                summary.as_secs(),
                interval.as_secs()
            )));
        }
        Ok(Self {
            interval,
            summary,
            summary_label: crate::stats::format_short(summary.as_secs()),
            count_limit,
            recovery_settle: RECOVERY_SETTLE,
        })
    }

    /// Counts per summary.
    pub fn summary_factor(&self) -> u32 {
        u32::try_from(self.summary.as_nanos() / self.interval.as_nanos()).unwrap_or(u32::MAX)
    }

    /// Interval as the `15m` style label used in reports.
    pub fn interval_label(&self) -> String {
        let secs = self.interval.as_secs();
        if secs > 0 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{secs}s")
        }
    }
}

/// Validate an interval in minutes: 5 to 60 in steps of 5.
pub fn parse_interval_minutes(minutes: u32) -> Result<Duration> {
    if minutes == 0 || minutes > MAX_INTERVAL_MINUTES || minutes % INTERVAL_STEP_MINUTES != 0 {
        return Err(CountError::Config(format!(
            "interval must be one of 5, 10, ..., 60 minutes, not {minutes}"
        )));
    }
    Ok(Duration::from_secs(u64::from(minutes) * 60))
}

/// Parse `VALUEunit` with unit `m`, `h` or `d`, e.g. `12h` or `7d`.
pub fn parse_time_unit(text: &str) -> Result<Duration> {
    let text = text.trim();
    let Some(unit) = text.chars().last() else {
        return Err(CountError::Config("empty time value".into()));
    };
    let minutes_per_unit: u64 = match unit {
        'm' => 1,
        'h' => 60,
        'd' => 1440,
        other => {
            return Err(CountError::Config(format!(
                "time unit must be m, h, or d, not {other:?}"
            )));
        }
    };
    let value: u64 = text[..text.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| CountError::Config(format!("time value must be an integer: {text:?}")))?;
    if value == 0 {
        return Err(CountError::Config("time value cannot be zero".into()));
    }
    let secs = value
        .checked_mul(minutes_per_unit * 60)
        .ok_or_else(|| CountError::Config(format!("time value too large: {text:?}")))?;
    Ok(Duration::from_secs(secs))
}

// ---------------------------------------------------------------------------
// boinccmd location
// ---------------------------------------------------------------------------

/// Where `boinccmd` is installed by default on this platform.
pub fn default_boinccmd_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Some(PathBuf::from("/usr/bin/boinccmd"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("BOINC")
                .join("boinccmd")
        })
    }
    #[cfg(target_os = "windows")]
    {
        Some(PathBuf::from(r"C:\Program Files\BOINC\boinccmd.exe"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// The `custom_path <path>` entry of a configuration file, if any. Lines
/// containing `#` are comments. Paths may contain spaces.
pub fn read_custom_path(config_text: &str) -> Option<PathBuf> {
    config_text
        .lines()
        .filter(|line| !line.contains('#'))
        .find_map(|line| {
            let mut words = line.split_whitespace();
            (words.next() == Some("custom_path")).then(|| words.collect::<Vec<_>>().join(" "))
        })
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Resolve `boinccmd`: an explicit path wins, then `custom_path` in
/// `config_file`, then the platform default. Whatever is chosen must be an
/// existing file.
pub fn resolve_boinccmd(explicit: Option<&Path>, config_file: &Path) -> Result<PathBuf> {
    let from_file = std::fs::read_to_string(config_file)
        .ok()
        .and_then(|text| read_custom_path(&text));

    let (path, origin) = match (explicit, from_file) {
        (Some(p), _) => (p.to_path_buf(), "--boinccmd".to_string()),
        (None, Some(p)) => (p, config_file.display().to_string()),
        (None, None) => (
            default_boinccmd_path()
                .ok_or_else(|| CountError::Config("no default boinccmd path on this platform".into()))?,
            "default location".to_string(),
        ),
    };

    if !path.is_file() {
        return Err(CountError::Config(format!(
            "boinccmd not found at {} (from {origin}); set custom_path in {CONFIG_FILE} or pass --boinccmd",
            path.display()
        )));
    }
    Ok(path)
}
