//! The interval loop: poll, deduplicate, report, sleep, repeat.
//!
//! # Deduplication
//!
//! The client's "recently reported" listing covers a fixed window that is
//! unrelated to how often we poll, so consecutive polls overlap. Each cycle:
//!
//! 1. `used` is extended with the previous cycle's new records,
//! 2. this cycle's new records are everything reported that is not in
//!    `used`,
//! 3. the new records are added to the rollup accumulator.
//!
//! `used` is seeded with the startup snapshot, so tasks reported before the
//! run began are never counted, and a task counted in one interval is never
//! counted again in a later one.
//!
//! # Rollups
//!
//! Every `summary / interval` completed cycles a summary over the
//! deduplicated accumulator is emitted and the accumulator cleared. A rollup
//! that falls on a stalled cycle is skipped, not deferred; the accumulator
//! keeps growing until the next boundary.

use std::mem;

use chrono::Local;
use log::debug;

use crate::config::CountConfig;
use crate::countdown::{Countdown, Sleeper};
use crate::error::{CountError, Result};
use crate::listing::TaskStates;
use crate::records::{Record, RecordSet, dedupe, unique_count};
use crate::report::{Report, ReportSink, StartupReport};
use crate::source::TaskSource;
use crate::stall::{self, StallVerdict};
use crate::stats::TimeStats;

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Startup,
    AwaitingInterval,
    Polling,
    StallCheck,
    Reporting,
    Exit,
}

// ---------------------------------------------------------------------------
// Dedup state
// ---------------------------------------------------------------------------

/// Which records have already been attributed to an interval.
#[derive(Debug, Clone, Default)]
pub struct DedupState {
    used: RecordSet,
    new_this_interval: Vec<Record>,
    rollup: Vec<Record>,
}

impl DedupState {
    /// Start from the records the client lists at startup; none of them will
    /// ever be counted.
    pub fn seeded(startup: &[Record]) -> Self {
        Self {
            used: startup.iter().collect(),
            ..Self::default()
        }
    }

    /// Fold one poll's reported records in and return this interval's new
    /// records, deduplicated.
    pub fn advance(&mut self, reported: &[Record]) -> &[Record] {
        self.used.extend(&self.new_this_interval);
        self.new_this_interval = dedupe(&self.used.difference(reported));
        self.rollup.extend(self.new_this_interval.iter().cloned());
        &self.new_this_interval
    }

    /// The deduplicated accumulator, leaving it empty.
    pub fn take_rollup(&mut self) -> Vec<Record> {
        dedupe(&mem::take(&mut self.rollup))
    }

    pub fn used(&self) -> &RecordSet {
        &self.used
    }

    pub fn new_this_interval(&self) -> &[Record] {
        &self.new_this_interval
    }

    /// Everything accumulated since the last rollup, repeats included.
    pub fn rollup(&self) -> &[Record] {
        &self.rollup
    }

    /// Distinct tasks in the accumulator.
    pub fn rollup_count(&self) -> usize {
        unique_count(&self.rollup)
    }
}

// ---------------------------------------------------------------------------
// Per-cycle decisions
// ---------------------------------------------------------------------------

/// Which interval report a cycle produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalReportKind {
    /// No new tasks, client running.
    NoNew,
    /// No new tasks and nothing executing: the notice plus an advisory.
    NoNewStalled,
    /// New tasks, client running: full statistics.
    Full,
    /// New tasks but nothing executing: statistics are unreliable, advisory
    /// only.
    StalledAdvisory,
}

pub fn select_report(new_count: usize, stalled: bool) -> IntervalReportKind {
    match (new_count, stalled) {
        (0, false) => IntervalReportKind::NoNew,
        (0, true) => IntervalReportKind::NoNewStalled,
        (_, false) => IntervalReportKind::Full,
        (_, true) => IntervalReportKind::StalledAdvisory,
    }
}

/// A rollup is due after every `factor` completed cycles unless the client
/// is stalled.
pub fn rollup_due(completed_cycles: u32, factor: u32, stalled: bool) -> bool {
    factor > 0 && completed_cycles > 0 && completed_cycles % factor == 0 && !stalled
}

/// What one poll cycle observed and decided.
#[derive(Debug, Clone)]
pub struct CycleResult {
    /// 1-based cycle number.
    pub cycle: u32,
    pub active: usize,
    pub queued: usize,
    pub new_records: Vec<Record>,
    pub stats: TimeStats,
    pub verdict: StallVerdict,
    /// Project a recovery update was sent to, if any.
    pub recovered: Option<String>,
    /// Statistics of the rollup emitted this cycle, if one was due.
    pub rollup: Option<TimeStats>,
    pub remaining: u32,
    pub reports: Vec<Report>,
}

impl CycleResult {
    pub fn new_count(&self) -> usize {
        self.new_records.len()
    }
}

// ---------------------------------------------------------------------------
// The loop
// ---------------------------------------------------------------------------

/// Interval loop state, threaded through every cycle.
pub struct IntervalLoop<S> {
    source: S,
    config: CountConfig,
    dedup: DedupState,
    completed: u32,
    zero_streak: u32,
    phase: Phase,
}

impl<S: TaskSource> IntervalLoop<S> {
    pub fn new(source: S, config: CountConfig) -> Self {
        Self {
            source,
            config,
            dedup: DedupState::default(),
            completed: 0,
            zero_streak: 0,
            phase: Phase::Startup,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &CountConfig {
        &self.config
    }

    pub fn dedup(&self) -> &DedupState {
        &self.dedup
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed
    }

    /// Counts left before exit.
    pub fn remaining(&self) -> u32 {
        self.config.count_limit.saturating_sub(self.completed)
    }

    /// Consecutive cycles without new tasks.
    pub fn zero_streak(&self) -> u32 {
        self.zero_streak
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Take the startup snapshot, seed the dedup state and build the startup
    /// report. With a zero cycle budget the loop goes straight to
    /// [`Phase::Exit`].
    pub fn startup(&mut self) -> Result<Report> {
        let snapshot = self.source.recently_reported()?;
        let tasks = TaskStates::group(&self.source.task_listing()?);
        debug!(
            "startup snapshot: {} reported, {} queued",
            snapshot.len(),
            tasks.queued()
        );

        self.dedup = DedupState::seeded(&snapshot);
        self.phase = if self.config.count_limit == 0 {
            Phase::Exit
        } else {
            Phase::AwaitingInterval
        };

        Ok(Report::Startup(StartupReport {
            at: Local::now(),
            stats: TimeStats::from_records(&snapshot),
            queued: tasks.queued(),
            count_limit: self.config.count_limit,
            interval_label: self.config.interval_label(),
            summary_label: self.config.summary_label.clone(),
        }))
    }

    /// One poll after the countdown: query the client, check for a stall
    /// (recovering once if possible), fold in the newly reported tasks and
    /// decide the reports.
    pub fn cycle<Z>(&mut self, sleeper: &mut Z) -> Result<CycleResult>
    where
        Z: Sleeper + ?Sized,
    {
        self.phase = Phase::Polling;
        let tasks = TaskStates::group(&self.source.task_listing()?);

        self.phase = Phase::StallCheck;
        let verdict = stall::detect_stall(&tasks);
        let stalled = verdict.is_stalled();
        let mut reports = Vec::new();
        let recovered = if verdict == StallVerdict::RecoverableStall {
            stall::recover(&mut self.source, sleeper, self.config.recovery_settle)?
        } else {
            None
        };
        if let Some(url) = &recovered {
            reports.push(Report::Recovery {
                at: Local::now(),
                project_url: url.clone(),
            });
        }

        self.phase = Phase::Reporting;
        let reported = self.source.recently_reported()?;
        let new_records = self.dedup.advance(&reported).to_vec();
        self.completed += 1;
        let remaining = self.remaining();
        let stats = TimeStats::from_records(&new_records);
        debug!(
            "cycle {}: {} reported, {} new, {} used, verdict {verdict}",
            self.completed,
            reported.len(),
            new_records.len(),
            self.dedup.used().len()
        );

        let at = Local::now();
        let kind = select_report(new_records.len(), stalled);
        match kind {
            IntervalReportKind::NoNew | IntervalReportKind::NoNewStalled => {
                self.zero_streak += 1;
                reports.push(Report::NoNewTasks {
                    at,
                    streak: self.zero_streak,
                    interval_label: self.config.interval_label(),
                    remaining,
                });
                if kind == IntervalReportKind::NoNewStalled {
                    reports.push(Report::CheckRunning { at });
                }
            }
            IntervalReportKind::Full => {
                self.zero_streak = 0;
                reports.push(Report::Interval {
                    at,
                    stats: stats.clone(),
                    queued: tasks.queued(),
                    interval_label: self.config.interval_label(),
                    remaining,
                });
            }
            IntervalReportKind::StalledAdvisory => {
                reports.push(Report::CheckRunning { at });
            }
        }

        let rollup = rollup_due(self.completed, self.config.summary_factor(), stalled).then(|| {
            debug!(
                "rollup at cycle {}: {} tasks",
                self.completed,
                self.dedup.rollup_count()
            );
            let summary = TimeStats::from_records(&self.dedup.take_rollup());
            reports.push(Report::Summary {
                at,
                stats: summary.clone(),
                summary_label: self.config.summary_label.clone(),
            });
            summary
        });

        self.phase = if remaining == 0 {
            Phase::Exit
        } else {
            Phase::AwaitingInterval
        };

        Ok(CycleResult {
            cycle: self.completed,
            active: tasks.active(),
            queued: tasks.queued(),
            new_records,
            stats,
            verdict,
            recovered,
            rollup,
            remaining,
            reports,
        })
    }

    /// Run to completion: startup, then countdown and cycle until the budget
    /// is spent. Any error, an interrupt included, leaves the loop in
    /// [`Phase::Exit`]. A failure that follows an interrupt request (a client
    /// call killed by the same Ctrl+C, say) is reported as
    /// [`CountError::Interrupted`].
    pub fn run<Z, W, K>(
        &mut self,
        countdown: &Countdown,
        sleeper: &mut Z,
        display: &mut W,
        sink: &mut K,
    ) -> Result<()>
    where
        Z: Sleeper + ?Sized,
        W: std::io::Write,
        K: ReportSink + ?Sized,
    {
        match self.drive(countdown, sleeper, display, sink) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.phase = Phase::Exit;
                if !e.is_interrupt() && sleeper.interrupted() {
                    debug!("treating failure after interrupt as interrupt: {e}");
                    return Err(CountError::Interrupted);
                }
                Err(e)
            }
        }
    }

    fn drive<Z, W, K>(
        &mut self,
        countdown: &Countdown,
        sleeper: &mut Z,
        display: &mut W,
        sink: &mut K,
    ) -> Result<()>
    where
        Z: Sleeper + ?Sized,
        W: std::io::Write,
        K: ReportSink + ?Sized,
    {
        if self.phase == Phase::Startup {
            let report = self.startup()?;
            sink.emit(&report)?;
        }
        while self.phase == Phase::AwaitingInterval {
            countdown.run(self.config.interval, sleeper, display)?;
            let result = self.cycle(sleeper)?;
            for report in &result.reports {
                sink.emit(report)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recs(names: &[&str]) -> Vec<Record> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Record::named(*n, Duration::from_secs(100 + i as u64)))
            .collect()
    }

    fn names(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // DedupState tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_startup_records_never_counted() {
        let mut state = DedupState::seeded(&recs(&["a", "b"]));
        assert!(state.advance(&recs(&["a", "b"])).is_empty());
        assert!(state.rollup().is_empty());
    }

    #[test]
    fn test_overlapping_windows_count_once() {
        let mut state = DedupState::seeded(&recs(&["a"]));
        assert_eq!(names(state.advance(&recs(&["a", "x"]))), vec!["x"]);
        assert_eq!(names(state.advance(&recs(&["a", "x", "y", "z"]))), vec!["y", "z"]);
        assert_eq!(names(state.advance(&recs(&["y", "z"]))), Vec::<String>::new());
        assert_eq!(names(state.rollup()), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_used_lags_one_cycle() {
        let mut state = DedupState::seeded(&[]);
        state.advance(&recs(&["x"]));
        // x is folded into `used` only at the start of the next cycle
        assert!(!state.used().contains(&recs(&["x"])[0]));
        state.advance(&[]);
        assert!(state.used().contains(&recs(&["x"])[0]));
    }

    #[test]
    fn test_repeated_identity_within_one_poll_counts_once() {
        let mut state = DedupState::seeded(&[]);
        assert_eq!(state.advance(&recs(&["x", "x"])).len(), 1);
    }

    #[test]
    fn test_take_rollup_clears() {
        let mut state = DedupState::seeded(&[]);
        state.advance(&recs(&["x", "y"]));
        assert_eq!(state.rollup_count(), 2);
        assert_eq!(state.take_rollup().len(), 2);
        assert!(state.rollup().is_empty());
        assert_eq!(state.rollup_count(), 0);
        assert!(state.take_rollup().is_empty());
    }

    // -----------------------------------------------------------------------
    // Decision tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_select_report_variants() {
        assert_eq!(select_report(0, false), IntervalReportKind::NoNew);
        assert_eq!(select_report(0, true), IntervalReportKind::NoNewStalled);
        assert_eq!(select_report(3, false), IntervalReportKind::Full);
        assert_eq!(select_report(3, true), IntervalReportKind::StalledAdvisory);
    }

    #[test]
    fn test_rollup_boundaries_for_ratio_four() {
        let due: Vec<u32> = (1..=13).filter(|&c| rollup_due(c, 4, false)).collect();
        assert_eq!(due, vec![4, 8, 12]);
    }

    #[test]
    fn test_rollup_skipped_when_stalled() {
        assert!(!rollup_due(4, 4, true));
        assert!(!rollup_due(0, 4, false));
        assert!(!rollup_due(4, 0, false));
    }
}
