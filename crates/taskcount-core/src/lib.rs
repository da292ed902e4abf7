//! # taskcount-core
//!
//! **Timed counts of the tasks your BOINC client reports.**
//!
//! `taskcount-core` polls a local BOINC client at a fixed interval, works out
//! which reported tasks are new since the last count, and produces interval
//! and summary reports with elapsed-time statistics.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use taskcount_core::{
//!     BoincCmd, ConsoleSink, CountConfig, Countdown, InterruptibleSleep, IntervalLoop,
//! };
//!
//! let config = CountConfig::new(15, "1h", 8).unwrap();
//! let source = BoincCmd::new("/usr/bin/boinccmd").unwrap();
//! let running = Arc::new(AtomicBool::new(true));
//!
//! let mut sink = ConsoleSink::new(std::io::stdout(), None);
//! let mut sleeper = InterruptibleSleep::new(running);
//! IntervalLoop::new(source, config)
//!     .run(&Countdown::default(), &mut sleeper, &mut std::io::stdout(), &mut sink)
//!     .unwrap();
//! ```
//!
//! ## Architecture
//!
//! Countdown → poll client → stall check (and recovery) → dedup → reports
//!
//! The client only lists tasks reported within the past hour, however often
//! it is asked. [`DedupState`] remembers which tasks were already counted so
//! overlapping listings never count a task twice. Every source of data goes
//! through the [`TaskSource`] trait and every wait through [`Sleeper`], so
//! the whole loop runs in tests without a client or real time passing.

pub mod boinc;
pub mod config;
pub mod countdown;
pub mod error;
pub mod interval;
pub mod listing;
pub mod records;
pub mod report;
pub mod source;
pub mod stall;
pub mod stats;

pub use boinc::BoincCmd;
pub use config::{CONFIG_FILE, CountConfig, LOG_FILE, resolve_boinccmd};
pub use countdown::{BAR_SEGMENTS, Countdown, InterruptibleSleep, Sleeper};
pub use error::{CountError, Result};
pub use interval::{
    CycleResult, DedupState, IntervalLoop, IntervalReportKind, Phase, rollup_due, select_report,
};
pub use listing::{TaggedField, TaskStates};
pub use records::{Record, RecordId, RecordSet, dedupe, unique_count};
pub use report::{ConsoleSink, LogFile, Report, ReportSink, StartupReport, strip_ansi};
pub use source::TaskSource;
pub use stall::{RECOVERY_SETTLE, StallVerdict, detect_stall};
pub use stats::TimeStats;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
