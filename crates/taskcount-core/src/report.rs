//! Report values, their terminal rendering, and the surfaces they go to.
//!
//! The interval loop produces [`Report`]s as plain data. Rendering adds
//! colour for the terminal; the append-only log receives the same text with
//! every escape sequence stripped.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use crossterm::cursor::{MoveToColumn, MoveToPreviousLine};
use crossterm::queue;
use crossterm::style::{Color, Print, StyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};
use regex::Regex;

use crate::error::Result;
use crate::stats::{TimeStats, format_opt, format_std};

/// Timestamp layout used in every report, e.g. `2026-Oct-17 09:30:00`.
pub const TIME_FORMAT: &str = "%Y-%b-%d %H:%M:%S";

const INDENT: &str = "                      ";
const BIG_INDENT: &str = "                                 ";

/// Settings echoed at the top of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupReport {
    pub at: DateTime<Local>,
    pub stats: TimeStats,
    pub queued: usize,
    pub count_limit: u32,
    pub interval_label: String,
    pub summary_label: String,
}

/// Everything the loop can say.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Startup(StartupReport),
    /// A project update was requested to clear a stall.
    Recovery {
        at: DateTime<Local>,
        project_url: String,
    },
    /// No new tasks this interval. `streak` counts consecutive such
    /// intervals.
    NoNewTasks {
        at: DateTime<Local>,
        streak: u32,
        interval_label: String,
        remaining: u32,
    },
    /// Nothing is executing; the user should look at the client.
    CheckRunning { at: DateTime<Local> },
    Interval {
        at: DateTime<Local>,
        stats: TimeStats,
        queued: usize,
        interval_label: String,
        remaining: u32,
    },
    Summary {
        at: DateTime<Local>,
        stats: TimeStats,
        summary_label: String,
    },
    Shutdown { at: DateTime<Local> },
}

fn highlight(text: impl std::fmt::Display) -> StyledContent<String> {
    text.to_string().with(Color::AnsiValue(33)).bold()
}

fn alert(text: &str) -> StyledContent<String> {
    text.to_string().with(Color::AnsiValue(202)).bold()
}

fn stats_lines(stats: &TimeStats) -> String {
    format!(
        "{INDENT}Task Time: mean {}, range [{} - {}],\n{BIG_INDENT}stdev {}, total {}",
        highlight(format_std(stats.mean)),
        format_opt(stats.min),
        format_opt(stats.max),
        format_opt(stats.stdev),
        format_std(stats.total),
    )
}

impl Report {
    pub fn at(&self) -> DateTime<Local> {
        match self {
            Self::Startup(s) => s.at,
            Self::Recovery { at, .. }
            | Self::NoNewTasks { at, .. }
            | Self::CheckRunning { at }
            | Self::Interval { at, .. }
            | Self::Summary { at, .. }
            | Self::Shutdown { at } => *at,
        }
    }

    /// Terminal lines above the cursor this report overwrites, so repeated
    /// quiet intervals and the countdown's trailing line stay compact.
    pub fn overwrite_lines(&self) -> u16 {
        match self {
            Self::NoNewTasks { streak, .. } if *streak > 1 => 2,
            Self::NoNewTasks { .. } | Self::CheckRunning { .. } | Self::Interval { .. } => 1,
            _ => 0,
        }
    }

    /// Coloured text for the terminal.
    pub fn render(&self) -> String {
        let at = self.at().format(TIME_FORMAT);
        match self {
            Self::Startup(s) => {
                let mut text = format!(
                    "{at}; Number of tasks in the most recent BOINC report: {}\n{}\n\
                     {INDENT}Total tasks in queue: {}\n",
                    highlight(s.stats.count),
                    stats_lines(&s.stats),
                    s.queued,
                );
                if s.count_limit > 0 {
                    text.push_str(&format!(
                        "{INDENT}Number of scheduled count intervals: {}\n\
                         {INDENT}Counts every {}, summaries every {}\n\
                         Timed intervals beginning now...\n",
                        s.count_limit, s.interval_label, s.summary_label,
                    ));
                }
                text
            }
            Self::Recovery { project_url, .. } => {
                format!("\n{at}; *** Project update requested for {project_url}. ***\n")
            }
            Self::NoNewTasks {
                streak,
                interval_label,
                remaining,
                ..
            } => format!(
                "{at}; {} in the past {streak} {interval_label} interval(s).\n\
                 {remaining} counts remaining until exit.",
                alert("NO TASKS reported"),
            ),
            Self::CheckRunning { .. } => {
                format!("\n{at}; *** Check whether tasks are running. ***\n")
            }
            Self::Interval {
                stats,
                queued,
                interval_label,
                remaining,
                ..
            } => format!(
                "{at}; Tasks reported in the past {interval_label}: {}\n{}\n\
                 {INDENT}Total tasks in queue: {queued}\n\n\
                 {remaining} counts remaining until exit.",
                highlight(stats.count),
                stats_lines(stats),
            ),
            Self::Summary {
                stats,
                summary_label,
                ..
            } => format!(
                "{at}; {} Count for the past {summary_label}: {}\n{}\n\n",
                alert(">>> SUMMARY:"),
                highlight(stats.count),
                stats_lines(stats),
            ),
            Self::Shutdown { .. } => {
                format!("\n\n  *** Interrupted by user ***\n  Quitting now...{at}\n")
            }
        }
    }

    /// Plain text for the log file.
    pub fn log_text(&self) -> String {
        let plain = strip_ansi(&self.render());
        match self {
            Self::Startup(s) => format!(
                "{}; >>> TASK COUNTER START settings <<<\n\
                 {INDENT}count interval: {}\n\
                 {INDENT}summary interval: {}\n\
                 {INDENT}max count cycles: {}\n{plain}",
                s.at.format(TIME_FORMAT),
                s.interval_label,
                s.summary_label,
                s.count_limit,
            ),
            _ => plain,
        }
    }
}

/// Remove ANSI escape sequences (colours, cursor movement, line clears).
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("static ANSI pattern")
    });
    re.replace_all(text, "").into_owned()
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for reports.
pub trait ReportSink {
    fn emit(&mut self, report: &Report) -> Result<()>;
}

impl<K: ReportSink + ?Sized> ReportSink for &mut K {
    fn emit(&mut self, report: &Report) -> Result<()> {
        (**self).emit(report)
    }
}

/// Collects reports in memory.
impl ReportSink for Vec<Report> {
    fn emit(&mut self, report: &Report) -> Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

/// Append-only plain-text report log.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for LogFile {
    fn emit(&mut self, report: &Report) -> Result<()> {
        writeln!(self.writer, "{}", report.log_text())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Coloured terminal output with in-place overwriting, optionally mirrored
/// to a [`LogFile`].
pub struct ConsoleSink<W: Write> {
    out: W,
    log: Option<LogFile>,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, log: Option<LogFile>) -> Self {
        Self { out, log }
    }

    pub fn log(&self) -> Option<&LogFile> {
        self.log.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn emit(&mut self, report: &Report) -> Result<()> {
        match report.overwrite_lines() {
            0 => queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?,
            n => queue!(self.out, MoveToPreviousLine(n), Clear(ClearType::CurrentLine))?,
        }
        queue!(self.out, Print(report.render()), Print("\n"))?;
        self.out.flush()?;
        if let Some(log) = self.log.as_mut() {
            log.emit(report)?;
        }
        Ok(())
    }
}
