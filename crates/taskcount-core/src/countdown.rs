//! Blocking countdown between polls.
//!
//! The interval is split into a fixed number of segments. Each segment
//! redraws a shrinking bar labelled with the time left, then sleeps for one
//! segment. The label comes from the nominal remaining time rather than the
//! wall clock, so long intervals may drift slightly.
//!
//! Sleeping goes through [`Sleeper`] so the loop can be driven in tests
//! without real time passing.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::{Color, Print, Stylize};
use crossterm::terminal::{Clear, ClearType};

use crate::error::{CountError, Result};
use crate::stats::format_short;

/// Bar segments per interval. 60 lines up with whole minutes for every
/// allowed interval length.
pub const BAR_SEGMENTS: usize = 60;

/// Blocking wait that can be cut short by an interrupt.
pub trait Sleeper {
    /// Block for `duration`. Returns [`CountError::Interrupted`] as soon as
    /// an interrupt is observed.
    fn sleep(&mut self, duration: Duration) -> Result<()>;

    /// Whether an interrupt has been requested, even outside a sleep.
    fn interrupted(&self) -> bool {
        false
    }
}

impl<Z: Sleeper + ?Sized> Sleeper for &mut Z {
    fn sleep(&mut self, duration: Duration) -> Result<()> {
        (**self).sleep(duration)
    }

    fn interrupted(&self) -> bool {
        (**self).interrupted()
    }
}

/// Real-time sleeper that polls a shared run flag, typically cleared by a
/// Ctrl+C handler.
#[derive(Debug, Clone)]
pub struct InterruptibleSleep {
    running: Arc<AtomicBool>,
    poll: Duration,
}

impl InterruptibleSleep {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            poll: Duration::from_millis(10),
        }
    }
}

impl Sleeper for InterruptibleSleep {
    fn sleep(&mut self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Err(CountError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(self.poll.min(deadline - now));
        }
    }

    fn interrupted(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// One redraw of the countdown bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub remaining_secs: u64,
    pub bar_len: usize,
}

impl Frame {
    /// The last segment is drawn in a different colour.
    pub fn is_final(&self) -> bool {
        self.bar_len == 1
    }

    pub fn label(&self) -> String {
        format_short(self.remaining_secs)
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let background = if self.is_final() {
            Color::AnsiValue(28)
        } else {
            Color::AnsiValue(53)
        };
        let bar = format!("{}{}", self.label(), " ".repeat(self.bar_len));
        write!(
            f,
            "{}|< ~time to next count",
            bar.with(Color::AnsiValue(231)).on(background).slow_blink()
        )
    }
}

/// Sleep time per segment.
pub fn segment_duration(total: Duration, segments: usize) -> Duration {
    total / u32::try_from(segments.max(1)).unwrap_or(u32::MAX)
}

/// Every frame of a countdown over `total`, first to last.
pub fn frames(total: Duration, segments: usize) -> impl Iterator<Item = Frame> {
    let segments = segments.max(1);
    let step = segment_duration(total, segments);
    (0..segments).map(move |i| Frame {
        remaining_secs: total.saturating_sub(step * i as u32).as_secs(),
        bar_len: segments - i,
    })
}

/// Draws frames to `out` and sleeps between them.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    segments: usize,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(BAR_SEGMENTS)
    }
}

impl Countdown {
    pub fn new(segments: usize) -> Self {
        Self {
            segments: segments.max(1),
        }
    }

    /// Block for `total`, redrawing the bar once per segment. The bar line is
    /// cleared when the countdown completes.
    pub fn run<W, Z>(&self, total: Duration, sleeper: &mut Z, out: &mut W) -> Result<()>
    where
        W: Write,
        Z: Sleeper + ?Sized,
    {
        let step = segment_duration(total, self.segments);
        for frame in frames(total, self.segments) {
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(frame))?;
            out.flush()?;
            sleeper.sleep(step)?;
        }
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        out.flush()?;
        Ok(())
    }
}
