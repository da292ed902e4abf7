//! `count-tasks`: run timed counts until the budget is spent or Ctrl+C.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use log::info;
use taskcount_core::{
    BoincCmd, CONFIG_FILE, ConsoleSink, CountConfig, CountError, Countdown, InterruptibleSleep,
    IntervalLoop, LogFile, Report, ReportSink, Result, resolve_boinccmd,
};

pub struct CountCommandConfig<'a> {
    pub interval_minutes: u32,
    pub summary: &'a str,
    pub count_limit: u32,
    pub log_path: Option<&'a Path>,
    pub boinccmd: Option<&'a Path>,
}

/// Run the count command. Exits the process with status 1 on any failure;
/// Ctrl+C at any point ends it with the shutdown notice instead.
pub fn run(cfg: &CountCommandConfig<'_>) {
    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let config = match CountConfig::new(cfg.interval_minutes, cfg.summary, cfg.count_limit) {
        Ok(c) => c,
        Err(e) => fail(&e),
    };
    let log = match cfg.log_path.map(LogFile::open).transpose() {
        Ok(l) => l,
        Err(e) => fail(&e),
    };
    let mut sink = ConsoleSink::new(io::stdout(), log);

    let client = match connect(cfg.boinccmd) {
        Ok(c) => c,
        Err(e) => return stop(&mut sink, &running, &e),
    };

    let mut sleeper = InterruptibleSleep::new(running.clone());
    let mut counter = IntervalLoop::new(client, config);
    if let Err(e) = counter.run(
        &Countdown::default(),
        &mut sleeper,
        &mut io::stdout(),
        &mut sink,
    ) {
        stop(&mut sink, &running, &e);
    }
}

/// Locate `boinccmd` and make sure the client answers.
fn connect(explicit: Option<&Path>) -> Result<BoincCmd> {
    let program = resolve_boinccmd(explicit, Path::new(CONFIG_FILE))?;
    let client = BoincCmd::new(program)?;
    let version = client.client_version()?;
    info!("connected to BOINC client {version}");
    Ok(client)
}

/// End the run after `err`: the shutdown notice if the user pressed Ctrl+C,
/// otherwise the error and exit status 1.
fn stop(sink: &mut impl ReportSink, running: &AtomicBool, err: &CountError) {
    if is_shutdown(err, running) {
        if let Err(e) = sink.emit(&Report::Shutdown { at: Local::now() }) {
            fail(&e);
        }
        return;
    }
    fail(err);
}

/// Whether `err` ends the run as a user interrupt. Ctrl+C also kills a
/// running `boinccmd`, so any failure seen after the flag drops counts.
fn is_shutdown(err: &CountError, running: &AtomicBool) -> bool {
    err.is_interrupt() || !running.load(Ordering::SeqCst)
}

fn fail(err: &CountError) -> ! {
    eprintln!("Error: {err}");
    if matches!(err, CountError::ClientNotRunning(_)) {
        eprintln!("Start the BOINC client, then run count-tasks again.");
    }
    std::process::exit(1);
}
