//! CLI for taskcount: timed counts of the tasks your BOINC client reports.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use taskcount_core::LOG_FILE;

#[derive(Parser)]
#[command(name = "count-tasks")]
#[command(about = "Timed counts of the tasks your BOINC client reports, with summaries")]
#[command(version = taskcount_core::VERSION)]
struct Cli {
    /// Minutes between counts: 5, 10, 15, ... up to 60
    #[arg(long, default_value = "60")]
    interval: u32,

    /// Time between summaries, e.g. 12h or 7d (units m, h, d).
    /// Must be a whole multiple of --interval and longer than it.
    #[arg(long, default_value = "1d")]
    summary: String,

    /// Counts to run before exiting; 0 prints one status report and exits
    #[arg(long = "count-lim", default_value = "1008")]
    count_lim: u32,

    /// Append reports to the log file
    #[arg(long, default_value = "yes", value_parser = ["yes", "no"])]
    log: String,

    /// Report log location
    #[arg(long, default_value = LOG_FILE)]
    log_file: PathBuf,

    /// Path to boinccmd (overrides custom_path in the configuration file)
    #[arg(long)]
    boinccmd: Option<PathBuf>,

    /// Print author, version and license, then exit
    #[arg(long)]
    about: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.about {
        commands::about();
        return;
    }

    commands::count::run(&commands::count::CountCommandConfig {
        interval_minutes: cli.interval,
        summary: &cli.summary,
        count_limit: cli.count_lim,
        log_path: (cli.log == "yes").then_some(cli.log_file.as_path()),
        boinccmd: cli.boinccmd.as_deref(),
    });
}
