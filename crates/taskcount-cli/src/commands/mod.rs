pub mod count;

/// Print program information for `--about`.
pub fn about() {
    println!("count-tasks {}", taskcount_core::VERSION);
    println!("  Timed counts of completed BOINC tasks, reported through boinccmd.");
    println!("  License:  {}", env!("CARGO_PKG_LICENSE"));
    println!("  Source:   {}", env!("CARGO_PKG_REPOSITORY"));
    println!(
        "  Config:   optional {} in the working directory, with a line",
        taskcount_core::CONFIG_FILE
    );
    println!("            custom_path /path/to/boinccmd");
}
