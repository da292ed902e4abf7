//! [`TaskSource`] backed by the `boinccmd` command-line tool.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::error::{CountError, Result};
use crate::listing::{self, MASTER_URL_TAG, TaggedField};
use crate::records::Record;
use crate::source::TaskSource;

/// Printed by `boinccmd` (on stdout or stderr) when no client answers.
pub const NOT_RUNNING_MARKER: &str = "can't connect to local host";

/// Runs `boinccmd` subcommands against the local client.
#[derive(Debug, Clone)]
pub struct BoincCmd {
    program: PathBuf,
}

impl BoincCmd {
    /// Wrap the `boinccmd` binary at `program`, which must exist.
    pub fn new(program: impl Into<PathBuf>) -> Result<Self> {
        let program = program.into();
        if !program.is_file() {
            return Err(CountError::CommandNotFound(program));
        }
        Ok(Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Client version string. Doubles as the startup liveness check: it fails
    /// with [`CountError::ClientNotRunning`] when no client answers.
    pub fn client_version(&self) -> Result<String> {
        let output = self.run(&["--client_version"])?;
        Ok(output.trim().to_string())
    }

    /// Run one subcommand and return its stdout.
    fn run(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", self.program.display(), args.join(" "));
        debug!("running {command}");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| CountError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        check_output(command, output.status.success(), output.status.to_string(), stdout, &stderr)
    }
}

/// Classify a finished `boinccmd` run.
fn check_output(
    command: String,
    success: bool,
    status: String,
    stdout: String,
    stderr: &str,
) -> Result<String> {
    if let Some(line) = stdout
        .lines()
        .chain(stderr.lines())
        .find(|l| l.contains(NOT_RUNNING_MARKER))
    {
        return Err(CountError::ClientNotRunning(line.trim().to_string()));
    }
    if !success {
        return Err(CountError::CommandFailed {
            command,
            status,
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(stdout)
}

impl TaskSource for BoincCmd {
    fn recently_reported(&mut self) -> Result<Vec<Record>> {
        let output = self.run(&["--get_old_tasks"])?;
        let records = listing::parse_reported(&output)?;
        debug!("client lists {} recently reported tasks", records.len());
        Ok(records)
    }

    fn task_listing(&mut self) -> Result<Vec<TaggedField>> {
        let output = self.run(&["--get_tasks"])?;
        Ok(listing::parse_tagged(&output))
    }

    fn project_urls(&mut self) -> Result<Vec<String>> {
        let output = self.run(&["--get_project_status"])?;
        let fields = listing::parse_tagged(&output);
        Ok(listing::values_of(&fields, MASTER_URL_TAG)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    fn request_update(&mut self, project_url: &str) {
        info!("requesting project update for {project_url}");
        if let Err(e) = self.run(&["--project", project_url, "update"]) {
            warn!("project update for {project_url} not confirmed: {e}");
        }
    }
}
