//! Tagged `tag: value` listings as printed by `boinccmd`.
//!
//! One `--get_tasks` call returns every task with all of its fields. Rather
//! than calling the client once per field, the listing is parsed into
//! [`TaggedField`]s and [`TaskStates::group`] pulls out every tag the loop
//! needs in a single traversal.

use std::time::Duration;

use crate::error::{CountError, Result};
use crate::records::Record;

pub const NAME_TAG: &str = "name";
pub const ACTIVE_STATE_TAG: &str = "active_task_state";
pub const STATE_TAG: &str = "state";
pub const ELAPSED_TAG: &str = "elapsed time";
pub const MASTER_URL_TAG: &str = "master URL";

/// Active state of a task that is currently running.
pub const EXECUTING: &str = "EXECUTING";
/// Task state: finished and uploaded, waiting to be reported to the server.
pub const UPLOADED: &str = "uploaded";
/// Task state: input files present, ready to run.
pub const DOWNLOADED: &str = "downloaded";

/// One indented `tag: value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedField {
    pub tag: String,
    pub value: String,
}

impl TaggedField {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Parse every indented `tag: value` line of a listing, in order.
///
/// Section banners (`======== Tasks ========`), item separators
/// (`1) -----------`) and unindented lines are skipped.
pub fn parse_tagged(output: &str) -> Vec<TaggedField> {
    output
        .lines()
        .filter(|line| line.starts_with(' ') || line.starts_with('\t'))
        .filter_map(|line| {
            let (tag, value) = line.trim().split_once(':')?;
            Some(TaggedField::new(tag.trim(), value.trim()))
        })
        .filter(|field| !field.tag.is_empty())
        .collect()
}

/// Values of every field carrying `tag`, in listing order.
pub fn values_of<'a>(fields: &'a [TaggedField], tag: &str) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|f| f.tag == tag)
        .map(|f| f.value.as_str())
        .collect()
}

/// Per-tag columns of the task listing, extracted in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStates {
    pub names: Vec<String>,
    pub active_states: Vec<String>,
    pub states: Vec<String>,
}

impl TaskStates {
    pub fn group(fields: &[TaggedField]) -> Self {
        let mut grouped = Self::default();
        for field in fields {
            let column = match field.tag.as_str() {
                NAME_TAG => &mut grouped.names,
                ACTIVE_STATE_TAG => &mut grouped.active_states,
                STATE_TAG => &mut grouped.states,
                _ => continue,
            };
            column.push(field.value.clone());
        }
        grouped
    }

    /// Tasks in the client's queue, whatever their state.
    pub fn queued(&self) -> usize {
        self.names.len()
    }

    /// Tasks currently executing.
    pub fn active(&self) -> usize {
        self.active_states
            .iter()
            .filter(|s| s.as_str() == EXECUTING)
            .count()
    }
}

/// Parse `--get_old_tasks` output into reported records.
///
/// A record is emitted at each `elapsed time:` line, named after the most
/// recent `name:` field or legacy `task <name>:` header of the same block.
pub fn parse_reported(output: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in output.lines() {
        if let Some(name) = legacy_task_header(line) {
            pending_name = Some(name.to_string());
            continue;
        }
        if is_block_separator(line) {
            pending_name = None;
            continue;
        }
        let Some((tag, value)) = line.trim().split_once(':') else {
            continue;
        };
        match tag.trim() {
            NAME_TAG => pending_name = Some(value.trim().to_string()),
            ELAPSED_TAG => {
                let elapsed = parse_elapsed(value)?;
                records.push(match pending_name.take() {
                    Some(name) => Record::named(name, elapsed),
                    None => Record::unnamed(elapsed),
                });
            }
            _ => {}
        }
    }
    Ok(records)
}

/// `task some_task_name:` as printed by older clients.
fn legacy_task_header(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix("task ")?
        .strip_suffix(':')
        .map(str::trim)
}

/// `1) -----------`
fn is_block_separator(line: &str) -> bool {
    line.trim()
        .split_once(')')
        .is_some_and(|(n, rest)| n.chars().all(|c| c.is_ascii_digit()) && rest.trim().starts_with('-'))
}

/// `3600.123456 sec` -> duration.
fn parse_elapsed(value: &str) -> Result<Duration> {
    let raw = value.trim();
    let numeric = raw.strip_suffix("sec").unwrap_or(raw).trim();
    numeric
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| CountError::Malformed(format!("elapsed time {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASKS: &str = "\
======== Tasks ========
1) -----------
   name: einstein_O3AS_1
   WU name: wu_1
   project URL: https://einstein.phys.uwm.edu/
   state: downloaded
   scheduler state: scheduled
   active_task_state: EXECUTING
2) -----------
   name: einstein_O3AS_2
   WU name: wu_2
   state: uploaded
   scheduler state: uninitialized
   active_task_state: UNINITIALIZED
";

    const OLD_TASKS: &str = "\
======== Old tasks ========
1) -----------
   name: task_a
   project URL: https://einstein.phys.uwm.edu/
   app name: einstein_O3AS
   exit status: 0
   elapsed time: 3600.500000 sec
   completed time: Sat Oct 17 10:00:00 2026
2) -----------
   name: task_b
   elapsed time: 1800.250000 sec
";

    // -----------------------------------------------------------------------
    // parse_tagged tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_tagged_skips_banners_and_separators() {
        let fields = parse_tagged(TASKS);
        assert_eq!(fields[0], TaggedField::new("name", "einstein_O3AS_1"));
        assert!(fields.iter().all(|f| !f.tag.contains("====")));
        assert_eq!(fields.len(), 11);
    }

    #[test]
    fn test_parse_tagged_keeps_colons_in_values() {
        let fields = parse_tagged("   project URL: https://example.org/\n");
        assert_eq!(fields, vec![TaggedField::new("project URL", "https://example.org/")]);
    }

    #[test]
    fn test_values_of() {
        let fields = parse_tagged(TASKS);
        assert_eq!(values_of(&fields, "WU name"), vec!["wu_1", "wu_2"]);
    }

    // -----------------------------------------------------------------------
    // TaskStates tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_group_separates_state_from_scheduler_state() {
        let states = TaskStates::group(&parse_tagged(TASKS));
        assert_eq!(states.names, vec!["einstein_O3AS_1", "einstein_O3AS_2"]);
        assert_eq!(states.states, vec!["downloaded", "uploaded"]);
        assert_eq!(states.active_states, vec!["EXECUTING", "UNINITIALIZED"]);
        assert_eq!(states.queued(), 2);
        assert_eq!(states.active(), 1);
    }

    #[test]
    fn test_group_empty_listing() {
        let states = TaskStates::group(&[]);
        assert_eq!(states.queued(), 0);
        assert_eq!(states.active(), 0);
    }

    // -----------------------------------------------------------------------
    // parse_reported tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_reported_named_blocks() {
        let records = parse_reported(OLD_TASKS).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], Record::named("task_a", Duration::ZERO));
        assert_eq!(records[0].elapsed, Duration::from_secs_f64(3600.5));
        assert_eq!(records[1].elapsed, Duration::from_secs_f64(1800.25));
    }

    #[test]
    fn test_parse_reported_legacy_headers() {
        let output = "task legacy_1:\n   elapsed time: 12.000000 sec\ntask legacy_2:\n   elapsed time: 13.000000 sec\n";
        let records = parse_reported(output).unwrap();
        assert_eq!(
            records,
            vec![
                Record::named("legacy_1", Duration::ZERO),
                Record::named("legacy_2", Duration::ZERO),
            ]
        );
    }

    #[test]
    fn test_parse_reported_without_names_falls_back_to_elapsed() {
        let output = "1) -----------\n   elapsed time: 42.5 sec\n";
        let records = parse_reported(output).unwrap();
        assert_eq!(records, vec![Record::unnamed(Duration::from_secs_f64(42.5))]);
    }

    #[test]
    fn test_parse_reported_name_does_not_leak_across_blocks() {
        let output = "1) -----------\n   name: a\n2) -----------\n   elapsed time: 1 sec\n";
        let records = parse_reported(output).unwrap();
        assert_eq!(records, vec![Record::unnamed(Duration::from_secs(1))]);
    }

    #[test]
    fn test_parse_reported_rejects_garbage_elapsed() {
        let err = parse_reported("   elapsed time: soon sec\n").unwrap_err();
        assert!(matches!(err, CountError::Malformed(_)));
    }

    #[test]
    fn test_parse_reported_empty_output() {
        assert!(parse_reported("").unwrap().is_empty());
        assert!(parse_reported("======== Old tasks ========\n").unwrap().is_empty());
    }
}
