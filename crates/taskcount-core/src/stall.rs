//! Stall detection and the single-shot recovery action.
//!
//! When nothing is executing the client is *stalled*. If, on top of that,
//! finished work is sitting in the `uploaded` state with nothing left in
//! `downloaded`, the client is most likely failing to reconcile with the
//! project server, and one project update is requested to nudge it.

use std::time::Duration;

use log::{info, warn};

use crate::countdown::Sleeper;
use crate::error::Result;
use crate::listing::{DOWNLOADED, EXECUTING, TaskStates, UPLOADED};
use crate::source::TaskSource;

/// Time the server is given to respond to a recovery request.
pub const RECOVERY_SETTLE: Duration = Duration::from_secs(70);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallVerdict {
    /// At least one task is executing.
    Running,
    /// Nothing is executing.
    Stalled,
    /// Nothing is executing and finished work is stuck waiting to be
    /// reported while nothing is ready to run.
    RecoverableStall,
}

impl StallVerdict {
    pub fn is_stalled(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for StallVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stalled => write!(f, "stalled"),
            Self::RecoverableStall => write!(f, "recoverable stall"),
        }
    }
}

pub fn detect_stall(tasks: &TaskStates) -> StallVerdict {
    if tasks.active_states.iter().any(|s| s == EXECUTING) {
        return StallVerdict::Running;
    }
    let awaiting = tasks.states.iter().any(|s| s == UPLOADED);
    let ready = tasks.states.iter().any(|s| s == DOWNLOADED);
    if awaiting && !ready {
        StallVerdict::RecoverableStall
    } else {
        StallVerdict::Stalled
    }
}

/// Issue one project update for the first attached project, then wait
/// `settle` for the server to respond.
///
/// Returns the project targeted, or `None` when no project is attached. The
/// update's outcome is not checked; a persisting stall is simply detected
/// again on the next cycle. Failing to list the projects, or an interrupt
/// during the wait, is an error.
pub fn recover<S, Z>(source: &mut S, sleeper: &mut Z, settle: Duration) -> Result<Option<String>>
where
    S: TaskSource + ?Sized,
    Z: Sleeper + ?Sized,
{
    let Some(url) = source.project_urls()?.into_iter().next() else {
        warn!("stalled with no attached project to update");
        return Ok(None);
    };

    source.request_update(&url);
    info!("waiting {}s for {url} to settle", settle.as_secs());
    sleeper.sleep(settle)?;
    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::tests::RecordingSleeper;
    use crate::error::CountError;
    use crate::listing::TaggedField;
    use crate::records::Record;

    fn tasks(active: &[&str], states: &[&str]) -> TaskStates {
        TaskStates {
            names: (0..states.len()).map(|i| format!("t{i}")).collect(),
            active_states: active.iter().map(|s| s.to_string()).collect(),
            states: states.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[derive(Default)]
    struct Projects {
        urls: Vec<String>,
        fail_listing: bool,
        updates: Vec<String>,
    }

    impl TaskSource for Projects {
        fn recently_reported(&mut self) -> Result<Vec<Record>> {
            Ok(Vec::new())
        }
        fn task_listing(&mut self) -> Result<Vec<TaggedField>> {
            Ok(Vec::new())
        }
        fn project_urls(&mut self) -> Result<Vec<String>> {
            if self.fail_listing {
                return Err(CountError::Malformed("no projects".into()));
            }
            Ok(self.urls.clone())
        }
        fn request_update(&mut self, project_url: &str) {
            self.updates.push(project_url.to_string());
        }
    }

    // -----------------------------------------------------------------------
    // detect_stall tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_executing_task_means_running() {
        let t = tasks(&["EXECUTING", "UNINITIALIZED"], &["downloaded", "uploaded"]);
        assert_eq!(detect_stall(&t), StallVerdict::Running);
    }

    #[test]
    fn test_all_uploaded_is_recoverable() {
        let t = tasks(&["UNINITIALIZED", "UNINITIALIZED"], &["uploaded", "uploaded"]);
        assert_eq!(detect_stall(&t), StallVerdict::RecoverableStall);
    }

    #[test]
    fn test_downloaded_work_blocks_recovery() {
        let t = tasks(&["SUSPENDED"], &["uploaded", "downloaded"]);
        assert_eq!(detect_stall(&t), StallVerdict::Stalled);
    }

    #[test]
    fn test_empty_queue_is_plain_stall() {
        assert_eq!(detect_stall(&TaskStates::default()), StallVerdict::Stalled);
    }

    #[test]
    fn test_is_stalled() {
        assert!(!StallVerdict::Running.is_stalled());
        assert!(StallVerdict::Stalled.is_stalled());
        assert!(StallVerdict::RecoverableStall.is_stalled());
    }

    // -----------------------------------------------------------------------
    // recover tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_recover_updates_first_project_and_settles() {
        let mut source = Projects {
            urls: vec!["https://a.example/".into(), "https://b.example/".into()],
            ..Default::default()
        };
        let mut sleeper = RecordingSleeper::default();
        let target = recover(&mut source, &mut sleeper, RECOVERY_SETTLE).unwrap();
        assert_eq!(target.as_deref(), Some("https://a.example/"));
        assert_eq!(source.updates, vec!["https://a.example/"]);
        assert_eq!(sleeper.total(), RECOVERY_SETTLE);
    }

    #[test]
    fn test_recover_without_projects_is_noop() {
        let mut source = Projects::default();
        let mut sleeper = RecordingSleeper::default();
        assert_eq!(recover(&mut source, &mut sleeper, RECOVERY_SETTLE).unwrap(), None);
        assert!(source.updates.is_empty());
        assert_eq!(sleeper.total(), Duration::ZERO);
    }

    #[test]
    fn test_recover_propagates_project_listing_failure() {
        let mut source = Projects {
            fail_listing: true,
            ..Default::default()
        };
        let mut sleeper = RecordingSleeper::default();
        let err = recover(&mut source, &mut sleeper, RECOVERY_SETTLE).unwrap_err();
        assert!(matches!(err, CountError::Malformed(_)));
        assert!(source.updates.is_empty());
        assert!(sleeper.sleeps.is_empty());
    }

    #[test]
    fn test_recover_propagates_interrupt() {
        let mut source = Projects {
            urls: vec!["https://a.example/".into()],
            ..Default::default()
        };
        let mut sleeper = RecordingSleeper::interrupt_after(0);
        let err = recover(&mut source, &mut sleeper, RECOVERY_SETTLE).unwrap_err();
        assert!(err.is_interrupt());
        assert_eq!(source.updates.len(), 1);
    }
}
