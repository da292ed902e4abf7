//! The data source the interval loop polls.
//!
//! [`TaskSource`] is the seam between the counting logic and the BOINC
//! client. The production implementation is [`crate::boinc::BoincCmd`];
//! tests drive the loop with scripted fakes.

use crate::error::Result;
use crate::listing::TaggedField;
use crate::records::Record;

/// A local client that runs tasks and reports finished ones upstream.
pub trait TaskSource {
    /// Records of tasks reported upstream within the client's own, fixed
    /// lookback window. Consecutive calls overlap.
    fn recently_reported(&mut self) -> Result<Vec<Record>>;

    /// Every field of every queued task as one flat tagged listing.
    fn task_listing(&mut self) -> Result<Vec<TaggedField>>;

    /// URLs of the attached projects, in the client's listing order.
    fn project_urls(&mut self) -> Result<Vec<String>>;

    /// Ask the client to contact `project_url`'s server. Fire-and-forget:
    /// the outcome is not reported back.
    fn request_update(&mut self, project_url: &str);
}

impl<S: TaskSource + ?Sized> TaskSource for &mut S {
    fn recently_reported(&mut self) -> Result<Vec<Record>> {
        (**self).recently_reported()
    }

    fn task_listing(&mut self) -> Result<Vec<TaggedField>> {
        (**self).task_listing()
    }

    fn project_urls(&mut self) -> Result<Vec<String>> {
        (**self).project_urls()
    }

    fn request_update(&mut self, project_url: &str) {
        (**self).request_update(project_url);
    }
}
