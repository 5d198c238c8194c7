#![forbid(unsafe_code)]

//! Update strategies: the pipelines that move data between two observables.
//!
//! A strategy describes one direction of a binding. Each step of the
//! pipeline is an optional hook; a step without a hook falls back to the
//! default behaviour, so callers customise one step without rewriting the
//! rest.
//!
//! - [`UpdateValueStrategy`]: validate after get, convert, validate after
//!   convert, validate before set, set.
//! - [`UpdateListStrategy`]: convert each element of a list diff and apply it
//!   with add/remove/move/replace.
//! - [`UpdateSetStrategy`]: convert each element of a set diff and apply it
//!   with add/remove.
//!
//! # Failure Modes
//!
//! Value pipelines stop at the first step whose status is blocking
//! (error or cancel). Collection pipelines record a failed element and carry
//! on with the next one.

mod list;
mod set;
mod value;

pub use list::UpdateListStrategy;
pub use set::UpdateSetStrategy;
pub use value::UpdateValueStrategy;

use tether_core::Status;

/// Accumulates the statuses produced by one propagation.
#[derive(Debug)]
pub(crate) struct StatusCollector {
    status: Status,
    abort_on_error: bool,
}

impl StatusCollector {
    /// Stop as soon as the merged severity is blocking.
    pub(crate) fn aborting() -> Self {
        Self {
            status: Status::binding_ok(),
            abort_on_error: true,
        }
    }

    /// Never stop; record every problem.
    pub(crate) fn accumulating() -> Self {
        Self {
            status: Status::binding_ok(),
            abort_on_error: false,
        }
    }

    /// Merge `status`. Returns `false` when the pipeline must stop.
    pub(crate) fn merge(&mut self, status: Status) -> bool {
        if !status.is_ok() {
            self.status.merge(status);
        }
        !(self.abort_on_error && self.status.severity().is_blocking())
    }

    pub(crate) fn finish(self) -> Status {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use tether_core::Severity;

    use super::*;

    #[test]
    fn aborting_collector_stops_on_error() {
        let mut collector = StatusCollector::aborting();
        assert!(collector.merge(Status::ok()));
        assert!(collector.merge(Status::warning("careful")));
        assert!(!collector.merge(Status::error("bad")));
        let status = collector.finish();
        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.message(), "bad");
        assert_eq!(status.children().len(), 2);
    }

    #[test]
    fn accumulating_collector_keeps_going() {
        let mut collector = StatusCollector::accumulating();
        assert!(collector.merge(Status::error("one")));
        assert!(collector.merge(Status::error("two")));
        let status = collector.finish();
        assert_eq!(status.children().len(), 2);
        assert_eq!(status.message(), "one");
    }
}
