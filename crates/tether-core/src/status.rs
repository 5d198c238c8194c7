#![forbid(unsafe_code)]

//! Severity-ranked results.
//!
//! A [`Status`] is either a single result or a multi-status that aggregates
//! children. A multi-status always reports the maximum severity of its
//! children.
//!
//! There are two multi-status flavours:
//!
//! - [`Status::multi`]: keeps the message it was created with.
//! - [`Status::binding_ok`]: a binding outcome; its message and cause track the
//!   most severe child added so far, so a UI can show one line per binding.
//!
//! # Invariants
//!
//! 1. `Ok < Info < Warning < Error < Cancel`.
//! 2. A multi-status severity is never lower than any child's severity.
//! 3. `merge` flattens one level: merging a multi-status adds its children,
//!    merging a single status adds the status itself.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

/// Severity of a [`Status`], ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Severity {
    /// Nothing to report.
    #[default]
    Ok = 0,
    /// Informational.
    Info = 1,
    /// A problem that does not block propagation.
    Warning = 2,
    /// A problem that blocks propagation.
    Error = 4,
    /// The operation was cancelled.
    Cancel = 8,
}

impl Severity {
    /// Whether this severity stops a value pipeline.
    #[inline]
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Error | Self::Cancel)
    }

    /// Lower-case label used in formatted output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Single,
    Multi,
    Binding,
}

/// A severity-ranked result value.
#[derive(Clone)]
pub struct Status {
    severity: Severity,
    code: i32,
    message: String,
    cause: Option<Rc<dyn Error>>,
    children: Vec<Status>,
    kind: Kind,
}

impl Status {
    /// Create a single status.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: 0,
            message: message.into(),
            cause: None,
            children: Vec::new(),
            kind: Kind::Single,
        }
    }

    /// The OK status.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(Severity::Ok, "")
    }

    /// An informational status.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// A warning status.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// An error status.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// A cancel status.
    #[must_use]
    pub fn cancel(message: impl Into<String>) -> Self {
        Self::new(Severity::Cancel, message)
    }

    /// An error status carrying the error that caused it.
    ///
    /// The message is the error's display text.
    #[must_use]
    pub fn from_error(error: impl Error + 'static) -> Self {
        let message = error.to_string();
        Self::error(message).with_cause(error)
    }

    /// An empty multi-status with a fixed message.
    #[must_use]
    pub fn multi(message: impl Into<String>) -> Self {
        Self {
            kind: Kind::Multi,
            ..Self::new(Severity::Ok, message)
        }
    }

    /// An empty binding outcome.
    #[must_use]
    pub fn binding_ok() -> Self {
        Self {
            kind: Kind::Binding,
            ..Self::ok()
        }
    }

    /// Attach a status code.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Attach the error that caused this status.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Error + 'static) -> Self {
        self.cause = Some(Rc::new(cause));
        self
    }

    /// Severity of this status (the maximum child severity for multi-statuses).
    #[inline]
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Status code, zero unless set.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The error that caused this status, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&dyn Error> {
        self.cause.as_deref()
    }

    /// Children of a multi-status; empty for single statuses.
    #[must_use]
    pub fn children(&self) -> &[Status] {
        &self.children
    }

    /// Whether the severity is [`Severity::Ok`].
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }

    /// Whether this status aggregates children.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.kind != Kind::Single
    }

    /// Add `child` to this multi-status.
    pub fn add(&mut self, child: Status) {
        debug_assert!(self.is_multi(), "add() called on a single status");
        if child.severity > self.severity {
            if self.kind == Kind::Binding {
                self.message.clone_from(&child.message);
                self.cause.clone_from(&child.cause);
            }
            self.severity = child.severity;
        }
        self.children.push(child);
    }

    /// Merge `other` into this multi-status.
    ///
    /// A multi-status contributes its children; a single status is added as is.
    pub fn merge(&mut self, other: Status) {
        if other.is_multi() {
            for child in other.children {
                self.add(child);
            }
        } else {
            self.add(other);
        }
    }

    /// Depth-first iterator over this status and all of its descendants.
    pub fn flatten(&self) -> impl Iterator<Item = &Status> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl PartialEq for Status {
    fn eq(&self, other: &Self) -> bool {
        self.severity == other.severity
            && self.code == other.code
            && self.kind == other.kind
            && self.message == other.message
            && self.children == other.children
            && self.cause.as_ref().map(ToString::to_string)
                == other.cause.as_ref().map(ToString::to_string)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Status");
        s.field("severity", &self.severity)
            .field("message", &self.message);
        if self.code != 0 {
            s.field("code", &self.code);
        }
        if let Some(cause) = &self.cause {
            s.field("cause", &cause.to_string());
        }
        if self.is_multi() {
            s.field("children", &self.children);
        }
        s.finish()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.severity)
        } else {
            write!(f, "{}: {}", self.severity, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn severity_ordering() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Cancel);
        assert!(Severity::Error.is_blocking());
        assert!(Severity::Cancel.is_blocking());
        assert!(!Severity::Warning.is_blocking());
    }

    #[test]
    fn multi_tracks_max_severity_but_keeps_message() {
        let mut multi = Status::multi("Multiple problems");
        multi.add(Status::warning("w"));
        multi.add(Status::error("e"));
        multi.add(Status::info("i"));
        assert_eq!(multi.severity(), Severity::Error);
        assert_eq!(multi.message(), "Multiple problems");
        assert_eq!(multi.children().len(), 3);
    }

    #[test]
    fn binding_status_reports_most_severe_child() {
        let mut status = Status::binding_ok();
        assert!(status.is_ok());
        status.add(Status::warning("first warning"));
        status.add(Status::warning("second warning"));
        assert_eq!(status.message(), "first warning");
        status.add(Status::from_error(Boom));
        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.message(), "boom");
        assert_eq!(status.cause().map(ToString::to_string), Some("boom".into()));
    }

    #[test]
    fn merge_flattens_one_level() {
        let mut inner = Status::multi("inner");
        inner.add(Status::error("a"));
        inner.add(Status::warning("b"));

        let mut outer = Status::multi("outer");
        outer.merge(inner);
        outer.merge(Status::info("c"));
        let messages: Vec<_> = outer.children().iter().map(Status::message).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
        assert_eq!(outer.severity(), Severity::Error);
    }

    #[test]
    fn flatten_visits_depth_first() {
        let mut inner = Status::multi("inner");
        inner.add(Status::error("leaf"));
        let mut outer = Status::multi("outer");
        outer.add(inner);
        outer.add(Status::warning("sibling"));
        let messages: Vec<_> = outer.flatten().map(Status::message).collect();
        assert_eq!(messages, vec!["outer", "inner", "leaf", "sibling"]);
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Status::error("x"), Status::error("x"));
        assert_ne!(Status::error("x"), Status::warning("x"));
        assert_ne!(Status::ok(), Status::binding_ok());
        assert_eq!(Status::from_error(Boom), Status::from_error(Boom));
    }

    #[test]
    fn display_includes_severity() {
        assert_eq!(Status::error("bad").to_string(), "error: bad");
        assert_eq!(Status::ok().to_string(), "ok");
    }
}
