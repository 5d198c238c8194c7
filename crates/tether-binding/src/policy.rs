#![forbid(unsafe_code)]

//! Update policies.
//!
//! The numeric values are part of the public contract: 1, 2, 4, 8.

use std::fmt;

/// When a value strategy runs its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum UpdatePolicy {
    /// Never propagate, not even on explicit request.
    Never = 1,
    /// Propagate only on explicit request.
    OnRequest = 2,
    /// Validate and convert on every change; write only on explicit request.
    Convert = 4,
    /// Propagate on every change and on explicit request.
    #[default]
    Update = 8,
}

impl UpdatePolicy {
    /// The policy's numeric code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse a numeric code.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Never),
            2 => Some(Self::OnRequest),
            4 => Some(Self::Convert),
            8 => Some(Self::Update),
            _ => None,
        }
    }

    /// Whether the pipeline reacts to source changes.
    #[inline]
    #[must_use]
    pub const fn is_automatic(self) -> bool {
        matches!(self, Self::Convert | Self::Update)
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Never => "never",
            Self::OnRequest => "on_request",
            Self::Convert => "convert",
            Self::Update => "update",
        })
    }
}

/// When a list or set strategy runs its pipeline.
///
/// Collections have no convert-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CollectionPolicy {
    /// Never propagate, not even on explicit request.
    Never = 1,
    /// Propagate only on explicit request.
    OnRequest = 2,
    /// Propagate on every change and on explicit request.
    #[default]
    Update = 8,
}

impl CollectionPolicy {
    /// The policy's numeric code.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parse a numeric code.
    #[must_use]
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Never),
            2 => Some(Self::OnRequest),
            8 => Some(Self::Update),
            _ => None,
        }
    }
}

impl From<CollectionPolicy> for UpdatePolicy {
    fn from(policy: CollectionPolicy) -> Self {
        match policy {
            CollectionPolicy::Never => Self::Never,
            CollectionPolicy::OnRequest => Self::OnRequest,
            CollectionPolicy::Update => Self::Update,
        }
    }
}

impl fmt::Display for CollectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        UpdatePolicy::from(*self).fmt(f)
    }
}

/// Whether a pipeline with `policy` runs for a request that is or is not explicit.
#[inline]
pub(crate) fn should_run(policy: UpdatePolicy, explicit: bool) -> bool {
    match policy {
        UpdatePolicy::Never => false,
        UpdatePolicy::OnRequest => explicit,
        UpdatePolicy::Convert | UpdatePolicy::Update => true,
    }
}
