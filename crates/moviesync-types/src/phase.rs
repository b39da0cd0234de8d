//! Stage identities, stage outputs and the per-run phase machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Locate,
    Fetch,
    Transform,
    Load,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locate => "locate",
            Self::Fetch => "fetch",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful stage result: data to hand on, or a legitimate "nothing to do".
///
/// Failures travel separately as `Err`, so "no changes" and "query failed"
/// are never confused.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput<T> {
    Ready(T),
    Empty,
}

impl<T> StageOutput<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutput<U> {
        match self {
            Self::Ready(value) => StageOutput::Ready(f(value)),
            Self::Empty => StageOutput::Empty,
        }
    }

    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Empty => None,
        }
    }
}

/// Sub-steps of a load, reported in the order they completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStep {
    Dropped,
    Created,
    Inserted,
    Verified,
}

/// Where a single run currently is.
///
/// `Idle → Locating → Fetching → Transforming → Loading → Dropped → Created →
/// Inserted → Verified → Done`, with early exits to `Done` after an empty
/// locate or fetch, and `Failed` reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Locating,
    Fetching,
    Transforming,
    Loading,
    Dropped,
    Created,
    Inserted,
    Verified,
    Done,
    Failed,
}

impl RunPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use RunPhase::{
            Created, Done, Dropped, Failed, Fetching, Idle, Inserted, Loading, Locating,
            Transforming, Verified,
        };

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Locating)
                | (Locating | Fetching | Transforming, Done)
                | (Locating, Fetching)
                | (Fetching, Transforming)
                | (Transforming, Loading)
                | (Loading, Dropped | Created)
                | (Dropped, Created)
                | (Created, Inserted)
                | (Inserted, Verified)
                | (Verified, Done)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Locating => "locating",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Dropped => "dropped",
            Self::Created => "created",
            Self::Inserted => "inserted",
            Self::Verified => "verified",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl From<LoadStep> for RunPhase {
    fn from(step: LoadStep) -> Self {
        match step {
            LoadStep::Dropped => Self::Dropped,
            LoadStep::Created => Self::Created,
            LoadStep::Inserted => Self::Inserted,
            LoadStep::Verified => Self::Verified,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
