//! Entity identifiers and the per-run change set.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::watermark::Watermark;

/// Opaque identifier of a top-level film entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for EntityId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

/// Entities changed since the watermark, plus the proposed next watermark.
///
/// `ids` keeps the locator's `updated_at` order and holds no duplicates.
/// `candidate_watermark` is the `updated_at` of the last located row and is
/// `None` exactly when `ids` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    ids: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    candidate_watermark: Option<Watermark>,
}

impl ChangeSet {
    /// Build a change set, dropping repeated ids (first occurrence wins).
    /// The candidate is discarded when no ids remain.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = EntityId>, candidate: Option<Watermark>) -> Self {
        let mut seen = HashSet::new();
        let ids: Vec<EntityId> = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let candidate_watermark = if ids.is_empty() { None } else { candidate };
        Self {
            ids,
            candidate_watermark,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    #[must_use]
    pub fn candidate_watermark(&self) -> Option<&Watermark> {
        self.candidate_watermark.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
