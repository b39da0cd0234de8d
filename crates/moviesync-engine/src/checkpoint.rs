//! Watermark persistence: reading the confirmed watermark, staging the
//! candidate and promoting it once the load is confirmed.

use std::cmp::Ordering;

use moviesync_state::CheckpointStore;
use moviesync_types::state::{CheckpointKey, PipelineId};
use moviesync_types::watermark::Watermark;

use crate::errors::PipelineError;

/// Outcome of [`promote_candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// The confirmed watermark now equals the candidate.
    Promoted {
        previous: Option<Watermark>,
        confirmed: Watermark,
    },
    /// The candidate already is the confirmed watermark.
    Unchanged(Watermark),
    /// No candidate has been staged.
    NoCandidate,
    /// The candidate is older than the confirmed watermark; nothing written.
    Stale {
        confirmed: Watermark,
        candidate: Watermark,
    },
    /// The confirmed watermark changed concurrently; nothing written.
    Conflict,
}

impl Promotion {
    /// Whether the confirmed watermark moved.
    #[must_use]
    pub fn advanced(&self) -> bool {
        matches!(self, Self::Promoted { .. })
    }
}

fn parse_stored(pipeline: &PipelineId, key: CheckpointKey, raw: &str) -> Watermark {
    Watermark::try_parse(raw).unwrap_or_else(|e| {
        tracing::warn!(
            pipeline = pipeline.as_str(),
            key = key.as_str(),
            error = %e,
            "Stored watermark is not a timestamp; using it verbatim"
        );
        Watermark::Raw(e.raw)
    })
}

/// Watermark of the last confirmed load, if any.
///
/// # Errors
///
/// Returns [`PipelineError::State`] if the store cannot be read.
pub fn read_confirmed(
    store: &dyn CheckpointStore,
    pipeline: &PipelineId,
) -> Result<Option<Watermark>, PipelineError> {
    let raw = store.pull(pipeline, CheckpointKey::Confirmed)?;
    Ok(raw.map(|raw| parse_stored(pipeline, CheckpointKey::Confirmed, &raw)))
}

/// Candidate staged by the last run, if any.
///
/// # Errors
///
/// Returns [`PipelineError::State`] if the store cannot be read.
pub fn read_candidate(
    store: &dyn CheckpointStore,
    pipeline: &PipelineId,
) -> Result<Option<Watermark>, PipelineError> {
    let raw = store.pull(pipeline, CheckpointKey::Candidate)?;
    Ok(raw.map(|raw| parse_stored(pipeline, CheckpointKey::Candidate, &raw)))
}

/// Record the proposed next watermark without confirming it.
///
/// # Errors
///
/// Returns [`PipelineError::State`] if the store cannot be written.
pub fn stage_candidate(
    store: &dyn CheckpointStore,
    pipeline: &PipelineId,
    candidate: &Watermark,
) -> Result<(), PipelineError> {
    store.push(pipeline, CheckpointKey::Candidate, &candidate.to_string())?;
    tracing::debug!(
        pipeline = pipeline.as_str(),
        candidate = %candidate,
        "Staged candidate watermark"
    );
    Ok(())
}

/// Move the staged candidate to the confirmed key.
///
/// The confirmed watermark never moves backwards: an older candidate is
/// reported as [`Promotion::Stale`]. The write is a compare-and-set against
/// the confirmed value read here.
///
/// # Errors
///
/// Returns [`PipelineError::State`] if the store fails.
pub fn promote_candidate(
    store: &dyn CheckpointStore,
    pipeline: &PipelineId,
) -> Result<Promotion, PipelineError> {
    let Some(candidate) = read_candidate(store, pipeline)? else {
        tracing::info!(pipeline = pipeline.as_str(), "No candidate watermark to promote");
        return Ok(Promotion::NoCandidate);
    };

    let expected = store.pull(pipeline, CheckpointKey::Confirmed)?;
    let previous = expected
        .as_deref()
        .map(|raw| parse_stored(pipeline, CheckpointKey::Confirmed, raw));

    if let Some(confirmed) = &previous {
        match candidate.partial_cmp(confirmed) {
            Some(Ordering::Equal) => return Ok(Promotion::Unchanged(candidate)),
            Some(Ordering::Less) => {
                tracing::warn!(
                    pipeline = pipeline.as_str(),
                    confirmed = %confirmed,
                    candidate = %candidate,
                    "Refusing to move confirmed watermark backwards"
                );
                return Ok(Promotion::Stale {
                    confirmed: confirmed.clone(),
                    candidate,
                });
            }
            Some(Ordering::Greater) | None => {}
        }
    }

    let swapped = store.compare_and_set(
        pipeline,
        CheckpointKey::Confirmed,
        expected.as_deref(),
        &candidate.to_string(),
    )?;
    if !swapped {
        tracing::warn!(
            pipeline = pipeline.as_str(),
            "Confirmed watermark changed during promotion; leaving it as is"
        );
        return Ok(Promotion::Conflict);
    }

    tracing::info!(
        pipeline = pipeline.as_str(),
        previous = previous.as_ref().map(ToString::to_string).as_deref(),
        confirmed = %candidate,
        "Watermark advanced: load confirmed"
    );
    Ok(Promotion::Promoted {
        previous,
        confirmed: candidate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use moviesync_state::SqliteCheckpointStore;

    fn pid() -> PipelineId {
        PipelineId::new("test_pipe")
    }

    fn wm(raw: &str) -> Watermark {
        Watermark::try_parse(raw).unwrap()
    }

    #[test]
    fn test_no_candidate() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        assert_eq!(promote_candidate(&store, &pid()).unwrap(), Promotion::NoCandidate);
        assert!(read_confirmed(&store, &pid()).unwrap().is_none());
    }

    #[test]
    fn test_first_promotion() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        stage_candidate(&store, &pid(), &wm("2024-01-02 00:00:00")).unwrap();
        assert!(read_confirmed(&store, &pid()).unwrap().is_none());

        let promotion = promote_candidate(&store, &pid()).unwrap();
        assert!(promotion.advanced());
        assert_eq!(
            read_confirmed(&store, &pid()).unwrap(),
            Some(wm("2024-01-02 00:00:00"))
        );
        assert_eq!(
            store.pull(&pid(), CheckpointKey::Confirmed).unwrap().as_deref(),
            Some("2024-01-02 00:00:00.000000")
        );
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        stage_candidate(&store, &pid(), &wm("2024-01-02 00:00:00")).unwrap();
        promote_candidate(&store, &pid()).unwrap();
        assert_eq!(
            promote_candidate(&store, &pid()).unwrap(),
            Promotion::Unchanged(wm("2024-01-02 00:00:00"))
        );
    }

    #[test]
    fn test_confirmed_never_moves_backwards() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .push(&pid(), CheckpointKey::Confirmed, "2024-02-01 00:00:00")
            .unwrap();
        stage_candidate(&store, &pid(), &wm("2024-01-01 00:00:00")).unwrap();

        let promotion = promote_candidate(&store, &pid()).unwrap();
        assert!(matches!(promotion, Promotion::Stale { .. }));
        assert_eq!(
            read_confirmed(&store, &pid()).unwrap(),
            Some(wm("2024-02-01 00:00:00"))
        );
    }

    #[test]
    fn test_legacy_formats_are_understood() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .push(&pid(), CheckpointKey::Confirmed, "2021-06-16 20:14:09.221838+00")
            .unwrap();
        assert_eq!(
            read_confirmed(&store, &pid()).unwrap(),
            Some(Watermark::Epoch(1_623_874_449_221_838))
        );
    }

    #[test]
    fn test_raw_confirmed_is_replaced() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store.push(&pid(), CheckpointKey::Confirmed, "garbage").unwrap();
        assert_eq!(
            read_confirmed(&store, &pid()).unwrap(),
            Some(Watermark::Raw("garbage".into()))
        );

        stage_candidate(&store, &pid(), &wm("2024-01-01 00:00:00")).unwrap();
        let promotion = promote_candidate(&store, &pid()).unwrap();
        assert!(promotion.advanced());
    }

    #[test]
    fn test_candidate_is_kept_separately() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        stage_candidate(&store, &pid(), &Watermark::Epoch(5_000_000)).unwrap();
        assert_eq!(
            read_candidate(&store, &pid()).unwrap(),
            Some(Watermark::Epoch(5_000_000))
        );
        assert!(read_confirmed(&store, &pid()).unwrap().is_none());
    }
}
