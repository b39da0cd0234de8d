//! End-to-end runs against real SQLite files: locate, fetch, transform,
//! load and watermark promotion.

mod common;

use common::{pairs, SyncEnv};
use moviesync_engine::checkpoint::{read_candidate, read_confirmed};
use moviesync_engine::config::parser;
use moviesync_engine::config::types::PipelineConfig;
use moviesync_engine::config::validator;
use moviesync_engine::{
    run_pipeline, ExecutionOptions, PipelineError, PipelineOutcome, PipelineResult, Promotion,
};
use moviesync_state::CheckpointStore;
use moviesync_types::phase::Stage;
use moviesync_types::state::{CheckpointKey, PipelineId, RunStatus};
use moviesync_types::watermark::Watermark;

fn run(env: &SyncEnv, fields: &[&str], extra: &str) -> PipelineResult {
    run_config(&env.config(fields, extra))
}

fn run_config(config: &PipelineConfig) -> PipelineResult {
    match run_pipeline(config, &ExecutionOptions::default()).expect("pipeline run") {
        PipelineOutcome::Run(result) => result,
        PipelineOutcome::DryRun(_) => panic!("expected a real run"),
    }
}

fn pipeline() -> PipelineId {
    PipelineId::new("movies")
}

fn wm(raw: &str) -> Watermark {
    Watermark::try_parse(raw).unwrap()
}

#[test]
fn test_parse_and_validate_fixture_pipeline() {
    std::env::set_var("MS_IT_DATA_DIR", "/var/lib/moviesync");

    let fixture_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("tests/fixtures/pipelines/movies_sqlite.yaml");

    let config = parser::parse_pipeline(&fixture_path).expect("Failed to parse fixture pipeline");
    assert_eq!(config.pipeline, "movies_sqlite");
    assert_eq!(config.connections["movies_src"].host, "/var/lib/moviesync");
    assert_eq!(config.fields.first().map(String::as_str), Some("film_id"));
    validator::validate_pipeline(&config).expect("Validation should pass");

    std::env::remove_var("MS_IT_DATA_DIR");
}

#[test]
fn test_parse_invalid_fixture_fails() {
    let fixture_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("tests/fixtures/pipelines/invalid_pipeline.yaml");

    let err = parser::parse_pipeline(&fixture_path).unwrap_err().to_string();
    assert!(
        err.contains("unknown variant") || err.contains("Failed to parse pipeline YAML"),
        "Expected serde enum parse error, got: {err}"
    );
}

#[test]
fn test_first_run_from_epoch_picks_up_all_changes() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    env.film("f2", "Beta", "2024-03-02 10:00:00");
    env.film("f3", "Gamma", "2024-03-03 10:00:00.250000");
    env.store()
        .push(&pipeline(), CheckpointKey::Confirmed, "1970-01-01 00:00:00")
        .unwrap();

    let result = run(&env, &["film_id", "title"], "");

    assert_eq!(result.counts.ids_located, 3);
    assert_eq!(result.counts.records_written, 3);
    assert_eq!(result.candidate, Some(wm("2024-03-03 10:00:00.25")));
    assert!(matches!(result.promotion, Some(Promotion::Promoted { .. })));
    assert_eq!(
        env.target_titles(),
        Some(pairs(&[("f1", "Alpha"), ("f2", "Beta"), ("f3", "Gamma")]))
    );

    let store = env.store();
    assert_eq!(
        read_confirmed(&store, &pipeline()).unwrap(),
        Some(wm("2024-03-03 10:00:00.25"))
    );
    let runs = store.recent_runs(&pipeline(), 1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].stats.ids_located, 3);
}

#[test]
fn test_duplicate_bridge_rows_aggregate_once() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    env.person("a1", "Anna");
    env.cast("l1", "f1", "a1", "actor");
    env.cast("l2", "f1", "a1", "actor");

    run(&env, &["film_id", "title", "actors"], "");

    assert_eq!(env.target_column("f1", "actors"), "a1 : Anna");
}

#[test]
fn test_empty_change_set_leaves_target_and_checkpoint_alone() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    env.store()
        .push(&pipeline(), CheckpointKey::Confirmed, "2030-01-01 00:00:00")
        .unwrap();

    let result = run(&env, &["film_id", "title"], "");

    assert_eq!(result.counts.ids_located, 0);
    assert!(result.load.is_none());
    assert!(result.promotion.is_none());
    assert_eq!(env.target_titles(), None);
    let store = env.store();
    assert_eq!(
        read_confirmed(&store, &pipeline()).unwrap(),
        Some(wm("2030-01-01 00:00:00"))
    );
    assert_eq!(read_candidate(&store, &pipeline()).unwrap(), None);
}

#[test]
fn test_second_run_only_picks_up_newer_changes() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    env.film("f2", "Beta", "2024-03-02 10:00:00");
    run(&env, &["film_id", "title"], "load_mode: upsert");

    env.source
        .execute("UPDATE film_work SET title = 'Beta II' WHERE id = 'f2'", [])
        .unwrap();
    env.touch("f2", "2024-03-05 09:00:00");
    env.film("f3", "Gamma", "2024-03-04 10:00:00");

    let second = run(&env, &["film_id", "title"], "load_mode: upsert");

    assert_eq!(second.counts.ids_located, 2);
    assert_eq!(
        env.target_titles(),
        Some(pairs(&[("f1", "Alpha"), ("f2", "Beta II"), ("f3", "Gamma")]))
    );
    assert_eq!(
        read_confirmed(&env.store(), &pipeline()).unwrap(),
        Some(wm("2024-03-05 09:00:00"))
    );
}

#[test]
fn test_replace_mode_keeps_only_latest_batch() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    run(&env, &["film_id", "title"], "");

    env.film("f2", "Beta", "2024-03-02 10:00:00");
    run(&env, &["film_id", "title"], "");

    // The boundary row f1 is re-read, so both survive the drop-and-recreate.
    assert_eq!(
        env.target_titles(),
        Some(pairs(&[("f1", "Alpha"), ("f2", "Beta")]))
    );

    env.film("f3", "Gamma", "2024-03-03 10:00:00");
    run(&env, &["film_id", "title"], "");
    assert_eq!(
        env.target_titles(),
        Some(pairs(&[("f2", "Beta"), ("f3", "Gamma")]))
    );
}

#[test]
fn test_rerun_without_changes_is_idempotent() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    run(&env, &["film_id", "title"], "");
    let before = env.target_titles();

    let again = run(&env, &["film_id", "title"], "");

    assert_eq!(env.target_titles(), before);
    assert!(matches!(again.promotion, Some(Promotion::Unchanged(_))));
}

#[test]
fn test_chunk_size_limits_each_run() {
    let env = SyncEnv::new();
    for i in 0..5 {
        env.film(&format!("f{i}"), "T", &format!("2024-03-0{} 10:00:00", i + 1));
    }

    let mut config = env.config(&["film_id"], "");
    config.chunk_size = 2;
    let first = run_config(&config);
    assert_eq!(first.counts.ids_located, 2);
    assert_eq!(first.candidate, Some(wm("2024-03-02 10:00:00")));
}

#[test]
fn test_manual_promotion_keeps_confirmed_watermark() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");

    let result = run(&env, &["film_id", "title"], "auto_promote: false");

    assert!(result.promotion.is_none());
    let store = env.store();
    assert_eq!(read_confirmed(&store, &pipeline()).unwrap(), None);
    assert_eq!(
        read_candidate(&store, &pipeline()).unwrap(),
        Some(wm("2024-03-01 10:00:00"))
    );
}

#[test]
fn test_transforms_apply_before_load() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01T10:00:00+02:00");
    env.film("f2", "Beta", "2024-03-02 10:00:00");
    env.source
        .execute("UPDATE film_work SET rating = NULL WHERE id = 'f2'", [])
        .unwrap();

    let extra = "transforms:\n  - canonical_timestamp: updated_at\n  - default: { rating: 5.0 }";
    run(&env, &["film_id", "title", "rating", "film_updated_at"], extra);

    assert_eq!(
        env.target_column("f1", "updated_at"),
        "2024-03-01 08:00:00.000000"
    );
    let conn = rusqlite::Connection::open(env.target_path()).unwrap();
    let rating: f64 = conn
        .query_row("SELECT rating FROM film_work WHERE id = 'f2'", [], |row| row.get(0))
        .unwrap();
    assert!((rating - 5.0).abs() < f64::EPSILON);
}

#[test]
fn test_failed_run_does_not_advance_watermark() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");
    std::fs::write(env.target_path(), "not a sqlite database\n".repeat(200)).unwrap();

    let config = env.config(&["film_id", "title"], "");
    let err = run_pipeline(&config, &ExecutionOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Query { .. }), "{err}");
    assert_eq!(err.stage(), Some(Stage::Load));

    let store = env.store();
    assert_eq!(read_confirmed(&store, &pipeline()).unwrap(), None);
    assert_eq!(read_candidate(&store, &pipeline()).unwrap(), None);
    let runs = store.recent_runs(&pipeline(), 1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[test]
fn test_dry_run_writes_nothing() {
    let env = SyncEnv::new();
    env.film("f1", "Alpha", "2024-03-01 10:00:00");

    let config = env.config(&["film_id", "title"], "");
    let outcome = run_pipeline(&config, &ExecutionOptions { dry_run: true }).unwrap();
    let PipelineOutcome::DryRun(dry) = outcome else {
        panic!("expected a dry run");
    };

    assert_eq!(dry.change_set.len(), 1);
    assert_eq!(dry.batch.len(), 1);
    assert_eq!(env.target_titles(), None);
    let store = env.store();
    assert!(store.recent_runs(&pipeline(), 5).unwrap().is_empty());
    assert_eq!(read_candidate(&store, &pipeline()).unwrap(), None);
}
