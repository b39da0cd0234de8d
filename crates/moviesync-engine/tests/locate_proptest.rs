use moviesync_engine::locate::locate_in;
use moviesync_engine::schema::SOURCE_DDL;
use moviesync_types::phase::StageOutput;
use moviesync_types::watermark::Watermark;
use proptest::prelude::*;
use rusqlite::{params, Connection};

fn source_with(offsets: &[u32]) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SOURCE_DDL).unwrap();
    for (i, secs) in offsets.iter().enumerate() {
        conn.execute(
            "INSERT INTO film_work (id, title, type, updated_at) \
             VALUES (?1, 't', 'movie', datetime(1700000000 + ?2, 'unixepoch'))",
            params![format!("film-{i:03}"), secs],
        )
        .unwrap();
    }
    conn
}

proptest! {
    #[test]
    fn locate_returns_bounded_ordered_changes(
        offsets in prop::collection::vec(0_u32..500, 0..40),
        bound in 0_u32..500,
        chunk_size in 1_usize..20,
    ) {
        let conn = source_with(&offsets);
        let watermark = Watermark::from_epoch_secs(1_700_000_000.0 + f64::from(bound)).unwrap();

        let expected = offsets.iter().filter(|secs| **secs >= bound).count();
        match locate_in(&conn, &watermark, chunk_size).unwrap() {
            StageOutput::Empty => prop_assert_eq!(expected, 0),
            StageOutput::Ready(change_set) => {
                prop_assert_eq!(change_set.len(), expected.min(chunk_size));

                let mut seen = Vec::new();
                for id in change_set.ids() {
                    let index: usize = id.as_str()["film-".len()..].parse().unwrap();
                    prop_assert!(offsets[index] >= bound);
                    seen.push((offsets[index], id.as_str().to_string()));
                }
                let mut sorted = seen.clone();
                sorted.sort();
                prop_assert_eq!(&seen, &sorted);

                let last = seen.last().map(|(secs, _)| *secs).unwrap();
                let candidate = Watermark::from_epoch_secs(1_700_000_000.0 + f64::from(last));
                prop_assert_eq!(change_set.candidate_watermark(), candidate.as_ref());
            }
        }
    }
}
