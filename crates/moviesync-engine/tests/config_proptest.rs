use moviesync_engine::config::parser;
use moviesync_engine::config::types::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use moviesync_engine::config::validator;
use proptest::prelude::*;

fn pipeline_yaml(chunk_size: usize, fields: &str) -> String {
    format!(
        r#"
version: "1.0"
pipeline: prop_movies
chunk_size: {chunk_size}
fields: [{fields}]
source_connection_id: src
target_connection_id: dst
connections:
  src:
    host: /data
    schema: movies.sqlite
  dst:
    host: /data
    schema: replica.sqlite
state:
  backend: sqlite
"#
    )
}

proptest! {
    #[test]
    fn chunk_size_must_be_in_range(chunk_size in 0_usize..(MAX_CHUNK_SIZE * 2)) {
        let config = parser::parse_pipeline_str(&pipeline_yaml(chunk_size, "film_id, title"))
            .expect("generated yaml must parse");
        let result = validator::validate_pipeline(&config);

        if chunk_size < MIN_CHUNK_SIZE || chunk_size > MAX_CHUNK_SIZE {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn unknown_fields_are_rejected(name in "[a-z]{3,12}") {
        let known = [
            "title", "description", "rating", "actors", "writers", "directors", "genre",
        ];
        let config = parser::parse_pipeline_str(&pipeline_yaml(10, &format!("film_id, {name}")))
            .expect("generated yaml must parse");
        let result = validator::validate_pipeline(&config);

        if known.contains(&name.as_str()) {
            prop_assert!(result.is_ok());
        } else {
            let message = result.unwrap_err().to_string();
            prop_assert!(message.contains(&name), "{}", message);
        }
    }
}
