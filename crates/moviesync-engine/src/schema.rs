//! Table names and DDL for the source and target stores.

/// Film table, same name in source and target.
pub const FILM_TABLE: &str = "film_work";

/// Columns of the target `film_work` table, in DDL order.
pub const TARGET_COLUMNS: &[&str] = &[
    "id",
    "title",
    "description",
    "creation_date",
    "file_path",
    "rating",
    "type",
    "created_at",
    "updated_at",
    "actors",
    "writers",
    "directors",
    "genre",
];

/// Primary key of the target table.
pub const PRIMARY_KEY: &str = "id";

/// Column list of the target table. Shared by the replace and upsert paths.
const TARGET_COLUMN_DEFS: &str = "
    id TEXT NOT NULL PRIMARY KEY,
    title TEXT DEFAULT 'TITLE',
    description TEXT DEFAULT 'DESCRIPTION',
    creation_date DATE DEFAULT CURRENT_DATE,
    file_path TEXT DEFAULT 'FILE_PATH',
    rating FLOAT DEFAULT 1,
    type TEXT DEFAULT 'TYPE',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    actors TEXT DEFAULT '',
    writers TEXT DEFAULT '',
    directors TEXT DEFAULT '',
    genre TEXT DEFAULT ''
";

/// `CREATE TABLE` for the target, optionally guarded by `IF NOT EXISTS`.
#[must_use]
pub fn create_target_table_sql(if_not_exists: bool) -> String {
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!("CREATE TABLE {guard}{FILM_TABLE} ({TARGET_COLUMN_DEFS})")
}

/// Source tables read by the locator and fetcher.
///
/// The pipeline never creates these in production; the DDL exists so fixture
/// databases and `check` can agree on the expected layout.
pub const SOURCE_DDL: &str = r"
CREATE TABLE IF NOT EXISTS film_work (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    creation_date DATE,
    file_path TEXT,
    rating FLOAT,
    type TEXT NOT NULL,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS person (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS person_film_work (
    id TEXT PRIMARY KEY,
    film_work_id TEXT NOT NULL,
    person_id TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS genre (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS genre_film_work (
    id TEXT PRIMARY KEY,
    film_work_id TEXT NOT NULL,
    genre_id TEXT NOT NULL,
    created_at TIMESTAMP
);

CREATE INDEX IF NOT EXISTS film_work_updated_at_idx ON film_work (updated_at);
";

/// Tables `check` expects to find in the source database.
pub const SOURCE_TABLES: &[&str] = &[
    FILM_TABLE,
    "person",
    "person_film_work",
    "genre",
    "genre_film_work",
];
