//! Source database fixtures for unit tests.

use rusqlite::{params, Connection, ToSql};

use crate::schema::SOURCE_DDL;

pub(crate) fn source_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SOURCE_DDL).unwrap();
    conn
}

pub(crate) fn insert_film(conn: &Connection, id: &str, title: &str, updated_at: &dyn ToSql) {
    conn.execute(
        "INSERT INTO film_work (id, title, description, creation_date, file_path, rating, type, \
         created_at, updated_at) \
         VALUES (?1, ?2, 'desc', '2020-01-01', NULL, 7.5, 'movie', '2020-01-01 00:00:00', ?3)",
        params![id, title, updated_at],
    )
    .unwrap();
}

pub(crate) fn insert_person(conn: &Connection, id: &str, full_name: &str) {
    conn.execute(
        "INSERT INTO person (id, full_name) VALUES (?1, ?2)",
        params![id, full_name],
    )
    .unwrap();
}

pub(crate) fn link_person(conn: &Connection, link_id: &str, film: &str, person: &str, role: &str) {
    conn.execute(
        "INSERT INTO person_film_work (id, film_work_id, person_id, role) VALUES (?1, ?2, ?3, ?4)",
        params![link_id, film, person, role],
    )
    .unwrap();
}

pub(crate) fn insert_genre(conn: &Connection, id: &str, name: &str) {
    conn.execute(
        "INSERT INTO genre (id, name) VALUES (?1, ?2)",
        params![id, name],
    )
    .unwrap();
}

pub(crate) fn link_genre(conn: &Connection, link_id: &str, film: &str, genre: &str) {
    conn.execute(
        "INSERT INTO genre_film_work (id, film_work_id, genre_id) VALUES (?1, ?2, ?3)",
        params![link_id, film, genre],
    )
    .unwrap();
}
