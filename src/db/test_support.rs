use crate::db::Database;

/// Opens a throwaway database under the system temp directory. WAL sidecar
/// files share the unique stem, so parallel tests never collide.
pub(crate) fn temp_db(tag: &str) -> Database {
    let path = std::env::temp_dir().join(format!(
        "walkmate-{tag}-{}.sqlite3",
        uuid::Uuid::new_v4()
    ));
    match Database::new(path) {
        Ok(db) => db,
        Err(err) => panic!("failed to open test database: {err:?}"),
    }
}
