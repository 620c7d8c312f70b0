//! Shared plumbing for the SQLite stores.

use std::path::Path;
use std::time::SystemTime;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, SqliteConnection};

use crate::error::DigestResult;

/// Opens the SQLite database at `path`, creating the file if it is missing.
pub(crate) async fn open_sqlite(path: &Path) -> DigestResult<SqliteConnection> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let conn = SqliteConnection::connect_with(&options).await?;
    Ok(conn)
}

/// Returns the modification time of the database file.
///
/// Note: this is the last write to the whole database, not to a specific table.
pub(crate) fn last_write_time(path: &Path) -> DigestResult<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}
