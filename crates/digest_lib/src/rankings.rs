//! The store of the per-mode top-10k rankings tables.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sqlx::{Connection as _, SqliteConnection};
use tokio::sync::Mutex;

use crate::db;
use crate::error::DigestResult;
use crate::gamemode::Gamemode;
use crate::internal;
use crate::models::{GLOBAL_COUNTRY, RankImprovement, RankingsUser, UserId};

/// The store of the daily top-10k rankings, one table per mode.
///
/// All access goes through a single connection behind a mutex; every
/// multi-statement write runs in a transaction that is rolled back when an
/// error drops it. Table names come from the closed [`Gamemode`] enumeration,
/// never from user input; all values are bound.
pub struct RankingsStore {
    file_path: PathBuf,
    conn: Mutex<SqliteConnection>,
}

impl RankingsStore {
    /// Opens the rankings database at `path`, creating the file and the
    /// per-mode tables if they are missing.
    pub async fn open(path: impl AsRef<Path>) -> DigestResult<Self> {
        let path = path.as_ref().to_owned();
        tracing::debug!("Opening rankings database at {}", path.display());
        let mut conn = db::open_sqlite(&path).await?;

        let mut txn = conn.begin().await?;
        for mode in Gamemode::ALL {
            let table = mode.rankings_table();
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    userID            INTEGER PRIMARY KEY,
                    username          TEXT    NOT NULL UNIQUE,
                    countryCode       TEXT    NOT NULL,
                    avatarURL         TEXT    NOT NULL,
                    performancePoints REAL    NOT NULL,
                    accuracy          REAL    NOT NULL,
                    hoursPlayed       INTEGER NOT NULL,
                    yesterdayRank     INTEGER,
                    currentRank       INTEGER
                )"
            ))
            .execute(&mut *txn)
            .await?;
        }
        txn.commit().await?;

        Ok(Self {
            file_path: path,
            conn: Mutex::new(conn),
        })
    }

    /// Returns the time of the last write to the database file.
    pub fn last_write_time(&self) -> DigestResult<SystemTime> {
        db::last_write_time(&self.file_path)
    }

    /// Deletes every row of every per-mode table.
    pub async fn wipe_tables(&self) -> DigestResult {
        tracing::debug!("Wiping rankings tables");
        let mut conn = self.conn.lock().await;
        let mut txn = conn.begin().await?;
        for mode in Gamemode::ALL {
            sqlx::query(&format!("DELETE FROM {}", mode.rankings_table()))
                .execute(&mut *txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    /// Clears yesterday's ranks and moves the current ranks into their place.
    pub async fn shift_ranks(&self, mode: Gamemode) -> DigestResult {
        tracing::debug!("Shifting ranks for {mode}");
        let mut conn = self.conn.lock().await;
        sqlx::query(&format!(
            "UPDATE {} SET yesterdayRank = currentRank, currentRank = NULL",
            mode.rankings_table()
        ))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Performs a batch upsert of users.
    ///
    /// A user already present keeps their stored `yesterdayRank` (the value
    /// carried by the input row is ignored); a new user gets NULL. A row that
    /// fails [`RankingsUser::is_valid`] aborts and rolls the batch back.
    pub async fn insert_rankings_users(
        &self,
        users: &[RankingsUser],
        mode: Gamemode,
    ) -> DigestResult {
        let table = mode.rankings_table();
        tracing::debug!("Inserting {} rankings users into {table}", users.len());

        let sql = format!(
            "INSERT OR REPLACE INTO {table}
             (userID, username, countryCode, avatarURL, performancePoints,
              accuracy, hoursPlayed, currentRank, yesterdayRank)
             SELECT ?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT yesterdayRank FROM {table} WHERE userID = ?)"
        );

        let mut conn = self.conn.lock().await;
        let mut txn = conn.begin().await?;
        for user in users {
            if !user.is_valid() {
                return Err(internal!(
                    "refusing to insert invalid rankings row for userID {}",
                    user.user_id
                ));
            }
            sqlx::query(&sql)
                .bind(user.user_id)
                .bind(&user.username)
                .bind(&user.country_code)
                .bind(&user.avatar_url)
                .bind(user.performance_points)
                .bind(user.accuracy)
                .bind(user.hours_played)
                .bind(user.current_rank)
                .bind(user.user_id)
                .execute(&mut *txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    /// Removes users whose `currentRank` is NULL, i.e. users that dropped out
    /// of the top 10k since the last shift.
    pub async fn delete_users_with_null_current_rank(&self, mode: Gamemode) -> DigestResult {
        tracing::debug!("Removing users with NULL current rank from {mode}");
        let mut conn = self.conn.lock().await;
        sqlx::query(&format!(
            "DELETE FROM {} WHERE currentRank IS NULL",
            mode.rankings_table()
        ))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Returns the IDs of users whose `yesterdayRank` is NULL, i.e. users
    /// that entered the top 10k since the last shift.
    pub async fn user_ids_with_null_yesterday_rank(
        &self,
        mode: Gamemode,
    ) -> DigestResult<Vec<UserId>> {
        tracing::debug!("Finding users with NULL yesterday rank in {mode}");
        let mut conn = self.conn.lock().await;
        let ids = sqlx::query_scalar(&format!(
            "SELECT userID FROM {} WHERE yesterdayRank IS NULL",
            mode.rankings_table()
        ))
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids)
    }

    /// Batch-updates `yesterdayRank` values, keyed by user ID.
    pub async fn update_yesterday_ranks(
        &self,
        user_yesterday_ranks: &[(UserId, i64)],
        mode: Gamemode,
    ) -> DigestResult {
        tracing::debug!(
            "Updating yesterday ranks of {} users in {mode}",
            user_yesterday_ranks.len()
        );
        let sql = format!(
            "UPDATE {} SET yesterdayRank = ? WHERE userID = ?",
            mode.rankings_table()
        );
        let mut conn = self.conn.lock().await;
        let mut txn = conn.begin().await?;
        for (user_id, rank) in user_yesterday_ranks {
            sqlx::query(&sql)
                .bind(rank)
                .bind(user_id)
                .execute(&mut *txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    /// Returns true if any per-mode table has no rows.
    pub async fn has_empty_table(&self) -> DigestResult<bool> {
        let mut conn = self.conn.lock().await;
        for mode in Gamemode::ALL {
            let empty: i64 = sqlx::query_scalar(&format!(
                "SELECT NOT EXISTS (SELECT 1 FROM {} LIMIT 1)",
                mode.rankings_table()
            ))
            .fetch_one(&mut *conn)
            .await?;
            if empty != 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns the top `num_users` users of the rank window sorted by relative
    /// rank improvement, best first.
    ///
    /// Passing [`GLOBAL_COUNTRY`] as `country_code` disables country filtering.
    pub async fn top_rank_improvements(
        &self,
        country_code: &str,
        min_rank: i64,
        max_rank: i64,
        num_users: i64,
        mode: Gamemode,
    ) -> DigestResult<Vec<RankImprovement>> {
        tracing::debug!("Retrieving top users by rank improvement from {mode}");
        self.rank_improvements(
            country_code,
            min_rank,
            max_rank,
            num_users,
            mode,
            "CAST(yesterdayRank - currentRank AS REAL) / currentRank",
            "yesterdayRank > currentRank",
        )
        .await
    }

    /// Returns the bottom `num_users` users of the rank window sorted by
    /// relative rank decline, worst first.
    ///
    /// Passing [`GLOBAL_COUNTRY`] as `country_code` disables country filtering.
    pub async fn bottom_rank_improvements(
        &self,
        country_code: &str,
        min_rank: i64,
        max_rank: i64,
        num_users: i64,
        mode: Gamemode,
    ) -> DigestResult<Vec<RankImprovement>> {
        tracing::debug!("Retrieving bottom users by rank improvement from {mode}");
        self.rank_improvements(
            country_code,
            min_rank,
            max_rank,
            num_users,
            mode,
            "CAST(currentRank - yesterdayRank AS REAL) / currentRank",
            "yesterdayRank < currentRank",
        )
        .await
    }

    async fn rank_improvements(
        &self,
        country_code: &str,
        min_rank: i64,
        max_rank: i64,
        num_users: i64,
        mode: Gamemode,
        improvement_expr: &str,
        direction_filter: &str,
    ) -> DigestResult<Vec<RankImprovement>> {
        let sql = format!(
            "SELECT
                userID, username, countryCode, avatarURL, performancePoints,
                accuracy, hoursPlayed, yesterdayRank, currentRank,
                {improvement_expr} AS relativeImprovement
             FROM {table}
             WHERE currentRank IS NOT NULL
               AND yesterdayRank IS NOT NULL
               AND currentRank != 0
               AND currentRank >= ?
               AND currentRank <= ?
               AND {direction_filter}
               AND (countryCode = ? OR ? = '{GLOBAL_COUNTRY}')
             ORDER BY relativeImprovement DESC
             LIMIT ?",
            table = mode.rankings_table(),
        );
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query_as(&sql)
            .bind(min_rank)
            .bind(max_rank)
            .bind(country_code)
            .bind(country_code)
            .bind(num_users)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }
}
