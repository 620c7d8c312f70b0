//! The store of the per-mode daily top plays tables.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sqlx::sqlite::SqliteRow;
use sqlx::{Connection as _, Row as _, SqliteConnection};
use tokio::sync::Mutex;

use crate::db;
use crate::error::DigestResult;
use crate::gamemode::Gamemode;
use crate::internal;
use crate::models::{BeatmapDetails, GLOBAL_COUNTRY, ScoreDetails, TopPlay, TopPlayUser};
use crate::time;

/// The store of the day's best plays, one table per mode.
///
/// Same discipline as the rankings store: a single connection behind a mutex,
/// transactional batch writes, table names from the closed [`Gamemode`]
/// enumeration, bound values everywhere.
pub struct TopPlaysStore {
    file_path: PathBuf,
    conn: Mutex<SqliteConnection>,
}

impl TopPlaysStore {
    /// Opens the top plays database at `path`, creating the file and the
    /// per-mode tables if they are missing.
    pub async fn open(path: impl AsRef<Path>) -> DigestResult<Self> {
        let path = path.as_ref().to_owned();
        tracing::debug!("Opening top plays database at {}", path.display());
        let mut conn = db::open_sqlite(&path).await?;

        let mut txn = conn.begin().await?;
        for mode in Gamemode::ALL {
            let table = mode.top_plays_table();
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    rank              INTEGER PRIMARY KEY,
                    scoreID           INTEGER UNIQUE,
                    mods              TEXT,
                    performancePoints REAL    NOT NULL,
                    accuracy          REAL,
                    totalScore        INTEGER NOT NULL,
                    createdAt         TEXT    NOT NULL,
                    combo             INTEGER,
                    letterRank        TEXT    NOT NULL,
                    count300          INTEGER,
                    count100          INTEGER,
                    count50           INTEGER,
                    countMiss         INTEGER,

                    beatmapID             INTEGER NOT NULL,
                    beatmapStarRating     REAL,
                    beatmapDifficultyName TEXT,
                    beatmapArtist         TEXT,
                    beatmapTitle          TEXT,
                    mapsetCreator         TEXT,
                    beatmapMaxCombo       INTEGER,

                    userID                INTEGER NOT NULL,
                    username              TEXT,
                    userCountryCode       TEXT,
                    userAvatarURL         TEXT,
                    userPerformancePoints REAL,
                    userAccuracy          REAL,
                    userHoursPlayed       INTEGER,
                    userCurrentRank       INTEGER
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
        tracing::debug!("Wiping top plays tables");
        let mut conn = self.conn.lock().await;
        let mut txn = conn.begin().await?;
        for mode in Gamemode::ALL {
            sqlx::query(&format!("DELETE FROM {}", mode.top_plays_table()))
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
                mode.top_plays_table()
            ))
            .fetch_one(&mut *conn)
            .await?;
            if empty != 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Performs a batch insert of top plays; `rank` is the primary key.
    pub async fn insert_top_plays(&self, mode: Gamemode, top_plays: &[TopPlay]) -> DigestResult {
        let table = mode.top_plays_table();
        tracing::debug!("Inserting {} top plays into {table}", top_plays.len());

        let sql = format!(
            "INSERT INTO {table} (
                rank,
                scoreID, mods, performancePoints, accuracy, totalScore,
                createdAt, combo, letterRank, count300, count100, count50, countMiss,
                beatmapID, beatmapStarRating, beatmapDifficultyName, beatmapArtist,
                beatmapTitle, mapsetCreator, beatmapMaxCombo,
                userID, username, userCountryCode, userAvatarURL,
                userPerformancePoints, userAccuracy, userHoursPlayed, userCurrentRank
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let mut conn = self.conn.lock().await;
        let mut txn = conn.begin().await?;
        for play in top_plays {
            if play.user.user_id < 0 || play.beatmap.beatmap_id < 0 || play.score.score_id < 0 {
                return Err(internal!(
                    "refusing to insert top play with a negative ID (rank {})",
                    play.rank
                ));
            }
            sqlx::query(&sql)
                .bind(play.rank)
                .bind(play.score.score_id)
                .bind(play.score.mods.canonical())
                .bind(play.score.performance_points)
                .bind(play.score.accuracy)
                .bind(play.score.total_score)
                .bind(time::format_utc_timestamp(play.score.created_at))
                .bind(play.score.combo)
                .bind(&play.score.letter_rank)
                .bind(play.score.count_300)
                .bind(play.score.count_100)
                .bind(play.score.count_50)
                .bind(play.score.count_miss)
                .bind(play.beatmap.beatmap_id)
                .bind(play.beatmap.star_rating)
                .bind(&play.beatmap.difficulty_name)
                .bind(&play.beatmap.artist)
                .bind(&play.beatmap.title)
                .bind(&play.beatmap.mapset_creator)
                .bind(play.beatmap.max_combo)
                .bind(play.user.user_id)
                .bind(&play.user.username)
                .bind(&play.user.country_code)
                .bind(&play.user.avatar_url)
                .bind(play.user.performance_points)
                .bind(play.user.accuracy)
                .bind(play.user.hours_played)
                .bind(play.user.current_rank)
                .execute(&mut *txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    /// Returns up to `num_top_plays` plays ordered by rank ascending.
    ///
    /// Passing [`GLOBAL_COUNTRY`] as `country_code` disables country filtering.
    pub async fn get_top_plays(
        &self,
        country_code: &str,
        num_top_plays: i64,
        mode: Gamemode,
    ) -> DigestResult<Vec<TopPlay>> {
        tracing::debug!("Retrieving top plays for {mode}");
        let sql = format!(
            "SELECT
                rank,
                scoreID, mods, performancePoints, accuracy, totalScore,
                createdAt, combo, letterRank, count300, count100, count50, countMiss,
                beatmapID, beatmapStarRating, beatmapDifficultyName, beatmapArtist,
                beatmapTitle, mapsetCreator, beatmapMaxCombo,
                userID, username, userCountryCode, userAvatarURL,
                userPerformancePoints, userAccuracy, userHoursPlayed, userCurrentRank
             FROM {table}
             WHERE (userCountryCode = ? OR ? = '{GLOBAL_COUNTRY}')
             ORDER BY rank ASC
             LIMIT ?",
            table = mode.top_plays_table(),
        );
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(&sql)
            .bind(country_code)
            .bind(country_code)
            .bind(num_top_plays)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(top_play_from_row).collect()
    }
}

fn top_play_from_row(row: &SqliteRow) -> DigestResult<TopPlay> {
    let mods: String = row.try_get("mods")?;
    let created_at: String = row.try_get("createdAt")?;
    Ok(TopPlay {
        rank: row.try_get("rank")?,
        score: ScoreDetails {
            score_id: row.try_get("scoreID")?,
            mods: mods
                .parse()
                .map_err(|e| internal!("malformed mods column: {e}"))?,
            performance_points: row.try_get("performancePoints")?,
            accuracy: row.try_get("accuracy")?,
            total_score: row.try_get("totalScore")?,
            created_at: time::parse_utc_timestamp(&created_at)?,
            combo: row.try_get("combo")?,
            letter_rank: row.try_get("letterRank")?,
            count_300: row.try_get("count300")?,
            count_100: row.try_get("count100")?,
            count_50: row.try_get("count50")?,
            count_miss: row.try_get("countMiss")?,
        },
        beatmap: BeatmapDetails {
            beatmap_id: row.try_get("beatmapID")?,
            star_rating: row.try_get("beatmapStarRating")?,
            difficulty_name: row.try_get("beatmapDifficultyName")?,
            artist: row.try_get("beatmapArtist")?,
            title: row.try_get("beatmapTitle")?,
            mapset_creator: row.try_get("mapsetCreator")?,
            max_combo: row.try_get("beatmapMaxCombo")?,
        },
        user: TopPlayUser {
            user_id: row.try_get("userID")?,
            username: row.try_get("username")?,
            country_code: row.try_get("userCountryCode")?,
            avatar_url: row.try_get("userAvatarURL")?,
            performance_points: row.try_get("userPerformancePoints")?,
            accuracy: row.try_get("userAccuracy")?,
            hours_played: row.try_get("userHoursPlayed")?,
            current_rank: row.try_get("userCurrentRank")?,
        },
    })
}
