//! Contains all the models persisted in the SQLite databases.
//!
//! The types correspond to the raw table rows; the per-mode tables all share
//! the same shape and differ only by name (see
//! [`Gamemode::rankings_table`](crate::gamemode::Gamemode::rankings_table)).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::mods::Mods;

/// The ID of an osu! user.
pub type UserId = i64;
/// The ID of a beatmap difficulty.
pub type BeatmapId = i64;
/// The ID of a score.
pub type ScoreId = i64;
/// The ID of a chat channel.
pub type ChannelId = i64;

/// The country filter value that disables country filtering.
pub const GLOBAL_COUNTRY: &str = "GLOBAL";

/// Normalizes a country code to its ISO-3166 alpha-2 form (trimmed,
/// uppercase). Idempotent.
pub fn to_alpha2(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// A ranked player in a per-mode rankings table.
#[derive(Serialize, sqlx::FromRow, Clone, Debug, PartialEq)]
pub struct RankingsUser {
    /// The user ID.
    #[sqlx(rename = "userID")]
    pub user_id: UserId,
    /// The user name.
    pub username: String,
    /// The ISO-3166 alpha-2 country code, uppercase.
    #[sqlx(rename = "countryCode")]
    pub country_code: String,
    /// A link to the user's profile picture.
    #[sqlx(rename = "avatarURL")]
    pub avatar_url: String,
    /// Total performance points in the mode.
    #[sqlx(rename = "performancePoints")]
    pub performance_points: f64,
    /// Hit accuracy in the mode, in percent.
    pub accuracy: f64,
    /// Total play time in the mode, in whole hours.
    #[sqlx(rename = "hoursPlayed")]
    pub hours_played: i64,
    /// The global rank the user held roughly a day ago.
    ///
    /// NULL between the daily rank shift and the new-entrant backfill.
    #[sqlx(rename = "yesterdayRank")]
    pub yesterday_rank: Option<i64>,
    /// The global rank the user holds now.
    ///
    /// NULL between the daily rank shift and the scrape upsert.
    #[sqlx(rename = "currentRank")]
    pub current_rank: Option<i64>,
}

impl RankingsUser {
    /// Whether the row satisfies the store invariants: a non-negative ID, a
    /// two-letter uppercase country code, and no zero current rank.
    pub fn is_valid(&self) -> bool {
        self.user_id >= 0
            && self.current_rank != Some(0)
            && self.country_code.len() == 2
            && self.country_code.bytes().all(|b| b.is_ascii_uppercase())
    }
}

/// A rankings row together with its relative rank movement.
#[derive(Serialize, sqlx::FromRow, Clone, Debug)]
pub struct RankImprovement {
    /// The player.
    #[sqlx(flatten)]
    pub user: RankingsUser,
    /// `(yesterdayRank - currentRank) / currentRank` for climbers, mirrored
    /// for fallers; always positive in query results.
    #[sqlx(rename = "relativeImprovement")]
    pub relative_improvement: f64,
}

/// Score facts of a daily top play.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ScoreDetails {
    /// The score ID.
    pub score_id: ScoreId,
    /// The mods the score was set with.
    pub mods: Mods,
    /// Performance points awarded for the score.
    pub performance_points: f64,
    /// Hit accuracy of the score, in the range `[0, 1]`.
    pub accuracy: f64,
    /// Total score value.
    pub total_score: i64,
    /// When the score was set, UTC at second resolution.
    pub created_at: DateTime<Utc>,
    /// Highest combo reached.
    pub combo: i64,
    /// Letter grade of the score.
    pub letter_rank: String,
    /// Number of 300s.
    pub count_300: i64,
    /// Number of 100s.
    pub count_100: i64,
    /// Number of 50s. NULL for taiko, which has none.
    pub count_50: Option<i64>,
    /// Number of misses.
    pub count_miss: i64,
}

/// Beatmap facts of a daily top play.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BeatmapDetails {
    /// The beatmap ID.
    pub beatmap_id: BeatmapId,
    /// Star rating of the difficulty.
    pub star_rating: f64,
    /// Name of the difficulty.
    pub difficulty_name: String,
    /// Song artist.
    pub artist: String,
    /// Song title.
    pub title: String,
    /// Name of the mapset creator.
    pub mapset_creator: String,
    /// Maximum achievable combo.
    pub max_combo: i64,
}

/// User snapshot attached to a daily top play.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TopPlayUser {
    /// The user ID.
    pub user_id: UserId,
    /// The user name.
    pub username: String,
    /// The ISO-3166 alpha-2 country code, uppercase.
    pub country_code: String,
    /// A link to the user's profile picture.
    pub avatar_url: String,
    /// Total performance points in the mode.
    pub performance_points: f64,
    /// Hit accuracy in the mode, in percent.
    pub accuracy: f64,
    /// Total play time in the mode, in whole hours.
    pub hours_played: i64,
    /// The global rank the user holds now.
    pub current_rank: i64,
}

/// One of the day's best plays, fully materialized.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TopPlay {
    /// Position in the day's best-plays listing; primary key of the table.
    ///
    /// Ranks may have gaps: a best play whose score could not be
    /// cross-referenced upstream is dropped without renumbering the rest.
    pub rank: i64,
    /// Score facts.
    pub score: ScoreDetails,
    /// Beatmap facts.
    pub beatmap: BeatmapDetails,
    /// The player, as seen at harvest time.
    pub user: TopPlayUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> RankingsUser {
        RankingsUser {
            user_id: 124493,
            username: "Cookiezi".to_owned(),
            country_code: "KR".to_owned(),
            avatar_url: "https://a.ppy.sh/124493".to_owned(),
            performance_points: 13_000.0,
            accuracy: 99.1,
            hours_played: 3_200,
            yesterday_rank: Some(3),
            current_rank: Some(2),
        }
    }

    #[test]
    fn country_normalization_is_idempotent() {
        for code in ["kr", " de ", "US"] {
            let normalized = to_alpha2(code);
            assert_eq!(to_alpha2(&normalized), normalized);
        }
        assert_eq!(to_alpha2("kr"), "KR");
    }

    #[test]
    fn validity_checks_the_store_invariants() {
        assert!(user().is_valid());

        let negative_id = RankingsUser {
            user_id: -1,
            ..user()
        };
        assert!(!negative_id.is_valid());

        let zero_rank = RankingsUser {
            current_rank: Some(0),
            ..user()
        };
        assert!(!zero_rank.is_valid());

        let bad_country = RankingsUser {
            country_code: "kor".to_owned(),
            ..user()
        };
        assert!(!bad_country.is_valid());
    }
}
