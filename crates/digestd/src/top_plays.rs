//! The daily harvest of the best plays across all modes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::{StreamExt as _, TryStreamExt as _, future, stream};

use digest_lib::error::DigestResult;
use digest_lib::gamemode::Gamemode;
use digest_lib::internal;
use digest_lib::models::{
    BeatmapDetails, BeatmapId, ScoreDetails, TopPlay, TopPlayUser, UserId, to_alpha2,
};
use digest_lib::mods::Mods;
use digest_lib::time;
use digest_lib::top_plays::TopPlaysStore;
use osu_api::http::HttpRequester;
use osu_api::osu::{Beatmap, BatchedUser, MAX_BATCH_IDS, OsuClient};
use osu_api::osutrack::{BestPlay, OsutrackClient};

/// How many best plays are harvested per mode each day.
pub const NUM_TOP_PLAYS: usize = 100;

/// A best play whose score has been cross-referenced but not yet enriched
/// with user and beatmap snapshots.
struct FoundPlay {
    rank: i64,
    user_id: UserId,
    beatmap_id: BeatmapId,
    score: ScoreDetails,
}

/// Harvests the day's best plays of every mode.
///
/// The tables are wiped once up front; yesterday's listing has no bearing on
/// today's. Per mode this makes one osu!track call, one osu!API call per
/// play, and two batched osu!API calls per 50 surviving plays.
pub async fn get_top_plays<R: HttpRequester>(
    osu: &OsuClient<R>,
    osutrack: &OsutrackClient<R>,
    store: &TopPlaysStore,
    fan_out: usize,
) -> DigestResult {
    tracing::info!("Grabbing the top plays of the day");

    store.wipe_tables().await?;

    let now = Utc::now();
    for mode in Gamemode::ALL {
        top_plays_mode(osu, osutrack, store, now, mode, fan_out).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(osu, osutrack, store, now, fan_out))]
async fn top_plays_mode<R: HttpRequester>(
    osu: &OsuClient<R>,
    osutrack: &OsutrackClient<R>,
    store: &TopPlaysStore,
    now: DateTime<Utc>,
    mode: Gamemode,
    fan_out: usize,
) -> DigestResult {
    let yesterday = now - chrono::Duration::days(1);
    let best_plays = osutrack
        .get_best_plays(
            mode,
            &yesterday.format("%Y-%m-%d").to_string(),
            &now.format("%Y-%m-%d").to_string(),
            NUM_TOP_PLAYS,
        )
        .await?;
    if best_plays.len() > NUM_TOP_PLAYS {
        return Err(internal!(
            "expected at most {NUM_TOP_PLAYS} plays from osu!track but got {}",
            best_plays.len()
        ));
    }

    // Ranks follow the osu!track ordering and are assigned before the
    // fan-out; a play that cannot be cross-referenced leaves a gap.
    let mut found: Vec<FoundPlay> =
        stream::iter(best_plays.into_iter().enumerate().map(|(index, play)| {
            let osu = osu.clone();
            async move { find_top_play(&osu, (index + 1) as i64, play, mode).await }
        }))
        .buffer_unordered(fan_out)
        .try_filter_map(|play| async move { Ok(play) })
        .try_collect()
        .await?;
    found.sort_by_key(|play| play.rank);

    // Batched enrichment, 50 plays per chunk.
    let completed: Vec<TopPlay> = future::try_join_all(found.chunks(MAX_BATCH_IDS).map(|chunk| {
        let osu = osu.clone();
        async move { fill_in_chunk(&osu, chunk, mode).await }
    }))
    .await?
    .into_iter()
    .flatten()
    .collect();

    store.insert_top_plays(mode, &completed).await?;
    Ok(())
}

/// Cross-references an osu!track best play against the player's scores on
/// the beatmap, matching on the score timestamp.
///
/// Both upstreams report the timestamp in UTC at second resolution, which is
/// what makes the equality sound; the two serialize it differently, so the
/// match is on the parsed instant. A play without a matching score is
/// dropped with a warning.
async fn find_top_play<R: HttpRequester>(
    osu: &OsuClient<R>,
    rank: i64,
    play: BestPlay,
    mode: Gamemode,
) -> DigestResult<Option<FoundPlay>> {
    let created_at = time::parse_utc_timestamp(&play.score_time)?;
    let scores = osu
        .get_user_beatmap_scores(mode, play.user, play.beatmap_id)
        .await?
        .ok_or_else(|| {
            internal!(
                "scores of user {} on beatmap {} not found",
                play.user,
                play.beatmap_id
            )
        })?;

    let Some(matching) = scores
        .into_iter()
        .find(|score| {
            time::parse_utc_timestamp(&score.created_at).is_ok_and(|parsed| parsed == created_at)
        })
    else {
        tracing::warn!(
            "Failed to find the {mode} score set by user {} on beatmap {}, skipping it",
            play.user,
            play.beatmap_id
        );
        return Ok(None);
    };

    let mods = Mods::from_codes(matching.mods.iter().map(String::as_str))
        .map_err(|e| internal!("score {} carries an unknown mod: {e}", matching.id))?;
    let count_50 = if mode == Gamemode::Taiko {
        None
    } else {
        Some(matching.statistics.count_50.ok_or_else(|| {
            internal!("score {} of a mode with 50s is missing its count", matching.id)
        })?)
    };

    Ok(Some(FoundPlay {
        rank,
        user_id: play.user,
        beatmap_id: play.beatmap_id,
        score: ScoreDetails {
            score_id: matching.id,
            mods,
            performance_points: play.pp,
            accuracy: matching.accuracy,
            total_score: play.score,
            created_at,
            combo: matching.max_combo,
            letter_rank: play.rank,
            count_300: matching.statistics.count_300,
            count_100: matching.statistics.count_100,
            count_50,
            count_miss: matching.statistics.count_miss,
        },
    }))
}

/// Fills in the user and beatmap snapshots of a chunk of found plays through
/// two batched lookups.
async fn fill_in_chunk<R: HttpRequester>(
    osu: &OsuClient<R>,
    chunk: &[FoundPlay],
    mode: Gamemode,
) -> DigestResult<Vec<TopPlay>> {
    let user_ids: Vec<UserId> = chunk.iter().map(|play| play.user_id).collect();
    let beatmap_ids: Vec<BeatmapId> = chunk.iter().map(|play| play.beatmap_id).collect();

    let users = osu
        .get_users(&user_ids, mode)
        .await?
        .ok_or_else(|| internal!("batched user lookup came back not found"))?;
    let beatmaps = osu
        .get_beatmaps(&beatmap_ids, mode)
        .await?
        .ok_or_else(|| internal!("batched beatmap lookup came back not found"))?;

    // Batched lookups return sets, so ordering cannot be relied on.
    let user_map: HashMap<UserId, BatchedUser> =
        users.into_iter().map(|user| (user.id, user)).collect();
    let beatmap_map: HashMap<BeatmapId, Beatmap> = beatmaps
        .into_iter()
        .map(|beatmap| (beatmap.id, beatmap))
        .collect();

    chunk
        .iter()
        .map(|play| {
            let user = user_map
                .get(&play.user_id)
                .ok_or_else(|| internal!("user {} missing from the batched lookup", play.user_id))?;
            let beatmap = beatmap_map.get(&play.beatmap_id).ok_or_else(|| {
                internal!("beatmap {} missing from the batched lookup", play.beatmap_id)
            })?;
            let stats = user
                .statistics_rulesets
                .get(mode.as_str())
                .ok_or_else(|| internal!("user {} has no {mode} statistics", play.user_id))?;

            Ok(TopPlay {
                rank: play.rank,
                score: play.score.clone(),
                beatmap: BeatmapDetails {
                    beatmap_id: play.beatmap_id,
                    star_rating: beatmap.difficulty_rating,
                    difficulty_name: beatmap.version.clone(),
                    artist: beatmap.beatmapset.artist.clone(),
                    title: beatmap.beatmapset.title.clone(),
                    mapset_creator: beatmap.beatmapset.creator.clone(),
                    max_combo: beatmap.max_combo,
                },
                user: TopPlayUser {
                    user_id: play.user_id,
                    username: user.username.clone(),
                    country_code: to_alpha2(&user.country_code),
                    avatar_url: user.avatar_url.clone(),
                    performance_points: stats.pp,
                    accuracy: stats.hit_accuracy,
                    hours_played: (stats.play_time / 3600) as i64,
                    current_rank: stats.global_rank,
                },
            })
        })
        .collect()
}
