//! The daily scrape of the per-mode top-10k rankings.

use std::time::{Duration, SystemTime};

use futures::{StreamExt as _, TryStreamExt as _, stream};

use digest_lib::error::DigestResult;
use digest_lib::gamemode::Gamemode;
use digest_lib::internal;
use digest_lib::models::{RankingsUser, UserId, to_alpha2};
use digest_lib::rankings::RankingsStore;
use osu_api::http::HttpRequester;
use osu_api::osu::{MAX_RANKINGS_PAGE, OsuClient, RankingsEntry};

/// Youngest database age for which ranks roll forward instead of restarting.
const MIN_SCRAPE_AGE: Duration = Duration::from_secs(24 * 3600);
/// Oldest database age for which ranks roll forward instead of restarting.
const MAX_SCRAPE_AGE: Duration = Duration::from_secs(25 * 3600);

/// Zero-based index of yesterday's rank in a user's 90-day rank history.
const YESTERDAY_HISTORY_INDEX: usize = 88;

/// Harvests the current top 10,000 players of every mode and rolls each
/// table's day-over-day rank movement forward.
///
/// When the previous write is roughly a day old (the `[24h, 25h]` window),
/// current ranks shift into yesterday ranks before the scrape, so rank
/// movement survives across runs. A younger or older database is wiped
/// first: re-running too early would double-shift, and stale data would
/// produce nonsense movement.
///
/// A page or user fetch that fails past the retry policy aborts the run;
/// progress committed for earlier modes is kept.
pub async fn scrape_rankings<R: HttpRequester>(
    osu: &OsuClient<R>,
    store: &RankingsStore,
    fan_out: usize,
) -> DigestResult {
    tracing::info!("Scraping the osu! rankings");

    let age = SystemTime::now()
        .duration_since(store.last_write_time()?)
        .unwrap_or_default();
    if !(MIN_SCRAPE_AGE..=MAX_SCRAPE_AGE).contains(&age) {
        tracing::warn!("Rankings database is out of sync with the current run, starting from scratch");
        store.wipe_tables().await?;
    }

    for mode in Gamemode::ALL {
        scrape_rankings_mode(osu, store, mode, fan_out).await?;
    }
    Ok(())
}

#[tracing::instrument(skip(osu, store, fan_out))]
async fn scrape_rankings_mode<R: HttpRequester>(
    osu: &OsuClient<R>,
    store: &RankingsStore,
    mode: Gamemode,
    fan_out: usize,
) -> DigestResult {
    store.shift_ranks(mode).await?;

    // The current top 10,000, 50 users per page. Page completion order does
    // not matter: the upsert is keyed by user ID.
    let users: Vec<RankingsUser> = stream::iter((0..=MAX_RANKINGS_PAGE).map(|page| {
        let osu = osu.clone();
        async move {
            let rankings = osu
                .get_rankings(page, mode)
                .await?
                .ok_or_else(|| internal!("rankings page {page} for {mode} not found"))?;
            Ok::<_, digest_lib::error::DigestError>(
                rankings
                    .ranking
                    .into_iter()
                    .map(rankings_user_from_entry)
                    .collect::<Vec<_>>(),
            )
        }
    }))
    .buffer_unordered(fan_out)
    .try_concat()
    .await?;

    store.insert_rankings_users(&users, mode).await?;

    // Users missing from today's scrape dropped out of the top 10k.
    store.delete_users_with_null_current_rank(mode).await?;

    // Users without a shifted yesterday rank entered the top 10k today;
    // their yesterday rank comes from their profile's rank history.
    let entrants = store.user_ids_with_null_yesterday_rank(mode).await?;
    tracing::info!("Backfilling yesterday ranks of {} new entrants", entrants.len());

    let yesterday_ranks: Vec<(UserId, i64)> = stream::iter(entrants.into_iter().map(|user_id| {
        let osu = osu.clone();
        async move { yesterday_rank_of_user(&osu, user_id, mode).await }
    }))
    .buffer_unordered(fan_out)
    .try_collect()
    .await?;

    store.update_yesterday_ranks(&yesterday_ranks, mode).await?;
    Ok(())
}

fn rankings_user_from_entry(entry: RankingsEntry) -> RankingsUser {
    RankingsUser {
        user_id: entry.user.id,
        username: entry.user.username,
        country_code: to_alpha2(&entry.user.country_code),
        avatar_url: entry.user.avatar_url,
        performance_points: entry.pp,
        accuracy: entry.hit_accuracy,
        hours_played: (entry.play_time / 3600) as i64,
        yesterday_rank: None,
        current_rank: Some(entry.global_rank),
    }
}

async fn yesterday_rank_of_user<R: HttpRequester>(
    osu: &OsuClient<R>,
    user_id: UserId,
    mode: Gamemode,
) -> DigestResult<(UserId, i64)> {
    let user = osu
        .get_user(user_id, mode)
        .await?
        .ok_or_else(|| internal!("user {user_id} not found while backfilling {mode} ranks"))?;
    let history = user
        .rank_history
        .ok_or_else(|| internal!("user {user_id} has no {mode} rank history"))?;
    let rank = history
        .data
        .get(YESTERDAY_HISTORY_INDEX)
        .copied()
        .ok_or_else(|| {
            internal!(
                "rank history of user {user_id} has only {} entries",
                history.data.len()
            )
        })?;
    Ok((user_id, rank))
}
