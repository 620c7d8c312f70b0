//! The boundary between the harvest jobs and the chat-bot surface.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use digest_lib::error::DigestResult;
use digest_lib::gamemode::Gamemode;
use digest_lib::models::{ChannelId, GLOBAL_COUNTRY, RankImprovement, TopPlay};
use digest_lib::rank_range::RankRange;
use digest_lib::rankings::RankingsStore;
use digest_lib::subscriptions::{NewsletterPage, SubscriptionsStore};
use digest_lib::top_plays::TopPlaysStore;

/// Oldest rankings data the publisher is willing to send.
///
/// Deliberately distinct from the scrape pipeline's wipe-on-stale window;
/// the two are tuned independently.
const MAX_PUBLISH_RANKINGS_AGE: Duration = Duration::from_secs(25 * 3600);
/// Oldest top-plays data the publisher is willing to send.
const MAX_PUBLISH_TOP_PLAYS_AGE: Duration = Duration::from_secs(25 * 3600);

/// How many climbers a rankings digest shows.
const NUM_DISPLAY_USERS_TOP: i64 = 15;
/// How many fallers a rankings digest shows.
const NUM_DISPLAY_USERS_BOTTOM: i64 = 5;
/// How many plays a top-plays digest shows.
const NUM_DISPLAY_TOP_PLAYS: i64 = 5;

/// A rendered rankings digest.
#[derive(Debug, Clone, Serialize)]
pub struct RankingsDigest {
    /// The ruleset the digest covers.
    pub mode: Gamemode,
    /// The country filter it was built with.
    pub country_code: String,
    /// Inclusive bounds of the rank tier it covers.
    pub rank_range: (i64, i64),
    /// Best climbers, best first.
    pub top: Vec<RankImprovement>,
    /// Worst fallers, worst first.
    pub bottom: Vec<RankImprovement>,
}

/// A rendered top-plays digest.
#[derive(Debug, Clone, Serialize)]
pub struct TopPlaysDigest {
    /// The ruleset the digest covers.
    pub mode: Gamemode,
    /// The country filter it was built with.
    pub country_code: String,
    /// The day's plays, rank ascending.
    pub plays: Vec<TopPlay>,
}

/// A payload handed to the chat-bot surface.
#[derive(Debug, Clone, Serialize)]
pub enum DigestPayload {
    /// Daily rank movements.
    Rankings(RankingsDigest),
    /// Daily best plays.
    TopPlays(TopPlaysDigest),
    /// Sent in place of a digest whose data is missing or stale. Never
    /// retried; the next day's run supersedes it.
    Unavailable {
        /// The page the digest would have been sent for.
        page: NewsletterPage,
        /// Why there is nothing to send.
        reason: String,
    },
}

/// The chat-bot surface the daemon publishes through.
///
/// The actual chat bot lives outside this workspace and implements this
/// trait; [`LoggingBot`] stands in when nothing is wired up.
pub trait BotSurface: Send + Sync + 'static {
    /// Sends a digest payload to the given channels.
    fn publish(
        &self,
        channel_ids: &[ChannelId],
        payload: &DigestPayload,
    ) -> impl Future<Output = ()> + Send;
}

/// Bot surface that logs digests instead of sending them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBot;

impl BotSurface for LoggingBot {
    async fn publish(&self, channel_ids: &[ChannelId], payload: &DigestPayload) {
        let kind = match payload {
            DigestPayload::Rankings(_) => "rankings",
            DigestPayload::TopPlays(_) => "top plays",
            DigestPayload::Unavailable { .. } => "unavailable",
        };
        tracing::info!(
            "Would deliver the {kind} digest to {} channels: {payload:?}",
            channel_ids.len()
        );
    }
}

/// Reads the stores after a completed job and fans the digests out to the
/// subscribed channels.
///
/// Stale or empty data is reported with a warning and skipped, never
/// retried; the next day's run supersedes it anyway.
pub struct Publisher<B> {
    rankings: Arc<RankingsStore>,
    top_plays: Arc<TopPlaysStore>,
    subscriptions: Arc<SubscriptionsStore>,
    bot: B,
}

impl<B: BotSurface> Publisher<B> {
    /// Creates a publisher over the given stores and bot surface.
    pub fn new(
        rankings: Arc<RankingsStore>,
        top_plays: Arc<TopPlaysStore>,
        subscriptions: Arc<SubscriptionsStore>,
        bot: B,
    ) -> Self {
        Self {
            rankings,
            top_plays,
            subscriptions,
            bot,
        }
    }

    /// Completion hook of the rankings job.
    pub async fn on_scrape_rankings_complete(&self) {
        tracing::debug!("Executing the scrape rankings completion hook");
        if let Err(e) = self.publish_rankings().await {
            tracing::error!("Failed to publish the rankings digest: {e}");
        }
    }

    /// Completion hook of the top plays job.
    pub async fn on_top_plays_complete(&self) {
        tracing::debug!("Executing the top plays completion hook");
        if let Err(e) = self.publish_top_plays().await {
            tracing::error!("Failed to publish the top plays digest: {e}");
        }
    }

    async fn publish_rankings(&self) -> DigestResult {
        let age = SystemTime::now()
            .duration_since(self.rankings.last_write_time()?)
            .unwrap_or_default();
        if age > MAX_PUBLISH_RANKINGS_AGE {
            tracing::warn!(
                "Rankings data is {}h old, skipping the digest send",
                age.as_secs() / 3600
            );
            return self
                .report_unavailable(NewsletterPage::Rankings, "no fresh rankings data today")
                .await;
        }
        if self.rankings.has_empty_table().await? {
            tracing::warn!("Rankings database has an empty table, skipping the digest send");
            return self
                .report_unavailable(NewsletterPage::Rankings, "no fresh rankings data today")
                .await;
        }

        let mode = Gamemode::Osu;
        let (min_rank, max_rank) = RankRange::First.bounds();
        let top = self
            .rankings
            .top_rank_improvements(
                GLOBAL_COUNTRY,
                min_rank,
                max_rank,
                NUM_DISPLAY_USERS_TOP,
                mode,
            )
            .await?;
        let bottom = self
            .rankings
            .bottom_rank_improvements(
                GLOBAL_COUNTRY,
                min_rank,
                max_rank,
                NUM_DISPLAY_USERS_BOTTOM,
                mode,
            )
            .await?;

        let payload = DigestPayload::Rankings(RankingsDigest {
            mode,
            country_code: GLOBAL_COUNTRY.to_owned(),
            rank_range: (min_rank, max_rank),
            top,
            bottom,
        });
        let channels = self
            .subscriptions
            .subscribed_channels(NewsletterPage::Rankings)
            .await?;
        self.bot.publish(&channels, &payload).await;
        Ok(())
    }

    async fn publish_top_plays(&self) -> DigestResult {
        let age = SystemTime::now()
            .duration_since(self.top_plays.last_write_time()?)
            .unwrap_or_default();
        if age > MAX_PUBLISH_TOP_PLAYS_AGE {
            tracing::warn!(
                "Top plays data is {}h old, skipping the digest send",
                age.as_secs() / 3600
            );
            return self
                .report_unavailable(NewsletterPage::TopPlays, "no fresh top plays data today")
                .await;
        }
        if self.top_plays.has_empty_table().await? {
            tracing::warn!("Top plays database has an empty table, skipping the digest send");
            return self
                .report_unavailable(NewsletterPage::TopPlays, "no fresh top plays data today")
                .await;
        }

        let mode = Gamemode::Osu;
        let plays = self
            .top_plays
            .get_top_plays(GLOBAL_COUNTRY, NUM_DISPLAY_TOP_PLAYS, mode)
            .await?;

        let payload = DigestPayload::TopPlays(TopPlaysDigest {
            mode,
            country_code: GLOBAL_COUNTRY.to_owned(),
            plays,
        });
        let channels = self
            .subscriptions
            .subscribed_channels(NewsletterPage::TopPlays)
            .await?;
        self.bot.publish(&channels, &payload).await;
        Ok(())
    }

    /// Tells the page's subscribers that today's digest cannot be built.
    async fn report_unavailable(&self, page: NewsletterPage, reason: &str) -> DigestResult {
        let payload = DigestPayload::Unavailable {
            page,
            reason: reason.to_owned(),
        };
        let channels = self.subscriptions.subscribed_channels(page).await?;
        self.bot.publish(&channels, &payload).await;
        Ok(())
    }
}
