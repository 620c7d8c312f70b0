//! The client of the osu!API v2 resource endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use std::collections::HashMap;

use digest_lib::error::{DigestError, DigestResult};
use digest_lib::gamemode::Gamemode;
use digest_lib::models::{BeatmapId, UserId};
use digest_lib::sync::ShutdownListener;

use crate::backoff::Backoff;
use crate::http::{HttpRequest, HttpRequester, Method};
use crate::token::TokenManager;

/// Base URL of the osu!API v2.
pub const OSU_API_BASE: &str = "https://osu.ppy.sh/api/v2";
/// Highest requestable zero-based rankings page.
pub const MAX_RANKINGS_PAGE: u32 = 199;
/// Most IDs accepted by a batched users/beatmaps lookup.
pub const MAX_BATCH_IDS: usize = 50;

/// Full wait applied when the transport itself fails; the elapsed cooldown
/// counts toward it.
const TRANSPORT_RETRY_WAIT: Duration = Duration::from_secs(30);

/// One page of the performance rankings.
#[derive(Debug, Deserialize)]
pub struct RankingsPage {
    /// The entries of the page, best rank first.
    pub ranking: Vec<RankingsEntry>,
}

/// Per-user statistics entry of a rankings page.
#[derive(Debug, Deserialize)]
pub struct RankingsEntry {
    /// The ranked user.
    pub user: RankedUser,
    /// Performance points in the mode.
    pub pp: f64,
    /// Hit accuracy in percent.
    pub hit_accuracy: f64,
    /// Total play time in seconds.
    pub play_time: u64,
    /// Current global rank.
    pub global_rank: i64,
}

/// The user object nested in a rankings entry.
#[derive(Debug, Deserialize)]
pub struct RankedUser {
    /// The user ID.
    pub id: i64,
    /// The user name.
    pub username: String,
    /// ISO-3166 alpha-2 country code.
    pub country_code: String,
    /// Profile picture link.
    pub avatar_url: String,
}

/// A user fetched by ID.
#[derive(Debug, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: i64,
    /// Daily global-rank history; absent for inactive users.
    pub rank_history: Option<RankHistory>,
}

/// A user's daily global-rank history, oldest first.
#[derive(Debug, Deserialize)]
pub struct RankHistory {
    /// One global rank per day, 90 entries.
    pub data: Vec<i64>,
}

/// A user from a batched lookup, with per-ruleset statistics.
#[derive(Debug, Deserialize)]
pub struct BatchedUser {
    /// The user ID.
    pub id: i64,
    /// The user name.
    pub username: String,
    /// ISO-3166 alpha-2 country code.
    pub country_code: String,
    /// Profile picture link.
    pub avatar_url: String,
    /// Statistics keyed by ruleset name.
    pub statistics_rulesets: HashMap<String, UserStatistics>,
}

/// Mode-specific statistics of a batched user.
#[derive(Debug, Deserialize)]
pub struct UserStatistics {
    /// Performance points in the mode.
    pub pp: f64,
    /// Hit accuracy in percent.
    pub hit_accuracy: f64,
    /// Total play time in seconds.
    pub play_time: u64,
    /// Current global rank.
    pub global_rank: i64,
}

#[derive(Debug, Deserialize)]
struct BatchedUsers {
    users: Vec<BatchedUser>,
}

/// A beatmap difficulty.
#[derive(Debug, Deserialize)]
pub struct Beatmap {
    /// The beatmap ID.
    pub id: i64,
    /// Maximum achievable combo.
    pub max_combo: i64,
    /// Name of the difficulty.
    pub version: String,
    /// Star rating.
    pub difficulty_rating: f64,
    /// The mapset the difficulty belongs to.
    pub beatmapset: Beatmapset,
}

/// The mapset a beatmap belongs to.
#[derive(Debug, Deserialize)]
pub struct Beatmapset {
    /// Song artist.
    pub artist: String,
    /// Song title.
    pub title: String,
    /// Name of the mapset creator.
    pub creator: String,
}

#[derive(Debug, Deserialize)]
struct BatchedBeatmaps {
    beatmaps: Vec<Beatmap>,
}

/// One of a user's scores on a beatmap.
#[derive(Debug, Deserialize)]
pub struct BeatmapScore {
    /// The score ID.
    pub id: i64,
    /// When the score was set (RFC 3339 UTC).
    pub created_at: String,
    /// Hit accuracy in the range `[0, 1]`.
    pub accuracy: f64,
    /// Mod codes the score was set with.
    pub mods: Vec<String>,
    /// Highest combo reached.
    pub max_combo: i64,
    /// Hit counts.
    pub statistics: ScoreStatistics,
}

/// Hit counts of a score.
#[derive(Debug, Deserialize)]
pub struct ScoreStatistics {
    /// Number of 300s.
    pub count_300: i64,
    /// Number of 100s.
    pub count_100: i64,
    /// Number of 50s; absent in taiko.
    pub count_50: Option<i64>,
    /// Number of misses.
    pub count_miss: i64,
}

#[derive(Debug, Deserialize)]
struct UserBeatmapScores {
    scores: Vec<BeatmapScore>,
}

/// Client of the osu!API v2 resource endpoints.
///
/// Cheap to clone: fan-out workers each clone their own handle while sharing
/// the token manager. Every request runs the full retry policy: transport
/// errors and rate limits are absorbed, a 401 drives a shared token refresh,
/// and a 404 comes back as `None`.
#[derive(Clone)]
pub struct OsuClient<R> {
    http: R,
    tokens: Arc<TokenManager<R>>,
    cooldown: Duration,
    base_url: String,
    shutdown: Option<ShutdownListener>,
}

impl<R: HttpRequester> OsuClient<R> {
    /// Creates a client. `cooldown` is slept before every request; pipeline
    /// workers pass zero and lean on the backoff policy instead.
    pub fn new(http: R, tokens: Arc<TokenManager<R>>, cooldown: Duration) -> Self {
        Self {
            http,
            tokens,
            cooldown,
            base_url: OSU_API_BASE.to_owned(),
            shutdown: None,
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Attaches a listener that aborts sleeping retry loops on shutdown.
    ///
    /// Without one (the production default) retry loops run unbounded.
    pub fn with_shutdown(mut self, listener: ShutdownListener) -> Self {
        self.shutdown = Some(listener);
        self
    }

    /// Fetches one zero-based page of the performance rankings; page 0 holds
    /// ranks 1-50, page 1 ranks 51-100, and so on.
    ///
    /// # Panics
    ///
    /// Panics if `page` exceeds [`MAX_RANKINGS_PAGE`].
    pub async fn get_rankings(
        &self,
        page: u32,
        mode: Gamemode,
    ) -> DigestResult<Option<RankingsPage>> {
        assert!(
            page <= MAX_RANKINGS_PAGE,
            "rankings page cannot be greater than {MAX_RANKINGS_PAGE}, got {page}"
        );
        tracing::debug!("Requesting page {page} of the {mode} rankings");
        let url = format!(
            "{}/rankings/{mode}/performance?page={}",
            self.base_url,
            page + 1
        );
        self.api_request(url).await
    }

    /// Fetches a user by ID, including their rank history for the mode.
    pub async fn get_user(&self, user_id: UserId, mode: Gamemode) -> DigestResult<Option<User>> {
        tracing::debug!("Requesting data for {mode} user {user_id}");
        let url = format!("{}/users/{user_id}/{mode}?key=id", self.base_url);
        self.api_request(url).await
    }

    /// Fetches up to [`MAX_BATCH_IDS`] users at once.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_BATCH_IDS`] IDs are given.
    pub async fn get_users(
        &self,
        user_ids: &[UserId],
        mode: Gamemode,
    ) -> DigestResult<Option<Vec<BatchedUser>>> {
        assert!(
            user_ids.len() <= MAX_BATCH_IDS,
            "cannot request more than {MAX_BATCH_IDS} users at once, got {}",
            user_ids.len()
        );
        tracing::debug!("Requesting data for {} {mode} users", user_ids.len());
        let url = format!("{}/users{}", self.base_url, batch_params(user_ids));
        let batched: Option<BatchedUsers> = self.api_request(url).await?;
        Ok(batched.map(|batch| batch.users))
    }

    /// Fetches a beatmap by ID.
    pub async fn get_beatmap(&self, beatmap_id: BeatmapId) -> DigestResult<Option<Beatmap>> {
        tracing::debug!("Requesting beatmap {beatmap_id}");
        let url = format!("{}/beatmaps/{beatmap_id}", self.base_url);
        self.api_request(url).await
    }

    /// Fetches up to [`MAX_BATCH_IDS`] beatmaps at once.
    ///
    /// # Panics
    ///
    /// Panics if more than [`MAX_BATCH_IDS`] IDs are given.
    pub async fn get_beatmaps(
        &self,
        beatmap_ids: &[BeatmapId],
        mode: Gamemode,
    ) -> DigestResult<Option<Vec<Beatmap>>> {
        assert!(
            beatmap_ids.len() <= MAX_BATCH_IDS,
            "cannot request more than {MAX_BATCH_IDS} beatmaps at once, got {}",
            beatmap_ids.len()
        );
        tracing::debug!("Requesting data for {} {mode} beatmaps", beatmap_ids.len());
        let url = format!("{}/beatmaps{}", self.base_url, batch_params(beatmap_ids));
        let batched: Option<BatchedBeatmaps> = self.api_request(url).await?;
        Ok(batched.map(|batch| batch.beatmaps))
    }

    /// Fetches all of a user's scores on a beatmap for the mode.
    pub async fn get_user_beatmap_scores(
        &self,
        mode: Gamemode,
        user_id: UserId,
        beatmap_id: BeatmapId,
    ) -> DigestResult<Option<Vec<BeatmapScore>>> {
        tracing::debug!("Requesting {mode} scores of user {user_id} on beatmap {beatmap_id}");
        let url = format!(
            "{}/beatmaps/{beatmap_id}/scores/users/{user_id}/all?ruleset={mode}",
            self.base_url
        );
        let scores: Option<UserBeatmapScores> = self.api_request(url).await?;
        Ok(scores.map(|wrapper| wrapper.scores))
    }

    /// One retried API exchange.
    ///
    /// Classification: transport error → fixed wait, retry; 200 → parse;
    /// 401 → shared token refresh, retry; 404 → `None`; 429/5xx → backoff,
    /// retry; anything else → error. Retries are unbounded unless a shutdown
    /// listener is attached.
    async fn api_request<T>(&self, url: String) -> DigestResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut backoff = Backoff::new(self.cooldown);
        loop {
            self.sleep(backoff.delay()).await?;

            let req = HttpRequest {
                url: url.clone(),
                method: Method::Get,
                headers: vec![
                    ("Content-Type".to_owned(), "application/json".to_owned()),
                    ("Accept".to_owned(), "application/json".to_owned()),
                    (
                        "Authorization".to_owned(),
                        format!("Bearer {}", self.tokens.access_token().await),
                    ),
                ],
                body: None,
            };

            let response = match self.http.request(req).await {
                Ok(response) => response,
                Err(e) => {
                    let top_up = TRANSPORT_RETRY_WAIT.saturating_sub(backoff.delay());
                    tracing::warn!(
                        "Request failed ({e}), retrying in {:?}",
                        top_up + backoff.delay()
                    );
                    self.sleep(top_up).await?;
                    continue;
                }
            };

            match response.status {
                200 => {
                    let parsed = serde_json::from_str(&response.body)?;
                    return Ok(Some(parsed));
                }
                401 => {
                    tracing::debug!("Got 401, attempting to refresh the OAuth token");
                    self.tokens.refresh_access_token().await?;
                }
                404 => {
                    tracing::error!("Got 404 response from GET {url}");
                    return Ok(None);
                }
                status if status == 429 || (500..600).contains(&status) => {
                    let delay = backoff.escalate();
                    tracing::warn!("Request failed ({status}), retrying in {delay:?}");
                }
                status => {
                    tracing::error!("Made GET request to {url} and got unhandled response {status}");
                    return Err(DigestError::UnhandledStatus(status));
                }
            }
        }
    }

    async fn sleep(&self, duration: Duration) -> DigestResult {
        match &self.shutdown {
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
            Some(listener) => {
                let mut listener = listener.clone();
                tokio::select! {
                    _ = tokio::time::sleep(duration) => Ok(()),
                    _ = listener.wait() => Err(DigestError::Cancelled),
                }
            }
        }
    }
}

pub(crate) fn batch_params(ids: &[i64]) -> String {
    use std::fmt::Write as _;
    let mut params = String::from("?");
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            params.push('&');
        }
        let _ = write!(params, "ids[]={id}");
    }
    params
}
