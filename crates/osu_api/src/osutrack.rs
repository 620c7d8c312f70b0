//! The client of the osu!track best-plays API.

use std::time::Duration;

use serde::Deserialize;

use digest_lib::error::{DigestError, DigestResult};
use digest_lib::gamemode::Gamemode;
use digest_lib::sync::ShutdownListener;

use crate::backoff::Backoff;
use crate::http::{HttpRequest, HttpRequester, Method};

/// Base URL of the osu!track API.
pub const OSUTRACK_API_BASE: &str = "https://osutrack-api.ameo.dev";

/// Full wait applied when the transport itself fails; the elapsed cooldown
/// counts toward it.
const TRANSPORT_RETRY_WAIT: Duration = Duration::from_secs(30);

/// One best play of the day, as returned by osu!track.
#[derive(Debug, Deserialize)]
pub struct BestPlay {
    /// ID of the player.
    pub user: i64,
    /// ID of the beatmap the play was set on.
    pub beatmap_id: i64,
    /// Performance points awarded.
    pub pp: f64,
    /// Total score value.
    pub score: i64,
    /// When the play was set, UTC at second resolution.
    pub score_time: String,
    /// Letter grade of the play.
    pub rank: String,
}

/// Client of the osu!track best-plays endpoint.
///
/// No authentication. The retry policy matches the osu!API client's, except
/// that there is no 401 branch and any 4xx is a non-retryable failure.
#[derive(Clone)]
pub struct OsutrackClient<R> {
    http: R,
    cooldown: Duration,
    base_url: String,
    shutdown: Option<ShutdownListener>,
}

impl<R: HttpRequester> OsutrackClient<R> {
    /// Creates a client. `cooldown` is slept before every request.
    pub fn new(http: R, cooldown: Duration) -> Self {
        Self {
            http,
            cooldown,
            base_url: OSUTRACK_API_BASE.to_owned(),
            shutdown: None,
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Attaches a listener that aborts sleeping retry loops on shutdown.
    pub fn with_shutdown(mut self, listener: ShutdownListener) -> Self {
        self.shutdown = Some(listener);
        self
    }

    /// Fetches the best `limit` plays of `[from, to)` for the mode;
    /// `from` and `to` must be of the form `YYYY-MM-DD`.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub async fn get_best_plays(
        &self,
        mode: Gamemode,
        from: &str,
        to: &str,
        limit: usize,
    ) -> DigestResult<Vec<BestPlay>> {
        assert!(limit > 0, "limit must be greater than zero");
        tracing::debug!("Requesting best {limit} {mode} plays from {from} to {to}");
        let url = format!(
            "{}/bestplays?mode={}&from={from}&to={to}&limit={limit}",
            self.base_url,
            mode.osutrack_code()
        );

        let mut backoff = Backoff::new(self.cooldown);
        loop {
            self.sleep(backoff.delay()).await?;

            let req = HttpRequest {
                url: url.clone(),
                method: Method::Get,
                headers: vec![("Accept".to_owned(), "application/json".to_owned())],
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
                    // The endpoint answers with a JSON array.
                    let plays: Vec<BestPlay> = serde_json::from_str(&response.body)?;
                    return Ok(plays);
                }
                status @ 400..=499 => {
                    tracing::error!("Got {status} response from {url}");
                    return Err(DigestError::UnhandledStatus(status));
                }
                status @ 500..=599 => {
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
