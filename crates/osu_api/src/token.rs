//! The shared OAuth token manager.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use digest_lib::error::{DigestError, DigestResult};
use digest_lib::internal;

use crate::http::{HttpRequest, HttpRequester, Method};

/// The osu! OAuth token endpoint.
pub const TOKEN_URL: &str = "https://osu.ppy.sh/oauth/token";

/// Fixed wait between attempts of the refresh loop.
const RETRY_WAIT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Owns the OAuth bearer token shared by every osu!API worker.
///
/// Readers get the cached token cheaply. A refresh elects a single leader
/// through a try-locked mutex; the leader holds the token's write lock across
/// the whole network round-trip, so concurrent refreshers (and readers) block
/// on the token lock until the new token is in place, without issuing their
/// own round-trip. Lock order is always leadership first, writer second.
pub struct TokenManager<R> {
    http: R,
    client_id: String,
    client_secret: String,
    token_url: String,
    token: RwLock<String>,
    refresh_leadership: Mutex<()>,
}

impl<R: HttpRequester> TokenManager<R> {
    /// Creates a manager holding an empty token.
    ///
    /// The first authenticated request is expected to receive a 401 and
    /// drive the initial refresh.
    pub fn new(http: R, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: TOKEN_URL.to_owned(),
            token: RwLock::new(String::new()),
            refresh_leadership: Mutex::new(()),
        }
    }

    /// Overrides the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Returns the current access token.
    ///
    /// Cannot fail; blocks only while a refresh leader holds the write lock.
    pub async fn access_token(&self) -> String {
        self.token.read().await.clone()
    }

    /// Refreshes the access token.
    ///
    /// At most one caller performs the network round-trip. Callers that lose
    /// the leadership election wait for the leader to finish and return
    /// without touching the network; a refresh failure therefore only ever
    /// surfaces to the leader.
    pub async fn refresh_access_token(&self) -> DigestResult {
        tracing::debug!("Attempting to refresh the access token");
        match self.refresh_leadership.try_lock() {
            Ok(_leadership) => {
                let mut token = self.token.write().await;
                tracing::info!("Refreshing the access token");
                *token = self.fetch_token().await?;
                Ok(())
            }
            Err(_) => {
                tracing::debug!("Somebody is already refreshing the token, waiting for them");
                let _token = self.token.read().await;
                Ok(())
            }
        }
    }

    /// The refresh loop: retries transport errors and 429/5xx at a fixed
    /// interval forever; any other non-200 status is fatal.
    async fn fetch_token(&self) -> DigestResult<String> {
        let body = serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "grant_type": "client_credentials",
            "scope": "public",
        })
        .to_string();

        loop {
            let req = HttpRequest {
                url: self.token_url.clone(),
                method: Method::Post,
                headers: vec![
                    ("Content-Type".to_owned(), "application/json".to_owned()),
                    ("Accept".to_owned(), "application/json".to_owned()),
                ],
                body: Some(body.clone()),
            };

            let response = match self.http.request(req).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Token request failed ({e}), retrying in {RETRY_WAIT:?}");
                    tokio::time::sleep(RETRY_WAIT).await;
                    continue;
                }
            };

            match response.status {
                200 => {
                    let parsed: TokenResponse = serde_json::from_str(&response.body)
                        .map_err(|e| internal!("malformed token response: {e}"))?;
                    return Ok(parsed.access_token);
                }
                status if status == 429 || (500..600).contains(&status) => {
                    tracing::warn!("Token request failed ({status}), retrying in {RETRY_WAIT:?}");
                    tokio::time::sleep(RETRY_WAIT).await;
                }
                status => return Err(DigestError::UnhandledStatus(status)),
            }
        }
    }
}
