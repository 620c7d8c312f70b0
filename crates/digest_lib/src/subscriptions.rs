//! The store of per-channel newsletter subscriptions.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::{Connection as _, SqliteConnection};
use tokio::sync::Mutex;

use crate::db;
use crate::error::DigestResult;
use crate::internal;
use crate::models::ChannelId;

/// The two newsletter pages a channel can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewsletterPage {
    /// The daily rank-movement digest.
    Rankings,
    /// The daily top plays digest.
    TopPlays,
}

impl NewsletterPage {
    /// Both pages.
    pub const ALL: [NewsletterPage; 2] = [NewsletterPage::Rankings, NewsletterPage::TopPlays];

    /// The flag column of the page in the `BotConfig` table.
    fn column(self) -> &'static str {
        match self {
            NewsletterPage::Rankings => "scrapeRankingsSubscribed",
            NewsletterPage::TopPlays => "topPlaysSubscribed",
        }
    }
}

impl fmt::Display for NewsletterPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NewsletterPage::Rankings => "rankings",
            NewsletterPage::TopPlays => "topPlays",
        })
    }
}

/// The store mapping chat channels to their newsletter subscriptions.
pub struct SubscriptionsStore {
    conn: Mutex<SqliteConnection>,
}

impl SubscriptionsStore {
    /// Opens the subscriptions database at `path`, creating the file and the
    /// `BotConfig` table if they are missing.
    pub async fn open(path: impl AsRef<Path>) -> DigestResult<Self> {
        let path = path.as_ref().to_owned();
        tracing::debug!("Opening subscriptions database at {}", path.display());
        let mut conn = db::open_sqlite(&path).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS BotConfig (
                channelID               INTEGER PRIMARY KEY,
                scrapeRankingsSubscribed INTEGER NOT NULL,
                topPlaysSubscribed       INTEGER NOT NULL
            )",
        )
        .execute(&mut conn)
        .await?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the IDs of the channels subscribed to the page.
    pub async fn subscribed_channels(&self, page: NewsletterPage) -> DigestResult<Vec<ChannelId>> {
        tracing::debug!("Retrieving IDs of channels subscribed to {page}");
        let mut conn = self.conn.lock().await;
        let channel_ids: Vec<ChannelId> = sqlx::query_scalar(&format!(
            "SELECT channelID FROM BotConfig WHERE {} = 1",
            page.column()
        ))
        .fetch_all(&mut *conn)
        .await?;

        if let Some(invalid) = channel_ids.iter().find(|id| **id < 0) {
            return Err(internal!("invalid negative channel ID in database: {invalid}"));
        }
        Ok(channel_ids)
    }

    /// Returns whether the channel is subscribed to the page.
    pub async fn is_channel_subscribed(
        &self,
        channel_id: ChannelId,
        page: NewsletterPage,
    ) -> DigestResult<bool> {
        tracing::debug!("Checking if channel {channel_id} is subscribed to {page}");
        let mut conn = self.conn.lock().await;
        let flag: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT {} FROM BotConfig WHERE channelID = ?",
            page.column()
        ))
        .bind(channel_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(flag.is_some_and(|flag| flag != 0))
    }

    /// Subscribes the channel to the page, inserting the channel row if it is
    /// not known yet.
    pub async fn add_subscription(
        &self,
        channel_id: ChannelId,
        page: NewsletterPage,
    ) -> DigestResult {
        tracing::debug!("Adding subscription of channel {channel_id} to {page}");
        let mut conn = self.conn.lock().await;
        let mut txn = conn.begin().await?;

        let exists: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM BotConfig WHERE channelID = ?)")
            .bind(channel_id)
            .fetch_one(&mut *txn)
            .await?;

        if exists != 0 {
            sqlx::query(&format!(
                "UPDATE BotConfig SET {} = 1 WHERE channelID = ?",
                page.column()
            ))
            .bind(channel_id)
            .execute(&mut *txn)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO BotConfig (channelID, scrapeRankingsSubscribed, topPlaysSubscribed)
                 VALUES (?, ?, ?)",
            )
            .bind(channel_id)
            .bind((page == NewsletterPage::Rankings) as i64)
            .bind((page == NewsletterPage::TopPlays) as i64)
            .execute(&mut *txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Removes the channel's subscription to the page.
    pub async fn remove_subscription(
        &self,
        channel_id: ChannelId,
        page: NewsletterPage,
    ) -> DigestResult {
        tracing::debug!("Removing subscription of channel {channel_id} from {page}");
        let mut conn = self.conn.lock().await;
        sqlx::query(&format!(
            "UPDATE BotConfig SET {} = 0 WHERE channelID = ?",
            page.column()
        ))
        .bind(channel_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
