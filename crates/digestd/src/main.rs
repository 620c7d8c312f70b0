//! Entrypoint of the osu! daily digest daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing::info;

use digest_lib::config::DigestConfig;
use digest_lib::rankings::RankingsStore;
use digest_lib::subscriptions::SubscriptionsStore;
use digest_lib::top_plays::TopPlaysStore;
use osu_api::http::ReqwestRequester;
use osu_api::osu::OsuClient;
use osu_api::osutrack::OsutrackClient;
use osu_api::token::TokenManager;

use digestd_lib::daily::DailyJob;
use digestd_lib::publish::{LoggingBot, Publisher};
use digestd_lib::{scrape_rankings, top_plays};

/// Time granted to the bot surface to come up before the jobs are spawned.
const STARTUP_GRACE_PERIOD: Duration = Duration::from_secs(7);

#[derive(Parser)]
#[command(about = "Daily osu! rankings and top plays digest daemon")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "digest_config.json")]
    config: PathBuf,
}

fn setup_tracing(config: &DigestConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_max_level(config.log_level_filter())
        .with_ansi(config.log_ansi_colors)
        .try_init()
        .map_err(|e| anyhow::format_err!("{e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.config.exists() {
        DigestConfig::setup_interactive(&args.config)
            .context("When creating the default configuration")?;
        return Ok(());
    }

    let config = DigestConfig::load(&args.config).context("When loading the configuration")?;
    setup_tracing(&config)?;

    let rankings = Arc::new(
        RankingsStore::open(&config.rankings_db_file_path)
            .await
            .context("When opening the rankings database")?,
    );
    let top_plays_store = Arc::new(
        TopPlaysStore::open(&config.top_plays_db_file_path)
            .await
            .context("When opening the top plays database")?,
    );
    let subscriptions = Arc::new(
        SubscriptionsStore::open(&config.bot_config_db_file_path)
            .await
            .context("When opening the bot config database")?,
    );

    let http = ReqwestRequester::new().context("When building the HTTP transport")?;
    let tokens = Arc::new(TokenManager::new(
        http.clone(),
        config.osu_client_id.clone(),
        config.osu_client_secret.clone(),
    ));
    let osu = OsuClient::new(http.clone(), tokens, Duration::ZERO);
    let osutrack = OsutrackClient::new(http, Duration::ZERO);

    let publisher = Arc::new(Publisher::new(
        rankings.clone(),
        top_plays_store.clone(),
        subscriptions.clone(),
        LoggingBot,
    ));

    // Give the bot surface some time to start before the jobs can fire.
    info!("Waiting {STARTUP_GRACE_PERIOD:?} before spawning the daily jobs");
    tokio::time::sleep(STARTUP_GRACE_PERIOD).await;

    let fan_out = config.thread_count.max(1) as usize;

    let scrape_job = {
        let osu = osu.clone();
        let rankings = rankings.clone();
        let publisher = publisher.clone();
        DailyJob::spawn_with_callback(
            config.scrape_rankings_run_hour,
            "scrapeRankings",
            move || {
                let osu = osu.clone();
                let rankings = rankings.clone();
                async move {
                    scrape_rankings::scrape_rankings(&osu, &rankings, fan_out)
                        .await
                        .context("When scraping the rankings")
                }
            },
            move || {
                let publisher = publisher.clone();
                async move { publisher.on_scrape_rankings_complete().await }
            },
        )
    };

    let top_plays_job = {
        let publisher = publisher.clone();
        DailyJob::spawn_with_callback(
            config.top_plays_run_hour,
            "getTopPlays",
            move || {
                let osu = osu.clone();
                let osutrack = osutrack.clone();
                let store = top_plays_store.clone();
                async move {
                    top_plays::get_top_plays(&osu, &osutrack, &store, fan_out)
                        .await
                        .context("When grabbing the top plays")
                }
            },
            move || {
                let publisher = publisher.clone();
                async move { publisher.on_top_plays_complete().await }
            },
        )
    };

    info!("Spawned all jobs");

    tokio::signal::ctrl_c()
        .await
        .context("When waiting for the shutdown signal")?;
    info!("Shutting down");
    scrape_job.stop();
    top_plays_job.stop();
    scrape_job.join().await;
    top_plays_job.join().await;

    Ok(())
}
