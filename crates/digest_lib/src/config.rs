//! Loading and first-run creation of the daemon's JSON configuration.

use std::collections::BTreeMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::DigestResult;
use crate::mods::MOD_VOCABULARY;

/// Default UTC hour of the rankings scrape job, converted to local time on setup.
const DEFAULT_SCRAPE_RANKINGS_UTC_HOUR: i32 = 3;
/// Default UTC hour of the top plays job, converted to local time on setup.
const DEFAULT_TOP_PLAYS_UTC_HOUR: i32 = 1;

const LETTER_RANKS: [&str; 8] = ["X", "XH", "S", "SH", "A", "B", "C", "D"];

/// The daemon configuration, read once at startup from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestConfig {
    /// Log verbosity: 0 errors only, 1 info, 2 debug, 3 trace.
    pub log_level: i32,
    /// Whether log output uses ANSI colors.
    pub log_ansi_colors: bool,
    /// The token the chat-bot surface authenticates with.
    pub discord_bot_token: String,
    /// The osu!API OAuth client ID.
    #[serde(rename = "osuClientID")]
    pub osu_client_id: String,
    /// The osu!API OAuth client secret.
    pub osu_client_secret: String,
    /// Local wall-clock hour the rankings scrape fires at.
    pub scrape_rankings_run_hour: i32,
    /// Local wall-clock hour the top plays harvest fires at.
    pub top_plays_run_hour: i32,
    /// Fan-out width of the harvest pipelines.
    pub thread_count: i32,
    /// Path of the rankings database file.
    pub rankings_db_file_path: PathBuf,
    /// Path of the top plays database file.
    pub top_plays_db_file_path: PathBuf,
    /// Path of the bot configuration (subscriptions) database file.
    pub bot_config_db_file_path: PathBuf,
    /// Mapping from display-string keys to the emoji tokens the bot renders.
    pub discord_bot_strings: BTreeMap<String, String>,
}

impl DigestConfig {
    /// Loads and normalizes the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> DigestResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.normalize();
        Ok(config)
    }

    /// Clamps out-of-range values into their documented domains, warning
    /// about each adjustment.
    fn normalize(&mut self) {
        if !(0..=3).contains(&self.log_level) {
            tracing::warn!("Configured logLevel is out of bounds, setting to 1");
            self.log_level = 1;
        }
        if !(0..=23).contains(&self.scrape_rankings_run_hour) {
            self.scrape_rankings_run_hour = self.scrape_rankings_run_hour.rem_euclid(24);
            tracing::warn!(
                "Configured scrapeRankingsRunHour is out of bounds, normalizing to {}",
                self.scrape_rankings_run_hour
            );
        }
        if !(0..=23).contains(&self.top_plays_run_hour) {
            self.top_plays_run_hour = self.top_plays_run_hour.rem_euclid(24);
            tracing::warn!(
                "Configured topPlaysRunHour is out of bounds, normalizing to {}",
                self.top_plays_run_hour
            );
        }
        if self.thread_count < 1 {
            self.thread_count = default_thread_count();
            tracing::warn!(
                "Configured threadCount is out of bounds, setting to {}",
                self.thread_count
            );
        }
    }

    /// The tracing level filter matching the configured log level.
    pub fn log_level_filter(&self) -> LevelFilter {
        match self.log_level {
            0 => LevelFilter::ERROR,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Interactively creates a default configuration at `path`.
    ///
    /// Prompts on stdin for the credentials that cannot be defaulted and
    /// writes everything else with sensible defaults.
    pub fn setup_interactive(path: impl AsRef<Path>) -> DigestResult<()> {
        let path = path.as_ref();

        println!("In order to run this bot, you will need a registered Discord application and an osu!API client.");
        let discord_bot_token = prompt("Enter Discord bot token: ")?;
        let osu_client_id = prompt("Enter osu!API client ID: ")?;
        let osu_client_secret = prompt("Enter osu!API client secret: ")?;

        let config = Self {
            log_level: 1,
            log_ansi_colors: false,
            discord_bot_token,
            osu_client_id,
            osu_client_secret,
            scrape_rankings_run_hour: utc_to_local_hour(DEFAULT_SCRAPE_RANKINGS_UTC_HOUR),
            top_plays_run_hour: utc_to_local_hour(DEFAULT_TOP_PLAYS_UTC_HOUR),
            thread_count: default_thread_count(),
            rankings_db_file_path: PathBuf::from("data/rankings.db"),
            top_plays_db_file_path: PathBuf::from("data/top_plays.db"),
            bot_config_db_file_path: PathBuf::from("data/bot_config.db"),
            discord_bot_strings: default_bot_strings(),
        };

        let mut serialized = serde_json::to_string_pretty(&config)?;
        serialized.push('\n');
        std::fs::write(path, serialized)?;

        println!(
            "Success! Some values have been set by default. Config can be found at {}",
            path.display()
        );
        Ok(())
    }
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

fn default_thread_count() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(1)
}

/// Converts an hour of day from UTC to the system timezone.
fn utc_to_local_hour(utc_hour: i32) -> i32 {
    let offset_hours = chrono::Local::now().offset().local_minus_utc() / 3600;
    (utc_hour + offset_hours).rem_euclid(24)
}

/// The display strings the bot falls back to when no emoji tokens are
/// configured: one per letter rank and one per mod code.
fn default_bot_strings() -> BTreeMap<String, String> {
    LETTER_RANKS
        .iter()
        .chain(MOD_VOCABULARY.iter())
        .map(|key| (key.to_string(), key.to_string()))
        .collect()
}
