use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use digest_lib::gamemode::Gamemode;
use digest_lib::models::{
    BeatmapDetails, ChannelId, RankingsUser, ScoreDetails, TopPlay, TopPlayUser,
};
use digest_lib::mods::Mods;
use digest_lib::rankings::RankingsStore;
use digest_lib::subscriptions::{NewsletterPage, SubscriptionsStore};
use digest_lib::time::parse_utc_timestamp;
use digest_lib::top_plays::TopPlaysStore;
use digestd_lib::publish::{BotSurface, DigestPayload, Publisher};

/// Bot surface that records every publish call.
#[derive(Clone, Default)]
struct RecordingBot {
    sent: Arc<Mutex<Vec<(Vec<ChannelId>, DigestPayload)>>>,
}

impl RecordingBot {
    fn sent(&self) -> Vec<(Vec<ChannelId>, DigestPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

impl BotSurface for RecordingBot {
    async fn publish(&self, channel_ids: &[ChannelId], payload: &DigestPayload) {
        self.sent
            .lock()
            .unwrap()
            .push((channel_ids.to_vec(), payload.clone()));
    }
}

fn temp_db(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "digestd-publish-{tag}-{}.db",
        digest_lib::gen_random_str(12)
    ))
}

fn user(user_id: i64, current_rank: i64) -> RankingsUser {
    RankingsUser {
        user_id,
        username: format!("player{user_id}"),
        country_code: "CA".to_owned(),
        avatar_url: format!("https://a.example/{user_id}"),
        performance_points: 7_000.0,
        accuracy: 98.5,
        hours_played: 1_200,
        yesterday_rank: None,
        current_rank: Some(current_rank),
    }
}

fn play(rank: i64) -> TopPlay {
    TopPlay {
        rank,
        score: ScoreDetails {
            score_id: 4_000_000 + rank,
            mods: Mods::none(),
            performance_points: 812.3,
            accuracy: 0.99,
            total_score: 71_234_567,
            created_at: parse_utc_timestamp("2023-01-02 03:04:05").unwrap(),
            combo: 1_520,
            letter_rank: "S".to_owned(),
            count_300: 1_100,
            count_100: 12,
            count_50: Some(1),
            count_miss: 0,
        },
        beatmap: BeatmapDetails {
            beatmap_id: 2_000_000 + rank,
            star_rating: 7.12,
            difficulty_name: "Extreme".to_owned(),
            artist: "Some Artist".to_owned(),
            title: "Some Song".to_owned(),
            mapset_creator: "mapper".to_owned(),
            max_combo: 1_540,
        },
        user: TopPlayUser {
            user_id: 9_000 + rank,
            username: format!("scorer{rank}"),
            country_code: "DE".to_owned(),
            avatar_url: "https://a.example/scorer".to_owned(),
            performance_points: 11_000.0,
            accuracy: 99.0,
            hours_played: 2_000,
            current_rank: 40 + rank,
        },
    }
}

struct Fixture {
    rankings: Arc<RankingsStore>,
    top_plays: Arc<TopPlaysStore>,
    subscriptions: Arc<SubscriptionsStore>,
    publisher: Publisher<RecordingBot>,
    bot: RecordingBot,
    paths: [PathBuf; 3],
}

async fn fixture(tag: &str) -> Fixture {
    let paths = [
        temp_db(&format!("{tag}-rankings")),
        temp_db(&format!("{tag}-plays")),
        temp_db(&format!("{tag}-subs")),
    ];
    let rankings = Arc::new(RankingsStore::open(&paths[0]).await.unwrap());
    let top_plays = Arc::new(TopPlaysStore::open(&paths[1]).await.unwrap());
    let subscriptions = Arc::new(SubscriptionsStore::open(&paths[2]).await.unwrap());
    let bot = RecordingBot::default();
    let publisher = Publisher::new(
        rankings.clone(),
        top_plays.clone(),
        subscriptions.clone(),
        bot.clone(),
    );
    Fixture {
        rankings,
        top_plays,
        subscriptions,
        publisher,
        bot,
        paths,
    }
}

impl Fixture {
    fn cleanup(&self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[tokio::test]
async fn fresh_rankings_fan_out_to_subscribers() {
    let fixture = fixture("rankings").await;

    for mode in Gamemode::ALL {
        fixture
            .rankings
            .insert_rankings_users(&[user(1, 10)], mode)
            .await
            .unwrap();
    }
    fixture.rankings.shift_ranks(Gamemode::Osu).await.unwrap();
    fixture
        .rankings
        .insert_rankings_users(&[user(1, 5)], Gamemode::Osu)
        .await
        .unwrap();

    fixture
        .subscriptions
        .add_subscription(100, NewsletterPage::Rankings)
        .await
        .unwrap();
    fixture
        .subscriptions
        .add_subscription(200, NewsletterPage::Rankings)
        .await
        .unwrap();
    // Subscribed to the other page only; must not receive this digest.
    fixture
        .subscriptions
        .add_subscription(300, NewsletterPage::TopPlays)
        .await
        .unwrap();

    fixture.publisher.on_scrape_rankings_complete().await;

    let sent = fixture.bot.sent();
    assert_eq!(sent.len(), 1);
    let (channels, payload) = &sent[0];
    assert_eq!(channels, &vec![100, 200]);
    match payload {
        DigestPayload::Rankings(digest) => {
            assert_eq!(digest.rank_range, (1, 100));
            assert_eq!(digest.top.len(), 1);
            assert_eq!(digest.top[0].user.user_id, 1);
            assert!(digest.bottom.is_empty());
        }
        other => panic!("unexpected payload {other:?}"),
    }

    fixture.cleanup();
}

#[tokio::test]
async fn empty_stores_report_unavailability_instead() {
    let fixture = fixture("unavailable").await;
    fixture
        .subscriptions
        .add_subscription(100, NewsletterPage::Rankings)
        .await
        .unwrap();

    fixture.publisher.on_scrape_rankings_complete().await;

    let sent = fixture.bot.sent();
    assert_eq!(sent.len(), 1);
    let (channels, payload) = &sent[0];
    assert_eq!(channels, &vec![100]);
    assert!(matches!(
        payload,
        DigestPayload::Unavailable {
            page: NewsletterPage::Rankings,
            ..
        }
    ));

    fixture.cleanup();
}

#[tokio::test]
async fn fresh_top_plays_fan_out_to_subscribers() {
    let fixture = fixture("plays").await;

    for mode in Gamemode::ALL {
        fixture
            .top_plays
            .insert_top_plays(mode, &[play(1), play(2)])
            .await
            .unwrap();
    }
    fixture
        .subscriptions
        .add_subscription(300, NewsletterPage::TopPlays)
        .await
        .unwrap();

    fixture.publisher.on_top_plays_complete().await;

    let sent = fixture.bot.sent();
    assert_eq!(sent.len(), 1);
    let (channels, payload) = &sent[0];
    assert_eq!(channels, &vec![300]);
    match payload {
        DigestPayload::TopPlays(digest) => {
            assert_eq!(digest.mode, Gamemode::Osu);
            assert_eq!(
                digest.plays.iter().map(|play| play.rank).collect::<Vec<_>>(),
                vec![1, 2]
            );
        }
        other => panic!("unexpected payload {other:?}"),
    }

    fixture.cleanup();
}
