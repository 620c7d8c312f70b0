use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use digest_lib::error::DigestResult;
use digest_lib::gamemode::Gamemode;
use digest_lib::models::GLOBAL_COUNTRY;
use digest_lib::rankings::RankingsStore;
use digest_lib::top_plays::TopPlaysStore;
use digestd_lib::{scrape_rankings, top_plays};
use osu_api::http::{HttpRequest, HttpRequester, HttpResponse};
use osu_api::osu::OsuClient;
use osu_api::osutrack::OsutrackClient;
use osu_api::token::TokenManager;

const OSU_BASE: &str = "https://osu.test/api/v2";
const OSUTRACK_BASE: &str = "https://osutrack.test";

/// Transport that answers by the first URL fragment that matches.
#[derive(Clone, Default)]
struct FakeUpstream {
    routes: Arc<Mutex<Vec<(String, u16, String)>>>,
}

impl FakeUpstream {
    fn route(&self, fragment: &str, status: u16, body: impl ToString) {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_owned(), status, body.to_string()));
    }
}

impl HttpRequester for FakeUpstream {
    fn request(&self, req: HttpRequest) -> impl Future<Output = DigestResult<HttpResponse>> + Send {
        let routes = self.routes.lock().unwrap();
        let (_, status, body) = routes
            .iter()
            .find(|(fragment, _, _)| req.url.contains(fragment))
            .unwrap_or_else(|| panic!("unrouted URL {}", req.url))
            .clone();
        async move { Ok(HttpResponse { status, body }) }
    }
}

fn temp_db(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "digestd-test-{tag}-{}.db",
        digest_lib::gen_random_str(12)
    ))
}

fn osu_client(upstream: &FakeUpstream) -> OsuClient<FakeUpstream> {
    let tokens = Arc::new(
        TokenManager::new(upstream.clone(), "client-id", "client-secret")
            .with_token_url("https://osu.test/oauth/token"),
    );
    OsuClient::new(upstream.clone(), tokens, Duration::ZERO).with_base_url(OSU_BASE)
}

fn statistics(pp: f64, global_rank: i64) -> serde_json::Value {
    json!({
        "pp": pp,
        "hit_accuracy": 99.2,
        "play_time": 7_200_000,
        "global_rank": global_rank,
    })
}

fn batched_user(id: i64, username: &str) -> serde_json::Value {
    let stats = statistics(11_000.0, 40 + id);
    json!({
        "id": id,
        "username": username,
        "country_code": "DE",
        "avatar_url": format!("https://a.test/{id}"),
        "statistics_rulesets": {
            "osu": stats.clone(), "taiko": stats.clone(), "catch": stats.clone(), "mania": stats,
        },
    })
}

fn beatmap(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "max_combo": 1_540,
        "version": "Extreme",
        "difficulty_rating": 7.12,
        "beatmapset": {
            "artist": "Some Artist",
            "title": "Some Song",
            "creator": "mapper",
        },
    })
}

fn beatmap_score(id: i64, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created_at": created_at,
        "accuracy": 0.9934,
        "mods": ["HD", "DT"],
        "max_combo": 1_520,
        "statistics": {
            "count_300": 1_100,
            "count_100": 12,
            "count_50": 1,
            "count_miss": 0,
        },
    })
}

fn best_play(user: i64, beatmap_id: i64, score_time: &str) -> serde_json::Value {
    json!({
        "user": user,
        "beatmap_id": beatmap_id,
        "pp": 812.3,
        "score": 71_234_567,
        "score_time": score_time,
        "rank": "SH",
    })
}

#[tokio::test]
async fn top_plays_reconciliation_drops_unmatched_scores() {
    let upstream = FakeUpstream::default();

    // Three best plays; the third has no score with a matching timestamp.
    upstream.route(
        "/bestplays?mode=0",
        200,
        json!([
            best_play(1, 11, "2023-01-02 03:04:05"),
            best_play(2, 12, "2023-01-02 04:05:06"),
            best_play(3, 13, "2023-01-02 05:06:07"),
        ]),
    );
    for code in 1..=3 {
        upstream.route(&format!("/bestplays?mode={code}"), 200, json!([]));
    }

    upstream.route(
        "/beatmaps/11/scores/users/1/all",
        200,
        json!({ "scores": [beatmap_score(501, "2023-01-02T03:04:05Z")] }),
    );
    upstream.route(
        "/beatmaps/12/scores/users/2/all",
        200,
        json!({
            "scores": [
                beatmap_score(502, "2022-12-31T10:00:00Z"),
                beatmap_score(503, "2023-01-02T04:05:06Z"),
            ]
        }),
    );
    upstream.route(
        "/beatmaps/13/scores/users/3/all",
        200,
        json!({ "scores": [beatmap_score(504, "2023-01-01T00:00:00Z")] }),
    );

    upstream.route(
        "/users?",
        200,
        json!({ "users": [batched_user(1, "alpha"), batched_user(2, "beta")] }),
    );
    upstream.route(
        "/beatmaps?",
        200,
        json!({ "beatmaps": [beatmap(11), beatmap(12)] }),
    );

    let path = temp_db("reconcile");
    let store = TopPlaysStore::open(&path).await.unwrap();
    let osu = osu_client(&upstream);
    let osutrack = OsutrackClient::new(upstream.clone(), Duration::ZERO)
        .with_base_url(OSUTRACK_BASE);

    top_plays::get_top_plays(&osu, &osutrack, &store, 8)
        .await
        .unwrap();

    let plays = store
        .get_top_plays(GLOBAL_COUNTRY, 10, Gamemode::Osu)
        .await
        .unwrap();
    assert_eq!(
        plays.iter().map(|play| play.rank).collect::<Vec<_>>(),
        vec![1, 2]
    );

    assert_eq!(plays[0].score.score_id, 501);
    assert_eq!(plays[0].user.username, "alpha");
    assert_eq!(plays[0].beatmap.title, "Some Song");
    assert_eq!(plays[0].score.mods.canonical(), "DTHD");

    assert_eq!(plays[1].score.score_id, 503);
    assert_eq!(plays[1].user.username, "beta");
    assert_eq!(plays[1].user.current_rank, 42);

    // The unmatched play must not appear under any rank.
    assert!(plays.iter().all(|play| play.user.user_id != 3));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn empty_best_plays_still_commit_empty_tables() {
    let upstream = FakeUpstream::default();
    upstream.route("/bestplays?mode=", 200, json!([]));

    let path = temp_db("empty-plays");
    let store = TopPlaysStore::open(&path).await.unwrap();
    let osu = osu_client(&upstream);
    let osutrack = OsutrackClient::new(upstream.clone(), Duration::ZERO)
        .with_base_url(OSUTRACK_BASE);

    top_plays::get_top_plays(&osu, &osutrack, &store, 4)
        .await
        .unwrap();

    assert!(store.has_empty_table().await.unwrap());
    for mode in Gamemode::ALL {
        assert!(
            store
                .get_top_plays(GLOBAL_COUNTRY, 10, mode)
                .await
                .unwrap()
                .is_empty()
        );
    }

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn rankings_scrape_backfills_new_entrants() {
    let upstream = FakeUpstream::default();

    // Every page of every mode reports the same single user.
    upstream.route(
        "/rankings/",
        200,
        json!({
            "ranking": [{
                "user": {
                    "id": 7,
                    "username": "climber",
                    "country_code": "CA",
                    "avatar_url": "https://a.test/7",
                },
                "pp": 9_000.5,
                "hit_accuracy": 98.7,
                "play_time": 5_400_000,
                "global_rank": 42,
            }]
        }),
    );

    // The entrant backfill reads index 88 of the 90-day rank history.
    let mut history = vec![70i64; 90];
    history[88] = 45;
    upstream.route(
        "/users/7/",
        200,
        json!({ "id": 7, "rank_history": { "data": history } }),
    );

    let path = temp_db("scrape");
    let store = RankingsStore::open(&path).await.unwrap();
    let osu = osu_client(&upstream);

    scrape_rankings::scrape_rankings(&osu, &store, 16)
        .await
        .unwrap();

    for mode in Gamemode::ALL {
        assert!(
            store
                .user_ids_with_null_yesterday_rank(mode)
                .await
                .unwrap()
                .is_empty()
        );
    }
    assert!(!store.has_empty_table().await.unwrap());

    // The user entered at 42 today, coming from 45 yesterday.
    let top = store
        .top_rank_improvements(GLOBAL_COUNTRY, 1, 100, 10, Gamemode::Osu)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].user.user_id, 7);
    assert_eq!(top[0].user.current_rank, Some(42));
    assert_eq!(top[0].user.yesterday_rank, Some(45));
    assert_eq!(top[0].user.hours_played, 1_500);

    let _ = std::fs::remove_file(&path);
}
