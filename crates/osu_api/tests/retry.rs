use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use digest_lib::error::{DigestError, DigestResult};
use digest_lib::gamemode::Gamemode;
use digest_lib::internal;
use osu_api::http::{HttpRequest, HttpRequester, HttpResponse};
use osu_api::osu::OsuClient;
use osu_api::osutrack::OsutrackClient;
use osu_api::token::TokenManager;

/// One scripted exchange: `Ok` is a `(status, body)` response, `Err` is a
/// transport failure.
type Scripted = Result<(u16, &'static str), &'static str>;

/// Transport that plays back a fixed script and records every request.
#[derive(Clone)]
struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn recorded(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpRequester for ScriptedTransport {
    fn request(&self, req: HttpRequest) -> impl Future<Output = DigestResult<HttpResponse>> + Send {
        self.requests.lock().unwrap().push(req.clone());
        let scripted = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request to {}", req.url));
        async move {
            match scripted {
                Ok((status, body)) => Ok(HttpResponse {
                    status,
                    body: body.to_owned(),
                }),
                Err(reason) => Err(internal!("{reason}")),
            }
        }
    }
}

fn osu_client(transport: ScriptedTransport) -> OsuClient<ScriptedTransport> {
    let tokens = Arc::new(
        TokenManager::new(transport.clone(), "client-id", "client-secret")
            .with_token_url("https://osu.test/oauth/token"),
    );
    OsuClient::new(transport, tokens, Duration::ZERO).with_base_url("https://osu.test/api/v2")
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_exponentially() {
    let transport = ScriptedTransport::new([
        Ok((429, "")),
        Ok((429, "")),
        Ok((429, "")),
        Ok((429, "")),
        Ok((429, "")),
        Ok((200, r#"{"ranking":[]}"#)),
    ]);
    let client = osu_client(transport.clone());

    let start = tokio::time::Instant::now();
    let page = client
        .get_rankings(0, Gamemode::Osu)
        .await
        .unwrap()
        .unwrap();
    let elapsed = start.elapsed();

    assert!(page.ranking.is_empty());
    assert_eq!(transport.recorded().len(), 6);
    // 1 + 2 + 4 + 8 + 16 seconds of base delay, plus up to a second of
    // jitter per retry.
    assert!(elapsed >= Duration::from_secs(31), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(37), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn unauthorized_refreshes_the_token_once_and_retries() {
    let transport = ScriptedTransport::new([
        Ok((401, "")),
        Ok((200, r#"{"access_token":"refreshed"}"#)),
        Ok((200, r#"{"ranking":[]}"#)),
    ]);
    let client = osu_client(transport.clone());

    client
        .get_rankings(0, Gamemode::Osu)
        .await
        .unwrap()
        .unwrap();

    let requests = transport.recorded();
    assert_eq!(requests.len(), 3);
    assert!(requests[1].url.ends_with("/oauth/token"));
    let bearer = requests[2]
        .headers
        .iter()
        .find(|(name, _)| name == "Authorization")
        .map(|(_, value)| value.clone())
        .unwrap();
    assert_eq!(bearer, "Bearer refreshed");
}

#[tokio::test(start_paused = true)]
async fn transport_errors_wait_the_fixed_interval() {
    let transport = ScriptedTransport::new([
        Err("connection reset"),
        Err("connection reset"),
        Ok((200, r#"{"ranking":[]}"#)),
    ]);
    let client = osu_client(transport);

    let start = tokio::time::Instant::now();
    client
        .get_rankings(0, Gamemode::Osu)
        .await
        .unwrap()
        .unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(61), "{elapsed:?}");
}

#[tokio::test]
async fn not_found_is_a_non_fatal_none() {
    let transport = ScriptedTransport::new([Ok((404, ""))]);
    let client = osu_client(transport);
    let user = client.get_user(123, Gamemode::Osu).await.unwrap();
    assert!(user.is_none());
}

#[tokio::test]
async fn unhandled_statuses_fail() {
    let transport = ScriptedTransport::new([Ok((418, ""))]);
    let client = osu_client(transport);
    let err = client.get_user(123, Gamemode::Osu).await.unwrap_err();
    assert!(matches!(err, DigestError::UnhandledStatus(418)));
}

#[tokio::test]
async fn page_urls_are_one_indexed_upstream() {
    let transport = ScriptedTransport::new([Ok((200, r#"{"ranking":[]}"#))]);
    let client = osu_client(transport.clone());
    client
        .get_rankings(0, Gamemode::Taiko)
        .await
        .unwrap()
        .unwrap();
    assert!(
        transport.recorded()[0]
            .url
            .ends_with("/rankings/taiko/performance?page=1")
    );
}

#[tokio::test]
#[should_panic(expected = "rankings page cannot be greater")]
async fn out_of_range_pages_are_programmer_errors() {
    let transport = ScriptedTransport::new([]);
    let client = osu_client(transport);
    let _ = client.get_rankings(200, Gamemode::Osu).await;
}

#[tokio::test]
#[should_panic(expected = "cannot request more than")]
async fn oversized_batches_are_programmer_errors() {
    let transport = ScriptedTransport::new([]);
    let client = osu_client(transport);
    let ids: Vec<i64> = (0..51).collect();
    let _ = client.get_users(&ids, Gamemode::Osu).await;
}

#[tokio::test(start_paused = true)]
async fn osutrack_retries_server_errors_but_not_client_errors() {
    let transport = ScriptedTransport::new([
        Ok((503, "")),
        Ok((200, r#"[{"user":1,"beatmap_id":2,"pp":900.1,"score":123456,"score_time":"2023-01-02 03:04:05","rank":"S"}]"#)),
    ]);
    let client =
        OsutrackClient::new(transport, Duration::ZERO).with_base_url("https://osutrack.test");
    let plays = client
        .get_best_plays(Gamemode::Mania, "2023-01-01", "2023-01-02", 100)
        .await
        .unwrap();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].user, 1);
    assert_eq!(plays[0].rank, "S");

    let transport = ScriptedTransport::new([Ok((400, ""))]);
    let client =
        OsutrackClient::new(transport, Duration::ZERO).with_base_url("https://osutrack.test");
    let err = client
        .get_best_plays(Gamemode::Mania, "2023-01-01", "2023-01-02", 100)
        .await
        .unwrap_err();
    assert!(matches!(err, DigestError::UnhandledStatus(400)));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_a_sleeping_retry_loop() {
    let (shutdown, listener) = digest_lib::sync::Shutdown::new();
    // Endless rate limiting keeps the loop sleeping.
    let transport = ScriptedTransport::new(std::iter::repeat_n(Ok((429, "")), 64));
    let client = osu_client(transport).with_shutdown(listener);

    let request = tokio::spawn(async move { client.get_user(123, Gamemode::Osu).await });
    tokio::time::sleep(Duration::from_secs(3)).await;
    shutdown.shutdown();

    let err = request.await.unwrap().unwrap_err();
    assert!(matches!(err, DigestError::Cancelled));
}
