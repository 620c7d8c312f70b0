//! Single-shot HTTP transport used by the API clients.

use std::future::Future;
use std::time::Duration;

use digest_lib::error::DigestResult;
use digest_lib::internal;

/// The User-Agent header sent with every request.
pub const USER_AGENT: &str = "osu-daily-digest";

const TOTAL_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;
const TCP_KEEPALIVE: Duration = Duration::from_secs(120);

/// An HTTP method understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// A GET request.
    Get,
    /// A POST request.
    Post,
    /// Any other verb.
    Custom(&'static str),
}

/// A single request handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The full request URL.
    pub url: String,
    /// The request method.
    pub method: Method,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// An optional request body.
    pub body: Option<String>,
}

/// The outcome of a completed exchange, whatever its status code.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response body.
    pub body: String,
}

/// Single-shot HTTP transport.
///
/// Implementations perform exactly one exchange per call: transport-level
/// failures (DNS, TCP, TLS, timeouts) are the only `Err` case, and any HTTP
/// status comes back as a response. Retrying is the caller's concern.
/// Implementations are cheap to clone; every fan-out worker holds its own
/// handle.
pub trait HttpRequester: Clone + Send + Sync + 'static {
    /// Performs one HTTP exchange.
    fn request(&self, req: HttpRequest) -> impl Future<Output = DigestResult<HttpResponse>> + Send;
}

/// [`HttpRequester`] backed by a [`reqwest::Client`].
///
/// The client enforces the transport policy: 120 s total / 30 s connect
/// timeouts, at most 10 redirects, TCP keepalive, TLS 1.2 or newer with peer
/// and host verification, and a fixed User-Agent.
#[derive(Clone)]
pub struct ReqwestRequester {
    client: reqwest::Client,
}

impl ReqwestRequester {
    /// Builds the transport.
    pub fn new() -> DigestResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TOTAL_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .tcp_keepalive(TCP_KEEPALIVE)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpRequester for ReqwestRequester {
    fn request(&self, req: HttpRequest) -> impl Future<Output = DigestResult<HttpResponse>> + Send {
        let client = self.client.clone();
        async move {
            let method = match req.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Custom(name) => reqwest::Method::from_bytes(name.as_bytes())
                    .map_err(|_| internal!("invalid HTTP method `{name}`"))?,
            };

            let mut builder = client.request(method, &req.url);
            for (name, value) in &req.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = req.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(HttpResponse { status, body })
        }
    }
}
