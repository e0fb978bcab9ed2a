// Podcast feed resolution
//
// Turns a feed URL into the audio URL of its newest episode. HTTP runs on a
// private tokio current-thread runtime so callers stay synchronous.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::error::{FeedError, FeedResult};

/// A playable episode found in a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    /// URL of the enclosure
    pub url: String,
    /// Episode title, if the feed has one
    pub title: Option<String>,
    /// Declared MIME type of the enclosure
    pub mime_type: Option<String>,
}

/// Resolves a feed URL into something the audio sink can play
pub trait FeedResolver: Send + Sync {
    /// Fetch the first enclosure of the first entry of the feed at `url`
    fn resolve(&self, url: &str) -> FeedResult<AudioSource>;
}

/// Feed fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of attempts before giving up
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// User agent sent with feed requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for downloading the episode audio, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_attempts() -> u32 {
    2
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("reveille/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            attempts: default_attempts(),
            user_agent: default_user_agent(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl FeedError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Unreachable(_) | FeedError::Timeout(_) => true,
            FeedError::HttpStatus(code) => *code >= 500,
            FeedError::Malformed(_)
            | FeedError::NoEntries
            | FeedError::NoEnclosure
            | FeedError::Runtime(_) => false,
        }
    }
}

/// Feed resolver that downloads RSS over HTTP
pub struct HttpFeedResolver {
    client: reqwest::Client,
    runtime: Runtime,
    timeout: Duration,
    attempts: u32,
}

impl HttpFeedResolver {
    /// Create a resolver with its own single-threaded runtime
    pub fn new(config: &FeedConfig) -> FeedResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create tokio runtime for feed fetching");
                FeedError::Runtime(e.to_string())
            })?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            runtime,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            attempts: config.attempts.max(1),
        })
    }
}

impl FeedResolver for HttpFeedResolver {
    fn resolve(&self, url: &str) -> FeedResult<AudioSource> {
        self.runtime
            .block_on(fetch_episode(&self.client, url, self.timeout, self.attempts))
    }
}

/// Fetch the newest episode with retry on transient failures
async fn fetch_episode(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    max_attempts: u32,
) -> FeedResult<AudioSource> {
    let mut attempts = 0;
    let mut backoff = Duration::from_millis(500);

    loop {
        attempts += 1;

        match fetch_episode_attempt(client, url, timeout).await {
            Ok(source) => {
                info!(
                    feed = %url,
                    episode = source.title.as_deref().unwrap_or("untitled"),
                    "Feed resolved"
                );
                return Ok(source);
            }
            Err(e) if attempts < max_attempts && e.is_transient() => {
                warn!(
                    error = %e,
                    feed = %url,
                    attempt = attempts,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Feed fetch failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                warn!(error = %e, feed = %url, attempts = attempts, "Feed fetch failed");
                return Err(e);
            }
        }
    }
}

/// Single attempt to download and parse the feed
async fn fetch_episode_attempt(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> FeedResult<AudioSource> {
    debug!(feed = %url, "Sending feed request");

    let body = tokio::time::timeout(timeout, async {
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, feed = %url, "Feed server returned error status");
            return Err(FeedError::HttpStatus(status.as_u16()));
        }
        Ok::<_, FeedError>(response.bytes().await?)
    })
    .await
    .map_err(|_| FeedError::Timeout(timeout.as_secs()))??;

    first_enclosure(&body)
}

/// Pick the first enclosure of the first item of an RSS document
pub fn first_enclosure(body: &[u8]) -> FeedResult<AudioSource> {
    let channel = rss::Channel::read_from(body)?;

    let item = channel.items().first().ok_or(FeedError::NoEntries)?;
    let enclosure = item.enclosure().ok_or(FeedError::NoEnclosure)?;

    let url = enclosure.url().trim();
    if url.is_empty() {
        return Err(FeedError::NoEnclosure);
    }

    let mime_type = Some(enclosure.mime_type().trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    debug!(
        channel = %channel.title(),
        enclosure = %url,
        "Found episode enclosure"
    );

    Ok(AudioSource {
        url: url.to_string(),
        title: item.title().map(str::to_string),
        mime_type,
    })
}
