use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, ACCEPT, CACHE_CONTROL, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::uri;

pub const DEFAULT_BASE_URL: &str = "https://public.api.bsky.app/";

const SEARCH_POSTS_PATH: &str = "/xrpc/app.bsky.feed.searchPosts";
const POST_THREAD_PATH: &str = "/xrpc/app.bsky.feed.getPostThread";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: url::Url,
    rate: RwLock<RateLimit>,
}

#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: f64,
    pub remaining: f64,
    pub reset_at: Option<SystemTime>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("bluesky client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = url::Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            rate: RwLock::new(RateLimit::default()),
        })
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate.read().clone()
    }

    /// Looks up posts by the given author that link to the given page,
    /// most engaged first.
    pub fn search_posts(&self, page_url: &str, author: &str) -> Result<Vec<PostView>> {
        let params = [
            ("q".to_string(), "*".to_string()),
            ("url".to_string(), page_url.to_string()),
            ("author".to_string(), author.to_string()),
            ("sort".to_string(), "top".to_string()),
        ];
        let resp = self.get(SEARCH_POSTS_PATH, &params, false)?;
        let payload: SearchPostsResponse = resp.json().context("bluesky: decode search response")?;
        Ok(payload.posts)
    }

    /// Fetches the reply tree for a post. Accepts either form of post
    /// identifier; web URLs are normalized before the request goes out.
    pub fn get_post_thread(&self, post_uri: &str) -> Result<ThreadNode> {
        let at = uri::at_uri(post_uri);
        let params = [("uri".to_string(), at)];
        let resp = self.get(POST_THREAD_PATH, &params, true)?;
        let payload: PostThreadResponse = resp.json().context("bluesky: decode thread response")?;
        Ok(payload.thread)
    }

    fn get(&self, path: &str, params: &[(String, String)], no_store: bool) -> Result<Response> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let mut req = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json");
        if no_store {
            req = req.header(CACHE_CONTROL, "no-store");
        }

        let resp = req.send()?;
        self.capture_rate(resp.headers());
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            match status.as_u16() {
                400 => Err(anyhow!("bluesky: bad request: {}", body)),
                429 => Err(anyhow!("bluesky: rate limited: {}", body)),
                _ => Err(anyhow!("bluesky: api error {}: {}", status, body)),
            }
        }
    }

    fn capture_rate(&self, headers: &HeaderMap) {
        let limit = header_float(headers, "ratelimit-limit");
        let remaining = header_float(headers, "ratelimit-remaining");
        let reset = header_float(headers, "ratelimit-reset");
        if limit == 0.0 && remaining == 0.0 && reset == 0.0 {
            return;
        }
        // reset is an absolute unix timestamp
        let reset_at = SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs_f64(reset.max(0.0)));
        let mut rate = self.rate.write();
        rate.limit = limit;
        rate.remaining = remaining;
        rate.reset_at = reset_at;
    }
}

fn header_float(headers: &HeaderMap, key: &str) -> f64 {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    #[serde(default)]
    pub cid: String,
    pub author: Author,
    #[serde(default)]
    pub record: serde_json::Value,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub repost_count: i64,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl PostView {
    /// Interprets the open record value as a plain feed post. Returns None
    /// for any other record kind.
    pub fn post_record(&self) -> Option<PostRecord> {
        let record: PostRecord = serde_json::from_value(self.record.clone()).ok()?;
        if record.record_type == uri::FEED_POST_COLLECTION {
            Some(record)
        } else {
            None
        }
    }

    pub fn text(&self) -> Option<String> {
        self.post_record().map(|record| record.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A node in the reply tree. Blocked and deleted posts come back as
/// placeholder variants carrying only the uri.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ThreadNode {
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post(ThreadViewPost),
    #[serde(rename = "app.bsky.feed.defs#notFoundPost")]
    NotFound(NotFoundPost),
    #[serde(rename = "app.bsky.feed.defs#blockedPost")]
    Blocked(BlockedPost),
}

impl ThreadNode {
    pub fn as_post(&self) -> Option<&ThreadViewPost> {
        match self {
            ThreadNode::Post(post) => Some(post),
            _ => None,
        }
    }

    pub fn into_post(self) -> Option<ThreadViewPost> {
        match self {
            ThreadNode::Post(post) => Some(post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadViewPost {
    pub post: PostView,
    #[serde(default)]
    pub replies: Vec<ThreadNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundPost {
    pub uri: String,
    #[serde(default)]
    pub not_found: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedPost {
    pub uri: String,
    #[serde(default)]
    pub blocked: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchPostsResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Debug, Clone, Deserialize)]
struct PostThreadResponse {
    thread: ThreadNode,
}
