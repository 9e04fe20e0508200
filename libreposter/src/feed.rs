//! Feed source adapter
//!
//! Fetches a ranked listing from Reddit and picks the first image post that
//! has not been republished yet.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{FeedError, PlatformError, Result};
use crate::types::{CandidateItem, DedupKey};

/// A ranked source of candidate items
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Up to `limit` items, best-ranked first
    async fn fetch_ranked(&self, limit: usize) -> Result<Vec<CandidateItem>>;
}

/// Selection rules applied to a ranked listing
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    allowed_extensions: HashSet<String>,
    max_scan: usize,
    key: DedupKey,
}

impl SelectionPolicy {
    /// Extensions may be given with or without the leading dot, in any case
    pub fn new<I, S>(allowed_extensions: I, max_scan: usize, key: DedupKey) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            max_scan,
            key,
        }
    }

    pub fn max_scan(&self) -> usize {
        self.max_scan
    }

    pub fn key(&self) -> DedupKey {
        self.key
    }

    pub fn allows_extension(&self, item: &CandidateItem) -> bool {
        item.extension()
            .is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// First item, in ranked order, that passes the extension filter and is
    /// not in `known`. At most `max_scan` items are examined.
    pub fn pick<'a>(
        &self,
        items: &'a [CandidateItem],
        known: &HashSet<String>,
    ) -> Option<&'a CandidateItem> {
        items
            .iter()
            .take(self.max_scan)
            .filter(|item| self.allows_extension(item))
            .find(|item| !known.contains(item.key(self.key)))
    }
}

/// Fetch a listing and select one candidate
///
/// Fetch failures are logged and reported as no candidate; they never reach
/// the caller as errors.
pub async fn select_candidate(
    feed: &dyn FeedSource,
    known: &HashSet<String>,
    policy: &SelectionPolicy,
) -> Option<CandidateItem> {
    let items = match feed.fetch_ranked(policy.max_scan()).await {
        Ok(items) => items,
        Err(e) => {
            warn!("Feed fetch failed: {}", e);
            return None;
        }
    };
    debug!("Fetched {} ranked items", items.len());

    match policy.pick(&items, known) {
        Some(item) => {
            info!("Selected '{}' ({})", item.title, item.url);
            Some(item.clone())
        }
        None => {
            info!(
                "No unpublished image among {} scanned items",
                items.len().min(policy.max_scan())
            );
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: ListingPost,
}

#[derive(Debug, Deserialize)]
struct ListingPost {
    url: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Reddit "hot" listing of one subreddit, via application-only OAuth
pub struct RedditFeed {
    http: Client,
    client_id: String,
    client_secret: SecretString,
    subreddit: String,
    auth_base: String,
    api_base: String,
}

impl RedditFeed {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        subreddit: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret,
            subreddit: subreddit.into(),
            auth_base: "https://www.reddit.com".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
        })
    }

    /// Override the token and listing endpoints
    pub fn with_endpoints(mut self, auth_base: &str, api_base: &str) -> Self {
        self.auth_base = auth_base.trim_end_matches('/').to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let feed = &config.settings.feed;
        let secret = config.credentials.reddit_client_secret.expose_secret().to_string();
        Ok(Self::new(
            config.credentials.reddit_client_id.clone(),
            SecretString::from(secret),
            feed.subreddit.clone(),
            &feed.user_agent,
            config.settings.publish.request_timeout()?,
        )?
        .with_endpoints(&feed.auth_base, &feed.api_base))
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| FeedError::Transport(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Authentication(format!("token request returned HTTP {}", status)).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Protocol(format!("token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl FeedSource for RedditFeed {
    async fn fetch_ranked(&self, limit: usize) -> Result<Vec<CandidateItem>> {
        let token = self.access_token().await?;
        let limit = limit.to_string();

        let response = self
            .http
            .get(format!("{}/r/{}/hot", self.api_base, self.subreddit))
            .bearer_auth(token)
            .query(&[("limit", limit.as_str()), ("raw_json", "1")])
            .send()
            .await
            .map_err(|e| FeedError::Transport(format!("listing request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FeedError::Authentication(format!("listing returned HTTP {}", status)).into());
        }
        if !status.is_success() {
            return Err(FeedError::Transport(format!("listing returned HTTP {}", status)).into());
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| FeedError::Protocol(format!("listing body: {}", e)))?;

        Ok(listing
            .data
            .children
            .into_iter()
            .filter_map(|child| match (child.data.url, child.data.title) {
                (Some(url), Some(title)) => Some(CandidateItem { url, title }),
                _ => None,
            })
            .collect())
    }
}
