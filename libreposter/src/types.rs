//! Core types for Reposter

use serde::{Deserialize, Serialize};

/// One feed entry selected for republication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub url: String,
    pub title: String,
}

impl CandidateItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }

    /// The identifying key of this item under the given policy
    pub fn key(&self, policy: DedupKey) -> &str {
        match policy {
            DedupKey::Title => &self.title,
            DedupKey::Url => &self.url,
        }
    }

    /// Lowercased extension of the URL path, without the leading dot
    ///
    /// Query strings and fragments are ignored, so
    /// `https://i.example/a.PNG?width=640` yields `png`.
    pub fn extension(&self) -> Option<String> {
        let path = match reqwest::Url::parse(&self.url) {
            Ok(url) => url.path().to_string(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let file_name = path.rsplit('/').next()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Which field of a candidate identifies it in the dedup record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupKey {
    Title,
    Url,
}

/// Outcome of one platform step within a publish attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// Platform name (e.g., "facebook", "facebook_story", "instagram")
    pub platform: String,
    /// Platform-assigned identifier, absent when the step did not succeed
    pub id: Option<String>,
}

/// Result of publishing one candidate
///
/// Holds one entry per attempted platform, in attempt order. A platform that
/// was never attempted has no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub outcomes: Vec<PublishOutcome>,
}

impl PublishResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, platform: impl Into<String>, id: Option<String>) {
        self.outcomes.push(PublishOutcome {
            platform: platform.into(),
            id,
        });
    }

    /// Look up a platform entry
    ///
    /// Returns `None` if the platform was not attempted, `Some(None)` if it
    /// was attempted and failed.
    pub fn get(&self, platform: &str) -> Option<Option<&str>> {
        self.outcomes
            .iter()
            .find(|o| o.platform == platform)
            .map(|o| o.id.as_deref())
    }

    pub fn contains(&self, platform: &str) -> bool {
        self.get(platform).is_some()
    }

    /// The first entry is the primary post; the attempt succeeded iff it did
    pub fn is_success(&self) -> bool {
        self.outcomes.first().is_some_and(|o| o.id.is_some())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.outcomes.iter().filter(|o| o.id.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}
