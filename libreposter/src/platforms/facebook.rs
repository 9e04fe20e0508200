//! Facebook Page targets
//!
//! Provides the primary photo post, the best-effort story step, and the feed
//! history query used by the remote dedup store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PlatformError, Result};
use crate::platforms::graph::{require_str, GraphClient};
use crate::platforms::{PublishContext, PublishTarget, TargetRole};
use crate::types::CandidateItem;

pub const FACEBOOK: &str = "facebook";
pub const FACEBOOK_STORY: &str = "facebook_story";

/// Grants the story step needs before it is attempted
pub const STORY_PERMISSIONS: &[&str] = &[
    "pages_show_list",
    "pages_read_engagement",
    "pages_manage_posts",
    "business_management",
];

/// Handle on one Facebook Page
#[derive(Clone)]
pub struct FacebookPage {
    graph: Arc<GraphClient>,
    page_id: String,
}

impl FacebookPage {
    pub fn new(graph: Arc<GraphClient>, page_id: impl Into<String>) -> Self {
        Self {
            graph,
            page_id: page_id.into(),
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Captions of the `limit` most recent feed posts
    ///
    /// Posts without a message are skipped.
    pub async fn recent_captions(&self, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let body = self
            .graph
            .get(
                &format!("{}/feed", self.page_id),
                &[("fields", "message"), ("limit", limit.as_str())],
                "feed history",
            )
            .await?;

        let entries = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| PlatformError::Protocol("feed history response has no 'data' array".to_string()))?;

        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("message").and_then(Value::as_str))
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Permissions currently granted to the access token
    pub async fn granted_permissions(&self) -> Result<HashSet<String>> {
        let body = self.graph.get("me/permissions", &[], "permission check").await?;

        let entries = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| PlatformError::Protocol("permission response has no 'data' array".to_string()))?;

        Ok(entries
            .iter()
            .filter(|entry| entry.get("status").and_then(Value::as_str) == Some("granted"))
            .filter_map(|entry| entry.get("permission").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }
}

/// Primary step: a photo post on the Page feed
pub struct FacebookPhotoTarget {
    page: FacebookPage,
    schedule_delay: Option<Duration>,
}

impl FacebookPhotoTarget {
    pub fn new(page: FacebookPage) -> Self {
        Self {
            page,
            schedule_delay: None,
        }
    }

    /// Post unpublished, scheduled `delay` from now
    pub fn with_schedule_delay(mut self, delay: Option<Duration>) -> Self {
        self.schedule_delay = delay;
        self
    }
}

#[async_trait]
impl PublishTarget for FacebookPhotoTarget {
    fn name(&self) -> &str {
        FACEBOOK
    }

    fn role(&self) -> TargetRole {
        TargetRole::Primary
    }

    async fn publish(&self, item: &CandidateItem, ctx: &mut PublishContext) -> Result<String> {
        let scheduled_at = self
            .schedule_delay
            .map(|delay| (chrono::Utc::now().timestamp() + delay.as_secs() as i64).to_string());

        let mut fields = vec![
            ("caption", item.title.as_str()),
            ("url", item.url.as_str()),
        ];
        match scheduled_at.as_deref() {
            Some(at) => {
                fields.push(("published", "false"));
                fields.push(("scheduled_publish_time", at));
            }
            None => fields.push(("published", "true")),
        }

        let body = self
            .page
            .graph
            .post_form(&format!("{}/photos", self.page.page_id), &fields, "photo post")
            .await?;

        let photo_id = require_str(&body, "id", "photo post")?;
        let post_id = require_str(&body, "post_id", "photo post").unwrap_or_else(|_| photo_id.clone());

        if let Some(at) = scheduled_at {
            info!("Scheduled Facebook post {} for unix time {}", post_id, at);
        }

        ctx.primary_post_id = Some(post_id.clone());
        ctx.primary_object_id = Some(photo_id);
        Ok(post_id)
    }
}

/// Best-effort step: a story on the Page
///
/// Tries a direct photo story first, then falls back to resharing the primary
/// post into the story surface.
pub struct FacebookStoryTarget {
    page: FacebookPage,
    required_permissions: Vec<String>,
}

impl FacebookStoryTarget {
    pub fn new(page: FacebookPage) -> Self {
        Self {
            page,
            required_permissions: STORY_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
        }
    }

    async fn publish_direct(&self, item: &CandidateItem) -> Result<String> {
        let body = self
            .page
            .graph
            .post_form(
                &format!("{}/stories", self.page.page_id),
                &[("url", item.url.as_str()), ("caption", item.title.as_str())],
                "story publish",
            )
            .await?;
        require_str(&body, "id", "story publish")
    }

    async fn share_primary(&self, object_id: &str) -> Result<String> {
        let body = self
            .page
            .graph
            .post_form(
                &format!("{}/stories", self.page.page_id),
                &[("object_id", object_id)],
                "story share",
            )
            .await?;
        require_str(&body, "id", "story share")
    }
}

#[async_trait]
impl PublishTarget for FacebookStoryTarget {
    fn name(&self) -> &str {
        FACEBOOK_STORY
    }

    async fn is_available(&self) -> bool {
        let granted = match self.page.granted_permissions().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Could not check story permissions: {}", e);
                return false;
            }
        };

        let missing: Vec<&str> = self
            .required_permissions
            .iter()
            .filter(|p| !granted.contains(p.as_str()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            true
        } else {
            info!("Skipping story, missing permissions: {}", missing.join(", "));
            false
        }
    }

    async fn publish(&self, item: &CandidateItem, ctx: &mut PublishContext) -> Result<String> {
        let direct_error = match self.publish_direct(item).await {
            Ok(id) => return Ok(id),
            Err(e) => e,
        };
        warn!("Direct story publish failed: {}", direct_error);

        let object_id = ctx
            .primary_object_id
            .as_deref()
            .or(ctx.primary_post_id.as_deref())
            .ok_or_else(|| {
                PlatformError::Unavailable("no primary post to share into the story".to_string())
            })?;

        debug!("Falling back to sharing {} as a story", object_id);
        self.share_primary(object_id).await
    }
}
