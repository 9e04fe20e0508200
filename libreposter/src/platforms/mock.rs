//! Mock publish target for testing
//!
//! A configurable target that can simulate successes, failures, unavailable
//! capabilities. Used by integration tests to exercise the
//! publish sequencing without network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::{PublishContext, PublishTarget, TargetRole};
use crate::types::CandidateItem;

/// Configuration for mock target behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Result key (e.g., "mock-facebook")
    pub name: String,

    pub role: TargetRole,

    /// Value returned by the capability gate
    pub available: bool,

    /// Whether publishing should succeed
    pub publish_succeeds: bool,

    /// Error to return on publish failure
    pub publish_error: Option<String>,

    /// Number of times the capability gate was checked
    pub availability_checks: Arc<Mutex<usize>>,

    /// Number of times publish was called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Items that were published (for verification)
    pub published: Arc<Mutex<Vec<CandidateItem>>>,

    /// Primary post id seen in the context on each publish call
    pub seen_primary_ids: Arc<Mutex<Vec<Option<String>>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            role: TargetRole::BestEffort,
            available: true,
            publish_succeeds: true,
            publish_error: None,
            availability_checks: Arc::new(Mutex::new(0)),
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
            seen_primary_ids: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock target for testing
///
/// Cloning shares the counters, so a test can keep a handle after moving the
/// target into a publisher.
#[derive(Debug, Clone)]
pub struct MockTarget {
    config: MockConfig,
}

impl MockTarget {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A best-effort target that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A primary target that always succeeds
    pub fn primary(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            role: TargetRole::Primary,
            ..Default::default()
        })
    }

    /// A target whose publish call fails
    pub fn failure(name: &str, role: TargetRole, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            role,
            publish_succeeds: false,
            publish_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// A target whose capability gate says no
    pub fn unavailable(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            available: false,
            ..Default::default()
        })
    }

    pub fn availability_checks(&self) -> usize {
        *self.config.availability_checks.lock().unwrap()
    }

    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    pub fn published(&self) -> Vec<CandidateItem> {
        self.config.published.lock().unwrap().clone()
    }

    pub fn seen_primary_ids(&self) -> Vec<Option<String>> {
        self.config.seen_primary_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishTarget for MockTarget {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn role(&self) -> TargetRole {
        self.config.role
    }

    async fn is_available(&self) -> bool {
        *self.config.availability_checks.lock().unwrap() += 1;
        self.config.available
    }

    async fn publish(&self, item: &CandidateItem, ctx: &mut PublishContext) -> Result<String> {
        *self.config.publish_call_count.lock().unwrap() += 1;
        self.config
            .seen_primary_ids
            .lock()
            .unwrap()
            .push(ctx.primary_post_id.clone());

        if !self.config.publish_succeeds {
            let error_msg = self
                .config
                .publish_error
                .clone()
                .unwrap_or_else(|| "Mock publish failed".to_string());
            return Err(PlatformError::Posting(error_msg).into());
        }

        self.config.published.lock().unwrap().push(item.clone());

        let post_id = format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4());
        if self.config.role == TargetRole::Primary {
            ctx.primary_post_id = Some(post_id.clone());
        }
        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CandidateItem {
        CandidateItem::new("https://i.example/a.png", "A")
    }

    #[tokio::test]
    async fn test_mock_success() {
        let target = MockTarget::success("test");
        let mut ctx = PublishContext::default();

        assert_eq!(target.name(), "test");
        assert_eq!(target.role(), TargetRole::BestEffort);
        assert!(target.is_available().await);

        let id = target.publish(&item(), &mut ctx).await.unwrap();
        assert!(id.starts_with("test:mock-"));
        assert_eq!(target.publish_call_count(), 1);
        assert_eq!(target.published(), vec![item()]);
        assert!(ctx.primary_post_id.is_none());
    }

    #[tokio::test]
    async fn test_mock_primary_fills_context() {
        let target = MockTarget::primary("fb");
        let mut ctx = PublishContext::default();

        let id = target.publish(&item(), &mut ctx).await.unwrap();
        assert_eq!(ctx.primary_post_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let target = MockTarget::failure("test", TargetRole::BestEffort, "Network error");
        let err = target
            .publish(&item(), &mut PublishContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Network error"));
        assert!(target.published().is_empty());
    }

    #[tokio::test]
    async fn test_mock_clone_shares_counters() {
        let target = MockTarget::unavailable("story");
        let handle = target.clone();

        assert!(!target.is_available().await);
        assert_eq!(handle.availability_checks(), 1);
    }
}
