//! Multi-platform publish sequencing
//!
//! Runs the configured targets strictly in order. A failing primary target
//! aborts the sequence; best-effort targets record their failure and the
//! sequence moves on. Nothing is rolled back: every successful step is a live
//! post.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::platforms::facebook::{FacebookPage, FacebookPhotoTarget, FacebookStoryTarget};
use crate::platforms::graph::GraphClient;
use crate::platforms::instagram::{FixedDelay, InstagramTarget};
use crate::platforms::{PublishContext, PublishTarget, TargetRole};
use crate::types::{CandidateItem, PublishResult};

pub struct Publisher {
    targets: Vec<Box<dyn PublishTarget>>,
}

impl Publisher {
    pub fn new(targets: Vec<Box<dyn PublishTarget>>) -> Self {
        Self { targets }
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    /// Publish one item to every target
    ///
    /// Never fails: each step's error is logged and recorded as an absent id.
    /// Targets after a failed primary get no entry at all.
    pub async fn publish(&self, item: &CandidateItem) -> PublishResult {
        let mut result = PublishResult::new();
        let mut ctx = PublishContext::default();

        for target in &self.targets {
            let name = target.name().to_string();

            if !target.is_available().await {
                info!("{}: capability check failed, skipping", name);
                result.push(name, None);
                if target.role() == TargetRole::Primary {
                    break;
                }
                continue;
            }

            info!("Publishing '{}' to {}", item.title, name);
            match target.publish(item, &mut ctx).await {
                Ok(id) => {
                    info!("{}: published as {}", name, id);
                    result.push(name, Some(id));
                }
                Err(e) => {
                    warn!("{}: publish failed: {}", name, e);
                    result.push(name, None);
                    if target.role() == TargetRole::Primary {
                        warn!("Primary target {} failed, skipping remaining targets", target.name());
                        break;
                    }
                }
            }
        }

        result
    }
}

/// Build the target sequence from configuration
///
/// The order is fixed: Page photo, then Page story, then Instagram.
pub fn create_targets(config: &Config) -> Result<Vec<Box<dyn PublishTarget>>> {
    let publish = &config.settings.publish;
    let graph = Arc::new(GraphClient::from_config(config)?);
    let page = FacebookPage::new(graph.clone(), config.credentials.fb_page_id.clone());

    let mut targets: Vec<Box<dyn PublishTarget>> = vec![Box::new(
        FacebookPhotoTarget::new(page.clone()).with_schedule_delay(publish.schedule_delay()?),
    )];

    if publish.story {
        targets.push(Box::new(FacebookStoryTarget::new(page)));
    }

    if publish.instagram {
        let account_id = config
            .credentials
            .ig_account_id
            .clone()
            .ok_or_else(|| ConfigError::MissingEnv(crate::config::ENV_IG_ACCOUNT_ID.to_string()))?;
        targets.push(Box::new(
            InstagramTarget::new(graph, account_id)
                .with_settle_strategy(Box::new(FixedDelay(publish.settle_delay()?))),
        ));
    }

    Ok(targets)
}
