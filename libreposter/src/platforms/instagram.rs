//! Instagram business account target
//!
//! Instagram publishes in two phases: a media container is created from the
//! image URL, the server processes it asynchronously, and only then can the
//! container be published. The flow is modelled as [`ContainerState`]
//! transitions so the wait between phases is a pluggable [`SettleStrategy`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{PlatformError, Result};
use crate::platforms::graph::{require_str, GraphClient};
use crate::platforms::{PublishContext, PublishTarget};
use crate::types::CandidateItem;

pub const INSTAGRAM: &str = "instagram";

/// Default wait between container creation and publish
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    /// Container accepted by the server
    Created { container_id: String },
    /// Server-side processing is assumed complete
    Settling { container_id: String },
    Published { media_id: String },
    Failed { reason: String },
}

impl ContainerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published { .. } | Self::Failed { .. })
    }
}

/// Waits until a freshly created container can be published
#[async_trait]
pub trait SettleStrategy: Send + Sync {
    async fn settle(&self, container_id: &str) -> Result<()>;
}

/// Unconditional sleep of a fixed duration
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_SETTLE_DELAY)
    }
}

#[async_trait]
impl SettleStrategy for FixedDelay {
    async fn settle(&self, container_id: &str) -> Result<()> {
        debug!("Waiting {:?} for container {} to settle", self.0, container_id);
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

pub struct InstagramTarget {
    graph: Arc<GraphClient>,
    account_id: String,
    settle: Box<dyn SettleStrategy>,
}

impl InstagramTarget {
    pub fn new(graph: Arc<GraphClient>, account_id: impl Into<String>) -> Self {
        Self {
            graph,
            account_id: account_id.into(),
            settle: Box::new(FixedDelay::default()),
        }
    }

    pub fn with_settle_strategy(mut self, settle: Box<dyn SettleStrategy>) -> Self {
        self.settle = settle;
        self
    }

    /// Phase one: create the media container
    pub async fn create_container(&self, item: &CandidateItem) -> ContainerState {
        let result = self
            .graph
            .post_form(
                &format!("{}/media", self.account_id),
                &[("image_url", item.url.as_str()), ("caption", item.title.as_str())],
                "container create",
            )
            .await
            .and_then(|body| require_str(&body, "id", "container create"));

        match result {
            Ok(container_id) => ContainerState::Created { container_id },
            Err(e) => ContainerState::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Move one step towards a terminal state
    pub async fn advance(&self, state: ContainerState) -> ContainerState {
        match state {
            ContainerState::Created { container_id } => {
                match self.settle.settle(&container_id).await {
                    Ok(()) => ContainerState::Settling { container_id },
                    Err(e) => ContainerState::Failed {
                        reason: format!("container {} did not settle: {}", container_id, e),
                    },
                }
            }
            ContainerState::Settling { container_id } => {
                let result = self
                    .graph
                    .post_form(
                        &format!("{}/media_publish", self.account_id),
                        &[("creation_id", container_id.as_str())],
                        "container publish",
                    )
                    .await
                    .and_then(|body| require_str(&body, "id", "container publish"));

                match result {
                    Ok(media_id) => ContainerState::Published { media_id },
                    Err(e) => ContainerState::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            terminal => terminal,
        }
    }
}

#[async_trait]
impl PublishTarget for InstagramTarget {
    fn name(&self) -> &str {
        INSTAGRAM
    }

    async fn publish(&self, item: &CandidateItem, _ctx: &mut PublishContext) -> Result<String> {
        let mut state = self.create_container(item).await;
        while !state.is_terminal() {
            debug!("Instagram container state: {:?}", state);
            state = self.advance(state).await;
        }

        match state {
            ContainerState::Published { media_id } => {
                info!("Published Instagram media {}", media_id);
                Ok(media_id)
            }
            ContainerState::Failed { reason } => {
                warn!("Instagram publish failed: {}", reason);
                Err(PlatformError::Posting(reason).into())
            }
            other => Err(PlatformError::Protocol(format!("container stopped in {:?}", other)).into()),
        }
    }
}
