//! Publish target abstraction and implementations
//!
//! Each target is one step of the publish sequence: the Facebook Page photo
//! post, the Page story, and the Instagram photo. The [`Publisher`] runs them
//! in order and never needs to know which concrete platform it is driving.
//!
//! [`Publisher`]: crate::publisher::Publisher

use async_trait::async_trait;

use crate::error::Result;
use crate::types::CandidateItem;

pub mod facebook;
pub mod graph;
pub mod instagram;

// Available for all builds (not just tests) so integration tests can use it
pub mod mock;

/// How a target's failure affects the rest of the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    /// Mandatory step; failure aborts every later target
    Primary,
    /// Failure is recorded and the sequence continues
    BestEffort,
}

/// State shared between the steps of one publish attempt
#[derive(Debug, Clone, Default)]
pub struct PublishContext {
    /// Identifier of the primary post, once it has succeeded
    pub primary_post_id: Option<String>,
    /// Identifier of the photo object behind the primary post, when the
    /// platform reports one separately
    pub primary_object_id: Option<String>,
}

/// One destination in the publish sequence
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Result key for this target (e.g., "facebook", "instagram")
    fn name(&self) -> &str;

    fn role(&self) -> TargetRole {
        TargetRole::BestEffort
    }

    /// Capability gate checked before [`publish`](Self::publish)
    ///
    /// Returning `false` skips the target entirely; it is then recorded as
    /// absent in the result.
    async fn is_available(&self) -> bool {
        true
    }

    /// Publish the item and return the platform-assigned identifier
    ///
    /// Primary targets may fill in `ctx` for the steps that follow.
    async fn publish(&self, item: &CandidateItem, ctx: &mut PublishContext) -> Result<String>;
}
