//! Cycle driver: load dedup record, select, record, publish
//!
//! A cycle never fails. Every problem inside it resolves to a
//! [`CycleOutcome`] and is logged; only configuration errors at construction
//! time are fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::dedup::{create_store, DedupStore};
use crate::error::Result;
use crate::feed::{select_candidate, FeedSource, RedditFeed, SelectionPolicy};
use crate::publisher::{create_targets, Publisher};
use crate::types::{CandidateItem, PublishResult};

/// How often the inter-cycle sleep checks for shutdown
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Nothing eligible in the feed, or the feed could not be read
    NoCandidate,
    /// The dedup record could not be read or written; nothing was published
    StoreUnavailable { reason: String },
    Published {
        item: CandidateItem,
        result: PublishResult,
    },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            CycleOutcome::Published { result, .. } => result.is_success(),
            _ => false,
        }
    }
}

pub struct Driver {
    feed: Box<dyn FeedSource>,
    store: Box<dyn DedupStore>,
    publisher: Publisher,
    policy: SelectionPolicy,
}

impl Driver {
    /// The selection key always follows the store's key policy
    pub fn new(
        feed: Box<dyn FeedSource>,
        store: Box<dyn DedupStore>,
        publisher: Publisher,
        allowed_extensions: &[String],
        max_scan: usize,
    ) -> Self {
        let policy = SelectionPolicy::new(allowed_extensions, max_scan, store.key_policy());
        Self {
            feed,
            store,
            publisher,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let feed = RedditFeed::from_config(config)?;
        let store = create_store(config)?;
        let publisher = Publisher::new(create_targets(config)?);

        info!(
            "Using {} with targets [{}]",
            store.describe(),
            publisher.target_names().join(", ")
        );

        Ok(Self::new(
            Box::new(feed),
            store,
            publisher,
            &config.settings.feed.allowed_extensions,
            config.settings.feed.max_scan,
        ))
    }

    /// Run one fetch-publish cycle
    pub async fn run_once(&self) -> CycleOutcome {
        let known = match self.store.load().await {
            Ok(known) => known,
            Err(e) => {
                warn!("Dedup record unavailable, skipping cycle: {}", e);
                return CycleOutcome::StoreUnavailable {
                    reason: e.to_string(),
                };
            }
        };
        info!("Dedup record holds {} entries", known.len());

        let Some(item) = select_candidate(self.feed.as_ref(), &known, &self.policy).await else {
            return CycleOutcome::NoCandidate;
        };

        // Recorded before publishing: a crash mid-publish leaves the item spent
        if let Err(e) = self.store.record(item.key(self.policy.key())).await {
            warn!("Could not record '{}', not publishing: {}", item.title, e);
            return CycleOutcome::StoreUnavailable {
                reason: e.to_string(),
            };
        }

        let result = self.publisher.publish(&item).await;
        if result.is_success() {
            info!(
                "Republished '{}' to {} platform(s)",
                item.title,
                result.succeeded().count()
            );
        } else {
            warn!("Failed to republish '{}'", item.title);
        }

        CycleOutcome::Published { item, result }
    }

    /// Run cycles with a fixed sleep between them until `shutdown` is set
    ///
    /// A running cycle always completes; shutdown is only observed between
    /// cycles and during the sleep.
    pub async fn run_loop<F>(&self, interval: Duration, shutdown: Arc<AtomicBool>, mut report: F)
    where
        F: FnMut(&CycleOutcome),
    {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping loop");
                break;
            }

            let outcome = self.run_once().await;
            report(&outcome);

            info!("Waiting {} before next cycle", humantime::format_duration(interval));
            let deadline = Instant::now() + interval;
            while !shutdown.load(Ordering::Relaxed) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                sleep(remaining.min(SHUTDOWN_POLL)).await;
            }
        }
    }
}
