//! Reposter - republish trending feed images to social platforms
//!
//! Picks an image post from a ranked feed that has not been shared yet and
//! publishes it to a Facebook Page (feed and story) and an Instagram account.

pub mod config;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod feed;
pub mod logging;
pub mod platforms;
pub mod publisher;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use dedup::DedupStore;
pub use driver::{CycleOutcome, Driver};
pub use error::{RepostError, Result};
pub use publisher::Publisher;
pub use types::{CandidateItem, DedupKey, PublishResult};
