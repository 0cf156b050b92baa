use async_trait::async_trait;
use scribe_core::{Result, Site};
use serde::{Deserialize, Serialize};

/// Article handed to the publishing target.
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    /// Category id on the publishing target.
    pub category_remote_id: i64,
}

/// Reference to the post the target created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedPost {
    pub post_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCategory {
    pub id: i64,
    pub name: String,
}

/// Client for a publishing target. Failures are `ScribeError::Publish`.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, site: &Site, post: &PostDraft) -> Result<PublishedPost>;

    /// Verify the target is reachable and the credentials are accepted.
    async fn health_check(&self, site: &Site) -> Result<()>;

    async fn list_categories(&self, site: &Site) -> Result<Vec<RemoteCategory>>;
}
