//! Storage contracts the engine requires. Implementations live outside the core
//! (see `scribe-store` for the SQLite adapter).
//!
//! Every method is a single logical write or read; nothing here spans a whole
//! pipeline run. Method names are prefixed by record kind so one type can
//! implement all traits without ambiguity.

use chrono::{DateTime, Utc};

use crate::catalog::{Category, PromptTemplate, Site};
use crate::error::Result;
use crate::execution::{Execution, ExecutionStatus};
use crate::job::Job;
use crate::topic::{SiteTopic, Topic};

pub trait JobStore: Send + Sync {
    /// Fails with `AlreadyExists` when the id is taken.
    fn create_job(&self, job: &Job) -> Result<()>;
    /// Fails with `NotFound` when the id is unknown.
    fn get_job(&self, id: &str) -> Result<Job>;
    fn update_job(&self, job: &Job) -> Result<()>;
    fn delete_job(&self, id: &str) -> Result<()>;
    fn list_jobs(&self) -> Result<Vec<Job>>;
    /// Active jobs whose `next_run_at <= now`, earliest first.
    fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>>;
    fn active_jobs(&self) -> Result<Vec<Job>>;
}

pub trait ExecutionStore: Send + Sync {
    fn create_execution(&self, execution: &Execution) -> Result<()>;
    fn get_execution(&self, id: &str) -> Result<Execution>;
    fn update_execution(&self, execution: &Execution) -> Result<()>;
    /// Write `execution` only while the stored row is still in `expected`.
    /// Returns `false`, writing nothing, when another writer moved it first.
    fn update_execution_from(&self, execution: &Execution, expected: ExecutionStatus)
        -> Result<bool>;
    /// Newest first.
    fn executions_for_job(&self, job_id: &str) -> Result<Vec<Execution>>;
    /// Executions waiting in `pending_validation`, oldest first.
    fn pending_validation(&self) -> Result<Vec<Execution>>;
}

pub trait TopicStore: Send + Sync {
    fn create_topic(&self, topic: &Topic) -> Result<()>;
    fn get_topic(&self, id: &str) -> Result<Topic>;
    /// Every active topic in the system, in creation order.
    fn active_topics(&self) -> Result<Vec<Topic>>;
    /// Persist a new site-topic association.
    fn associate_topic(&self, site_topic: &SiteTopic) -> Result<()>;
    /// All associations of a site, with their topics joined in.
    fn site_topics(&self, site_id: &str) -> Result<Vec<SiteTopic>>;
    /// Increment the usage count, stamp `used_at` and store the rotation slot
    /// in one write, provided the count is still `expected_usage`.
    /// Returns `false`, writing nothing, when another selection recorded first.
    fn record_usage(
        &self,
        site_topic_id: &str,
        expected_usage: u32,
        used_at: DateTime<Utc>,
        rr_position: u32,
    ) -> Result<bool>;
    /// Flag the topic as used for the site. Idempotent.
    fn mark_used(&self, site_id: &str, topic_id: &str) -> Result<()>;
    fn is_used(&self, site_id: &str, topic_id: &str) -> Result<bool>;
    /// Active topics of the site that were never used, in creation order.
    fn unused_topics(&self, site_id: &str) -> Result<Vec<Topic>>;
}

pub trait CatalogStore: Send + Sync {
    fn create_site(&self, site: &Site) -> Result<()>;
    fn get_site(&self, id: &str) -> Result<Site>;
    fn create_category(&self, category: &Category) -> Result<()>;
    fn get_category(&self, id: &str) -> Result<Category>;
    fn create_prompt(&self, prompt: &PromptTemplate) -> Result<()>;
    fn get_prompt(&self, id: &str) -> Result<PromptTemplate>;
}

/// Per-job advisory lock with expiry.
pub trait JobClaims: Send + Sync {
    /// Take the claim unless another holder owns an unexpired one.
    /// Returns `false` when the job is already claimed.
    fn try_claim(
        &self,
        job_id: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Release the claim if `holder` still owns it.
    fn release_claim(&self, job_id: &str, holder: &str) -> Result<()>;
}

/// Everything the engine needs from persistence, as one object.
pub trait Repository: JobStore + ExecutionStore + TopicStore + CatalogStore + JobClaims {}

impl<T> Repository for T where T: JobStore + ExecutionStore + TopicStore + CatalogStore + JobClaims {}
