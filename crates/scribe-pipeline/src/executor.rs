use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Utc};
use scribe_core::{
    Category, Execution, ExecutionStatus, Job, JobClaims, Repository, Result, ScribeError, Site,
    TopicStore, TopicStrategy, REJECTION_MESSAGE,
};
use scribe_topics::{site_strategy, TopicService};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::claim::ClaimGuard;
use crate::generator::{ContentGenerator, GenerateRequest};
use crate::prompt::{render_template, PromptVars};
use crate::publisher::{PostDraft, Publisher};

pub const CANCELLED_MESSAGE: &str = "execution cancelled: shutdown";

/// Race `fut` against `cancel`.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ScribeError::Cancelled(CANCELLED_MESSAGE.to_string())),
        res = fut => res,
    }
}

/// Drives one job run through selection, generation, optional validation and
/// publication, persisting the execution after every transition.
pub struct Executor {
    store: Arc<dyn Repository>,
    claims: Arc<dyn JobClaims>,
    topics: TopicService,
    generator: Arc<dyn ContentGenerator>,
    publisher: Arc<dyn Publisher>,
    claim_ttl: Duration,
}

impl Executor {
    pub fn new<R: Repository + 'static>(
        store: Arc<R>,
        generator: Arc<dyn ContentGenerator>,
        publisher: Arc<dyn Publisher>,
        claim_ttl: Duration,
    ) -> Self {
        let topic_store: Arc<dyn TopicStore> = store.clone();
        let claims: Arc<dyn JobClaims> = store.clone();
        Self {
            store,
            claims,
            topics: TopicService::new(topic_store),
            generator,
            publisher,
            claim_ttl,
        }
    }

    /// Run `job` once. Returns the execution in `published` or
    /// `pending_validation`; any failure is recorded on the execution and
    /// returned.
    ///
    /// Fails with `AlreadyExists`, without creating an execution, while
    /// another run of the same job holds its claim.
    #[instrument(skip(self, job, cancel), fields(job_id = %job.id))]
    pub async fn execute(&self, job: &Job, cancel: &CancellationToken) -> Result<Execution> {
        let _claim = ClaimGuard::acquire(self.claims.clone(), &job.id, self.claim_ttl)?;

        let mut exec = Execution::new(&job.id, Utc::now());
        self.store.create_execution(&exec)?;
        info!(execution_id = %exec.id, "execution created");

        match self.run_pipeline(job, &mut exec, cancel).await {
            Ok(()) => Ok(exec),
            Err(e) => {
                self.record_failure(&mut exec, &e);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        job: &Job,
        exec: &mut Execution,
        cancel: &CancellationToken,
    ) -> Result<()> {
        exec.transition(ExecutionStatus::Generating)?;
        exec.started_at = Some(Utc::now());
        self.persist(exec)?;

        let site = self.store.get_site(&job.site_id)?;
        let selected = self.topics.select_for_site(&site.id)?;
        exec.topic_id = Some(selected.site_topic.topic.id.clone());

        let category = self.store.get_category(&job.category_id)?;
        let template = self.store.get_prompt(&job.prompt_id)?;
        let prompt = render_template(
            &template,
            &PromptVars {
                title: &selected.site_topic.topic.title,
                site_name: &site.name,
                category: &category.name,
            },
        )?;

        let request = GenerateRequest {
            provider: job.ai_provider.clone(),
            model: job.ai_model.clone(),
            system: prompt.system,
            user: prompt.user,
        };
        info!(execution_id = %exec.id, generator = self.generator.name(), "generating content");
        let content = cancellable(cancel, self.generator.generate(&request)).await?;
        if content.trim().is_empty() {
            return Err(ScribeError::Generation("generator returned empty text".into()));
        }
        exec.title = Some(selected.article_title());
        exec.content = Some(content);
        exec.generated_at = Some(Utc::now());

        if job.requires_validation {
            exec.transition(ExecutionStatus::PendingValidation)?;
            self.persist(exec)?;
            info!(execution_id = %exec.id, "awaiting validation");
            return Ok(());
        }

        exec.transition(ExecutionStatus::Publishing)?;
        self.persist(exec)?;
        self.publish(&site, &category, exec, cancel).await?;

        if selected.strategy == TopicStrategy::Unique {
            self.mark_topic_used(&site.id, &selected.site_topic.topic.id);
        }
        Ok(())
    }

    /// Resolve a human decision on an execution in `pending_validation`.
    ///
    /// Rejection fails the execution with a fixed message. Approval publishes
    /// it; a publish failure fails the execution and is returned.
    ///
    /// The decision is a conditional write on the execution row alone, so it
    /// never waits on other runs of the same job; of two concurrent decisions
    /// only the first lands and the other gets `InvalidState`.
    #[instrument(skip(self, cancel))]
    pub async fn validate_execution(
        &self,
        execution_id: &str,
        approved: bool,
        cancel: &CancellationToken,
    ) -> Result<Execution> {
        let mut exec = self.store.get_execution(execution_id)?;
        ensure_pending_validation(&exec)?;
        exec.validated_at = Some(Utc::now());

        if !approved {
            exec.fail(REJECTION_MESSAGE);
            self.decide(&exec)?;
            info!(execution_id, "execution rejected");
            return Ok(exec);
        }

        let job = self.store.get_job(&exec.job_id)?;
        exec.transition(ExecutionStatus::Validated)?;
        self.decide(&exec)?;
        info!(execution_id, "execution approved");

        let outcome = async {
            exec.transition(ExecutionStatus::Publishing)?;
            self.persist(&exec)?;
            let site = self.store.get_site(&job.site_id)?;
            let category = self.store.get_category(&job.category_id)?;
            self.publish(&site, &category, &mut exec, cancel).await?;
            Ok::<_, ScribeError>(site)
        }
        .await;

        match outcome {
            Ok(site) => {
                if let Some(topic_id) = exec.topic_id.clone() {
                    self.mark_used_if_unique(&site, &topic_id);
                }
                Ok(exec)
            }
            Err(e) => {
                self.record_failure(&mut exec, &e);
                Err(e)
            }
        }
    }

    /// Verify a site's publishing target is reachable with its credentials.
    pub async fn check_site(&self, site_id: &str, cancel: &CancellationToken) -> Result<Site> {
        let site = self.store.get_site(site_id)?;
        match cancellable(cancel, self.publisher.health_check(&site)).await {
            Ok(()) => {
                info!(site_id, site = %site.name, "site reachable");
                Ok(site)
            }
            Err(e) => {
                warn!(site_id, site = %site.name, error = %e, "site health check failed");
                Err(e)
            }
        }
    }

    /// Executions waiting for a human decision, oldest first.
    pub fn pending_validations(&self) -> Result<Vec<Execution>> {
        self.store.pending_validation()
    }

    /// Runs of a job, newest first.
    pub fn executions_for_job(&self, job_id: &str) -> Result<Vec<Execution>> {
        self.store.executions_for_job(job_id)
    }

    // --- private helpers ---------------------------------------------------

    /// `publishing → published`. The caller has already moved to `publishing`.
    async fn publish(
        &self,
        site: &Site,
        category: &Category,
        exec: &mut Execution,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let category_remote_id = self.remote_category_id(site, category, cancel).await?;
        let draft = PostDraft {
            title: exec.title.clone().unwrap_or_default(),
            content: exec.content.clone().unwrap_or_default(),
            category_remote_id,
        };

        let post = cancellable(cancel, self.publisher.publish(site, &draft)).await?;
        exec.post_id = Some(post.post_id);
        exec.post_url = Some(post.url);
        exec.published_at = Some(Utc::now());
        exec.transition(ExecutionStatus::Published)?;
        self.persist(exec)?;
        info!(
            execution_id = %exec.id,
            post_url = exec.post_url.as_deref().unwrap_or_default(),
            "execution published"
        );
        Ok(())
    }

    /// The category's id on the target, looked up by name when not stored.
    async fn remote_category_id(
        &self,
        site: &Site,
        category: &Category,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        if let Some(id) = category.remote_id {
            return Ok(id);
        }
        let remote = cancellable(cancel, self.publisher.list_categories(site)).await?;
        remote
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(&category.name))
            .map(|c| c.id)
            .ok_or_else(|| {
                ScribeError::Publish(format!(
                    "category {:?} not found on site {}",
                    category.name, site.name
                ))
            })
    }

    fn mark_used_if_unique(&self, site: &Site, topic_id: &str) {
        let strategy = self
            .store
            .site_topics(&site.id)
            .and_then(|topics| site_strategy(&site.id, &topics));
        match strategy {
            Ok(TopicStrategy::Unique) => self.mark_topic_used(&site.id, topic_id),
            Ok(_) => {}
            Err(e) => warn!(site_id = %site.id, error = %e, "could not resolve site strategy"),
        }
    }

    /// Best-effort: the run already succeeded.
    fn mark_topic_used(&self, site_id: &str, topic_id: &str) {
        if let Err(e) = self.topics.mark_used(site_id, topic_id) {
            warn!(site_id, topic_id, error = %e, "failed to mark topic used");
        }
    }

    /// Move an execution out of `pending_validation` unless another decision
    /// already did.
    fn decide(&self, exec: &Execution) -> Result<()> {
        if self
            .store
            .update_execution_from(exec, ExecutionStatus::PendingValidation)?
        {
            return Ok(());
        }
        Err(ScribeError::InvalidState(format!(
            "execution {} was already decided",
            exec.id
        )))
    }

    fn persist(&self, exec: &Execution) -> Result<()> {
        self.store.update_execution(exec)
    }

    fn record_failure(&self, exec: &mut Execution, err: &ScribeError) {
        let message = match err {
            ScribeError::Cancelled(msg) => msg.clone(),
            other => other.to_string(),
        };
        exec.fail(message);
        error!(execution_id = %exec.id, code = err.code(), error = %err, "execution failed");
        if let Err(e) = self.persist(exec) {
            error!(execution_id = %exec.id, error = %e, "failed to persist failed execution");
        }
    }
}

fn ensure_pending_validation(exec: &Execution) -> Result<()> {
    if exec.status != ExecutionStatus::PendingValidation {
        return Err(ScribeError::InvalidState(format!(
            "execution {} is {}, not pending_validation",
            exec.id, exec.status
        )));
    }
    Ok(())
}
