//! `scribe-pipeline` — the execution state machine.
//!
//! ```text
//! pending → generating ─┬─────────────────────────────→ publishing → published
//!                       └→ pending_validation → validated ↗
//!         (any non-terminal state) → failed
//! ```
//!
//! The AI backend and the publishing target are reached only through the
//! [`ContentGenerator`] and [`Publisher`] traits.

pub mod claim;
pub mod executor;
pub mod generator;
pub mod prompt;
pub mod publisher;

pub use claim::ClaimGuard;
pub use executor::{Executor, CANCELLED_MESSAGE};
pub use generator::{ContentGenerator, GenerateRequest};
pub use prompt::{render, render_template, PromptVars, RenderedPrompt};
pub use publisher::{PostDraft, PublishedPost, Publisher, RemoteCategory};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use scribe_core::{
        CatalogStore, Category, ExecutionStatus, ExecutionStore, Job, JobClaims, JobStore,
        PromptTemplate, Result, ScheduleType, ScribeError, Site, SiteTopic, Topic, TopicStore,
        TopicStrategy, REJECTION_MESSAGE,
    };
    use scribe_store::SqliteStore;
    use tokio_util::sync::CancellationToken;

    use super::*;

    // --- fakes -------------------------------------------------------------

    struct StaticGenerator(&'static str);

    #[async_trait]
    impl ContentGenerator for StaticGenerator {
        fn name(&self) -> &str {
            "static"
        }

        async fn generate(&self, req: &GenerateRequest) -> Result<String> {
            assert!(req.user.contains("topic"), "rendered user prompt: {}", req.user);
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ContentGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _req: &GenerateRequest) -> Result<String> {
            Err(ScribeError::Generation("backend unavailable".into()))
        }
    }

    /// Never answers; only cancellation ends the call.
    struct HangingGenerator;

    #[async_trait]
    impl ContentGenerator for HangingGenerator {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(&self, _req: &GenerateRequest) -> Result<String> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        published: AtomicUsize,
        fail: bool,
        unreachable: bool,
        categories: Vec<RemoteCategory>,
        last_draft: Mutex<Option<PostDraft>>,
    }

    impl CountingPublisher {
        fn count(&self) -> usize {
            self.published.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn publish(&self, _site: &Site, post: &PostDraft) -> Result<PublishedPost> {
            if self.fail {
                return Err(ScribeError::Publish("target returned 500".into()));
            }
            let n = self.published.fetch_add(1, Ordering::SeqCst) + 1;
            *self.last_draft.lock().unwrap() = Some(post.clone());
            Ok(PublishedPost {
                post_id: n.to_string(),
                url: format!("https://blog.example/?p={n}"),
            })
        }

        async fn health_check(&self, _site: &Site) -> Result<()> {
            if self.unreachable {
                return Err(ScribeError::Publish("health check failed (401)".into()));
            }
            Ok(())
        }

        async fn list_categories(&self, _site: &Site) -> Result<Vec<RemoteCategory>> {
            Ok(self.categories.clone())
        }
    }

    // --- fixture -----------------------------------------------------------

    struct Fixture {
        store: Arc<SqliteStore>,
        job: Job,
        site_id: String,
    }

    fn fixture(strategy: TopicStrategy, topics: usize, remote_id: Option<i64>) -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let site = Site::new("Rust Weekly", "https://blog.example");
        store.create_site(&site).unwrap();
        let category = Category::new(&site.id, "News", remote_id);
        store.create_category(&category).unwrap();
        let prompt = PromptTemplate::new(
            "default",
            "You write for {site_name} in {category}.",
            "Write an article about {title}.",
        );
        store.create_prompt(&prompt).unwrap();

        let base = Utc::now();
        for i in 0..topics {
            let mut topic = Topic::new(&format!("topic {i}"));
            topic.created_at = base + Duration::seconds(i as i64);
            store.create_topic(&topic).unwrap();
            store
                .associate_topic(&SiteTopic::new(&site.id, topic, strategy))
                .unwrap();
        }

        let mut job = Job::new("daily", &site.id, &category.id, &prompt.id, ScheduleType::Daily);
        job.ai_model = "test-model".into();
        store.create_job(&job).unwrap();
        Fixture {
            store,
            job,
            site_id: site.id,
        }
    }

    fn executor(
        fx: &Fixture,
        generator: Arc<dyn ContentGenerator>,
        publisher: Arc<CountingPublisher>,
    ) -> Executor {
        Executor::new(fx.store.clone(), generator, publisher, Duration::minutes(30))
    }

    fn ok_generator() -> Arc<dyn ContentGenerator> {
        Arc::new(StaticGenerator("Generated body."))
    }

    // --- tests -------------------------------------------------------------

    #[tokio::test]
    async fn publishes_directly_without_validation() {
        let fx = fixture(TopicStrategy::Unique, 2, Some(7));
        let publisher = Arc::new(CountingPublisher::default());
        let ex = executor(&fx, ok_generator(), publisher.clone());

        let exec = ex.execute(&fx.job, &CancellationToken::new()).await.unwrap();

        assert_eq!(exec.status, ExecutionStatus::Published);
        assert_eq!(exec.title.as_deref(), Some("topic 0"));
        assert_eq!(exec.post_id.as_deref(), Some("1"));
        assert!(exec.published_at.is_some());
        assert_eq!(publisher.count(), 1);
        assert_eq!(
            publisher.last_draft.lock().unwrap().as_ref().unwrap().category_remote_id,
            7
        );

        let stored = fx.store.get_execution(&exec.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Published);
        let topic_id = exec.topic_id.unwrap();
        assert!(fx.store.is_used(&fx.site_id, &topic_id).unwrap());
    }

    #[tokio::test]
    async fn validation_pauses_then_publishes_exactly_once() {
        let mut fx = fixture(TopicStrategy::RoundRobin, 1, Some(7));
        fx.job.requires_validation = true;
        fx.store.update_job(&fx.job).unwrap();
        let publisher = Arc::new(CountingPublisher::default());
        let ex = executor(&fx, ok_generator(), publisher.clone());
        let cancel = CancellationToken::new();

        let paused = ex.execute(&fx.job, &cancel).await.unwrap();
        assert_eq!(paused.status, ExecutionStatus::PendingValidation);
        assert!(paused.content.is_some());
        assert_eq!(publisher.count(), 0);
        assert_eq!(ex.pending_validations().unwrap().len(), 1);

        let done = ex.validate_execution(&paused.id, true, &cancel).await.unwrap();
        assert_eq!(done.status, ExecutionStatus::Published);
        assert!(done.validated_at.is_some());
        assert_eq!(publisher.count(), 1);
        assert!(ex.pending_validations().unwrap().is_empty());

        let again = ex.validate_execution(&paused.id, true, &cancel).await.unwrap_err();
        assert!(matches!(again, ScribeError::InvalidState(_)));
        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test]
    async fn rejection_fails_without_publishing() {
        let mut fx = fixture(TopicStrategy::Unique, 1, Some(7));
        fx.job.requires_validation = true;
        let publisher = Arc::new(CountingPublisher::default());
        let ex = executor(&fx, ok_generator(), publisher.clone());
        let cancel = CancellationToken::new();

        let paused = ex.execute(&fx.job, &cancel).await.unwrap();
        let rejected = ex.validate_execution(&paused.id, false, &cancel).await.unwrap();

        assert_eq!(rejected.status, ExecutionStatus::Failed);
        assert_eq!(rejected.error_message.as_deref(), Some(REJECTION_MESSAGE));
        assert!(rejected.validated_at.is_some());
        assert_eq!(publisher.count(), 0);
        let stored = fx.store.get_execution(&paused.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn decisions_do_not_wait_on_a_running_job() {
        let mut fx = fixture(TopicStrategy::RoundRobin, 2, Some(7));
        fx.job.requires_validation = true;
        let publisher = Arc::new(CountingPublisher::default());
        let ex = executor(&fx, ok_generator(), publisher.clone());
        let cancel = CancellationToken::new();

        let first = ex.execute(&fx.job, &cancel).await.unwrap();
        let second = ex.execute(&fx.job, &cancel).await.unwrap();

        // The job's next run is in flight and holds the claim.
        let now = Utc::now();
        assert!(fx
            .store
            .try_claim(&fx.job.id, "next-run", now, now + Duration::minutes(5))
            .unwrap());

        let rejected = ex.validate_execution(&first.id, false, &cancel).await.unwrap();
        assert_eq!(rejected.status, ExecutionStatus::Failed);
        let approved = ex.validate_execution(&second.id, true, &cancel).await.unwrap();
        assert_eq!(approved.status, ExecutionStatus::Published);
        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test]
    async fn concurrent_decisions_land_once() {
        let mut fx = fixture(TopicStrategy::Unique, 1, Some(7));
        fx.job.requires_validation = true;
        let publisher = Arc::new(CountingPublisher::default());
        let ex = executor(&fx, ok_generator(), publisher.clone());
        let cancel = CancellationToken::new();
        let paused = ex.execute(&fx.job, &cancel).await.unwrap();

        let (approve, reject) = tokio::join!(
            ex.validate_execution(&paused.id, true, &cancel),
            ex.validate_execution(&paused.id, false, &cancel),
        );

        assert_eq!(approve.is_ok() as u8 + reject.is_ok() as u8, 1);
        let loser = approve.as_ref().err().or(reject.as_ref().err()).unwrap();
        assert!(matches!(loser, ScribeError::InvalidState(_)));
        let stored = fx.store.get_execution(&paused.id).unwrap();
        if approve.is_ok() {
            assert_eq!(stored.status, ExecutionStatus::Published);
            assert_eq!(publisher.count(), 1);
        } else {
            assert_eq!(stored.error_message.as_deref(), Some(REJECTION_MESSAGE));
            assert_eq!(publisher.count(), 0);
        }
    }

    #[tokio::test]
    async fn validating_unknown_execution_is_not_found() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        let err = ex
            .validate_execution("missing", true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::NotFound { kind: "execution", .. }));
    }

    #[tokio::test]
    async fn validating_published_execution_is_invalid_state() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        let cancel = CancellationToken::new();
        let exec = ex.execute(&fx.job, &cancel).await.unwrap();
        let err = ex.validate_execution(&exec.id, false, &cancel).await.unwrap_err();
        assert!(matches!(err, ScribeError::InvalidState(_)));
        assert_eq!(
            fx.store.get_execution(&exec.id).unwrap().status,
            ExecutionStatus::Published
        );
    }

    #[tokio::test]
    async fn generation_failure_is_recorded() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let ex = executor(&fx, Arc::new(FailingGenerator), Arc::new(CountingPublisher::default()));

        let err = ex.execute(&fx.job, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ScribeError::Generation(_)));

        let runs = ex.executions_for_job(&fx.job.id).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, ExecutionStatus::Failed);
        assert!(runs[0].error_message.as_deref().unwrap().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn exhausted_topics_fail_the_execution() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        let cancel = CancellationToken::new();

        ex.execute(&fx.job, &cancel).await.unwrap();
        let err = ex.execute(&fx.job, &cancel).await.unwrap_err();
        assert!(matches!(err, ScribeError::NoTopicAvailable { .. }));

        let runs = ex.executions_for_job(&fx.job.id).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, ExecutionStatus::Failed);
        assert_eq!(runs[1].status, ExecutionStatus::Published);
    }

    #[tokio::test]
    async fn claimed_job_is_rejected_without_an_execution() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let now = Utc::now();
        assert!(fx
            .store
            .try_claim(&fx.job.id, "other-worker", now, now + Duration::minutes(5))
            .unwrap());
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));

        let err = ex.execute(&fx.job, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ScribeError::AlreadyExists(_)));
        assert!(ex.executions_for_job(&fx.job.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_is_released_after_each_run() {
        let fx = fixture(TopicStrategy::RoundRobin, 2, Some(7));
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        let cancel = CancellationToken::new();
        ex.execute(&fx.job, &cancel).await.unwrap();
        ex.execute(&fx.job, &cancel).await.unwrap();
        assert_eq!(ex.executions_for_job(&fx.job.id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_fails_the_execution() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let ex = executor(&fx, Arc::new(HangingGenerator), Arc::new(CountingPublisher::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ex.execute(&fx.job, &cancel).await.unwrap_err();
        assert!(matches!(err, ScribeError::Cancelled(_)));
        let runs = ex.executions_for_job(&fx.job.id).unwrap();
        assert_eq!(runs[0].status, ExecutionStatus::Failed);
        assert_eq!(runs[0].error_message.as_deref(), Some(CANCELLED_MESSAGE));
    }

    #[tokio::test]
    async fn category_id_is_resolved_by_name() {
        let fx = fixture(TopicStrategy::Unique, 1, None);
        let publisher = Arc::new(CountingPublisher {
            categories: vec![
                RemoteCategory { id: 3, name: "Sports".into() },
                RemoteCategory { id: 42, name: "news".into() },
            ],
            ..Default::default()
        });
        let ex = executor(&fx, ok_generator(), publisher.clone());

        ex.execute(&fx.job, &CancellationToken::new()).await.unwrap();
        let draft = publisher.last_draft.lock().unwrap().clone().unwrap();
        assert_eq!(draft.category_remote_id, 42);
    }

    #[tokio::test]
    async fn unresolvable_category_is_a_publish_error() {
        let fx = fixture(TopicStrategy::Unique, 1, None);
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        let err = ex.execute(&fx.job, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ScribeError::Publish(_)));
    }

    #[tokio::test]
    async fn failed_publish_after_approval_fails_the_execution() {
        let mut fx = fixture(TopicStrategy::Unique, 1, Some(7));
        fx.job.requires_validation = true;
        let publisher = Arc::new(CountingPublisher {
            fail: true,
            ..Default::default()
        });
        let ex = executor(&fx, ok_generator(), publisher);
        let cancel = CancellationToken::new();

        let paused = ex.execute(&fx.job, &cancel).await.unwrap();
        let err = ex.validate_execution(&paused.id, true, &cancel).await.unwrap_err();
        assert!(matches!(err, ScribeError::Publish(_)));
        let stored = fx.store.get_execution(&paused.id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert!(stored.validated_at.is_some());
    }

    #[tokio::test]
    async fn variation_titles_are_numbered() {
        let fx = fixture(TopicStrategy::Variation, 1, Some(7));
        let ex = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        let cancel = CancellationToken::new();
        let first = ex.execute(&fx.job, &cancel).await.unwrap();
        let second = ex.execute(&fx.job, &cancel).await.unwrap();
        assert_eq!(first.title.as_deref(), Some("topic 0 (variation 1)"));
        assert_eq!(second.title.as_deref(), Some("topic 0 (variation 2)"));
    }

    #[tokio::test]
    async fn site_check_reports_reachability() {
        let fx = fixture(TopicStrategy::Unique, 1, Some(7));
        let cancel = CancellationToken::new();

        let ok = executor(&fx, ok_generator(), Arc::new(CountingPublisher::default()));
        assert_eq!(ok.check_site(&fx.site_id, &cancel).await.unwrap().id, fx.site_id);

        let down = executor(
            &fx,
            ok_generator(),
            Arc::new(CountingPublisher {
                unreachable: true,
                ..Default::default()
            }),
        );
        let err = down.check_site(&fx.site_id, &cancel).await.unwrap_err();
        assert!(matches!(err, ScribeError::Publish(_)));

        let err = ok.check_site("missing", &cancel).await.unwrap_err();
        assert!(matches!(err, ScribeError::NotFound { kind: "site", .. }));
    }
}
