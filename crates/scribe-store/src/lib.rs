//! `scribe-store` — SQLite adapter for the storage contracts in `scribe_core::store`.
//!
//! All timestamps are stored as fixed-width RFC 3339 UTC strings so the due-job
//! query can compare them as text.

pub mod db;
pub mod error;
mod catalog;
mod claims;
mod executions;
mod jobs;
mod store;
mod topics;

pub use error::StoreError;
pub use store::SqliteStore;

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use scribe_core::{
        CatalogStore, Category, Execution, ExecutionStatus, ExecutionStore, Job, JobClaims,
        JobStatus, JobStore, ScheduleType, ScribeError, Site, SiteTopic, Topic, TopicStore,
        TopicStrategy,
    };

    use super::SqliteStore;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("in-memory store")
    }

    #[test]
    fn job_roundtrip_preserves_schedule() {
        let s = store();
        let mut job = Job::new("digest", "site", "cat", "prompt", ScheduleType::Weekly);
        job.schedule_day = Some(3);
        job.schedule_time = Some("08:15".into());
        job.jitter_enabled = true;
        job.jitter_minutes = 10;
        job.next_run_at = Some(Utc::now());
        s.create_job(&job).unwrap();

        let back = s.get_job(&job.id).unwrap();
        assert_eq!(back.schedule_type, ScheduleType::Weekly);
        assert_eq!(back.schedule_day, Some(3));
        assert_eq!(back.schedule_time.as_deref(), Some("08:15"));
        assert!(back.jitter_enabled);
        assert_eq!(back.status, JobStatus::Active);
        assert!(back.next_run_at.is_some());
    }

    #[test]
    fn duplicate_job_is_already_exists() {
        let s = store();
        let job = Job::new("digest", "site", "cat", "prompt", ScheduleType::Daily);
        s.create_job(&job).unwrap();
        assert!(matches!(s.create_job(&job), Err(ScribeError::AlreadyExists(_))));
    }

    #[test]
    fn missing_job_is_not_found() {
        let s = store();
        assert!(matches!(s.get_job("nope"), Err(ScribeError::NotFound { kind: "job", .. })));
        assert!(matches!(s.delete_job("nope"), Err(ScribeError::NotFound { .. })));
    }

    #[test]
    fn due_jobs_only_returns_active_past_jobs() {
        let s = store();
        let now = Utc::now();

        let mut due = Job::new("due", "site", "cat", "prompt", ScheduleType::Daily);
        due.next_run_at = Some(now - Duration::minutes(1));
        let mut future = Job::new("future", "site", "cat", "prompt", ScheduleType::Daily);
        future.next_run_at = Some(now + Duration::minutes(1));
        let mut paused = Job::new("paused", "site", "cat", "prompt", ScheduleType::Daily);
        paused.next_run_at = Some(now - Duration::minutes(1));
        paused.status = JobStatus::Paused;
        let manual = Job::new("manual", "site", "cat", "prompt", ScheduleType::Manual);

        for j in [&due, &future, &paused, &manual] {
            s.create_job(j).unwrap();
        }

        let ids: Vec<_> = s.due_jobs(now).unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![due.id.clone()]);
        assert_eq!(s.active_jobs().unwrap().len(), 3);
    }

    #[test]
    fn pending_validation_lists_only_paused_runs() {
        let s = store();
        let mut waiting = Execution::new("job", Utc::now());
        waiting.status = ExecutionStatus::PendingValidation;
        let done = Execution::new("job", Utc::now());
        s.create_execution(&waiting).unwrap();
        s.create_execution(&done).unwrap();

        let pending = s.pending_validation().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, waiting.id);
        assert_eq!(s.executions_for_job("job").unwrap().len(), 2);
    }

    #[test]
    fn usage_is_tracked_per_site() {
        let s = store();
        let topic = Topic::new("Rust ownership");
        s.create_topic(&topic).unwrap();
        let a = SiteTopic::new("site-a", topic.clone(), TopicStrategy::Unique);
        let b = SiteTopic::new("site-b", topic.clone(), TopicStrategy::Unique);
        s.associate_topic(&a).unwrap();
        s.associate_topic(&b).unwrap();

        s.mark_used("site-a", &topic.id).unwrap();
        s.mark_used("site-a", &topic.id).unwrap();

        assert!(s.is_used("site-a", &topic.id).unwrap());
        assert!(!s.is_used("site-b", &topic.id).unwrap());
        assert!(s.unused_topics("site-a").unwrap().is_empty());
        assert_eq!(s.unused_topics("site-b").unwrap().len(), 1);
        assert_eq!(s.site_topics("site-a").unwrap()[0].usage_count, 1);
    }

    #[test]
    fn record_usage_increments_and_stores_position() {
        let s = store();
        let topic = Topic::new("Async traits");
        s.create_topic(&topic).unwrap();
        let st = SiteTopic::new("site", topic, TopicStrategy::RoundRobin);
        s.associate_topic(&st).unwrap();
        let id = st.id.clone().unwrap();

        assert!(s.record_usage(&id, 0, Utc::now(), 1).unwrap());
        assert!(s.record_usage(&id, 1, Utc::now(), 2).unwrap());

        let back = &s.site_topics("site").unwrap()[0];
        assert_eq!(back.usage_count, 2);
        assert_eq!(back.rr_position, 2);
        assert!(back.last_used_at.is_some());
    }

    #[test]
    fn record_usage_refuses_a_stale_count() {
        let s = store();
        let topic = Topic::new("Pinning");
        s.create_topic(&topic).unwrap();
        let st = SiteTopic::new("site", topic, TopicStrategy::Unique);
        s.associate_topic(&st).unwrap();
        let id = st.id.clone().unwrap();

        assert!(s.record_usage(&id, 0, Utc::now(), 1).unwrap());
        // A second selector that read the row before the first write.
        assert!(!s.record_usage(&id, 0, Utc::now(), 1).unwrap());
        assert_eq!(s.site_topics("site").unwrap()[0].usage_count, 1);
        assert!(matches!(
            s.record_usage("missing", 0, Utc::now(), 1),
            Err(ScribeError::NotFound { .. })
        ));
    }

    #[test]
    fn conditional_execution_update_only_from_expected_status() {
        let s = store();
        let mut exec = Execution::new("job", Utc::now());
        exec.status = ExecutionStatus::PendingValidation;
        s.create_execution(&exec).unwrap();

        let mut rejected = exec.clone();
        rejected.fail("rejected");
        assert!(s
            .update_execution_from(&rejected, ExecutionStatus::PendingValidation)
            .unwrap());

        let mut approved = exec.clone();
        approved.status = ExecutionStatus::Validated;
        assert!(!s
            .update_execution_from(&approved, ExecutionStatus::PendingValidation)
            .unwrap());
        assert_eq!(s.get_execution(&exec.id).unwrap().status, ExecutionStatus::Failed);

        let ghost = Execution::new("job", Utc::now());
        assert!(matches!(
            s.update_execution_from(&ghost, ExecutionStatus::Pending),
            Err(ScribeError::NotFound { .. })
        ));
    }

    #[test]
    fn transient_association_is_refused() {
        let s = store();
        let st = SiteTopic::transient("site", Topic::new("x"), TopicStrategy::RandomAll);
        assert!(matches!(s.associate_topic(&st), Err(ScribeError::Validation(_))));
    }

    #[test]
    fn claims_exclude_until_expiry_or_release() {
        let s = store();
        let now = Utc::now();
        let ttl = Duration::minutes(5);

        assert!(s.try_claim("job", "a", now, now + ttl).unwrap());
        assert!(!s.try_claim("job", "b", now, now + ttl).unwrap());
        // After expiry another holder may take over.
        let later = now + ttl + Duration::seconds(1);
        assert!(s.try_claim("job", "b", later, later + ttl).unwrap());
        // Stale holder cannot release someone else's claim.
        s.release_claim("job", "a").unwrap();
        assert!(!s.try_claim("job", "c", later, later + ttl).unwrap());
        s.release_claim("job", "b").unwrap();
        assert!(s.try_claim("job", "c", later, later + ttl).unwrap());
    }

    #[test]
    fn catalog_roundtrip() {
        let s = store();
        let site = Site::new("Blog", "https://blog.example/");
        s.create_site(&site).unwrap();
        let cat = Category::new(&site.id, "News", Some(12));
        s.create_category(&cat).unwrap();

        assert_eq!(s.get_site(&site.id).unwrap().url, "https://blog.example");
        assert_eq!(s.get_category(&cat.id).unwrap().remote_id, Some(12));
        assert!(matches!(s.get_prompt("missing"), Err(ScribeError::NotFound { .. })));
    }
}
