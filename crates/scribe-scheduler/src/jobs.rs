use std::sync::Arc;

use chrono::Utc;
use scribe_core::{Job, JobStatus, JobStore, Result, ScribeError};
use tracing::info;

use crate::schedule::calculate_next_run;

/// Job management with schedule validation. Every write goes through
/// [`Job::validate`] and keeps `next_run_at` consistent with the schedule.
pub struct JobService {
    store: Arc<dyn JobStore>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Validate and persist a new job with its first `next_run_at`.
    pub fn create(&self, mut job: Job) -> Result<Job> {
        job.validate()?;
        let now = Utc::now();
        job.created_at = now;
        job.updated_at = now;
        job.next_run_at = match job.status {
            JobStatus::Active => calculate_next_run(&job, now)?,
            _ => None,
        };
        self.store.create_job(&job)?;
        info!(job_id = %job.id, name = %job.name, schedule = %job.schedule_type, next_run_at = ?job.next_run_at, "job created");
        Ok(job)
    }

    /// Validate and persist changes. A changed schedule recomputes the next run.
    pub fn update(&self, mut job: Job) -> Result<Job> {
        job.validate()?;
        let existing = self.store.get_job(&job.id)?;
        let now = Utc::now();

        if job.schedule_changed(&existing) {
            job.next_run_at = calculate_next_run(&job, now)?;
        }
        job.created_at = existing.created_at;
        job.updated_at = now;
        self.store.update_job(&job)?;
        info!(job_id = %job.id, next_run_at = ?job.next_run_at, "job updated");
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Result<Job> {
        self.store.get_job(id)
    }

    pub fn list(&self) -> Result<Vec<Job>> {
        self.store.list_jobs()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_job(id)?;
        info!(job_id = %id, "job deleted");
        Ok(())
    }

    /// Stop polling a job. Its schedule is kept.
    pub fn pause(&self, id: &str) -> Result<Job> {
        let mut job = self.store.get_job(id)?;
        if job.status != JobStatus::Active {
            return Err(ScribeError::InvalidState(format!(
                "job {id} is {}, only active jobs can be paused",
                job.status
            )));
        }
        job.status = JobStatus::Paused;
        job.updated_at = Utc::now();
        self.store.update_job(&job)?;
        info!(job_id = %id, "job paused");
        Ok(job)
    }

    /// Reactivate a paused or errored job from now on; runs missed while
    /// paused are not replayed.
    pub fn resume(&self, id: &str) -> Result<Job> {
        let mut job = self.store.get_job(id)?;
        if !matches!(job.status, JobStatus::Paused | JobStatus::Error) {
            return Err(ScribeError::InvalidState(format!(
                "job {id} is {}, only paused or errored jobs can be resumed",
                job.status
            )));
        }
        job.validate()?;
        let now = Utc::now();
        job.status = JobStatus::Active;
        job.next_run_at = calculate_next_run(&job, now)?;
        job.updated_at = now;
        self.store.update_job(&job)?;
        info!(job_id = %id, next_run_at = ?job.next_run_at, "job resumed");
        Ok(job)
    }
}
