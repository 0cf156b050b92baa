use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use scribe_core::config::SchedulerConfig;
use scribe_core::random::uniform_inclusive;
use scribe_core::{Execution, Job, JobStatus, Repository, Result, ScheduleType, ScribeError};
use scribe_pipeline::Executor;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::schedule::calculate_next_run;

/// Where the scheduler is in its start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    Stopping,
}

/// Outcome of [`Scheduler::restore_state`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs whose next run had passed and were respread.
    pub missed: usize,
    /// Jobs that had no next run and got a fresh one.
    pub initialised: usize,
    /// `once` jobs found already run, now marked completed.
    pub completed: usize,
    /// Jobs whose update could not be computed or persisted.
    pub failed: usize,
}

/// State shared between the scheduler handle, its polling loop and every
/// dispatch task.
struct Shared {
    store: Arc<dyn Repository>,
    executor: Arc<Executor>,
    config: SchedulerConfig,
}

/// Handles owned while the loop runs.
struct Running {
    cancel: CancellationToken,
    tracker: TaskTracker,
    poll_loop: JoinHandle<()>,
}

/// Polls for due jobs and dispatches each one to the [`Executor`] as its own task.
pub struct Scheduler {
    shared: Arc<Shared>,
    lifecycle: watch::Sender<Lifecycle>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new<R: Repository + 'static>(
        store: Arc<R>,
        executor: Arc<Executor>,
        config: SchedulerConfig,
    ) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Stopped);
        Self {
            shared: Arc::new(Shared {
                store,
                executor,
                config,
            }),
            lifecycle,
            running: Mutex::new(None),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Watch lifecycle changes (e.g. to wait for `Stopped`).
    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// Next run of `job` as seen at `now`.
    pub fn calculate_next_run(&self, job: &Job, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        calculate_next_run(job, now)
    }

    /// Recover persisted state, then start the polling loop.
    ///
    /// Fails with `InvalidState` unless the scheduler is stopped.
    pub async fn start(&self) -> Result<RecoveryReport> {
        let mut running = self.running.lock().await;
        let current = self.lifecycle();
        if current != Lifecycle::Stopped || running.is_some() {
            return Err(ScribeError::InvalidState(format!(
                "scheduler cannot start while {current:?}"
            )));
        }

        let report = self.restore_state(Utc::now())?;

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let poll_loop = tokio::spawn(poll_loop(
            self.shared.clone(),
            cancel.clone(),
            tracker.clone(),
        ));
        *running = Some(Running {
            cancel,
            tracker,
            poll_loop,
        });
        self.lifecycle.send_replace(Lifecycle::Running);
        info!(
            poll_interval_secs = self.shared.config.poll_interval_secs,
            missed = report.missed,
            initialised = report.initialised,
            "scheduler started"
        );
        Ok(report)
    }

    /// Cancel in-flight work and wait for it to wind down. Idempotent.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(Running {
            cancel,
            tracker,
            poll_loop,
        }) = running.take()
        else {
            debug!("scheduler already stopped");
            return;
        };

        self.lifecycle.send_replace(Lifecycle::Stopping);
        info!("scheduler stopping");
        cancel.cancel();

        if let Err(e) = poll_loop.await {
            error!(error = %e, "scheduler loop ended abnormally");
        }

        tracker.close();
        let grace = Duration::from_secs(self.shared.config.shutdown_grace_secs);
        if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                in_flight = tracker.len(),
                grace_secs = grace.as_secs(),
                "executions still running after shutdown grace period"
            );
        }

        self.lifecycle.send_replace(Lifecycle::Stopped);
        info!("scheduler stopped");
    }

    /// Bring every active job's `next_run_at` up to date after downtime.
    ///
    /// Missed runs are respread over `missed_spread_secs` so a restart does not
    /// fire them all at once. A job that cannot be updated is logged and
    /// counted; recovery carries on with the rest.
    pub fn restore_state(&self, now: DateTime<Utc>) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let spread = self.shared.config.missed_spread_secs as i64;

        for mut job in self.shared.store.active_jobs()? {
            if job.is_manual() {
                continue;
            }

            match job.next_run_at {
                Some(next) if next < now => {
                    let delay = match uniform_inclusive(0, spread) {
                        Ok(delay) => delay,
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "cannot draw respread delay, running without one");
                            0
                        }
                    };
                    // Bounds held at the millisecond precision of storage.
                    let earliest = ceil_millis(now);
                    let latest = (now + chrono::Duration::seconds(spread))
                        .trunc_subsecs(3)
                        .max(earliest);
                    job.next_run_at =
                        Some((earliest + chrono::Duration::seconds(delay)).min(latest));
                    warn!(job_id = %job.id, missed_at = %next, delay_secs = delay, "missed job rescheduled");
                    report.missed += 1;
                }
                Some(_) => continue,
                None if job.schedule_type == ScheduleType::Once && job.last_run_at.is_some() => {
                    job.status = JobStatus::Completed;
                    report.completed += 1;
                }
                None => match calculate_next_run(&job, now) {
                    Ok(next) => {
                        job.next_run_at = next;
                        report.initialised += 1;
                    }
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "cannot compute next run");
                        job.status = JobStatus::Error;
                        report.failed += 1;
                    }
                },
            }

            job.updated_at = now;
            if let Err(e) = self.shared.store.update_job(&job) {
                error!(job_id = %job.id, error = %e, "failed to persist recovered job");
                report.failed += 1;
            }
        }

        info!(
            missed = report.missed,
            initialised = report.initialised,
            completed = report.completed,
            failed = report.failed,
            "scheduler state restored"
        );
        Ok(report)
    }

    /// Run a job immediately on the caller's task, then reschedule it like a
    /// polled run.
    pub async fn run_now(&self, job_id: &str, cancel: &CancellationToken) -> Result<Execution> {
        let job = self.shared.store.get_job(job_id)?;
        let result = self.shared.executor.execute(&job, cancel).await;
        match &result {
            Ok(exec) => info!(job_id, execution_id = %exec.id, status = %exec.status, "manual run finished"),
            Err(e) => warn!(job_id, error = %e, "manual run failed"),
        }
        if !matches!(
            result,
            Err(ScribeError::AlreadyExists(_)) | Err(ScribeError::Cancelled(_))
        ) {
            self.shared.reschedule(job_id, Utc::now())?;
        }
        result
    }
}

/// `t` rounded up to the millisecond, the precision timestamps are stored at.
fn ceil_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = t.trunc_subsecs(3);
    if truncated < t {
        truncated + chrono::Duration::milliseconds(1)
    } else {
        truncated
    }
}

async fn poll_loop(shared: Arc<Shared>, cancel: CancellationToken, tracker: TaskTracker) {
    let period = Duration::from_secs(shared.config.poll_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("scheduler loop shutting down");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = shared.tick(&cancel, &tracker) {
                    error!(error = %e, "scheduler tick error");
                }
            }
        }
    }
}

impl Shared {
    /// Spawn one task per due job. Never waits on an execution.
    fn tick(self: &Arc<Self>, cancel: &CancellationToken, tracker: &TaskTracker) -> Result<()> {
        let due = self.store.due_jobs(Utc::now())?;
        if !due.is_empty() {
            debug!(count = due.len(), "due jobs");
        }
        for job in due {
            tracker.spawn(self.clone().dispatch(job, cancel.clone()));
        }
        Ok(())
    }

    async fn dispatch(self: Arc<Self>, job: Job, cancel: CancellationToken) {
        info!(job_id = %job.id, name = %job.name, "dispatching job");
        match self.executor.execute(&job, &cancel).await {
            Ok(exec) => {
                info!(job_id = %job.id, execution_id = %exec.id, status = %exec.status, "job run finished")
            }
            Err(ScribeError::AlreadyExists(msg)) => {
                // Another run holds the claim and will reschedule the job itself.
                debug!(job_id = %job.id, %msg, "job skipped");
                return;
            }
            Err(ScribeError::Cancelled(_)) => {
                // Left due so the next start picks it up as missed.
                warn!(job_id = %job.id, "job run cancelled by shutdown");
                return;
            }
            Err(e) => error!(job_id = %job.id, code = e.code(), error = %e, "job run failed"),
        }

        if let Err(e) = self.reschedule(&job.id, Utc::now()) {
            error!(job_id = %job.id, error = %e, "failed to reschedule job");
        }
    }

    /// Post-run bookkeeping: stamp the run and compute the next one.
    fn reschedule(&self, job_id: &str, now: DateTime<Utc>) -> Result<Job> {
        // Re-read: the job may have been edited while it ran.
        let mut job = self.store.get_job(job_id)?;
        job.last_run_at = Some(now);
        job.updated_at = now;

        if job.schedule_type == ScheduleType::Once {
            job.status = JobStatus::Completed;
            job.next_run_at = None;
        } else {
            match calculate_next_run(&job, now) {
                Ok(next) => job.next_run_at = next,
                Err(e) => {
                    error!(job_id, error = %e, "cannot compute next run, job disabled");
                    job.status = JobStatus::Error;
                    job.next_run_at = None;
                }
            }
        }

        self.store.update_job(&job)?;
        info!(
            job_id,
            status = %job.status,
            next_run_at = ?job.next_run_at,
            "job rescheduled"
        );
        Ok(job)
    }
}
