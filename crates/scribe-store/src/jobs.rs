use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use scribe_core::{Job, JobStore};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::store::{enum_col, expect_one, opt_ts, opt_ts_col, ts, ts_col, SqliteStore};

const JOB_COLUMNS: &str = "id, name, site_id, category_id, prompt_id, ai_provider, ai_model,
     requires_validation, schedule_type, schedule_time, schedule_day,
     jitter_enabled, jitter_minutes, status, last_run_at, next_run_at,
     created_at, updated_at";

impl JobStore for SqliteStore {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    fn create_job(&self, job: &Job) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO jobs ({JOB_COLUMNS})
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)"
                ),
                rusqlite::params![
                    job.id,
                    job.name,
                    job.site_id,
                    job.category_id,
                    job.prompt_id,
                    job.ai_provider,
                    job.ai_model,
                    job.requires_validation,
                    job.schedule_type.to_string(),
                    job.schedule_time,
                    job.schedule_day,
                    job.jitter_enabled,
                    job.jitter_minutes,
                    job.status.to_string(),
                    opt_ts(&job.last_run_at),
                    opt_ts(&job.next_run_at),
                    ts(&job.created_at),
                    ts(&job.updated_at),
                ],
            )?;
            debug!("job inserted");
            Ok(())
        })
    }

    fn get_job(&self, id: &str) -> scribe_core::Result<Job> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                [id],
                row_to_job,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "job",
                id: id.to_string(),
            })
        })
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    fn update_job(&self, job: &Job) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE jobs SET name=?2, site_id=?3, category_id=?4, prompt_id=?5,
                    ai_provider=?6, ai_model=?7, requires_validation=?8, schedule_type=?9,
                    schedule_time=?10, schedule_day=?11, jitter_enabled=?12,
                    jitter_minutes=?13, status=?14, last_run_at=?15, next_run_at=?16,
                    updated_at=?17
                 WHERE id=?1",
                rusqlite::params![
                    job.id,
                    job.name,
                    job.site_id,
                    job.category_id,
                    job.prompt_id,
                    job.ai_provider,
                    job.ai_model,
                    job.requires_validation,
                    job.schedule_type.to_string(),
                    job.schedule_time,
                    job.schedule_day,
                    job.jitter_enabled,
                    job.jitter_minutes,
                    job.status.to_string(),
                    opt_ts(&job.last_run_at),
                    opt_ts(&job.next_run_at),
                    ts(&Utc::now()),
                ],
            )?;
            expect_one(n, "job", &job.id)
        })
    }

    fn delete_job(&self, id: &str) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
            expect_one(n, "job", id)
        })
    }

    fn list_jobs(&self) -> scribe_core::Result<Vec<Job>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at"))?;
            let jobs = stmt
                .query_map([], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(jobs)
        })
    }

    fn due_jobs(&self, now: DateTime<Utc>) -> scribe_core::Result<Vec<Job>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE status = 'active' AND next_run_at IS NOT NULL AND next_run_at <= ?1
                 ORDER BY next_run_at"
            ))?;
            let jobs = stmt
                .query_map([ts(&now)], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(jobs)
        })
    }

    fn active_jobs(&self) -> scribe_core::Result<Vec<Job>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'active' ORDER BY created_at"
            ))?;
            let jobs = stmt
                .query_map([], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(jobs)
        })
    }
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        site_id: row.get(2)?,
        category_id: row.get(3)?,
        prompt_id: row.get(4)?,
        ai_provider: row.get(5)?,
        ai_model: row.get(6)?,
        requires_validation: row.get(7)?,
        schedule_type: enum_col(row, 8)?,
        schedule_time: row.get(9)?,
        schedule_day: row.get(10)?,
        jitter_enabled: row.get(11)?,
        jitter_minutes: row.get(12)?,
        status: enum_col(row, 13)?,
        last_run_at: opt_ts_col(row, 14)?,
        next_run_at: opt_ts_col(row, 15)?,
        created_at: ts_col(row, 16)?,
        updated_at: ts_col(row, 17)?,
    })
}
