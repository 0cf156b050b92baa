use rusqlite::{Connection, OptionalExtension, Row};
use scribe_core::{Execution, ExecutionStatus, ExecutionStore};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::store::{enum_col, expect_one, opt_ts, opt_ts_col, ts, ts_col, SqliteStore};

const EXECUTION_COLUMNS: &str = "id, job_id, topic_id, title, content, status, error_message,
     post_id, post_url, started_at, generated_at, validated_at, published_at, created_at";

impl ExecutionStore for SqliteStore {
    #[instrument(skip(self, execution), fields(execution_id = %execution.id))]
    fn create_execution(&self, execution: &Execution) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO executions ({EXECUTION_COLUMNS})
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)"
                ),
                rusqlite::params![
                    execution.id,
                    execution.job_id,
                    execution.topic_id,
                    execution.title,
                    execution.content,
                    execution.status.to_string(),
                    execution.error_message,
                    execution.post_id,
                    execution.post_url,
                    opt_ts(&execution.started_at),
                    opt_ts(&execution.generated_at),
                    opt_ts(&execution.validated_at),
                    opt_ts(&execution.published_at),
                    ts(&execution.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn get_execution(&self, id: &str) -> scribe_core::Result<Execution> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = ?1"),
                [id],
                row_to_execution,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "execution",
                id: id.to_string(),
            })
        })
    }

    #[instrument(skip(self, execution), fields(execution_id = %execution.id, status = %execution.status))]
    fn update_execution(&self, execution: &Execution) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            let n = write_execution(conn, execution, None)?;
            expect_one(n, "execution", &execution.id)
        })
    }

    #[instrument(skip(self, execution), fields(execution_id = %execution.id, status = %execution.status))]
    fn update_execution_from(
        &self,
        execution: &Execution,
        expected: ExecutionStatus,
    ) -> scribe_core::Result<bool> {
        self.with_conn(|conn| {
            if write_execution(conn, execution, Some(expected))? == 1 {
                return Ok(true);
            }
            let exists = conn
                .query_row("SELECT 1 FROM executions WHERE id = ?1", [&execution.id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Err(StoreError::NotFound {
                    kind: "execution",
                    id: execution.id.clone(),
                });
            }
            debug!(%expected, "execution left the expected status");
            Ok(false)
        })
    }

    fn executions_for_job(&self, job_id: &str) -> scribe_core::Result<Vec<Execution>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE job_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([job_id], row_to_execution)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn pending_validation(&self) -> scribe_core::Result<Vec<Execution>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE status = 'pending_validation' ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map([], row_to_execution)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

/// Full-row update, optionally only while the stored status is `expected`.
fn write_execution(
    conn: &Connection,
    execution: &Execution,
    expected: Option<ExecutionStatus>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE executions SET topic_id=?2, title=?3, content=?4, status=?5,
            error_message=?6, post_id=?7, post_url=?8, started_at=?9,
            generated_at=?10, validated_at=?11, published_at=?12
         WHERE id=?1 AND (?13 IS NULL OR status=?13)",
        rusqlite::params![
            execution.id,
            execution.topic_id,
            execution.title,
            execution.content,
            execution.status.to_string(),
            execution.error_message,
            execution.post_id,
            execution.post_url,
            opt_ts(&execution.started_at),
            opt_ts(&execution.generated_at),
            opt_ts(&execution.validated_at),
            opt_ts(&execution.published_at),
            expected.map(|s| s.to_string()),
        ],
    )
}

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<Execution> {
    Ok(Execution {
        id: row.get(0)?,
        job_id: row.get(1)?,
        topic_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        status: enum_col(row, 5)?,
        error_message: row.get(6)?,
        post_id: row.get(7)?,
        post_url: row.get(8)?,
        started_at: opt_ts_col(row, 9)?,
        generated_at: opt_ts_col(row, 10)?,
        validated_at: opt_ts_col(row, 11)?,
        published_at: opt_ts_col(row, 12)?,
        created_at: ts_col(row, 13)?,
    })
}
