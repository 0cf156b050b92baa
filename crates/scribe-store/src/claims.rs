use chrono::{DateTime, Utc};
use scribe_core::JobClaims;
use tracing::debug;

use crate::store::{ts, SqliteStore};

impl JobClaims for SqliteStore {
    fn try_claim(
        &self,
        job_id: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> scribe_core::Result<bool> {
        self.with_conn(|conn| {
            // Upsert that only overwrites an expired claim; 0 rows means someone else holds it.
            let n = conn.execute(
                "INSERT INTO job_claims (job_id, holder, claimed_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(job_id) DO UPDATE
                    SET holder = excluded.holder,
                        claimed_at = excluded.claimed_at,
                        expires_at = excluded.expires_at
                    WHERE job_claims.expires_at <= excluded.claimed_at",
                rusqlite::params![job_id, holder, ts(&now), ts(&expires_at)],
            )?;
            debug!(job_id, holder, claimed = n > 0, "claim attempt");
            Ok(n > 0)
        })
    }

    fn release_claim(&self, job_id: &str, holder: &str) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM job_claims WHERE job_id = ?1 AND holder = ?2",
                [job_id, holder],
            )?;
            Ok(())
        })
    }
}
