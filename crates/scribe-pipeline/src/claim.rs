use std::sync::Arc;

use chrono::{Duration, Utc};
use scribe_core::{JobClaims, Result, ScribeError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Holds the advisory claim on a job; released on drop.
pub struct ClaimGuard {
    claims: Arc<dyn JobClaims>,
    job_id: String,
    holder: String,
}

impl ClaimGuard {
    /// Claim `job_id` for `ttl`, or fail with `AlreadyExists` while another
    /// holder's claim is still live.
    pub fn acquire(claims: Arc<dyn JobClaims>, job_id: &str, ttl: Duration) -> Result<Self> {
        let holder = Uuid::now_v7().to_string();
        let now = Utc::now();
        if !claims.try_claim(job_id, &holder, now, now + ttl)? {
            return Err(ScribeError::AlreadyExists(format!("job {job_id} already running")));
        }
        debug!(job_id, %holder, "job claimed");
        Ok(Self {
            claims,
            job_id: job_id.to_string(),
            holder,
        })
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if let Err(e) = self.claims.release_claim(&self.job_id, &self.holder) {
            // The claim expires on its own; the next dispatch after the TTL can take it.
            warn!(job_id = %self.job_id, error = %e, "failed to release job claim");
        }
    }
}
