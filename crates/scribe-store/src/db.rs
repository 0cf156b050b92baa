use rusqlite::{Connection, Result};

/// Initialise every table the engine persists. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_catalog_tables(conn)?;
    create_topic_tables(conn)?;
    create_jobs_table(conn)?;
    create_executions_table(conn)?;
    create_claims_table(conn)?;
    Ok(())
}

fn create_catalog_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sites (
            id           TEXT    NOT NULL PRIMARY KEY,
            name         TEXT    NOT NULL,
            url          TEXT    NOT NULL,
            username     TEXT    NOT NULL DEFAULT '',
            app_password TEXT    NOT NULL DEFAULT '',
            active       INTEGER NOT NULL DEFAULT 1,
            created_at   TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS categories (
            id        TEXT    NOT NULL PRIMARY KEY,
            site_id   TEXT    NOT NULL,
            name      TEXT    NOT NULL,
            remote_id INTEGER           -- id on the publishing target, NULL until known
        ) STRICT;

        CREATE TABLE IF NOT EXISTS prompts (
            id            TEXT NOT NULL PRIMARY KEY,
            name          TEXT NOT NULL,
            system_prompt TEXT NOT NULL,
            user_prompt   TEXT NOT NULL
        ) STRICT;",
    )
}

/// Usage is tracked per (site, topic) pair, never globally.
fn create_topic_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS topics (
            id         TEXT    NOT NULL PRIMARY KEY,
            title      TEXT    NOT NULL,
            active     INTEGER NOT NULL DEFAULT 1,
            created_at TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS site_topics (
            id           TEXT    NOT NULL PRIMARY KEY,
            site_id      TEXT    NOT NULL,
            topic_id     TEXT    NOT NULL,
            strategy     TEXT    NOT NULL,
            priority     INTEGER NOT NULL DEFAULT 0,
            usage_count  INTEGER NOT NULL DEFAULT 0,
            last_used_at TEXT,
            rr_position  INTEGER NOT NULL DEFAULT 0,
            UNIQUE(site_id, topic_id)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_site_topics_site ON site_topics (site_id);",
    )
}

fn create_jobs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS jobs (
            id                  TEXT    NOT NULL PRIMARY KEY,
            name                TEXT    NOT NULL,
            site_id             TEXT    NOT NULL,
            category_id         TEXT    NOT NULL,
            prompt_id           TEXT    NOT NULL,
            ai_provider         TEXT    NOT NULL,
            ai_model            TEXT    NOT NULL,
            requires_validation INTEGER NOT NULL DEFAULT 0,
            schedule_type       TEXT    NOT NULL,
            schedule_time       TEXT,               -- HH:MM or NULL
            schedule_day        INTEGER,
            jitter_enabled      INTEGER NOT NULL DEFAULT 0,
            jitter_minutes      INTEGER NOT NULL DEFAULT 0,
            status              TEXT    NOT NULL DEFAULT 'active',
            last_run_at         TEXT,
            next_run_at         TEXT,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL
        ) STRICT;

        -- Polling: WHERE status = 'active' AND next_run_at <= ?
        CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs (status, next_run_at);",
    )
}

fn create_executions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS executions (
            id            TEXT NOT NULL PRIMARY KEY,
            job_id        TEXT NOT NULL,
            topic_id      TEXT,
            title         TEXT,
            content       TEXT,
            status        TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            post_id       TEXT,
            post_url      TEXT,
            started_at    TEXT,
            generated_at  TEXT,
            validated_at  TEXT,
            published_at  TEXT,
            created_at    TEXT NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_executions_job ON executions (job_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_executions_status ON executions (status);",
    )
}

/// Advisory per-job claims. A row whose `expires_at` has passed is free to take over.
fn create_claims_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS job_claims (
            job_id     TEXT NOT NULL PRIMARY KEY,
            holder     TEXT NOT NULL,
            claimed_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        ) STRICT;",
    )
}
