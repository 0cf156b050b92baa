use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use scribe_core::{SiteTopic, Topic, TopicStore};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::store::{enum_col, expect_one, opt_ts_col, ts, ts_col, SqliteStore};

const SITE_TOPIC_SELECT: &str = "SELECT st.id, st.site_id, st.strategy, st.priority, st.usage_count,
            st.last_used_at, st.rr_position, t.id, t.title, t.active, t.created_at
     FROM site_topics st
     JOIN topics t ON t.id = st.topic_id";

impl TopicStore for SqliteStore {
    fn create_topic(&self, topic: &Topic) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO topics (id, title, active, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![topic.id, topic.title, topic.active, ts(&topic.created_at)],
            )?;
            Ok(())
        })
    }

    fn get_topic(&self, id: &str) -> scribe_core::Result<Topic> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, active, created_at FROM topics WHERE id = ?1",
                [id],
                |row| row_to_topic(row, 0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "topic",
                id: id.to_string(),
            })
        })
    }

    fn active_topics(&self) -> scribe_core::Result<Vec<Topic>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, active, created_at FROM topics
                 WHERE active = 1 ORDER BY created_at, id",
            )?;
            let topics = stmt
                .query_map([], |row| row_to_topic(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(topics)
        })
    }

    #[instrument(skip(self, site_topic), fields(site_id = %site_topic.site_id, topic_id = %site_topic.topic.id))]
    fn associate_topic(&self, site_topic: &SiteTopic) -> scribe_core::Result<()> {
        let Some(id) = site_topic.id.as_deref() else {
            return Err(scribe_core::ScribeError::Validation(
                "transient site-topic associations are never persisted".into(),
            ));
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO site_topics
                 (id, site_id, topic_id, strategy, priority, usage_count, last_used_at, rr_position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id,
                    site_topic.site_id,
                    site_topic.topic.id,
                    site_topic.strategy.to_string(),
                    site_topic.priority,
                    site_topic.usage_count,
                    site_topic.last_used_at.as_ref().map(ts),
                    site_topic.rr_position,
                ],
            )?;
            debug!("topic associated with site");
            Ok(())
        })
    }

    fn site_topics(&self, site_id: &str) -> scribe_core::Result<Vec<SiteTopic>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SITE_TOPIC_SELECT} WHERE st.site_id = ?1 ORDER BY t.created_at, t.id"
            ))?;
            let rows = stmt
                .query_map([site_id], row_to_site_topic)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn record_usage(
        &self,
        site_topic_id: &str,
        expected_usage: u32,
        used_at: DateTime<Utc>,
        rr_position: u32,
    ) -> scribe_core::Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE site_topics
                 SET usage_count  = usage_count + 1,
                     last_used_at = ?3,
                     rr_position  = ?4
                 WHERE id = ?1 AND usage_count = ?2",
                rusqlite::params![site_topic_id, expected_usage, ts(&used_at), rr_position],
            )?;
            if n == 1 {
                return Ok(true);
            }
            let exists = conn
                .query_row("SELECT 1 FROM site_topics WHERE id = ?1", [site_topic_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Err(StoreError::NotFound {
                    kind: "site topic",
                    id: site_topic_id.to_string(),
                });
            }
            debug!(site_topic_id, expected_usage, "usage changed since selection");
            Ok(false)
        })
    }

    fn mark_used(&self, site_id: &str, topic_id: &str) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE site_topics
                 SET usage_count  = MAX(usage_count, 1),
                     last_used_at = COALESCE(last_used_at, ?3)
                 WHERE site_id = ?1 AND topic_id = ?2",
                rusqlite::params![site_id, topic_id, ts(&Utc::now())],
            )?;
            expect_one(n, "site topic", &format!("{site_id}/{topic_id}"))
        })
    }

    fn is_used(&self, site_id: &str, topic_id: &str) -> scribe_core::Result<bool> {
        self.with_conn(|conn| {
            let count: Option<u32> = conn
                .query_row(
                    "SELECT usage_count FROM site_topics WHERE site_id = ?1 AND topic_id = ?2",
                    [site_id, topic_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.is_some_and(|c| c > 0))
        })
    }

    fn unused_topics(&self, site_id: &str) -> scribe_core::Result<Vec<Topic>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.title, t.active, t.created_at
                 FROM site_topics st
                 JOIN topics t ON t.id = st.topic_id
                 WHERE st.site_id = ?1 AND st.usage_count = 0 AND t.active = 1
                 ORDER BY t.created_at, t.id",
            )?;
            let topics = stmt
                .query_map([site_id], |row| row_to_topic(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(topics)
        })
    }
}

fn row_to_topic(row: &Row<'_>, offset: usize) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        active: row.get(offset + 2)?,
        created_at: ts_col(row, offset + 3)?,
    })
}

fn row_to_site_topic(row: &Row<'_>) -> rusqlite::Result<SiteTopic> {
    Ok(SiteTopic {
        id: Some(row.get(0)?),
        site_id: row.get(1)?,
        strategy: enum_col(row, 2)?,
        priority: row.get(3)?,
        usage_count: row.get(4)?,
        last_used_at: opt_ts_col(row, 5)?,
        rr_position: row.get(6)?,
        topic: row_to_topic(row, 7)?,
    })
}
