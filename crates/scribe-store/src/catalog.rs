use rusqlite::OptionalExtension;
use scribe_core::{CatalogStore, Category, PromptTemplate, Site};

use crate::error::StoreError;
use crate::store::{ts, ts_col, SqliteStore};

impl CatalogStore for SqliteStore {
    fn create_site(&self, site: &Site) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sites (id, name, url, username, app_password, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    site.id,
                    site.name,
                    site.url,
                    site.username,
                    site.app_password,
                    site.active,
                    ts(&site.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn get_site(&self, id: &str) -> scribe_core::Result<Site> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, url, username, app_password, active, created_at
                 FROM sites WHERE id = ?1",
                [id],
                |row| {
                    Ok(Site {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        url: row.get(2)?,
                        username: row.get(3)?,
                        app_password: row.get(4)?,
                        active: row.get(5)?,
                        created_at: ts_col(row, 6)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "site",
                id: id.to_string(),
            })
        })
    }

    fn create_category(&self, category: &Category) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (id, site_id, name, remote_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    category.id,
                    category.site_id,
                    category.name,
                    category.remote_id
                ],
            )?;
            Ok(())
        })
    }

    fn get_category(&self, id: &str) -> scribe_core::Result<Category> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, site_id, name, remote_id FROM categories WHERE id = ?1",
                [id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        site_id: row.get(1)?,
                        name: row.get(2)?,
                        remote_id: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "category",
                id: id.to_string(),
            })
        })
    }

    fn create_prompt(&self, prompt: &PromptTemplate) -> scribe_core::Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO prompts (id, name, system_prompt, user_prompt)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    prompt.id,
                    prompt.name,
                    prompt.system_prompt,
                    prompt.user_prompt
                ],
            )?;
            Ok(())
        })
    }

    fn get_prompt(&self, id: &str) -> scribe_core::Result<PromptTemplate> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, system_prompt, user_prompt FROM prompts WHERE id = ?1",
                [id],
                |row| {
                    Ok(PromptTemplate {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        system_prompt: row.get(2)?,
                        user_prompt: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                kind: "prompt",
                id: id.to_string(),
            })
        })
    }
}
