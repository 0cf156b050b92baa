//! Reference data a job points at: the target site, its category and the prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A publishing target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    /// Base URL without trailing slash.
    pub url: String,
    pub username: String,
    /// Application password used by the publishing client.
    pub app_password: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Site {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            username: String::new(),
            app_password: String::new(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub site_id: String,
    pub name: String,
    /// Numeric category id on the publishing target, once known.
    pub remote_id: Option<i64>,
}

impl Category {
    pub fn new(site_id: &str, name: &str, remote_id: Option<i64>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            site_id: site_id.to_string(),
            name: name.to_string(),
            remote_id,
        }
    }
}

/// System + user prompt pair. Both may use `{title}`, `{site_name}` and `{category}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl PromptTemplate {
    pub fn new(name: &str, system_prompt: &str, user_prompt: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        }
    }
}
