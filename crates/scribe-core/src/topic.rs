use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Algorithm used to pick the next topic for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStrategy {
    /// Each topic is used at most once per site.
    Unique,
    /// Topics are served in a fixed rotation.
    RoundRobin,
    /// Uniform pick among the site's topics.
    Random,
    /// Uniform pick among every active topic in the system.
    RandomAll,
    /// Rotation like `RoundRobin`, with a numbered title suffix per reuse.
    Variation,
}

impl std::fmt::Display for TopicStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TopicStrategy::Unique => "unique",
            TopicStrategy::RoundRobin => "round_robin",
            TopicStrategy::Random => "random",
            TopicStrategy::RandomAll => "random_all",
            TopicStrategy::Variation => "variation",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TopicStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unique" => Ok(TopicStrategy::Unique),
            "round_robin" => Ok(TopicStrategy::RoundRobin),
            "random" => Ok(TopicStrategy::Random),
            "random_all" => Ok(TopicStrategy::RandomAll),
            "variation" => Ok(TopicStrategy::Variation),
            other => Err(format!("unknown topic strategy: {other}")),
        }
    }
}

/// A content subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    /// Inactive topics are never selected.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(title: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            title: title.to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Binding of a topic to a site, carrying the usage bookkeeping the strategies read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTopic {
    /// `None` for a transient association synthesized by `random_all`.
    pub id: Option<String>,
    pub site_id: String,
    pub topic: Topic,
    pub strategy: TopicStrategy,
    pub priority: i32,
    pub usage_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    /// 0 = never scheduled; otherwise the 1-based rotation slot last served.
    pub rr_position: u32,
}

impl SiteTopic {
    pub fn new(site_id: &str, topic: Topic, strategy: TopicStrategy) -> Self {
        Self {
            id: Some(Uuid::now_v7().to_string()),
            site_id: site_id.to_string(),
            topic,
            strategy,
            priority: 0,
            usage_count: 0,
            last_used_at: None,
            rr_position: 0,
        }
    }

    /// Bookkeeping-only association that is never written to storage.
    pub fn transient(site_id: &str, topic: Topic, strategy: TopicStrategy) -> Self {
        Self {
            id: None,
            ..Self::new(site_id, topic, strategy)
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_used(&self) -> bool {
        self.usage_count > 0
    }
}
