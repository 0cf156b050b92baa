use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use scribe_core::{Result, ScribeError, SiteTopic, TopicStore, TopicStrategy};
use tracing::{debug, info};

use crate::registry::StrategyRegistry;
use crate::strategy::{advance_position, SelectionContext};

/// A topic picked for one execution, with its usage already recorded.
#[derive(Debug, Clone)]
pub struct Selected {
    /// Association state after recording (usage count includes this pick).
    pub site_topic: SiteTopic,
    pub strategy: TopicStrategy,
    pub can_continue: bool,
}

impl Selected {
    /// Article title for this pick. `variation` numbers each reuse.
    pub fn article_title(&self) -> String {
        let title = &self.site_topic.topic.title;
        match self.strategy {
            TopicStrategy::Variation => {
                format!("{title} (variation {})", self.site_topic.usage_count)
            }
            _ => title.clone(),
        }
    }
}

/// Resolve the single strategy a site's associations share.
pub fn site_strategy(site_id: &str, site_topics: &[SiteTopic]) -> Result<TopicStrategy> {
    let Some(first) = site_topics.first() else {
        return Err(ScribeError::NoTopicAvailable {
            site_id: site_id.to_string(),
        });
    };
    if let Some(other) = site_topics.iter().find(|st| st.strategy != first.strategy) {
        return Err(ScribeError::Validation(format!(
            "site {site_id} mixes topic strategies ({} and {})",
            first.strategy, other.strategy
        )));
    }
    Ok(first.strategy)
}

/// Attempts before a selection that keeps losing its usage write gives up.
const MAX_SELECTION_ATTEMPTS: usize = 8;

/// Loads candidates, runs the site's selector and records the usage as one
/// step per site.
///
/// Usage is written with a compare-and-set on the association's usage count:
/// a selector that read stale candidates loses the write and selects again,
/// so two services on the same database can never both be handed the same
/// `unique` topic. The per-site lock only keeps one process from racing
/// itself.
pub struct TopicService {
    store: Arc<dyn TopicStore>,
    registry: StrategyRegistry,
    site_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TopicService {
    pub fn new(store: Arc<dyn TopicStore>) -> Self {
        Self::with_registry(store, StrategyRegistry::default())
    }

    pub fn with_registry(store: Arc<dyn TopicStore>, registry: StrategyRegistry) -> Self {
        Self {
            store,
            registry,
            site_locks: DashMap::new(),
        }
    }

    fn site_lock(&self, site_id: &str) -> Arc<Mutex<()>> {
        self.site_locks
            .entry(site_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Pick the next topic for `site_id` and durably record its usage.
    pub fn select_for_site(&self, site_id: &str) -> Result<Selected> {
        let lock = self.site_lock(site_id);
        let _guard = lock
            .lock()
            .map_err(|_| ScribeError::Internal(format!("topic lock poisoned for site {site_id}")))?;

        for attempt in 1..=MAX_SELECTION_ATTEMPTS {
            if let Some(selected) = self.try_select(site_id)? {
                info!(
                    site_id,
                    topic_id = %selected.site_topic.topic.id,
                    strategy = %selected.strategy,
                    can_continue = selected.can_continue,
                    "topic selected"
                );
                return Ok(selected);
            }
            debug!(site_id, attempt, "topic usage changed concurrently, selecting again");
        }

        Err(ScribeError::Internal(format!(
            "topic selection for site {site_id} lost {MAX_SELECTION_ATTEMPTS} concurrent races"
        )))
    }

    /// One read-select-record round. `None` when the usage write lost a race.
    fn try_select(&self, site_id: &str) -> Result<Option<Selected>> {
        let site_topics = self.store.site_topics(site_id)?;
        let strategy = site_strategy(site_id, &site_topics)?;
        let candidates: Vec<SiteTopic> = site_topics.into_iter().filter(|st| st.topic.active).collect();

        let selector = self.registry.get(strategy)?;
        let all_topics = if selector.needs_all_topics() {
            self.store.active_topics()?
        } else {
            Vec::new()
        };

        let selection = selector.select(&SelectionContext {
            site_id,
            candidates: &candidates,
            all_topics: &all_topics,
        })?;

        let mut site_topic = selection.site_topic;
        if let Some(id) = site_topic.id.clone() {
            let now = Utc::now();
            let position = advance_position(site_topic.rr_position, candidates.len());
            if !self.store.record_usage(&id, site_topic.usage_count, now, position)? {
                return Ok(None);
            }
            site_topic.usage_count += 1;
            site_topic.last_used_at = Some(now);
            site_topic.rr_position = position;
        } else {
            debug!(site_id, topic_id = %site_topic.topic.id, "transient association, usage not recorded");
        }

        Ok(Some(Selected {
            site_topic,
            strategy,
            can_continue: selection.can_continue,
        }))
    }

    /// Flag a topic as used for a site. Idempotent.
    pub fn mark_used(&self, site_id: &str, topic_id: &str) -> Result<()> {
        self.store.mark_used(site_id, topic_id)
    }
}
