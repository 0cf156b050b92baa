//! Topic selectors: pure decision logic over a site's candidate associations.
//!
//! Selectors never touch storage. The [`crate::TopicService`] loads the
//! candidates, asks the selector for a pick, and records the usage.

use std::cmp::Ordering;

use scribe_core::random::pick_index;
use scribe_core::{Result, ScribeError, SiteTopic, Topic, TopicStrategy};

/// Inputs to one selection.
pub struct SelectionContext<'a> {
    pub site_id: &'a str,
    /// Active associations of the site, in topic creation order.
    pub candidates: &'a [SiteTopic],
    /// Every active topic in the system. Only loaded for selectors that ask
    /// for it via [`TopicSelector::needs_all_topics`].
    pub all_topics: &'a [Topic],
}

impl SelectionContext<'_> {
    fn no_topic(&self) -> ScribeError {
        ScribeError::NoTopicAvailable {
            site_id: self.site_id.to_string(),
        }
    }
}

/// Outcome of a selector: the chosen association and whether more picks remain.
#[derive(Debug, Clone)]
pub struct Selection {
    pub site_topic: SiteTopic,
    pub can_continue: bool,
}

pub trait TopicSelector: Send + Sync {
    fn strategy(&self) -> TopicStrategy;

    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection>;

    fn needs_all_topics(&self) -> bool {
        false
    }
}

fn creation_order(a: &SiteTopic, b: &SiteTopic) -> Ordering {
    a.topic
        .created_at
        .cmp(&b.topic.created_at)
        .then_with(|| a.topic.id.cmp(&b.topic.id))
}

/// Next rotation slot after `position` for a set of `size` topics.
/// Slot 0 means "never scheduled" and maps to 1.
pub fn advance_position(position: u32, size: usize) -> u32 {
    let size = size.max(1) as u32;
    (position % size) + 1
}

// ---------------------------------------------------------------------------

pub struct UniqueSelector;

impl TopicSelector for UniqueSelector {
    fn strategy(&self) -> TopicStrategy {
        TopicStrategy::Unique
    }

    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection> {
        let mut unused: Vec<&SiteTopic> = ctx.candidates.iter().filter(|st| !st.is_used()).collect();
        unused.sort_by(|a, b| creation_order(a, b));
        let first = unused.first().ok_or_else(|| ctx.no_topic())?;
        Ok(Selection {
            site_topic: (*first).clone(),
            can_continue: unused.len() > 1,
        })
    }
}

// ---------------------------------------------------------------------------

/// Serves topics in a fixed rotation.
///
/// Positions count how many rounds a topic has been served (wrapping at the
/// candidate count). Never-scheduled topics come first. When the scheduled
/// positions form two cyclically adjacent values, the topics still on the
/// older value are behind and go next. Anything else falls back to
/// least-recently-used, then creation order.
pub struct RoundRobinSelector;

impl RoundRobinSelector {
    fn rank_of(position: u32, lagging: Option<u32>, size: u32, ordered: bool) -> u32 {
        match (position, lagging) {
            (0, _) => 0,
            (p, Some(lag)) => {
                if p == lag {
                    1
                } else {
                    2
                }
            }
            (p, None) if ordered => p.min(size),
            _ => 1,
        }
    }

    /// Ordering of `candidates` from next-to-serve to last.
    pub fn rotation<'a>(candidates: &'a [SiteTopic]) -> Vec<&'a SiteTopic> {
        let size = candidates.len().max(1) as u32;
        let mut scheduled: Vec<u32> = candidates
            .iter()
            .map(|st| st.rr_position)
            .filter(|p| *p > 0)
            .collect();
        scheduled.sort_unstable();
        scheduled.dedup();

        let (lagging, ordered) = match scheduled.as_slice() {
            [x, y] => {
                let x_then_y = advance_position(*x, size as usize) == *y;
                let y_then_x = advance_position(*y, size as usize) == *x;
                match (x_then_y, y_then_x) {
                    (true, false) => (Some(*x), false),
                    (false, true) => (Some(*y), false),
                    // Both directions adjacent: only two slots exist, so
                    // position alone cannot say who is behind.
                    (true, true) => (None, false),
                    (false, false) => (None, true),
                }
            }
            [_] | [] => (None, false),
            _ => (None, true),
        };

        let mut ordered_candidates: Vec<&SiteTopic> = candidates.iter().collect();
        ordered_candidates.sort_by(|a, b| {
            let ra = Self::rank_of(a.rr_position, lagging, size, ordered);
            let rb = Self::rank_of(b.rr_position, lagging, size, ordered);
            ra.cmp(&rb)
                .then_with(|| a.last_used_at.cmp(&b.last_used_at))
                .then_with(|| creation_order(a, b))
        });
        ordered_candidates
    }
}

impl TopicSelector for RoundRobinSelector {
    fn strategy(&self) -> TopicStrategy {
        TopicStrategy::RoundRobin
    }

    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection> {
        let next = Self::rotation(ctx.candidates)
            .into_iter()
            .next()
            .ok_or_else(|| ctx.no_topic())?;
        Ok(Selection {
            site_topic: next.clone(),
            can_continue: true,
        })
    }
}

// ---------------------------------------------------------------------------

pub struct RandomSelector;

impl TopicSelector for RandomSelector {
    fn strategy(&self) -> TopicStrategy {
        TopicStrategy::Random
    }

    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection> {
        if ctx.candidates.is_empty() {
            return Err(ctx.no_topic());
        }
        let idx = pick_index(ctx.candidates.len())?;
        Ok(Selection {
            site_topic: ctx.candidates[idx].clone(),
            can_continue: true,
        })
    }
}

// ---------------------------------------------------------------------------

/// Draws from every active topic in the system, not just the site's own.
pub struct RandomAllSelector;

impl TopicSelector for RandomAllSelector {
    fn strategy(&self) -> TopicStrategy {
        TopicStrategy::RandomAll
    }

    fn needs_all_topics(&self) -> bool {
        true
    }

    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection> {
        let pool: Vec<&Topic> = ctx.all_topics.iter().filter(|t| t.active).collect();
        if pool.is_empty() {
            return Err(ctx.no_topic());
        }
        let topic = pool[pick_index(pool.len())?];
        let site_topic = ctx
            .candidates
            .iter()
            .find(|st| st.topic.id == topic.id)
            .cloned()
            .unwrap_or_else(|| {
                SiteTopic::transient(ctx.site_id, topic.clone(), TopicStrategy::RandomAll)
            });
        Ok(Selection {
            site_topic,
            can_continue: true,
        })
    }
}

// ---------------------------------------------------------------------------

/// Reuses topics in rotation; the pipeline derives a numbered title per reuse.
pub struct VariationSelector;

impl TopicSelector for VariationSelector {
    fn strategy(&self) -> TopicStrategy {
        TopicStrategy::Variation
    }

    fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection> {
        RoundRobinSelector.select(ctx)
    }
}
