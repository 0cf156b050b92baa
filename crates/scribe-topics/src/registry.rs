use std::collections::HashMap;

use scribe_core::{Result, ScribeError, TopicStrategy};

use crate::strategy::{
    RandomAllSelector, RandomSelector, RoundRobinSelector, TopicSelector, UniqueSelector,
    VariationSelector,
};

/// Maps each strategy tag to the selector that implements it.
pub struct StrategyRegistry {
    selectors: HashMap<TopicStrategy, Box<dyn TopicSelector>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            selectors: HashMap::new(),
        }
    }

    /// Register a selector, replacing any previous one for the same tag.
    pub fn register(&mut self, selector: Box<dyn TopicSelector>) {
        self.selectors.insert(selector.strategy(), selector);
    }

    pub fn get(&self, strategy: TopicStrategy) -> Result<&dyn TopicSelector> {
        self.selectors
            .get(&strategy)
            .map(|s| s.as_ref())
            .ok_or_else(|| ScribeError::Internal(format!("no selector registered for {strategy}")))
    }
}

impl Default for StrategyRegistry {
    /// Registry with every built-in strategy.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(UniqueSelector));
        registry.register(Box::new(RoundRobinSelector));
        registry.register(Box::new(RandomSelector));
        registry.register(Box::new(RandomAllSelector));
        registry.register(Box::new(VariationSelector));
        registry
    }
}
