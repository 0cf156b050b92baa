//! `scribe-topics` — decides which topic a job run writes about.
//!
//! | Strategy      | Pick                                              | Continues       |
//! |---------------|---------------------------------------------------|-----------------|
//! | `unique`      | oldest unused topic of the site                   | while >1 unused |
//! | `round_robin` | next slot in the rotation, LRU on ties            | always          |
//! | `random`      | uniform over the site's topics (OS CSPRNG)        | always          |
//! | `random_all`  | uniform over every active topic in the system     | always          |
//! | `variation`   | like `round_robin`, title suffixed per reuse      | always          |

pub mod registry;
pub mod service;
pub mod strategy;

pub use registry::StrategyRegistry;
pub use service::{site_strategy, Selected, TopicService};
pub use strategy::{Selection, SelectionContext, TopicSelector};
