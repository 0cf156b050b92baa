//! `scribe-core` — domain types, error taxonomy and storage contracts shared by
//! the scheduler, the topic strategy engine and the execution pipeline.
//!
//! | Module      | Contents                                            |
//! |-------------|-----------------------------------------------------|
//! | `job`       | `Job`, schedule types, schedule validation          |
//! | `execution` | `Execution` and its status state machine            |
//! | `topic`     | `Topic`, `SiteTopic`, `TopicStrategy`               |
//! | `catalog`   | sites, categories, prompt templates                 |
//! | `store`     | persistence traits implemented by adapters          |
//! | `random`    | uniform draws from the OS CSPRNG                    |
//! | `config`    | `ScribeConfig` (TOML + env)                         |

pub mod catalog;
pub mod config;
pub mod error;
pub mod execution;
pub mod job;
pub mod random;
pub mod store;
pub mod topic;

pub use catalog::{Category, PromptTemplate, Site};
pub use error::{Result, ScribeError};
pub use execution::{Execution, ExecutionStatus, REJECTION_MESSAGE};
pub use job::{Job, JobStatus, ScheduleType};
pub use store::{CatalogStore, ExecutionStore, JobClaims, JobStore, Repository, TopicStore};
pub use topic::{SiteTopic, Topic, TopicStrategy};
