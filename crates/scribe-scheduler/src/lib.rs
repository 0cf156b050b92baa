//! `scribe-scheduler` — decides when jobs run and dispatches them.
//!
//! # Overview
//!
//! [`engine::Scheduler`] polls storage on a fixed interval and spawns one
//! task per due job; the loop never waits on an execution. After each run
//! the job is stamped and its next run recomputed. On start, missed runs are
//! respread over a short window.
//!
//! # Schedule types
//!
//! | Type      | Next run                                                 |
//! |-----------|----------------------------------------------------------|
//! | `manual`  | never; only [`engine::Scheduler::run_now`]               |
//! | `once`    | immediately, then the job completes                      |
//! | `daily`   | HH:MM UTC, today if still ahead else tomorrow            |
//! | `weekly`  | HH:MM UTC on an ISO weekday (1 = Monday)                 |
//! | `monthly` | HH:MM UTC on a day of month, clamped to the month's end  |
//!
//! Recurring schedules may add a uniform jitter of ±N minutes.

pub mod engine;
pub mod jobs;
pub mod schedule;

pub use engine::{Lifecycle, RecoveryReport, Scheduler};
pub use jobs::JobService;
pub use schedule::calculate_next_run;
