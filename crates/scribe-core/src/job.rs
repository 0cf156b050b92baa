use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScribeError};

/// Upper bound for the jitter window (one day either side).
pub const MAX_JITTER_MINUTES: u32 = 24 * 60;

/// How often a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Only runs when triggered by hand; never has a `next_run_at`.
    Manual,
    /// Runs a single time, as soon as possible.
    Once,
    Daily,
    /// Runs on `schedule_day` (1 = Monday … 7 = Sunday).
    Weekly,
    /// Runs on `schedule_day` of the month (1–31, clamped to the month's length).
    Monthly,
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleType::Manual => "manual",
            ScheduleType::Once => "once",
            ScheduleType::Daily => "daily",
            ScheduleType::Weekly => "weekly",
            ScheduleType::Monthly => "monthly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ScheduleType::Manual),
            "once" => Ok(ScheduleType::Once),
            "daily" => Ok(ScheduleType::Daily),
            "weekly" => Ok(ScheduleType::Weekly),
            "monthly" => Ok(ScheduleType::Monthly),
            other => Err(format!("unknown schedule type: {other}")),
        }
    }
}

/// Lifecycle state of a job definition (not of a single run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Paused,
    /// A `once` job after its single execution.
    Completed,
    /// The stored schedule could not be evaluated; needs operator attention.
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A recurring content-production definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUIDv7 string — primary key.
    pub id: String,
    pub name: String,
    pub site_id: String,
    pub category_id: String,
    pub prompt_id: String,
    /// Provider label forwarded to the generator (e.g. `"openai"`).
    pub ai_provider: String,
    pub ai_model: String,
    /// When set, runs pause in `pending_validation` until a human decides.
    pub requires_validation: bool,
    pub schedule_type: ScheduleType,
    /// Time of day as `HH:MM` (24h, UTC).
    pub schedule_time: Option<String>,
    /// Day of week (1–7) for weekly jobs, day of month (1–31) for monthly jobs.
    pub schedule_day: Option<u32>,
    pub jitter_enabled: bool,
    pub jitter_minutes: u32,
    pub status: JobStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// New active job with no jitter, no validation and no run history.
    pub fn new(
        name: &str,
        site_id: &str,
        category_id: &str,
        prompt_id: &str,
        schedule_type: ScheduleType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            site_id: site_id.to_string(),
            category_id: category_id.to_string(),
            prompt_id: prompt_id.to_string(),
            ai_provider: "openai".to_string(),
            ai_model: String::new(),
            requires_validation: false,
            schedule_type,
            schedule_time: None,
            schedule_day: None,
            jitter_enabled: false,
            jitter_minutes: 0,
            status: JobStatus::Active,
            last_run_at: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the schedule fields against the job's schedule type.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScribeError::Validation("job name must not be empty".into()));
        }
        match self.schedule_type {
            ScheduleType::Weekly => match self.schedule_day {
                Some(day) if (1..=7).contains(&day) => {}
                Some(day) => {
                    return Err(ScribeError::Validation(format!(
                        "weekly schedule day must be in 1..=7, got {day}"
                    )))
                }
                None => {
                    return Err(ScribeError::Validation(
                        "weekly schedule requires a schedule day".into(),
                    ))
                }
            },
            ScheduleType::Monthly => match self.schedule_day {
                Some(day) if (1..=31).contains(&day) => {}
                Some(day) => {
                    return Err(ScribeError::Validation(format!(
                        "monthly schedule day must be in 1..=31, got {day}"
                    )))
                }
                None => {
                    return Err(ScribeError::Validation(
                        "monthly schedule requires a schedule day".into(),
                    ))
                }
            },
            _ => {}
        }
        self.time_of_day()?;
        if self.jitter_minutes > MAX_JITTER_MINUTES {
            return Err(ScribeError::Validation(format!(
                "jitter must be at most {MAX_JITTER_MINUTES} minutes, got {}",
                self.jitter_minutes
            )));
        }
        Ok(())
    }

    /// Parsed `schedule_time`, if one is configured.
    pub fn time_of_day(&self) -> Result<Option<NaiveTime>> {
        self.schedule_time
            .as_deref()
            .map(parse_time_of_day)
            .transpose()
    }

    pub fn is_manual(&self) -> bool {
        self.schedule_type == ScheduleType::Manual
    }

    /// True when the job's schedule-defining fields differ from `other`.
    pub fn schedule_changed(&self, other: &Job) -> bool {
        self.schedule_type != other.schedule_type
            || self.schedule_time != other.schedule_time
            || self.schedule_day != other.schedule_day
            || self.jitter_enabled != other.jitter_enabled
            || self.jitter_minutes != other.jitter_minutes
    }
}

/// Parse a `HH:MM` time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ScribeError::Validation(format!("schedule time must be HH:MM, got {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(schedule_type: ScheduleType, day: Option<u32>) -> Job {
        let mut job = Job::new("weekly digest", "site", "cat", "prompt", schedule_type);
        job.schedule_day = day;
        job
    }

    #[test]
    fn weekly_requires_day_in_range() {
        assert!(job(ScheduleType::Weekly, Some(1)).validate().is_ok());
        assert!(job(ScheduleType::Weekly, Some(7)).validate().is_ok());
        for bad in [None, Some(0), Some(8)] {
            let err = job(ScheduleType::Weekly, bad).validate().unwrap_err();
            assert!(matches!(err, ScribeError::Validation(_)), "day {bad:?}");
        }
    }

    #[test]
    fn monthly_requires_day_in_range() {
        assert!(job(ScheduleType::Monthly, Some(31)).validate().is_ok());
        for bad in [None, Some(0), Some(32)] {
            let err = job(ScheduleType::Monthly, bad).validate().unwrap_err();
            assert!(matches!(err, ScribeError::Validation(_)), "day {bad:?}");
        }
    }

    #[test]
    fn daily_ignores_day() {
        assert!(job(ScheduleType::Daily, None).validate().is_ok());
    }

    #[test]
    fn bad_time_of_day_is_rejected() {
        let mut j = job(ScheduleType::Daily, None);
        j.schedule_time = Some("25:00".into());
        assert!(matches!(j.validate(), Err(ScribeError::Validation(_))));
        j.schedule_time = Some("09:30".into());
        assert_eq!(
            j.time_of_day().unwrap(),
            Some(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
    }

    #[test]
    fn status_roundtrips_through_str() {
        for s in ["active", "paused", "completed", "error"] {
            let status: JobStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("running".parse::<JobStatus>().is_err());
    }
}
