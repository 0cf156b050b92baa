use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use scribe_core::random::uniform_inclusive;
use scribe_core::{Job, Result, ScheduleType, ScribeError};

/// Compute the next UTC run of `job` as seen at `now`.
///
/// `manual` jobs and `once` jobs that already ran have no next run. Recurring
/// schedules always land strictly after `now` before jitter is applied; a job
/// without a configured time of day keeps the minute of `now`.
pub fn calculate_next_run(job: &Job, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let time = job
        .time_of_day()?
        .unwrap_or_else(|| minute_of(now));

    let base = match job.schedule_type {
        ScheduleType::Manual => return Ok(None),
        ScheduleType::Once => {
            return Ok(match job.last_run_at {
                None => Some(now),
                Some(_) => None,
            })
        }
        ScheduleType::Daily => next_daily(now, time),
        ScheduleType::Weekly => next_weekly(now, job.schedule_day.unwrap_or(1), time)?,
        ScheduleType::Monthly => next_monthly(now, job.schedule_day.unwrap_or(1), time)?,
    };

    Ok(Some(apply_jitter(job, base)?))
}

fn minute_of(now: DateTime<Utc>) -> NaiveTime {
    NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or_default()
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

fn next_daily(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    let today = at(now.date_naive(), time);
    if today > now {
        today
    } else {
        // Today's slot has passed; advance to tomorrow.
        today + Duration::days(1)
    }
}

/// `day` is ISO numbering: 1 = Monday … 7 = Sunday.
fn next_weekly(now: DateTime<Utc>, day: u32, time: NaiveTime) -> Result<DateTime<Utc>> {
    if !(1..=7).contains(&day) {
        return Err(ScribeError::Validation(format!(
            "weekly schedule day must be in 1..=7, got {day}"
        )));
    }
    let today_dow = now.weekday().number_from_monday() as i64;
    let days_ahead = (day as i64 - today_dow).rem_euclid(7);
    let candidate = at(now.date_naive() + Duration::days(days_ahead), time);
    if candidate > now {
        Ok(candidate)
    } else {
        // Same weekday, slot already passed.
        Ok(candidate + Duration::days(7))
    }
}

fn next_monthly(now: DateTime<Utc>, day: u32, time: NaiveTime) -> Result<DateTime<Utc>> {
    if !(1..=31).contains(&day) {
        return Err(ScribeError::Validation(format!(
            "monthly schedule day must be in 1..=31, got {day}"
        )));
    }
    let this_month = at(clamped_date(now.year(), now.month(), day)?, time);
    if this_month > now {
        return Ok(this_month);
    }
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Ok(at(clamped_date(year, month, day)?, time))
}

/// `day` in the given month, stepping back to the month's last valid day.
fn clamped_date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .ok_or_else(|| ScribeError::Internal(format!("no valid day in {year}-{month:02}")))
}

/// Uniform offset in `[-jitter, +jitter]` minutes. `once` runs are never jittered.
fn apply_jitter(job: &Job, base: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if !job.jitter_enabled || job.jitter_minutes == 0 || job.schedule_type == ScheduleType::Once {
        return Ok(base);
    }
    let max = job.jitter_minutes as i64;
    let offset = uniform_inclusive(-max, max)?;
    Ok(base + Duration::minutes(offset))
}
