//! Submission timeliness classification
//!
//! Maps a submission instant and a deadline to ON_TIME / LATE / OVERDUE.
//! The formal deadline is inclusive; the grace period extends acceptance as
//! LATE; past the effective deadline only `lock_after_deadline` makes a
//! submission OVERDUE. `allow_late` never takes part.

use crate::models::Deadline;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of classifying a submission against a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    OnTime,
    Late,
    Overdue,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTime => "ON_TIME",
            Self::Late => "LATE",
            Self::Overdue => "OVERDUE",
        }
    }

    /// Parse the stored representation; unknown values read as ON_TIME
    pub fn from_stored(s: &str) -> Self {
        match s {
            "LATE" => Self::Late,
            "OVERDUE" => Self::Overdue,
            _ => Self::OnTime,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deadline whose `deadline_at` cannot be turned into an instant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("Deadline {deadline_id} has no deadline_at")]
    MissingDeadline { deadline_id: String },

    #[error("Deadline {deadline_id} has unparseable deadline_at '{value}'")]
    UnparseableDeadline { deadline_id: String, value: String },

    #[error("Deadline {deadline_id} has unknown timezone '{timezone}'")]
    UnknownTimezone { deadline_id: String, timezone: String },

    #[error("Deadline {deadline_id} has negative grace period ({minutes} minutes)")]
    NegativeGrace { deadline_id: String, minutes: i64 },
}

/// Resolved enforcement window of a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelinessWindow {
    pub deadline_at: DateTime<Utc>,
    pub grace: Duration,
    pub lock_after_deadline: bool,
}

impl TimelinessWindow {
    pub fn new(deadline_at: DateTime<Utc>, grace_period_minutes: i64, lock_after_deadline: bool) -> Self {
        Self {
            deadline_at,
            grace: Duration::minutes(grace_period_minutes.clamp(0, i64::from(i32::MAX))),
            lock_after_deadline,
        }
    }

    /// deadline_at + grace period
    pub fn effective_deadline(&self) -> DateTime<Utc> {
        self.deadline_at
            .checked_add_signed(self.grace)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the formal deadline has passed at `now`
    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline_at
    }

    /// Resolve the window of a deadline row
    pub fn from_deadline(deadline: &Deadline) -> Result<Self, ClassificationError> {
        if deadline.grace_period_minutes < 0 {
            return Err(ClassificationError::NegativeGrace {
                deadline_id: deadline.deadline_id.clone(),
                minutes: deadline.grace_period_minutes,
            });
        }

        let raw = deadline
            .deadline_at
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClassificationError::MissingDeadline {
                deadline_id: deadline.deadline_id.clone(),
            })?;

        let deadline_at = parse_deadline_at(&deadline.deadline_id, raw, &deadline.timezone)?;

        Ok(Self::new(
            deadline_at,
            deadline.grace_period_minutes,
            deadline.lock_after_deadline,
        ))
    }
}

/// Classify a submission instant against a resolved window
pub fn classify(submitted_at: DateTime<Utc>, window: &TimelinessWindow) -> Verdict {
    if submitted_at <= window.deadline_at {
        Verdict::OnTime
    } else if submitted_at <= window.effective_deadline() {
        Verdict::Late
    } else if window.lock_after_deadline {
        Verdict::Overdue
    } else {
        Verdict::Late
    }
}

/// Classify against a deadline row
///
/// Unpublished deadlines are not enforced and always yield ON_TIME.
pub fn classify_deadline(
    submitted_at: DateTime<Utc>,
    deadline: &Deadline,
) -> Result<Verdict, ClassificationError> {
    if !deadline.is_published {
        return Ok(Verdict::OnTime);
    }
    let window = TimelinessWindow::from_deadline(deadline)?;
    Ok(classify(submitted_at, &window))
}

/// Display-only classification; fails closed to ON_TIME
pub fn classify_for_display(submitted_at: DateTime<Utc>, deadline: &Deadline) -> Verdict {
    classify_deadline(submitted_at, deadline).unwrap_or(Verdict::OnTime)
}

/// Parse a timezone as stored on a deadline (`UTC`, `Z`, or `+HH:MM`)
pub fn parse_timezone(timezone: &str) -> Option<FixedOffset> {
    let tz = timezone.trim();
    if tz.is_empty() || tz.eq_ignore_ascii_case("utc") || tz == "Z" {
        return FixedOffset::east_opt(0);
    }
    let offset = tz
        .strip_prefix("UTC")
        .or_else(|| tz.strip_prefix("GMT"))
        .unwrap_or(tz);
    offset.parse::<FixedOffset>().ok()
}

fn parse_deadline_at(
    deadline_id: &str,
    raw: &str,
    timezone: &str,
) -> Result<DateTime<Utc>, ClassificationError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }

    let offset = parse_timezone(timezone).ok_or_else(|| ClassificationError::UnknownTimezone {
        deadline_id: deadline_id.to_string(),
        timezone: timezone.to_string(),
    })?;

    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| ClassificationError::UnparseableDeadline {
            deadline_id: deadline_id.to_string(),
            value: raw.to_string(),
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ClassificationError::UnparseableDeadline {
            deadline_id: deadline_id.to_string(),
            value: raw.to_string(),
        })
}
