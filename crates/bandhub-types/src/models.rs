use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on occurrences generated for one recurring series.
pub const MAX_OCCURRENCES: usize = 104;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// -- Roles --

/// Role held through a membership row. The membership row is the only
/// place a role is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(alias = "member", alias = "MEMBER")]
    Member,
    #[serde(alias = "admin", alias = "ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "Member",
            Self::Admin => "Admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("member") {
            Ok(Self::Member)
        } else if s.eq_ignore_ascii_case("admin") {
            Ok(Self::Admin)
        } else {
            Err(ParseEnumError::new("role", s))
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- RSVPs --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsvpStatus {
    Yes,
    No,
    Maybe,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Maybe => "Maybe",
        }
    }

    /// Read-side mapping of a stored value. Older rows hold mixed-case or
    /// free-form values; anything unrecognized reads as `No`.
    pub fn normalize(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::No)
    }
}

impl FromStr for RsvpStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("yes") {
            Ok(Self::Yes)
        } else if s.eq_ignore_ascii_case("no") {
            Ok(Self::No)
        } else if s.eq_ignore_ascii_case("maybe") {
            Ok(Self::Maybe)
        } else {
            Err(ParseEnumError::new("RSVP status", s))
        }
    }
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Recurrence --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Start times of a series: `start`, then every `interval` steps up to
    /// and including `until`, never more than `cap` entries.
    ///
    /// Each occurrence is computed from `start` rather than from the previous
    /// occurrence, so a monthly series starting on the 31st lands on the last
    /// day of shorter months without drifting afterwards.
    pub fn occurrences(
        &self,
        start: DateTime<Utc>,
        interval: u32,
        until: DateTime<Utc>,
        cap: usize,
    ) -> Vec<DateTime<Utc>> {
        let interval = interval.max(1);
        let mut out = Vec::new();

        for k in 0..cap as u32 {
            let steps = k.saturating_mul(interval);
            let next = match self {
                Self::Daily => start.checked_add_signed(Duration::days(i64::from(steps))),
                Self::Weekly => start.checked_add_signed(Duration::weeks(i64::from(steps))),
                Self::Monthly => start.checked_add_months(Months::new(steps)),
            };
            match next {
                Some(at) if at <= until => out.push(at),
                _ => break,
            }
        }

        out
    }
}

impl FromStr for Recurrence {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(ParseEnumError::new("recurrence", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 19, 30, 0).unwrap()
    }

    #[test]
    fn rsvp_normalizes_case_and_whitespace() {
        assert_eq!(RsvpStatus::normalize("yes"), RsvpStatus::Yes);
        assert_eq!(RsvpStatus::normalize(" MAYBE "), RsvpStatus::Maybe);
        assert_eq!(RsvpStatus::normalize("No"), RsvpStatus::No);
    }

    #[test]
    fn unknown_rsvp_reads_as_no() {
        assert_eq!(RsvpStatus::normalize("attending"), RsvpStatus::No);
        assert_eq!(RsvpStatus::normalize(""), RsvpStatus::No);
        assert!("attending".parse::<RsvpStatus>().is_err());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("owner".parse::<Role>().is_err());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Member.is_admin());
    }

    #[test]
    fn role_deserializes_lowercase_alias() {
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"Member\"");
    }

    #[test]
    fn weekly_series_stops_at_until() {
        let dates = Recurrence::Weekly.occurrences(at(2026, 1, 5), 1, at(2026, 2, 2), MAX_OCCURRENCES);
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], at(2026, 1, 5));
        assert_eq!(*dates.last().unwrap(), at(2026, 2, 2));
    }

    #[test]
    fn daily_series_respects_interval() {
        let dates = Recurrence::Daily.occurrences(at(2026, 3, 1), 3, at(2026, 3, 10), MAX_OCCURRENCES);
        assert_eq!(dates, vec![at(2026, 3, 1), at(2026, 3, 4), at(2026, 3, 7), at(2026, 3, 10)]);
    }

    #[test]
    fn monthly_series_clamps_to_month_end() {
        let dates = Recurrence::Monthly.occurrences(at(2026, 1, 31), 1, at(2026, 4, 30), MAX_OCCURRENCES);
        assert_eq!(
            dates,
            vec![at(2026, 1, 31), at(2026, 2, 28), at(2026, 3, 31), at(2026, 4, 30)]
        );
    }

    #[test]
    fn series_is_capped() {
        let dates = Recurrence::Daily.occurrences(at(2026, 1, 1), 1, at(2030, 1, 1), 10);
        assert_eq!(dates.len(), 10);
    }

    #[test]
    fn until_before_start_yields_nothing() {
        let dates = Recurrence::Weekly.occurrences(at(2026, 6, 1), 1, at(2026, 5, 1), MAX_OCCURRENCES);
        assert!(dates.is_empty());
    }
}
