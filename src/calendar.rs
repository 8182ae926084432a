use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Ms;

const NOON_MS: Ms = 12 * 3_600_000;

/// One calendar day in the property calendar, rendered as `YYYY-MM-DD`.
///
/// Ordering of tokens matches ordering of their string form, so sets of tokens
/// sort chronologically whichever representation is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayToken(NaiveDate);

impl DayToken {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(DayToken)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whole days from `self` to `later` (negative if `later` is earlier).
    pub fn days_until(&self, later: DayToken) -> i64 {
        (later.0 - self.0).num_days()
    }
}

impl fmt::Display for DayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDayToken(pub String);

impl fmt::Display for InvalidDayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid day token {:?}, expected YYYY-MM-DD", self.0)
    }
}

impl std::error::Error for InvalidDayToken {}

impl FromStr for DayToken {
    type Err = InvalidDayToken;

    /// Strict parse: only the canonical zero-padded form is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| InvalidDayToken(s.to_string()))?;
        let token = DayToken(date);
        if token.to_string() != s {
            return Err(InvalidDayToken(s.to_string()));
        }
        Ok(token)
    }
}

impl TryFrom<String> for DayToken {
    type Error = InvalidDayToken;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DayToken> for String {
    fn from(token: DayToken) -> Self {
        token.to_string()
    }
}

/// The property calendar: a single fixed UTC offset that decides which
/// calendar day an instant belongs to and when local noon falls.
///
/// Ledger writes, availability checks, sweeps and the unavailable-days query
/// all derive days through the same `Calendar` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Offset of the host at the time of the call.
    pub fn host_local() -> Self {
        Self::new(*chrono::Local::now().offset())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day of `at` in the property offset. `None` if `at` is outside
    /// the range chrono can represent.
    pub fn day_of(&self, at: Ms) -> Option<DayToken> {
        DateTime::from_timestamp_millis(at)
            .map(|utc| DayToken(utc.with_timezone(&self.offset).date_naive()))
    }

    /// Number of nights covered by `[check_in, check_out)`: the difference of
    /// their calendar days, never negative.
    pub fn nights_between(&self, check_in: Ms, check_out: Ms) -> i64 {
        match (self.day_of(check_in), self.day_of(check_out)) {
            (Some(first), Some(end)) => first.days_until(end).max(0),
            _ => 0,
        }
    }

    /// Ordered, de-duplicated day tokens from check-in's day up to but
    /// excluding check-out's day. Empty when `check_out` is not on a later day.
    pub fn days_between(&self, check_in: Ms, check_out: Ms) -> Vec<DayToken> {
        let (Some(first), Some(end)) = (self.day_of(check_in), self.day_of(check_out)) else {
            return Vec::new();
        };
        first
            .0
            .iter_days()
            .take_while(|d| *d < end.0)
            .map(DayToken)
            .collect()
    }

    /// Instant of local midnight starting `day`.
    pub fn midnight_of(&self, day: DayToken) -> Ms {
        let naive_ms = day.0.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        naive_ms - Ms::from(self.offset.local_minus_utc()) * 1000
    }

    /// Instant of local noon on `day` (the check-in / check-out checkpoint).
    pub fn noon_of(&self, day: DayToken) -> Ms {
        self.midnight_of(day) + NOON_MS
    }

    /// True once wall-clock `now` has reached local noon of `day`.
    pub fn is_past_noon(&self, now: Ms, day: DayToken) -> bool {
        now >= self.noon_of(day)
    }

    /// Day tokens in `[from, to)`.
    pub fn days_in(&self, from: DayToken, to: DayToken) -> Vec<DayToken> {
        from.0.iter_days().take_while(|d| *d < to.0).map(DayToken).collect()
    }
}
