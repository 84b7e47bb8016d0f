//! Session calendar - Sunday enumeration and the organization's local calendar day.
//!
//! Sessions happen every Sunday. Which calendar day an instant belongs to is decided by
//! a fixed UTC offset, never by the machine's local zone, so the same stored timestamp
//! always lands on the same day key.

use crate::errors::{Error, Result};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, Utc,
    Weekday,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A normalized `YYYY-MM-DD` calendar-day key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// The calendar date behind the key.
    #[must_use]
    pub const fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DayKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| Error::validation(format!("invalid day key {s:?}: {e}")))
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for DayKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// The organization's calendar: a fixed UTC offset plus the local hour used to anchor
/// entries made for a day other than today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgCalendar {
    offset: FixedOffset,
    anchor: NaiveTime,
}

impl Default for OrgCalendar {
    fn default() -> Self {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix());
        let anchor = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
        Self { offset, anchor }
    }
}

impl OrgCalendar {
    /// Builds a calendar for `UTC+offset_hours` with entries anchored at `anchor_hour:00`.
    ///
    /// # Errors
    /// Rejects offsets outside `-23..=23` and hours outside `0..=23`.
    pub fn new(offset_hours: i32, anchor_hour: u32) -> Result<Self> {
        let offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| Error::Config {
                message: format!("utc offset of {offset_hours} hours is out of range"),
            })?;
        let anchor = NaiveTime::from_hms_opt(anchor_hour, 0, 0).ok_or_else(|| Error::Config {
            message: format!("anchor hour {anchor_hour} is out of range"),
        })?;
        Ok(Self { offset, anchor })
    }

    /// The fixed offset that defines a local day.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn offset_delta(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))
    }

    /// Local calendar day of an instant: shift by the offset, then take the date.
    #[must_use]
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        (instant.naive_utc() + self.offset_delta()).date()
    }

    /// [`day_of`](Self::day_of) as a key.
    #[must_use]
    pub fn day_key(&self, instant: DateTime<Utc>) -> DayKey {
        DayKey(self.day_of(instant))
    }

    /// Today in the organization's calendar.
    #[must_use]
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.day_of(now)
    }

    /// Calendar-day comparison against `now`; time of day is ignored.
    #[must_use]
    pub fn is_past_or_today(&self, date: NaiveDate, now: DateTime<Utc>) -> bool {
        is_past_or_today(date, self.today(now))
    }

    /// Converts a local wall-clock time to the absolute instant.
    #[must_use]
    pub fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - self.offset_delta()).and_utc()
    }

    /// Inclusive instant range covering one local day.
    #[must_use]
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.local_to_utc(date.and_time(NaiveTime::MIN)),
            self.local_to_utc(date.and_time(end_of_day())),
        )
    }

    /// Inclusive instant range covering one local year.
    ///
    /// # Errors
    /// Returns a validation error for years chrono cannot represent.
    pub fn year_bounds(&self, year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let first = NaiveDate::from_ymd_opt(year, 1, 1);
        let last = NaiveDate::from_ymd_opt(year, 12, 31);
        match (first, last) {
            (Some(first), Some(last)) => Ok((
                self.local_to_utc(first.and_time(NaiveTime::MIN)),
                self.local_to_utc(last.and_time(end_of_day())),
            )),
            _ => Err(Error::validation(format!("year {year} is out of range"))),
        }
    }

    /// The anchor instant (`anchor_hour:00` local) of a day.
    #[must_use]
    pub fn anchor_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.local_to_utc(date.and_time(self.anchor))
    }

    /// Check-in instant for a new record: the current time when marking today,
    /// otherwise the day's anchor.
    #[must_use]
    pub fn check_in_instant(&self, date: NaiveDate, now: DateTime<Utc>) -> DateTime<Utc> {
        if date == self.today(now) {
            now
        } else {
            self.anchor_instant(date)
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// Whether a date is a session date.
#[must_use]
pub fn is_session_date(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

/// Every Sunday of `year`, ascending, from the first Sunday through December 31.
///
/// Future Sundays are included; callers filter with [`is_past_or_today`]. Years chrono
/// cannot represent yield an empty list.
#[must_use]
pub fn session_dates_for_year(year: i32) -> Vec<NaiveDate> {
    let Some(jan_first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };
    let to_sunday = (7 - jan_first.weekday().num_days_from_sunday()) % 7;
    let mut day = jan_first + TimeDelta::days(i64::from(to_sunday));

    let mut sundays = Vec::with_capacity(53);
    while day.year() == year {
        sundays.push(day);
        match day.checked_add_signed(TimeDelta::days(7)) {
            Some(next) => day = next,
            None => break,
        }
    }
    sundays
}

/// Calendar-day comparison: `date` is on or before `today`.
#[must_use]
pub fn is_past_or_today(date: NaiveDate, today: NaiveDate) -> bool {
    date <= today
}

/// The Sundays of `year` that are on or before `today`; the rate denominator.
#[must_use]
pub fn past_session_dates(year: i32, today: NaiveDate) -> Vec<NaiveDate> {
    session_dates_for_year(year)
        .into_iter()
        .filter(|d| is_past_or_today(*d, today))
        .collect()
}

/// The session dates that fall in `month` (1-12).
#[must_use]
pub fn sessions_in_month(sessions: &[NaiveDate], month: u32) -> Vec<NaiveDate> {
    sessions
        .iter()
        .copied()
        .filter(|d| d.month() == month)
        .collect()
}

/// Steps the selected date by `delta_days`. A step past `today` is refused and the
/// original date comes back unchanged.
#[must_use]
pub fn move_date(date: NaiveDate, delta_days: i64, today: NaiveDate) -> NaiveDate {
    match date.checked_add_signed(TimeDelta::days(delta_days)) {
        Some(next) if next <= today => next,
        _ => date,
    }
}

/// The `count` most recent years ending at `current_year`, newest first.
#[must_use]
pub fn year_options(current_year: i32, count: usize) -> Vec<i32> {
    (0..count)
        .map_while(|i| i32::try_from(i).ok().and_then(|i| current_year.checked_sub(i)))
        .collect()
}
