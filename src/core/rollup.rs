//! Attendance rollups - joins session dates against an [`AttendanceIndex`].
//!
//! Only past-or-today Sundays count. "Attended" means present or late, "absent" means
//! absent; every other case (no record, early leave, an unknown stored status) is
//! unrecorded. All functions are pure and framework-agnostic so each view can call them
//! with whatever scope it has loaded.

use crate::core::calendar::is_past_or_today;
use crate::core::index::AttendanceIndex;
use crate::core::status::AttendanceStatus;
use crate::entities::student;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// One session date of the weekly table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyRow {
    /// The Sunday
    pub date: NaiveDate,
    /// Students in scope
    pub total: usize,
    /// Present or late
    pub attended: usize,
    /// Absent
    pub absent: usize,
    /// Everyone else
    pub unrecorded: usize,
    /// `attended / total` as a rounded percentage
    pub rate: u8,
}

/// One student's totals for the year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRow {
    /// The student
    pub student: student::Model,
    /// Sundays attended
    pub attended: usize,
    /// Sundays absent
    pub absent: usize,
    /// Past-or-today Sundays in the year
    pub total: usize,
    /// `attended / total` as a rounded percentage
    pub rate: u8,
}

/// Totals for a single student, including the unrecorded count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StudentSummary {
    /// Sundays attended
    pub attended: usize,
    /// Sundays absent
    pub absent: usize,
    /// Sundays with no record at all
    pub unrecorded: usize,
    /// Past-or-today Sundays in the year
    pub total: usize,
    /// `attended / total` as a rounded percentage
    pub rate: u8,
}

/// How one session date renders on a student's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum DayMark {
    /// A record with a known status
    Marked(AttendanceStatus),
    /// Past or today with no usable record
    Unrecorded,
    /// After today
    Future,
}

/// A session date and its mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCell {
    /// The Sunday
    pub date: NaiveDate,
    /// Its classification
    pub mark: DayMark,
}

/// One month of a student's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    /// Month number, 1-12
    pub month: u32,
    /// The month's Sundays
    pub cells: Vec<DayCell>,
    /// Sundays attended this month
    pub attended: usize,
    /// Past-or-today Sundays this month
    pub past: usize,
}

/// Per-status counts for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusTally {
    /// Present
    pub present: usize,
    /// Late
    pub late: usize,
    /// Absent
    pub absent: usize,
    /// Left early
    pub early_leave: usize,
    /// Records whose status could not be parsed
    pub unknown: usize,
    /// Students with any record
    pub checked: usize,
}

impl StatusTally {
    /// Count for one status.
    #[must_use]
    pub const fn count(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Late => self.late,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::EarlyLeave => self.early_leave,
        }
    }
}

/// Rounded percentage (half up) of `numerator / denominator`, 0 when the
/// denominator is 0, never above 100.
#[must_use]
pub fn rate_percent(numerator: usize, denominator: usize) -> u8 {
    if denominator == 0 {
        return 0;
    }
    let numerator = numerator.min(denominator);
    let rounded = (numerator * 200 + denominator) / (denominator * 2);
    u8::try_from(rounded).unwrap_or(100)
}

/// Weekly table, newest first, over the past-or-today dates of `sessions`.
///
/// `students` is the scope: every student counted in `total`, and the only students
/// whose records are tallied.
#[must_use]
pub fn weekly_rollup(
    sessions: &[NaiveDate],
    index: &AttendanceIndex,
    students: &[student::Model],
    today: NaiveDate,
) -> Vec<WeeklyRow> {
    let total = students.len();
    let mut rows: Vec<WeeklyRow> = sessions
        .iter()
        .copied()
        .filter(|d| is_past_or_today(*d, today))
        .map(|date| {
            let mut attended = 0;
            let mut absent = 0;
            for student in students {
                match index.status(&student.id, date) {
                    Some(status) if status.is_attended() => attended += 1,
                    Some(AttendanceStatus::Absent) => absent += 1,
                    _ => {}
                }
            }
            WeeklyRow {
                date,
                total,
                attended,
                absent,
                unrecorded: total - (attended + absent),
                rate: rate_percent(attended, total),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows
}

/// Totals for one student over the past-or-today dates of `sessions`.
#[must_use]
pub fn student_summary(
    index: &AttendanceIndex,
    student_id: &str,
    sessions: &[NaiveDate],
    today: NaiveDate,
) -> StudentSummary {
    let mut summary = StudentSummary::default();
    for date in sessions.iter().copied().filter(|d| is_past_or_today(*d, today)) {
        summary.total += 1;
        match index.record(student_id, date) {
            None => summary.unrecorded += 1,
            Some(entry) => match entry.status {
                Some(status) if status.is_attended() => summary.attended += 1,
                Some(AttendanceStatus::Absent) => summary.absent += 1,
                _ => {}
            },
        }
    }
    summary.rate = rate_percent(summary.attended, summary.total);
    summary
}

/// Per-student table, most attended first. Ties keep the order of `students`.
#[must_use]
pub fn student_rollup(
    students: &[student::Model],
    index: &AttendanceIndex,
    sessions: &[NaiveDate],
    today: NaiveDate,
) -> Vec<StudentRow> {
    let mut rows: Vec<StudentRow> = students
        .iter()
        .map(|student| {
            let summary = student_summary(index, &student.id, sessions, today);
            StudentRow {
                student: student.clone(),
                attended: summary.attended,
                absent: summary.absent,
                total: summary.total,
                rate: summary.rate,
            }
        })
        .collect();
    // stable: equal counts stay in input order
    rows.sort_by(|a, b| b.attended.cmp(&a.attended));
    rows
}

/// Classifies every date of `sessions` for one student.
#[must_use]
pub fn day_cells(
    index: &AttendanceIndex,
    student_id: &str,
    sessions: &[NaiveDate],
    today: NaiveDate,
) -> Vec<DayCell> {
    sessions
        .iter()
        .map(|&date| {
            let mark = if !is_past_or_today(date, today) {
                DayMark::Future
            } else {
                index
                    .status(student_id, date)
                    .map_or(DayMark::Unrecorded, DayMark::Marked)
            };
            DayCell { date, mark }
        })
        .collect()
}

/// Groups calendar cells into the twelve months of the year, empty months included.
#[must_use]
pub fn month_summaries(cells: &[DayCell]) -> Vec<MonthSummary> {
    (1..=12)
        .map(|month| {
            let cells: Vec<DayCell> = cells
                .iter()
                .copied()
                .filter(|cell| cell.date.month() == month)
                .collect();
            let attended = cells
                .iter()
                .filter(|cell| matches!(cell.mark, DayMark::Marked(s) if s.is_attended()))
                .count();
            let past = cells
                .iter()
                .filter(|cell| cell.mark != DayMark::Future)
                .count();
            MonthSummary {
                month,
                cells,
                attended,
                past,
            }
        })
        .collect()
}

/// Counts the day's records for the students in scope.
#[must_use]
pub fn tally_day(
    index: &AttendanceIndex,
    day: NaiveDate,
    students: &[student::Model],
) -> StatusTally {
    let mut tally = StatusTally::default();
    for student in students {
        let Some(entry) = index.record(&student.id, day) else {
            continue;
        };
        tally.checked += 1;
        match entry.status {
            Some(AttendanceStatus::Present) => tally.present += 1,
            Some(AttendanceStatus::Late) => tally.late += 1,
            Some(AttendanceStatus::Absent) => tally.absent += 1,
            Some(AttendanceStatus::EarlyLeave) => tally.early_leave += 1,
            None => tally.unknown += 1,
        }
    }
    tally
}
