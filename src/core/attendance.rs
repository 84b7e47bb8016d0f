//! Attendance store queries and the status-toggle state machine.
//!
//! Each (student, day) pair is either unmarked or marked with one status. Selecting a
//! status moves it along:
//!
//! | current      | selection      | result                          |
//! |--------------|----------------|---------------------------------|
//! | unmarked     | `Some(s)`      | insert, marked `s`              |
//! | marked `s`   | `Some(s)`      | delete, unmarked                |
//! | marked `s1`  | `Some(s2)`     | update status, marked `s2`      |
//! | marked `s`   | `None`         | delete, unmarked                |
//! | unmarked     | `None`         | nothing                         |
//!
//! Updates and deletes only apply if the row still carries the status that was read when
//! the transition was planned. Otherwise the write fails with [`Error::StaleRecord`].

use crate::{
    core::{
        calendar::OrgCalendar,
        permissions::{self, Actor},
        roster,
        status::AttendanceStatus,
    },
    entities::{Attendance, attendance},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// State of one (student, day) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "status", rename_all = "snake_case")]
pub enum MarkState {
    /// No record
    Unmarked,
    /// A record with this status
    Marked(AttendanceStatus),
}

/// A write decided by [`plan_transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Create a record with this status
    Insert(AttendanceStatus),
    /// Change the status of an existing record
    Update {
        /// Record to change
        id: String,
        /// Stored status at planning time
        observed: String,
        /// New status
        to: AttendanceStatus,
    },
    /// Remove an existing record
    Delete {
        /// Record to remove
        id: String,
        /// Stored status at planning time
        observed: String,
    },
    /// Clear requested on an unmarked pair
    Nothing,
}

/// Decides the write for a selection given the day's existing record.
///
/// An existing record with an unrecognized status is treated as marked with a
/// status different from any selection, so selecting a status overwrites it.
#[must_use]
pub fn plan_transition(
    existing: Option<&attendance::Model>,
    selection: Option<AttendanceStatus>,
) -> Plan {
    match (existing, selection) {
        (None, None) => Plan::Nothing,
        (None, Some(status)) => Plan::Insert(status),
        (Some(record), None) => Plan::Delete {
            id: record.id.clone(),
            observed: record.status.clone(),
        },
        (Some(record), Some(status)) => {
            if AttendanceStatus::parse_stored(&record.status).ok() == Some(status) {
                Plan::Delete {
                    id: record.id.clone(),
                    observed: record.status.clone(),
                }
            } else {
                Plan::Update {
                    id: record.id.clone(),
                    observed: record.status.clone(),
                    to: status,
                }
            }
        }
    }
}

// ---------------------------------------------------------------- queries

async fn records_between<C>(
    db: &C,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    student_id: Option<&str>,
) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Attendance::find()
        .filter(attendance::Column::CheckInAt.gte(start))
        .filter(attendance::Column::CheckInAt.lte(end))
        .order_by_asc(attendance::Column::CheckInAt)
        .order_by_asc(attendance::Column::Id);
    if let Some(student_id) = student_id {
        query = query.filter(attendance::Column::StudentId.eq(student_id));
    }
    query.all(db).await.map_err(Into::into)
}

/// Every record whose check-in falls on one local day.
pub async fn records_for_day<C>(
    db: &C,
    calendar: &OrgCalendar,
    date: NaiveDate,
) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    let (start, end) = calendar.day_bounds(date);
    records_between(db, start, end, None).await
}

/// Every record in one local year, optionally for one student only.
pub async fn records_for_year<C>(
    db: &C,
    calendar: &OrgCalendar,
    year: i32,
    student_id: Option<&str>,
) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    let (start, end) = calendar.year_bounds(year)?;
    records_between(db, start, end, student_id).await
}

/// Every record of one student, oldest first.
pub async fn records_for_student<C>(db: &C, student_id: &str) -> Result<Vec<attendance::Model>>
where
    C: ConnectionTrait,
{
    Attendance::find()
        .filter(attendance::Column::StudentId.eq(student_id))
        .order_by_asc(attendance::Column::CheckInAt)
        .order_by_asc(attendance::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The record of a student on a day. With duplicates the latest one is used.
pub async fn find_day_record<C>(
    db: &C,
    calendar: &OrgCalendar,
    student_id: &str,
    date: NaiveDate,
) -> Result<Option<attendance::Model>>
where
    C: ConnectionTrait,
{
    let (start, end) = calendar.day_bounds(date);
    let mut records = records_between(db, start, end, Some(student_id)).await?;
    if records.len() > 1 {
        warn!(
            student_id,
            %date,
            count = records.len(),
            "data integrity: duplicate records for one day"
        );
    }
    Ok(records.pop())
}

// ---------------------------------------------------------------- writes

/// Inserts one record as given. Used by import and by the mutator.
pub async fn insert_record<C>(
    db: &C,
    student_id: &str,
    check_in_at: DateTime<Utc>,
    status: AttendanceStatus,
) -> Result<attendance::Model>
where
    C: ConnectionTrait,
{
    let model = attendance::ActiveModel {
        id: Set(roster::new_id()),
        student_id: Set(student_id.to_string()),
        check_in_at: Set(check_in_at),
        status: Set(status.as_str().to_string()),
    };
    model.insert(db).await.map_err(Into::into)
}

async fn update_if_unchanged<C>(
    db: &C,
    id: &str,
    observed: &str,
    to: AttendanceStatus,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Attendance::update_many()
        .col_expr(attendance::Column::Status, Expr::value(to.as_str()))
        .filter(attendance::Column::Id.eq(id))
        .filter(attendance::Column::Status.eq(observed))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::StaleRecord { id: id.to_string() });
    }
    Ok(())
}

async fn delete_if_unchanged<C>(db: &C, id: &str, observed: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Attendance::delete_many()
        .filter(attendance::Column::Id.eq(id))
        .filter(attendance::Column::Status.eq(observed))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::StaleRecord { id: id.to_string() });
    }
    Ok(())
}

/// Carries out a plan for (student, date) and returns the resulting state.
///
/// # Errors
/// [`Error::StaleRecord`] when the record changed or vanished since the plan was made.
pub async fn apply_plan<C>(
    db: &C,
    calendar: &OrgCalendar,
    student_id: &str,
    date: NaiveDate,
    plan: Plan,
    now: DateTime<Utc>,
) -> Result<MarkState>
where
    C: ConnectionTrait,
{
    match plan {
        Plan::Nothing => Ok(MarkState::Unmarked),
        Plan::Insert(status) => {
            let check_in_at = calendar.check_in_instant(date, now);
            let record = insert_record(db, student_id, check_in_at, status).await?;
            debug!(record_id = %record.id, %status, "Attendance recorded");
            Ok(MarkState::Marked(status))
        }
        Plan::Update { id, observed, to } => {
            update_if_unchanged(db, &id, &observed, to).await?;
            debug!(record_id = %id, from = %observed, %to, "Attendance changed");
            Ok(MarkState::Marked(to))
        }
        Plan::Delete { id, observed } => {
            delete_if_unchanged(db, &id, &observed).await?;
            debug!(record_id = %id, "Attendance cleared");
            Ok(MarkState::Unmarked)
        }
    }
}

/// Applies a status selection for one student on one day.
///
/// `None` clears the day. Re-selecting the current status also clears it.
#[instrument(skip(db, calendar, actor))]
pub async fn select_status<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    student_id: &str,
    date: NaiveDate,
    selection: Option<AttendanceStatus>,
    now: DateTime<Utc>,
) -> Result<MarkState>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_check_attendance(actor), "check attendance")?;
    roster::require_student(db, student_id).await?;

    let existing = find_day_record(db, calendar, student_id, date).await?;
    let plan = plan_transition(existing.as_ref(), selection);
    let state = apply_plan(db, calendar, student_id, date, plan, now).await?;
    info!(?state, "Attendance updated");
    Ok(state)
}

/// Single-tap check-in: marks present when unmarked, otherwise clears the day.
pub async fn toggle_present<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    student_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<MarkState>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_check_attendance(actor), "check attendance")?;
    roster::require_student(db, student_id).await?;

    let plan = match find_day_record(db, calendar, student_id, date).await? {
        Some(record) => Plan::Delete {
            id: record.id,
            observed: record.status,
        },
        None => Plan::Insert(AttendanceStatus::Present),
    };
    apply_plan(db, calendar, student_id, date, plan, now).await
}
