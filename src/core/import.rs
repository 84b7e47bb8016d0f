//! Bulk import of attendance rows exported from another system.
//!
//! Rows carry raw strings. Each row is checked on its own, and a bad row is skipped
//! with a warning without stopping the batch.

use crate::{
    core::{attendance, calendar::OrgCalendar, roster, status::AttendanceStatus},
    entities::{Attendance, attendance as attendance_entity},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    /// Identifier from the source system, kept when present
    #[serde(default)]
    pub id: Option<String>,
    /// Student the row belongs to
    pub student_id: String,
    /// RFC 3339 timestamp
    pub check_in_at: String,
    /// Status label
    pub status: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows written as new records
    pub inserted: usize,
    /// Rows that overwrote the existing record of that day
    pub replaced: usize,
    /// Rows skipped
    pub rejected: usize,
}

/// Parses an RFC 3339 timestamp into UTC.
pub fn parse_check_in(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parses a JSON array of [`ImportRow`].
pub fn parse_rows(json: &str) -> Result<Vec<ImportRow>> {
    serde_json::from_str(json).map_err(Into::into)
}

/// Imports `rows` in one transaction.
///
/// A row replaces the record already stored for the same student and local day.
/// A row whose source id already belongs to a record on another day is skipped.
pub async fn import_rows<C>(
    db: &C,
    calendar: &OrgCalendar,
    rows: Vec<ImportRow>,
) -> Result<ImportReport>
where
    C: ConnectionTrait + TransactionTrait,
{
    let known: HashSet<String> = roster::list_students(db, None)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();

    let txn = db.begin().await?;
    let mut report = ImportReport::default();

    for (line, row) in rows.into_iter().enumerate() {
        let check_in_at = match parse_check_in(&row.check_in_at) {
            Ok(instant) => instant,
            Err(e) => {
                warn!(line, "data integrity: skipping row: {e}");
                report.rejected += 1;
                continue;
            }
        };
        let status = match AttendanceStatus::parse_stored(&row.status) {
            Ok(status) => status,
            Err(e) => {
                warn!(line, "data integrity: skipping row: {e}");
                report.rejected += 1;
                continue;
            }
        };
        if !known.contains(&row.student_id) {
            warn!(
                line,
                student_id = %row.student_id,
                "data integrity: skipping row for unknown student"
            );
            report.rejected += 1;
            continue;
        }

        let day = calendar.day_of(check_in_at);
        let existing = attendance::find_day_record(&txn, calendar, &row.student_id, day).await?;

        if let Some(id) = row.id.as_deref() {
            let taken = Attendance::find_by_id(id.to_string()).one(&txn).await?;
            let replacing_same = existing.as_ref().is_some_and(|e| e.id == id);
            if taken.is_some() && !replacing_same {
                warn!(line, record_id = id, "data integrity: skipping row with a taken id");
                report.rejected += 1;
                continue;
            }
        }

        if let Some(existing) = existing {
            Attendance::delete_by_id(existing.id).exec(&txn).await?;
            report.replaced += 1;
        } else {
            report.inserted += 1;
        }

        let model = attendance_entity::ActiveModel {
            id: Set(row.id.unwrap_or_else(roster::new_id)),
            student_id: Set(row.student_id),
            check_in_at: Set(check_in_at),
            status: Set(status.as_str().to_string()),
        };
        model.insert(&txn).await?;
    }

    txn.commit().await?;
    info!(
        inserted = report.inserted,
        replaced = report.replaced,
        rejected = report.rejected,
        "Attendance import finished"
    );
    Ok(report)
}
