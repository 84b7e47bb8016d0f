//! Attendance index - lookups over a batch of attendance records.
//!
//! Records are bucketed by the organization-local day of `check_in_at` and by student.
//! Anomalies (two records for one student on one day, or a status outside the known set)
//! are kept and logged as data-integrity warnings rather than rejected.

use crate::core::calendar::{DayKey, OrgCalendar};
use crate::core::status::AttendanceStatus;
use crate::entities::attendance;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// One record together with its parsed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    /// The stored record
    pub record: attendance::Model,
    /// `None` when the stored status is not one of the known values
    pub status: Option<AttendanceStatus>,
}

/// Lookup tables built from one query's worth of records.
#[derive(Debug, Clone, Default)]
pub struct AttendanceIndex {
    by_date_key: HashMap<DayKey, HashMap<String, IndexedRecord>>,
    by_student_id: HashMap<String, Vec<attendance::Model>>,
}

impl AttendanceIndex {
    /// Indexes `records` using `calendar` to derive day keys.
    ///
    /// When a student has several records on one day the last one seen wins.
    pub fn build<I>(calendar: &OrgCalendar, records: I) -> Self
    where
        I: IntoIterator<Item = attendance::Model>,
    {
        let mut index = Self::default();
        for record in records {
            let key = calendar.day_key(record.check_in_at);
            let status = match AttendanceStatus::parse_stored(&record.status) {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!(record_id = %record.id, "data integrity: {e}; counted as unrecorded");
                    None
                }
            };

            index
                .by_student_id
                .entry(record.student_id.clone())
                .or_default()
                .push(record.clone());

            let day = index.by_date_key.entry(key).or_default();
            if let Some(previous) = day.get(&record.student_id) {
                warn!(
                    student_id = %record.student_id,
                    day = %key,
                    replaced = %previous.record.id,
                    kept = %record.id,
                    "data integrity: duplicate records for one day"
                );
            }
            day.insert(record.student_id.clone(), IndexedRecord { record, status });
        }
        index
    }

    /// The record for a student on a day, if any.
    #[must_use]
    pub fn record(&self, student_id: &str, day: NaiveDate) -> Option<&IndexedRecord> {
        self.by_date_key
            .get(&DayKey::from(day))
            .and_then(|students| students.get(student_id))
    }

    /// The parsed status for a student on a day; `None` when unrecorded or unknown.
    #[must_use]
    pub fn status(&self, student_id: &str, day: NaiveDate) -> Option<AttendanceStatus> {
        self.record(student_id, day).and_then(|entry| entry.status)
    }

    /// Every record on a day, keyed by student id.
    #[must_use]
    pub fn records_on(&self, day: NaiveDate) -> Option<&HashMap<String, IndexedRecord>> {
        self.by_date_key.get(&DayKey::from(day))
    }

    /// A student's records in source order.
    #[must_use]
    pub fn for_student(&self, student_id: &str) -> &[attendance::Model] {
        self.by_student_id
            .get(student_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// One student's records keyed by day, as used by the calendar view.
    #[must_use]
    pub fn days_for_student(&self, student_id: &str) -> BTreeMap<DayKey, &IndexedRecord> {
        self.by_date_key
            .iter()
            .filter_map(|(key, students)| students.get(student_id).map(|entry| (*key, entry)))
            .collect()
    }

    /// Number of distinct (student, day) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_date_key.values().map(HashMap::len).sum()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_date_key.is_empty()
    }
}
