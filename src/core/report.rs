//! View models for every screen that shows attendance.
//!
//! Each function loads what its view needs, builds an [`AttendanceIndex`] and hands it to
//! the rollup functions. A failed read degrades to an empty result with a warning so the
//! view can still render. Permission failures and missing entities are still errors.

use crate::{
    core::{
        attendance::{self, MarkState},
        calendar::{self, OrgCalendar},
        index::AttendanceIndex,
        permissions::{self, Actor},
        roster::{self, ClassGroup},
        rollup::{self, MonthSummary, StatusTally, StudentRow, StudentSummary, WeeklyRow},
        sequence::{RequestSequencer, RequestToken},
        status::AttendanceStatus,
    },
    entities::{class, student},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

fn or_empty<T: Default>(result: Result<T>, what: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!("Failed to load {what}, showing nothing: {e}");
        T::default()
    })
}

/// Head-teacher statistics for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadStatistics {
    /// Year shown
    pub year: i32,
    /// Class filter, `None` for every class
    pub class_id: Option<String>,
    /// One row per past-or-today Sunday, newest first
    pub weeks: Vec<WeeklyRow>,
    /// One row per student, most attended first
    pub students: Vec<StudentRow>,
}

/// Builds the weekly and per-student tables for `year`.
pub async fn head_statistics<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    year: i32,
    class_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<HeadStatistics>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_view_statistics(actor), "view statistics")?;

    let students = or_empty(roster::list_students(db, class_id).await, "students");
    let records = or_empty(
        attendance::records_for_year(db, calendar, year, None).await,
        "attendance",
    );
    let index = AttendanceIndex::build(calendar, records);
    let sessions = calendar::session_dates_for_year(year);
    let today = calendar.today(now);

    Ok(HeadStatistics {
        year,
        class_id: class_id.map(str::to_string),
        weeks: rollup::weekly_rollup(&sessions, &index, &students, today),
        students: rollup::student_rollup(&students, &index, &sessions, today),
    })
}

/// One student's year at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentCalendar {
    /// The student
    pub student: student::Model,
    /// Year shown
    pub year: i32,
    /// Year totals
    pub summary: StudentSummary,
    /// January through December
    pub months: Vec<MonthSummary>,
    /// Years the view offers, newest first
    pub year_options: Vec<i32>,
}

/// Builds the single-student calendar.
pub async fn student_calendar<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    student_id: &str,
    year: i32,
    year_option_count: usize,
    now: DateTime<Utc>,
) -> Result<StudentCalendar>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_view_attendance(actor), "view attendance")?;
    let student = roster::require_student(db, student_id).await?;
    let teacher_class = roster::actor_class_id(db, actor).await?;
    permissions::require(
        permissions::can_view_student(actor, teacher_class.as_deref(), &student.class_id),
        "view attendance",
    )?;

    let records = or_empty(
        attendance::records_for_year(db, calendar, year, Some(student_id)).await,
        "attendance",
    );
    let index = AttendanceIndex::build(calendar, records);
    let sessions = calendar::session_dates_for_year(year);
    let today = calendar.today(now);
    let cells = rollup::day_cells(&index, student_id, &sessions, today);

    Ok(StudentCalendar {
        summary: rollup::student_summary(&index, student_id, &sessions, today),
        months: rollup::month_summaries(&cells),
        year_options: calendar::year_options(today.year(), year_option_count),
        student,
        year,
    })
}

/// A student and their mark on the day being shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDay {
    /// The student
    pub student: student::Model,
    /// Their state for the day
    pub mark: MarkState,
}

fn student_days(
    index: &AttendanceIndex,
    date: NaiveDate,
    students: Vec<student::Model>,
) -> Vec<StudentDay> {
    students
        .into_iter()
        .map(|student| {
            let mark = index
                .status(&student.id, date)
                .map_or(MarkState::Unmarked, MarkState::Marked);
            StudentDay { student, mark }
        })
        .collect()
}

/// One class on one day, as a class teacher sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDaySheet {
    /// The class
    pub class: class::Model,
    /// Day shown
    pub date: NaiveDate,
    /// Students ordered by name
    pub students: Vec<StudentDay>,
    /// Counts per status
    pub tally: StatusTally,
}

/// Builds the day sheet of one class.
pub async fn class_day_sheet<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    class_id: &str,
    date: NaiveDate,
) -> Result<ClassDaySheet>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_view_attendance(actor), "view attendance")?;
    let Some(class) = roster::get_class(db, class_id).await? else {
        return Err(Error::ClassNotFound {
            id: class_id.to_string(),
        });
    };

    let students = or_empty(roster::list_students(db, Some(class_id)).await, "students");
    let records = or_empty(attendance::records_for_day(db, calendar, date).await, "attendance");
    let index = AttendanceIndex::build(calendar, records);
    let tally = rollup::tally_day(&index, date, &students);

    Ok(ClassDaySheet {
        class,
        date,
        students: student_days(&index, date, students),
        tally,
    })
}

/// Day sheet of the actor's own class.
pub async fn my_class_day_sheet<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    date: NaiveDate,
) -> Result<ClassDaySheet>
where
    C: ConnectionTrait,
{
    let Some(class_id) = roster::actor_class_id(db, actor).await? else {
        return Err(Error::denied("view own class"));
    };
    class_day_sheet(db, calendar, actor, &class_id, date).await
}

/// One class block of the check-in grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridGroup {
    /// The class
    pub class: class::Model,
    /// The class's teacher, if any
    pub teacher_name: Option<String>,
    /// Students ordered by name
    pub students: Vec<StudentDay>,
}

/// Every class on one day, for the head teacher's check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInGrid {
    /// Day shown
    pub date: NaiveDate,
    /// Classes ordered by name, empty classes left out
    pub groups: Vec<GridGroup>,
    /// Counts per status across every class
    pub tally: StatusTally,
}

/// Builds the check-in grid.
pub async fn check_in_grid<C>(
    db: &C,
    calendar: &OrgCalendar,
    actor: &Actor,
    date: NaiveDate,
) -> Result<CheckInGrid>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_check_attendance(actor), "check attendance")?;

    let groups: Vec<ClassGroup> = or_empty(roster::class_groups(db).await, "classes");
    let records = or_empty(attendance::records_for_day(db, calendar, date).await, "attendance");
    let index = AttendanceIndex::build(calendar, records);

    let everyone: Vec<student::Model> = groups
        .iter()
        .flat_map(|g| g.students.iter().cloned())
        .collect();
    let tally = rollup::tally_day(&index, date, &everyone);

    let groups = groups
        .into_iter()
        .map(|group| GridGroup {
            class: group.class,
            teacher_name: group.teacher_name,
            students: student_days(&index, date, group.students),
        })
        .collect();

    Ok(CheckInGrid { date, groups, tally })
}

/// Holds the check-in grid currently on screen.
///
/// A load that was overtaken by a newer one is dropped instead of replacing the newer
/// grid. Writes made through the cache reload the grid afterwards.
#[derive(Debug, Default)]
pub struct DaySheetCache {
    sequencer: RequestSequencer,
    current: RwLock<Option<CheckInGrid>>,
}

impl DaySheetCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a load.
    pub fn begin(&self) -> RequestToken {
        self.sequencer.issue()
    }

    /// Publishes a finished load. Returns `false` when a newer load has started.
    pub async fn publish(&self, token: RequestToken, grid: CheckInGrid) -> bool {
        let mut writer = self.current.write().await;
        let Some(grid) = self.sequencer.settle(token, grid) else {
            debug!(?token, "Dropping superseded grid");
            return false;
        };
        *writer = Some(grid);
        true
    }

    /// Loads the grid for `date`. `None` when the load was superseded.
    pub async fn load<C>(
        &self,
        db: &C,
        calendar: &OrgCalendar,
        actor: &Actor,
        date: NaiveDate,
    ) -> Result<Option<CheckInGrid>>
    where
        C: ConnectionTrait,
    {
        let token = self.begin();
        let grid = check_in_grid(db, calendar, actor, date).await?;
        if self.publish(token, grid.clone()).await {
            Ok(Some(grid))
        } else {
            Ok(None)
        }
    }

    /// The grid on screen, if any.
    pub async fn current(&self) -> Option<CheckInGrid> {
        self.current.read().await.clone()
    }

    /// Drops the grid on screen.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    async fn after_write<C>(
        &self,
        db: &C,
        calendar: &OrgCalendar,
        actor: &Actor,
        date: NaiveDate,
        outcome: Result<MarkState>,
    ) -> Result<MarkState>
    where
        C: ConnectionTrait,
    {
        self.invalidate().await;
        match outcome {
            Ok(state) => {
                self.load(db, calendar, actor, date).await?;
                Ok(state)
            }
            Err(e) => {
                error!("Attendance write failed: {e}");
                Err(e)
            }
        }
    }

    /// [`attendance::select_status`], then reloads the grid.
    #[allow(clippy::too_many_arguments)]
    pub async fn select_status<C>(
        &self,
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
        let outcome =
            attendance::select_status(db, calendar, actor, student_id, date, selection, now).await;
        self.after_write(db, calendar, actor, date, outcome).await
    }

    /// [`attendance::toggle_present`], then reloads the grid.
    pub async fn toggle_present<C>(
        &self,
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
        let outcome = attendance::toggle_present(db, calendar, actor, student_id, date, now).await;
        self.after_write(db, calendar, actor, date, outcome).await
    }
}

/// Generates a text bar for a rate, like `[██████░░░░] 60%`.
#[must_use]
pub fn format_rate_bar(rate: u8, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let rate = rate.min(100);
    let filled = (usize::from(rate) * length + 50) / 100;
    let empty = length.saturating_sub(filled);

    format!("[{}{}] {rate}%", "█".repeat(filled), "░".repeat(empty))
}

/// One line of the weekly table.
#[must_use]
pub fn format_weekly_row(row: &WeeklyRow) -> String {
    format!(
        "{} | {}/{} attended, {} absent, {} unrecorded | {}",
        row.date,
        row.attended,
        row.total,
        row.absent,
        row.unrecorded,
        format_rate_bar(row.rate, None)
    )
}

/// One line of the per-student table.
#[must_use]
pub fn format_student_row(row: &StudentRow) -> String {
    format!(
        "{} | {}/{} attended, {} absent | {}",
        row.student.name,
        row.attended,
        row.total,
        row.absent,
        format_rate_bar(row.rate, None)
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Sunday 2024-01-07, 14:00 local
    fn sunday_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 7, 5, 0, 0).unwrap()
    }

    #[test]
    fn test_format_rate_bar() {
        assert_eq!(format_rate_bar(100, None), "[██████████] 100%");
        assert_eq!(format_rate_bar(60, None), "[██████░░░░] 60%");
        assert_eq!(format_rate_bar(0, Some(4)), "[░░░░] 0%");
        assert_eq!(format_rate_bar(250, Some(2)), "[██] 100%");
    }

    #[tokio::test]
    async fn test_head_statistics_todays_row() -> Result<()> {
        let (db, class, _teacher, students) = setup_with_class(10).await?;
        for student in &students[..6] {
            create_test_record(&db, &student.id, "2024-01-07", "present").await?;
        }
        create_test_record(&db, &students[6].id, "2024-01-07", "absent").await?;

        let stats = head_statistics(
            &db,
            &OrgCalendar::default(),
            &Actor::head_teacher(),
            2024,
            Some(&class.id),
            sunday_afternoon(),
        )
        .await?;

        assert_eq!(
            stats.weeks,
            vec![WeeklyRow {
                date: date(2024, 1, 7),
                total: 10,
                attended: 6,
                absent: 1,
                unrecorded: 3,
                rate: 60,
            }]
        );
        assert_eq!(stats.students.len(), 10);
        assert_eq!(stats.students[0].attended, 1);
        assert_eq!(stats.students[9].attended, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_head_statistics_class_filter() -> Result<()> {
        let (db, class, _teacher, students) = setup_with_class(2).await?;
        let other = create_test_class(&db, "Birches").await?;
        let outsider = create_test_student(&db, "Outsider", &other.id).await?;
        create_test_record(&db, &students[0].id, "2024-01-07", "present").await?;
        create_test_record(&db, &outsider.id, "2024-01-07", "present").await?;

        let calendar = OrgCalendar::default();
        let head = Actor::head_teacher();
        let filtered = head_statistics(
            &db,
            &calendar,
            &head,
            2024,
            Some(&class.id),
            sunday_afternoon(),
        )
        .await?;
        assert_eq!(filtered.weeks[0].total, 2);
        assert_eq!(filtered.weeks[0].attended, 1);

        let all = head_statistics(&db, &calendar, &head, 2024, None, sunday_afternoon()).await?;
        assert_eq!(all.weeks[0].total, 3);
        assert_eq!(all.weeks[0].attended, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_head_statistics_requires_staff() -> Result<()> {
        let db = setup_test_db().await?;
        let result = head_statistics(
            &db,
            &OrgCalendar::default(),
            &Actor::teacher("t1", "Kim"),
            2024,
            None,
            sunday_afternoon(),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::PermissionDenied { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_failures_degrade_to_empty() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([
                DbErr::Custom("store unavailable".to_string()),
                DbErr::Custom("store unavailable".to_string()),
            ])
            .into_connection();

        let stats = head_statistics(
            &db,
            &OrgCalendar::default(),
            &Actor::admin(),
            2024,
            None,
            sunday_afternoon(),
        )
        .await?;
        assert!(stats.students.is_empty());
        assert_eq!(stats.weeks.len(), 1);
        assert_eq!(stats.weeks[0].total, 0);
        assert_eq!(stats.weeks[0].rate, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_student_calendar() -> Result<()> {
        let (db, _class, teacher, students) = setup_with_class(1).await?;
        let student = &students[0];
        for day in ["2024-01-07", "2024-01-14", "2024-01-21"] {
            create_test_record(&db, &student.id, day, "present").await?;
        }
        create_test_record(&db, &student.id, "2024-01-28", "absent").await?;
        // Thursday 2024-02-08
        let now = Utc.with_ymd_and_hms(2024, 2, 8, 3, 0, 0).unwrap();

        let view = student_calendar(
            &db,
            &OrgCalendar::default(),
            &Actor::teacher(&teacher.id, &teacher.name),
            &student.id,
            2024,
            5,
            now,
        )
        .await?;

        assert_eq!(
            view.summary,
            StudentSummary {
                attended: 3,
                absent: 1,
                unrecorded: 1,
                total: 5,
                rate: 60,
            }
        );
        assert_eq!(view.months.len(), 12);
        assert_eq!(view.months[0].attended, 3);
        assert_eq!(view.months[0].past, 4);
        assert_eq!(view.months[1].past, 1);
        assert_eq!(view.year_options, vec![2024, 2023, 2022, 2021, 2020]);
        Ok(())
    }

    #[tokio::test]
    async fn test_student_calendar_unknown_student() -> Result<()> {
        let db = setup_test_db().await?;
        let result = student_calendar(
            &db,
            &OrgCalendar::default(),
            &Actor::admin(),
            "ghost",
            2024,
            5,
            sunday_afternoon(),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::StudentNotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_student_calendar_limited_to_own_class() -> Result<()> {
        let (db, _class, teacher, students) = setup_with_class(1).await?;
        let other = create_test_class(&db, "Birches").await?;
        let outsider = create_test_student(&db, "Outsider", &other.id).await?;
        let calendar = OrgCalendar::default();
        let actor = Actor::teacher(&teacher.id, &teacher.name);

        let own = student_calendar(
            &db,
            &calendar,
            &actor,
            &students[0].id,
            2024,
            5,
            sunday_afternoon(),
        )
        .await?;
        assert_eq!(own.student.id, students[0].id);

        let result = student_calendar(
            &db,
            &calendar,
            &actor,
            &outsider.id,
            2024,
            5,
            sunday_afternoon(),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::PermissionDenied { .. }));

        // Staff see every class
        let staff = student_calendar(
            &db,
            &calendar,
            &Actor::head_teacher(),
            &outsider.id,
            2024,
            5,
            sunday_afternoon(),
        )
        .await?;
        assert_eq!(staff.student.id, outsider.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_my_class_day_sheet() -> Result<()> {
        let (db, class, teacher, students) = setup_with_class(3).await?;
        create_test_record(&db, &students[0].id, "2024-01-07", "present").await?;
        create_test_record(&db, &students[1].id, "2024-01-07", "early-leave").await?;

        let sheet = my_class_day_sheet(
            &db,
            &OrgCalendar::default(),
            &Actor::teacher(&teacher.id, &teacher.name),
            date(2024, 1, 7),
        )
        .await?;

        assert_eq!(sheet.class.id, class.id);
        assert_eq!(sheet.students[0].mark, MarkState::Marked(AttendanceStatus::Present));
        assert_eq!(sheet.students[1].mark, MarkState::Marked(AttendanceStatus::EarlyLeave));
        assert_eq!(sheet.students[2].mark, MarkState::Unmarked);
        assert_eq!(sheet.tally.checked, 2);
        assert_eq!(sheet.tally.early_leave, 1);

        let calendar = OrgCalendar::default();
        let result = my_class_day_sheet(&db, &calendar, &Actor::admin(), date(2024, 1, 7)).await;
        assert!(matches!(result.unwrap_err(), Error::PermissionDenied { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_check_in_grid_groups_classes() -> Result<()> {
        let (db, _class, _teacher, students) = setup_with_class(2).await?;
        let other = create_test_class(&db, "Birches").await?;
        let outsider = create_test_student(&db, "Outsider", &other.id).await?;
        create_test_class(&db, "Empty").await?;
        create_test_record(&db, &students[0].id, "2024-01-07", "present").await?;
        create_test_record(&db, &outsider.id, "2024-01-07", "late").await?;

        let head = Actor::head_teacher();
        let grid = check_in_grid(&db, &OrgCalendar::default(), &head, date(2024, 1, 7)).await?;

        assert_eq!(grid.groups.len(), 2);
        assert_eq!(grid.groups[1].class.name, "Birches");
        assert!(grid.groups[1].teacher_name.is_none());
        assert_eq!(grid.tally.present, 1);
        assert_eq!(grid.tally.late, 1);
        assert_eq!(grid.tally.checked, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_drops_superseded_load() -> Result<()> {
        let (db, _class, _teacher, _students) = setup_with_class(1).await?;
        let calendar = OrgCalendar::default();
        let head = Actor::head_teacher();
        let cache = DaySheetCache::new();

        let older = cache.begin();
        let newer = cache.begin();
        let jan_14 = check_in_grid(&db, &calendar, &head, date(2024, 1, 14)).await?;
        let jan_7 = check_in_grid(&db, &calendar, &head, date(2024, 1, 7)).await?;

        assert!(cache.publish(newer, jan_14).await);
        // The slow response for the earlier selection arrives last
        assert!(!cache.publish(older, jan_7).await);
        assert_eq!(cache.current().await.unwrap().date, date(2024, 1, 14));
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_reloads_after_write() -> Result<()> {
        let (db, _class, _teacher, students) = setup_with_class(1).await?;
        let calendar = OrgCalendar::default();
        let head = Actor::head_teacher();
        let cache = DaySheetCache::new();
        let day = date(2024, 1, 7);

        cache.load(&db, &calendar, &head, day).await?;
        assert_eq!(cache.current().await.unwrap().tally.checked, 0);

        let state = cache
            .toggle_present(&db, &calendar, &head, &students[0].id, day, sunday_afternoon())
            .await?;
        assert_eq!(state, MarkState::Marked(AttendanceStatus::Present));
        let grid = cache.current().await.unwrap();
        assert_eq!(grid.groups[0].students[0].mark, state);

        let denied = cache
            .select_status(
                &db,
                &calendar,
                &Actor::admin(),
                &students[0].id,
                day,
                None,
                sunday_afternoon(),
            )
            .await;
        assert!(matches!(denied.unwrap_err(), Error::PermissionDenied { .. }));
        assert!(cache.current().await.is_none());
        Ok(())
    }
}
