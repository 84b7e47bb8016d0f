//! Shared test utilities.
//!
//! This module provides helpers for setting up in-memory test databases and creating
//! roster and attendance rows with sensible defaults.

use crate::{
    core::{
        calendar::{DayKey, OrgCalendar},
        permissions::Actor,
        roster::{self, StudentContact, StudentFields, TeacherFields},
    },
    entities::{attendance, class, student, teacher},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds an attendance model without touching a database.
#[must_use]
pub fn record_at(
    id: &str,
    student_id: &str,
    check_in_at: DateTime<Utc>,
    status: &str,
) -> attendance::Model {
    attendance::Model {
        id: id.to_string(),
        student_id: student_id.to_string(),
        check_in_at,
        status: status.to_string(),
    }
}

/// Builds a student model without touching a database.
#[must_use]
pub fn student_model(id: &str, name: &str, class_id: &str) -> student::Model {
    student::Model {
        id: id.to_string(),
        name: name.to_string(),
        photo_url: None,
        class_id: class_id.to_string(),
        parent_name: None,
        parent_phone: None,
        address: None,
        memo: None,
    }
}

/// Creates a class as the administrator.
pub async fn create_test_class(db: &DatabaseConnection, name: &str) -> Result<class::Model> {
    roster::create_class(db, &Actor::admin(), name).await
}

/// Creates a teacher with no contact details.
pub async fn create_test_teacher(
    db: &DatabaseConnection,
    name: &str,
    class_id: &str,
) -> Result<teacher::Model> {
    roster::create_teacher(
        db,
        &Actor::admin(),
        TeacherFields {
            name: name.to_string(),
            class_id: class_id.to_string(),
            ..Default::default()
        },
    )
    .await
}

/// Creates a student with no contact details.
pub async fn create_test_student(
    db: &DatabaseConnection,
    name: &str,
    class_id: &str,
) -> Result<student::Model> {
    roster::create_student(
        db,
        &Actor::admin(),
        StudentFields {
            name: name.to_string(),
            class_id: class_id.to_string(),
            contact: StudentContact::default(),
        },
    )
    .await
}

/// Stores a record at the default calendar's anchor hour of `day` (`YYYY-MM-DD`).
///
/// The status is written verbatim, so unknown or legacy values can be seeded.
pub async fn create_test_record(
    db: &DatabaseConnection,
    student_id: &str,
    day: &str,
    status: &str,
) -> Result<attendance::Model> {
    let day: DayKey = day.parse()?;
    let model = attendance::ActiveModel {
        id: Set(roster::new_id()),
        student_id: Set(student_id.to_string()),
        check_in_at: Set(OrgCalendar::default().anchor_instant(day.date())),
        status: Set(status.to_string()),
    };
    Ok(model.insert(db).await?)
}

/// Creates a test database holding class "Acorns", its teacher and `students`
/// students named `Student 00`, `Student 01`, ...
pub async fn setup_with_class(
    students: usize,
) -> Result<(DatabaseConnection, class::Model, teacher::Model, Vec<student::Model>)> {
    let db = setup_test_db().await?;
    let class = create_test_class(&db, "Acorns").await?;
    let teacher = create_test_teacher(&db, "Teacher Kim", &class.id).await?;

    let mut created = Vec::with_capacity(students);
    for n in 0..students {
        created.push(create_test_student(&db, &format!("Student {n:02}"), &class.id).await?);
    }
    Ok((db, class, teacher, created))
}
