//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs, foreign-key cascades included.

use crate::entities::{Attendance, Class, Student, SystemState, Teacher};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

/// Used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/attendance.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the `SQLite` database named by `DATABASE_URL`.
///
/// Falls back to [`DEFAULT_DATABASE_URL`] if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables that do not exist yet.
///
/// Parents are created before children so the foreign keys resolve: classes, then
/// teachers and students, then attendance.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut class_table = schema.create_table_from_entity(Class);
    let mut teacher_table = schema.create_table_from_entity(Teacher);
    let mut student_table = schema.create_table_from_entity(Student);
    let mut attendance_table = schema.create_table_from_entity(Attendance);
    let mut system_state_table = schema.create_table_from_entity(SystemState);

    for table in [
        &mut class_table,
        &mut teacher_table,
        &mut student_table,
        &mut attendance_table,
        &mut system_state_table,
    ] {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    info!("Database tables ready");
    Ok(())
}
