//! Attendance entity - One row per (student, organization-local day) by convention.
//!
//! The store does not enforce that uniqueness; writers look up the day's record
//! before inserting. `status` is kept as the stored string and parsed into
//! [`AttendanceStatus`](crate::core::status::AttendanceStatus) when read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attendance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    /// Opaque unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Student this record belongs to
    pub student_id: String,
    /// Absolute instant of the check-in
    pub check_in_at: DateTimeUtc,
    /// Stored status value (`"present"`, `"late"`, `"absent"`, `"early-leave"`)
    pub status: String,
}

/// Defines relationships between Attendance and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record belongs to one student
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
