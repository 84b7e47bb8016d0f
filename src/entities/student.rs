//! Student entity - Many students per class.
//!
//! Contact fields (`parent_name`, `parent_phone`, `address`, `memo`) are the only ones
//! a class teacher may change; the rest of the row is managed by admins and the
//! head teacher.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Student database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    /// Opaque unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Public URL of the uploaded photo
    pub photo_url: Option<String>,
    /// Class the student attends
    pub class_id: String,
    /// Parent or guardian name
    pub parent_name: Option<String>,
    /// Parent or guardian phone number
    pub parent_phone: Option<String>,
    /// Home address
    pub address: Option<String>,
    /// Free-form notes
    pub memo: Option<String>,
}

/// Defines relationships between Student and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each student belongs to one class
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id",
        on_delete = "Cascade"
    )]
    Class,
    /// One student has many attendance records
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
