//! Class entity - A weekly class group that teachers and students belong to.
//!
//! Deleting a class cascades to its teachers and students at the storage layer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    /// Opaque unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name (e.g., "Sprouts", "Grade 3")
    pub name: String,
}

/// Defines relationships between Class and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One class has many teachers
    #[sea_orm(has_many = "super::teacher::Entity")]
    Teachers,
    /// One class has many students
    #[sea_orm(has_many = "super::student::Entity")]
    Students,
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teachers.def()
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
