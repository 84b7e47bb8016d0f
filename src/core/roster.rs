//! Roster business logic - classes, teachers and students.
//!
//! Every mutating function takes the current [`Actor`] and checks it before touching the
//! store. Deleting a class relies on the schema's foreign-key cascade to remove its
//! teachers and students (and, through students, their attendance).

use crate::{
    core::permissions::{self, Actor, Role},
    entities::{Class, Student, Teacher, class, student, teacher},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Generates an opaque identifier for a new row.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn required_name(name: &str, what: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{what} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------- classes

/// All classes, ordered by name.
pub async fn list_classes<C>(db: &C) -> Result<Vec<class::Model>>
where
    C: ConnectionTrait,
{
    Class::find()
        .order_by_asc(class::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a class by id.
pub async fn get_class<C>(db: &C, class_id: &str) -> Result<Option<class::Model>>
where
    C: ConnectionTrait,
{
    Class::find_by_id(class_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_class<C>(db: &C, class_id: &str) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    get_class(db, class_id)
        .await?
        .ok_or_else(|| Error::ClassNotFound {
            id: class_id.to_string(),
        })
}

/// Creates a class. Admin only.
pub async fn create_class<C>(db: &C, actor: &Actor, name: &str) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_manage_classes(actor), "manage classes")?;
    let model = class::ActiveModel {
        id: Set(new_id()),
        name: Set(required_name(name, "Class")?),
    };
    let created = model.insert(db).await?;
    info!(class_id = %created.id, "Class created");
    Ok(created)
}

/// Renames a class. Admin only.
pub async fn rename_class<C>(
    db: &C,
    actor: &Actor,
    class_id: &str,
    name: &str,
) -> Result<class::Model>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_manage_classes(actor), "manage classes")?;
    let name = required_name(name, "Class")?;
    let mut model: class::ActiveModel = require_class(db, class_id).await?.into();
    model.name = Set(name);
    model.update(db).await.map_err(Into::into)
}

/// Deletes a class together with its teachers and students. Admin only.
pub async fn delete_class<C>(db: &C, actor: &Actor, class_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_manage_classes(actor), "manage classes")?;
    let result = Class::delete_by_id(class_id.to_string()).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::ClassNotFound {
            id: class_id.to_string(),
        });
    }
    info!(class_id, "Class deleted");
    Ok(())
}

// ---------------------------------------------------------------- teachers

/// Fields for a new teacher, also used as the full replacement on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherFields {
    /// Display name
    pub name: String,
    /// Class taught
    pub class_id: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Home address
    pub address: Option<String>,
    /// Free-form notes
    pub memo: Option<String>,
}

/// A teacher together with the name of their class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherWithClass {
    /// The teacher
    pub teacher: teacher::Model,
    /// Name of the class, if it still exists
    pub class_name: Option<String>,
}

/// Teachers ordered by name, optionally restricted to one class.
pub async fn list_teachers<C>(db: &C, class_id: Option<&str>) -> Result<Vec<teacher::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Teacher::find().order_by_asc(teacher::Column::Name);
    if let Some(class_id) = class_id {
        query = query.filter(teacher::Column::ClassId.eq(class_id));
    }
    query.all(db).await.map_err(Into::into)
}

/// Teachers ordered by name with their class name joined in.
pub async fn list_teachers_with_class<C>(
    db: &C,
    class_id: Option<&str>,
) -> Result<Vec<TeacherWithClass>>
where
    C: ConnectionTrait,
{
    let mut query = Teacher::find()
        .find_also_related(Class)
        .order_by_asc(teacher::Column::Name);
    if let Some(class_id) = class_id {
        query = query.filter(teacher::Column::ClassId.eq(class_id));
    }
    Ok(query
        .all(db)
        .await?
        .into_iter()
        .map(|(teacher, class)| TeacherWithClass {
            teacher,
            class_name: class.map(|c| c.name),
        })
        .collect())
}

/// Finds a teacher by id.
pub async fn get_teacher<C>(db: &C, teacher_id: &str) -> Result<Option<teacher::Model>>
where
    C: ConnectionTrait,
{
    Teacher::find_by_id(teacher_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_teacher`] but a missing teacher is an error.
pub async fn require_teacher<C>(db: &C, teacher_id: &str) -> Result<teacher::Model>
where
    C: ConnectionTrait,
{
    get_teacher(db, teacher_id)
        .await?
        .ok_or_else(|| Error::TeacherNotFound {
            id: teacher_id.to_string(),
        })
}

/// Creates a teacher. Admin or head teacher.
pub async fn create_teacher<C>(
    db: &C,
    actor: &Actor,
    fields: TeacherFields,
) -> Result<teacher::Model>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_manage_teachers(actor), "manage teachers")?;
    let name = required_name(&fields.name, "Teacher")?;
    require_class(db, &fields.class_id).await?;

    let model = teacher::ActiveModel {
        id: Set(new_id()),
        name: Set(name),
        class_id: Set(fields.class_id),
        photo_url: Set(None),
        phone: Set(optional_text(fields.phone)),
        address: Set(optional_text(fields.address)),
        memo: Set(optional_text(fields.memo)),
    };
    let created = model.insert(db).await?;
    info!(teacher_id = %created.id, "Teacher created");
    Ok(created)
}

/// Replaces a teacher's roster fields. Admin or head teacher.
pub async fn update_teacher<C>(
    db: &C,
    actor: &Actor,
    teacher_id: &str,
    fields: TeacherFields,
) -> Result<teacher::Model>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_edit_teacher_info(actor), "edit teacher info")?;
    let name = required_name(&fields.name, "Teacher")?;
    require_class(db, &fields.class_id).await?;

    let mut model: teacher::ActiveModel = require_teacher(db, teacher_id).await?.into();
    model.name = Set(name);
    model.class_id = Set(fields.class_id);
    model.phone = Set(optional_text(fields.phone));
    model.address = Set(optional_text(fields.address));
    model.memo = Set(optional_text(fields.memo));
    model.update(db).await.map_err(Into::into)
}

/// Records a new photo URL for a teacher.
pub async fn set_teacher_photo<C>(db: &C, teacher_id: &str, url: &str) -> Result<teacher::Model>
where
    C: ConnectionTrait,
{
    let mut model: teacher::ActiveModel = require_teacher(db, teacher_id).await?.into();
    model.photo_url = Set(Some(url.to_string()));
    model.update(db).await.map_err(Into::into)
}

/// Deletes a teacher. Admin or head teacher.
pub async fn delete_teacher<C>(db: &C, actor: &Actor, teacher_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    permissions::require(permissions::can_manage_teachers(actor), "manage teachers")?;
    let result = Teacher::delete_by_id(teacher_id.to_string()).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::TeacherNotFound {
            id: teacher_id.to_string(),
        });
    }
    info!(teacher_id, "Teacher deleted");
    Ok(())
}

/// The class of the actor when they are a class teacher.
pub async fn actor_class_id<C>(db: &C, actor: &Actor) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    match (actor.role, actor.teacher_id.as_deref()) {
        (Some(Role::Teacher), Some(teacher_id)) => {
            Ok(get_teacher(db, teacher_id).await?.map(|t| t.class_id))
        }
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------- students

/// Fields for a new student, also used as the full replacement on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFields {
    /// Display name
    pub name: String,
    /// Class attended
    pub class_id: String,
    /// Contact details
    #[serde(flatten)]
    pub contact: StudentContact,
}

/// The fields a class teacher may edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentContact {
    /// Parent or guardian name
    pub parent_name: Option<String>,
    /// Parent or guardian phone number
    pub parent_phone: Option<String>,
    /// Home address
    pub address: Option<String>,
    /// Free-form notes
    pub memo: Option<String>,
}

fn apply_contact(model: &mut student::ActiveModel, contact: StudentContact) {
    model.parent_name = Set(optional_text(contact.parent_name));
    model.parent_phone = Set(optional_text(contact.parent_phone));
    model.address = Set(optional_text(contact.address));
    model.memo = Set(optional_text(contact.memo));
}

/// Students ordered by name, optionally restricted to one class.
pub async fn list_students<C>(db: &C, class_id: Option<&str>) -> Result<Vec<student::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Student::find().order_by_asc(student::Column::Name);
    if let Some(class_id) = class_id {
        query = query.filter(student::Column::ClassId.eq(class_id));
    }
    query.all(db).await.map_err(Into::into)
}

/// Finds a student by id.
pub async fn get_student<C>(db: &C, student_id: &str) -> Result<Option<student::Model>>
where
    C: ConnectionTrait,
{
    Student::find_by_id(student_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_student`] but a missing student is an error.
pub async fn require_student<C>(db: &C, student_id: &str) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    get_student(db, student_id)
        .await?
        .ok_or_else(|| Error::StudentNotFound {
            id: student_id.to_string(),
        })
}

async fn require_student_access<C>(
    db: &C,
    actor: &Actor,
    class_id: &str,
    action: &str,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let teacher_class = actor_class_id(db, actor).await?;
    permissions::require(
        permissions::can_manage_students(actor)
            && permissions::can_edit_student_info(actor, teacher_class.as_deref(), class_id),
        action,
    )
}

/// Creates a student. Class teachers may only add to their own class.
pub async fn create_student<C>(
    db: &C,
    actor: &Actor,
    fields: StudentFields,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    require_student_access(db, actor, &fields.class_id, "manage students").await?;
    let name = required_name(&fields.name, "Student")?;
    require_class(db, &fields.class_id).await?;

    let mut model = student::ActiveModel {
        id: Set(new_id()),
        name: Set(name),
        photo_url: Set(None),
        class_id: Set(fields.class_id),
        ..Default::default()
    };
    apply_contact(&mut model, fields.contact);
    let created = model.insert(db).await?;
    info!(student_id = %created.id, "Student created");
    Ok(created)
}

/// Replaces every editable field of a student. Admin or head teacher.
pub async fn update_student<C>(
    db: &C,
    actor: &Actor,
    student_id: &str,
    fields: StudentFields,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    permissions::require(
        permissions::can_edit_student_roster(actor),
        "edit student roster fields",
    )?;
    let name = required_name(&fields.name, "Student")?;
    require_class(db, &fields.class_id).await?;

    let mut model: student::ActiveModel = require_student(db, student_id).await?.into();
    model.name = Set(name);
    model.class_id = Set(fields.class_id);
    apply_contact(&mut model, fields.contact);
    model.update(db).await.map_err(Into::into)
}

/// Replaces a student's contact fields. Staff, or the teacher of the student's class.
pub async fn update_student_contact<C>(
    db: &C,
    actor: &Actor,
    student_id: &str,
    contact: StudentContact,
) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let existing = require_student(db, student_id).await?;
    require_student_access(db, actor, &existing.class_id, "edit student info").await?;

    let mut model: student::ActiveModel = existing.into();
    apply_contact(&mut model, contact);
    debug!(student_id, "Student contact updated");
    model.update(db).await.map_err(Into::into)
}

/// Records a new photo URL for a student.
pub async fn set_student_photo<C>(db: &C, student_id: &str, url: &str) -> Result<student::Model>
where
    C: ConnectionTrait,
{
    let mut model: student::ActiveModel = require_student(db, student_id).await?.into();
    model.photo_url = Set(Some(url.to_string()));
    model.update(db).await.map_err(Into::into)
}

/// Deletes a student and their attendance. Staff, or the teacher of the student's class.
pub async fn delete_student<C>(db: &C, actor: &Actor, student_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = require_student(db, student_id).await?;
    require_student_access(db, actor, &existing.class_id, "manage students").await?;
    Student::delete_by_id(existing.id).exec(db).await?;
    info!(student_id, "Student deleted");
    Ok(())
}

// ---------------------------------------------------------------- grouping

/// A class with its teacher and students, as shown on the check-in grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassGroup {
    /// The class
    pub class: class::Model,
    /// Name of the class's teacher, if one is assigned
    pub teacher_name: Option<String>,
    /// Students ordered by name
    pub students: Vec<student::Model>,
}

/// Groups students by class, classes ordered by name. Classes with no students are left out.
pub async fn class_groups<C>(db: &C) -> Result<Vec<ClassGroup>>
where
    C: ConnectionTrait,
{
    let classes = list_classes(db).await?;
    let teachers = list_teachers(db, None).await?;
    let students = list_students(db, None).await?;

    Ok(classes
        .into_iter()
        .map(|class| {
            let teacher_name = teachers
                .iter()
                .find(|t| t.class_id == class.id)
                .map(|t| t.name.clone());
            let students = students
                .iter()
                .filter(|s| s.class_id == class.id)
                .cloned()
                .collect();
            ClassGroup {
                class,
                teacher_name,
                students,
            }
        })
        .filter(|group| !group.students.is_empty())
        .collect())
}
