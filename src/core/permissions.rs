//! Role-based permission checks.
//!
//! The current actor is always passed in explicitly; nothing here reads ambient state.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// A selectable role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages the roster, including classes
    Admin,
    /// Checks attendance for every class and reads statistics
    HeadTeacher,
    /// Teaches one class
    Teacher,
}

/// The current user's role context.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    /// `None` until a role has been picked
    pub role: Option<Role>,
    /// Set when `role` is [`Role::Teacher`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
}

impl Actor {
    /// No role selected.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// The administrator.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            role: Some(Role::Admin),
            teacher_id: None,
            teacher_name: Some("Administrator".to_string()),
        }
    }

    /// The head teacher.
    #[must_use]
    pub fn head_teacher() -> Self {
        Self {
            role: Some(Role::HeadTeacher),
            teacher_id: None,
            teacher_name: Some("Head teacher".to_string()),
        }
    }

    /// A specific class teacher.
    #[must_use]
    pub fn teacher(teacher_id: impl Into<String>, teacher_name: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Teacher),
            teacher_id: Some(teacher_id.into()),
            teacher_name: Some(teacher_name.into()),
        }
    }

    fn is(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    fn is_staff(&self) -> bool {
        self.is(Role::Admin) || self.is(Role::HeadTeacher)
    }

    /// Whether any role has been selected.
    #[must_use]
    pub const fn has_role(&self) -> bool {
        self.role.is_some()
    }
}

/// Add, edit or remove teachers.
#[must_use]
pub fn can_manage_teachers(actor: &Actor) -> bool {
    actor.is_staff()
}

/// Add, edit or remove students.
#[must_use]
pub fn can_manage_students(actor: &Actor) -> bool {
    actor.has_role()
}

/// Change attendance status.
#[must_use]
pub fn can_check_attendance(actor: &Actor) -> bool {
    actor.is(Role::HeadTeacher)
}

/// Read attendance.
#[must_use]
pub fn can_view_attendance(actor: &Actor) -> bool {
    actor.has_role()
}

/// Replace a student photo.
#[must_use]
pub fn can_edit_photo(actor: &Actor) -> bool {
    actor.has_role()
}

/// Add or remove classes.
#[must_use]
pub fn can_manage_classes(actor: &Actor) -> bool {
    actor.is(Role::Admin)
}

/// Access the admin menu.
#[must_use]
pub fn is_admin(actor: &Actor) -> bool {
    actor.is(Role::Admin)
}

/// Read the cross-class statistics.
#[must_use]
pub fn can_view_statistics(actor: &Actor) -> bool {
    actor.is_staff()
}

/// Edit a student's details. A class teacher may only edit students of their own class.
#[must_use]
pub fn can_edit_student_info(
    actor: &Actor,
    teacher_class_id: Option<&str>,
    student_class_id: &str,
) -> bool {
    if actor.is_staff() {
        return true;
    }
    actor.is(Role::Teacher) && teacher_class_id == Some(student_class_id)
}

/// Open one student's attendance calendar. A class teacher only sees their own class.
#[must_use]
pub fn can_view_student(
    actor: &Actor,
    teacher_class_id: Option<&str>,
    student_class_id: &str,
) -> bool {
    if actor.is(Role::Teacher) {
        return teacher_class_id == Some(student_class_id);
    }
    can_view_attendance(actor)
}

/// Replace every roster field of a student, class included.
#[must_use]
pub fn can_edit_student_roster(actor: &Actor) -> bool {
    actor.is_staff()
}

/// Edit a teacher's roster fields.
#[must_use]
pub fn can_edit_teacher_info(actor: &Actor) -> bool {
    actor.is_staff()
}

/// Replace a teacher's photo: staff, or the teacher themself.
#[must_use]
pub fn can_edit_teacher_photo(actor: &Actor, teacher_id: &str) -> bool {
    actor.is_staff() || (actor.is(Role::Teacher) && actor.teacher_id.as_deref() == Some(teacher_id))
}

/// Turns a failed check into [`Error::PermissionDenied`].
pub fn require(allowed: bool, action: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::denied(action))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_role_matrix() {
        let none = Actor::none();
        let admin = Actor::admin();
        let head = Actor::head_teacher();
        let teacher = Actor::teacher("t1", "Kim");

        assert!(can_manage_teachers(&admin) && can_manage_teachers(&head));
        assert!(!can_manage_teachers(&teacher) && !can_manage_teachers(&none));

        assert!(can_check_attendance(&head));
        assert!(!can_check_attendance(&admin));
        assert!(!can_check_attendance(&teacher));

        assert!(can_manage_classes(&admin));
        assert!(!can_manage_classes(&head));
        assert!(is_admin(&admin) && !is_admin(&head));

        assert!(can_view_attendance(&teacher) && !can_view_attendance(&none));
        assert!(can_manage_students(&teacher) && !can_manage_students(&none));
        assert!(can_edit_photo(&teacher) && !can_edit_photo(&none));
        assert!(can_view_statistics(&admin) && !can_view_statistics(&teacher));
    }

    #[test]
    fn test_teacher_edits_only_own_class() {
        let teacher = Actor::teacher("t1", "Kim");
        assert!(can_edit_student_info(&teacher, Some("c1"), "c1"));
        assert!(!can_edit_student_info(&teacher, Some("c1"), "c2"));
        assert!(!can_edit_student_info(&teacher, None, "c1"));
        assert!(can_edit_student_info(&Actor::admin(), None, "c2"));
        assert!(!can_edit_student_info(&Actor::none(), Some("c1"), "c1"));
    }

    #[test]
    fn test_teacher_views_only_own_students() {
        let teacher = Actor::teacher("t1", "Kim");
        assert!(can_view_student(&teacher, Some("c1"), "c1"));
        assert!(!can_view_student(&teacher, Some("c1"), "c2"));
        assert!(!can_view_student(&teacher, None, "c1"));
        assert!(can_view_student(&Actor::head_teacher(), None, "c2"));
        assert!(can_view_student(&Actor::admin(), Some("c1"), "c2"));
        assert!(!can_view_student(&Actor::none(), None, "c1"));
    }

    #[test]
    fn test_student_roster_edits_are_staff_only() {
        assert!(can_edit_student_roster(&Actor::admin()));
        assert!(can_edit_student_roster(&Actor::head_teacher()));
        assert!(!can_edit_student_roster(&Actor::teacher("t1", "Kim")));
        assert!(!can_edit_student_roster(&Actor::none()));
    }

    #[test]
    fn test_teacher_photo_self_service() {
        let teacher = Actor::teacher("t1", "Kim");
        assert!(can_edit_teacher_photo(&teacher, "t1"));
        assert!(!can_edit_teacher_photo(&teacher, "t2"));
        assert!(can_edit_teacher_photo(&Actor::head_teacher(), "t2"));
        assert!(!can_edit_teacher_info(&teacher));
    }

    #[test]
    fn test_require() {
        assert!(require(true, "anything").is_ok());
        let err = require(false, "check attendance").unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { action } if action == "check attendance"));
    }

    #[test]
    fn test_actor_json_shape() {
        let json = serde_json::to_string(&Actor::teacher("t1", "Kim")).unwrap();
        assert_eq!(
            json,
            r#"{"role":"teacher","teacher_id":"t1","teacher_name":"Kim"}"#
        );
        let back: Actor = serde_json::from_str(r#"{"role":"head_teacher"}"#).unwrap();
        assert_eq!(back.role, Some(Role::HeadTeacher));
        assert!(back.teacher_id.is_none());
    }
}
