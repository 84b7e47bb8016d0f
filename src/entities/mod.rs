//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the roster, the attendance records, and the key-value
//! slot used to persist the selected role.

pub mod attendance;
pub mod class;
pub mod student;
pub mod system_state;
pub mod teacher;

// Re-export specific types to avoid conflicts
pub use attendance::{
    Column as AttendanceColumn, Entity as Attendance, Model as AttendanceModel,
};
pub use class::{Column as ClassColumn, Entity as Class, Model as ClassModel};
pub use student::{Column as StudentColumn, Entity as Student, Model as StudentModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use teacher::{Column as TeacherColumn, Entity as Teacher, Model as TeacherModel};
