//! Core business logic - framework-agnostic calendar, aggregation and store operations.
//!
//! The calendar, status, index, rollup, permissions and sequence modules are pure.
//! The remaining modules talk to the database through any `ConnectionTrait`.

/// Attendance store queries and the status-toggle state machine
pub mod attendance;
/// Session dates and the organization's local calendar
pub mod calendar;
/// Bulk import of exported attendance rows
pub mod import;
/// Lookups over a batch of attendance records
pub mod index;
/// Role-based permission checks
pub mod permissions;
/// Photo uploads through a blob store
pub mod photo;
/// View models for the attendance screens
pub mod report;
/// Weekly and per-student rollups
pub mod rollup;
/// Classes, teachers and students
pub mod roster;
/// Request tokens for discarding superseded responses
pub mod sequence;
/// Persisted role selection
pub mod session;
/// The closed set of attendance statuses
pub mod status;
