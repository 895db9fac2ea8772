//! Database rows and the value types stored in them.

use crate::schema::{
    absence_requests, attendance, courses, enrollments, faculty, sessions, students,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Returned when a stored or user-supplied status string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status `{0}`")]
pub struct UnknownStatus(pub String);

/// Lets a string-backed enum live in a `Text` column.
macro_rules! text_column_enum {
    ($ty:ty) => {
        impl ToSql<Text, Sqlite> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $ty {
            fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
                Ok(raw.parse::<$ty>()?)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// The attendance status of a student for a single session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    diesel::AsExpression,
    diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
    Late,
    Excused,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
            Status::Late => "late",
            Status::Excused => "excused",
        }
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(Status::Present),
            "absent" => Ok(Status::Absent),
            "late" => Ok(Status::Late),
            "excused" => Ok(Status::Excused),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

text_column_enum!(Status);

/// Lifecycle state of an [`AbsenceRequest`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    diesel::AsExpression,
    diesel::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

text_column_enum!(RequestStatus);

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Tabled, Serialize)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Student {
    pub id: i32,
    pub student_number: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub year_of_study: i32,
}

#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = students)]
pub struct NewStudent {
    pub student_number: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub year_of_study: i32,
}

/// Profile fields a student may change. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = students)]
pub struct StudentChanges<'a> {
    pub student_number: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub department: Option<&'a str>,
    pub year_of_study: Option<i32>,
}

impl StudentChanges<'_> {
    pub fn is_empty(&self) -> bool {
        self.student_number.is_none()
            && self.full_name.is_none()
            && self.department.is_none()
            && self.year_of_study.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Tabled)]
#[diesel(table_name = faculty)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Faculty {
    pub id: i32,
    pub faculty_number: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = faculty)]
pub struct NewFaculty<'a> {
    pub faculty_number: &'a str,
    pub full_name: &'a str,
    pub email: &'a str,
    pub department: &'a str,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = faculty)]
pub struct FacultyChanges<'a> {
    pub faculty_number: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub department: Option<&'a str>,
}

impl FacultyChanges<'_> {
    pub fn is_empty(&self) -> bool {
        self.faculty_number.is_none() && self.full_name.is_none() && self.department.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Tabled, Serialize)]
#[diesel(table_name = courses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Course {
    pub id: i32,
    pub code: String,
    pub title: String,
    pub faculty_id: i32,
    pub schedule: String,
    pub location: String,
    /// The course's own attendance requirement, used for notifications and reports.
    pub min_attendance_percent: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = courses)]
pub struct NewCourse<'a> {
    pub code: &'a str,
    pub title: &'a str,
    pub faculty_id: i32,
    pub schedule: &'a str,
    pub location: &'a str,
    pub min_attendance_percent: f64,
}

/// Edits to a course. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = courses)]
pub struct CourseChanges<'a> {
    pub code: Option<&'a str>,
    pub title: Option<&'a str>,
    pub schedule: Option<&'a str>,
    pub location: Option<&'a str>,
    pub min_attendance_percent: Option<f64>,
}

impl CourseChanges<'_> {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.title.is_none()
            && self.schedule.is_none()
            && self.location.is_none()
            && self.min_attendance_percent.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = enrollments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Enrollment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub enrolled_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = enrollments)]
pub struct NewEnrollment {
    pub student_id: i32,
    pub course_id: i32,
    pub enrolled_at: NaiveDateTime,
}

/// One scheduled meeting of a course.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Session {
    pub id: i32,
    pub course_id: i32,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: Option<String>,
    pub notes: Option<String>,
}

impl Session {
    /// The session title, or `Session on Mar 05` style text when none was given.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => format!("Session on {}", self.session_date.format("%b %d")),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub course_id: i32,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// A single student's status for a single session. Unique per (student, session).
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttendanceRecord {
    pub id: i32,
    pub student_id: i32,
    pub session_id: i32,
    pub status: Status,
    pub notes: Option<String>,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = attendance)]
pub struct NewAttendance<'a> {
    pub student_id: i32,
    pub session_id: i32,
    pub status: Status,
    pub notes: Option<&'a str>,
    pub recorded_at: NaiveDateTime,
}

/// One line of a "take attendance" submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: i32,
    pub status: Status,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = absence_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AbsenceRequest {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub request_date: NaiveDate,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: String,
    pub status: RequestStatus,
    pub response_notes: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
}

impl AbsenceRequest {
    /// Whether `date` lies within the requested range, both ends inclusive.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from_date <= date && date <= self.to_date
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = absence_requests)]
pub struct NewAbsenceRequest<'a> {
    pub student_id: i32,
    pub course_id: i32,
    pub request_date: NaiveDate,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: &'a str,
    pub status: RequestStatus,
}
