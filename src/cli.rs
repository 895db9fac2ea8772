//! This module contains the command-line interface [`Cli`] parser for managing course attendance.

use crate::error::Result;
use crate::manager::Actor;
use crate::models::AttendanceEntry;
use crate::reconcile::Decision;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(author, version, about = "Track course attendance, absence requests and reports")]
pub struct Cli {
    /// Path to a config file. Defaults to `config.toml` in the working directory, if present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Act as the faculty member with this ID.
    #[arg(long = "as-faculty", value_name = "ID", conflicts_with = "as_student")]
    pub as_faculty: Option<i32>,

    /// Act as the student with this ID.
    #[arg(long = "as-student", value_name = "ID")]
    pub as_student: Option<i32>,

    /// The different commands available for managing attendance.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The identity given with `--as-faculty` or `--as-student`, if any.
    pub fn actor(&self) -> Option<Actor> {
        match (self.as_faculty, self.as_student) {
            (Some(id), _) => Some(Actor::Faculty(id)),
            (None, Some(id)) => Some(Actor::Student(id)),
            (None, None) => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database tables.
    InitDb,

    /// Add a student profile.
    AddStudent {
        number: String,
        name: String,
        email: String,
        department: String,
        year: i32,
    },

    /// Add a faculty profile.
    AddFaculty {
        number: String,
        name: String,
        email: String,
        department: String,
    },

    /// Create a course taught by the acting faculty member.
    AddCourse {
        code: String,
        title: String,
        schedule: String,
        location: String,
        /// Minimum attendance percentage. Defaults to the configured value.
        #[arg(long)]
        min_attendance: Option<f64>,
    },

    /// Change details of a course taught by the acting faculty member.
    EditCourse {
        course_id: i32,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        schedule: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        min_attendance: Option<f64>,
    },

    /// Delete a course along with its sessions, enrollments, attendance and absence requests.
    DeleteCourse { course_id: i32 },

    /// List the courses taught by the acting faculty member.
    Courses,

    /// List the sessions of a course.
    Sessions { course_id: i32 },

    /// Update the acting user's own profile.
    UpdateProfile {
        /// New student or faculty number.
        #[arg(long)]
        number: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Year of study. Students only.
        #[arg(long)]
        year: Option<i32>,
    },

    /// Schedule a session for a course.
    AddSession {
        course_id: i32,
        /// Date as YYYY-MM-DD.
        date: NaiveDate,
        /// Start time as HH:MM:SS.
        start: NaiveTime,
        /// End time as HH:MM:SS.
        end: NaiveTime,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Enroll a student in a course.
    Enroll { student_id: i32, course_id: i32 },

    /// Remove a student from a course.
    Unenroll { student_id: i32, course_id: i32 },

    /// Record attendance for a session from a CSV file with `student_id,status,notes` columns.
    TakeAttendance { session_id: i32, file_path: PathBuf },

    /// Ask to be excused from a course over a date range.
    RequestAbsence {
        course_id: i32,
        from: NaiveDate,
        to: NaiveDate,
        reason: String,
    },

    /// Approve or reject a pending absence request.
    RespondRequest {
        request_id: i32,
        #[arg(value_enum)]
        decision: Decision,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List absence requests visible to the acting user.
    ListRequests,

    /// Show one student's attendance stats for a course.
    StudentStats { student_id: i32, course_id: i32 },

    /// Show the acting student's status for every session of a course.
    StudentHistory { course_id: i32 },

    /// Show course-wide attendance stats.
    CourseStats { course_id: i32 },

    /// Show the acting user's dashboard.
    Dashboard,

    /// Show the full attendance report for a course.
    Report {
        course_id: i32,
        /// Print the report as JSON instead of tables.
        #[arg(long)]
        json: bool,
    },
}

/// Reads a `student_id,status,notes` CSV file into attendance entries.
pub fn read_attendance_batch(file_path: &Path) -> Result<Vec<AttendanceEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    let entries = reader
        .deserialize()
        .collect::<std::result::Result<Vec<AttendanceEntry>, csv::Error>>()?;
    Ok(entries)
}
