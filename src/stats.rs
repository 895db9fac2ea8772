//! Attendance aggregation.
//!
//! Everything here is a pure computation over a [`CourseLedger`] snapshot: no database access and
//! no notion of who is asking. Empty inputs produce zero-valued results instead of errors.

use crate::models::{AttendanceRecord, Course, Session, Status, Student};
use serde::Serialize;
use std::collections::HashSet;

/// The fixed reference threshold used by [`CourseLedger::course_stats`].
///
/// This is deliberately independent of [`Course::min_attendance_percent`], which is what reports
/// and notifications compare against.
pub const REFERENCE_THRESHOLD_PERCENT: f64 = 75.0;

/// Rounds a percentage to two decimal places, sending exact halves to the even neighbour.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Raw counts of recorded statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        match status {
            Status::Present => self.present += 1,
            Status::Absent => self.absent += 1,
            Status::Late => self.late += 1,
            Status::Excused => self.excused += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.absent + self.late + self.excused
    }

    pub fn attended(&self) -> usize {
        self.present + self.late
    }

    /// `(present + late) / total * 100` over recorded rows only, or `0` when nothing is recorded.
    ///
    /// Unlike [`StudentCourseStats`] this neither scores missing rows as absences nor removes
    /// excused rows from the base.
    pub fn raw_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.attended() as f64 / total as f64 * 100.0,
        }
    }
}

impl FromIterator<Status> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

/// One student's standing in one course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StudentCourseStats {
    pub total: usize,
    pub present: usize,
    /// Recorded absences plus every session with no record at all.
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub percentage: f64,
}

impl StudentCourseStats {
    /// Scores a student given the number of sessions in the course and the statuses recorded for
    /// the student against those sessions.
    ///
    /// Sessions without a record count as absences. Excused sessions are removed from the
    /// denominator; if every session is excused the percentage is `0`.
    pub fn from_statuses(session_count: usize, statuses: impl IntoIterator<Item = Status>) -> Self {
        if session_count == 0 {
            return StudentCourseStats::default();
        }

        let counts: StatusCounts = statuses.into_iter().collect();
        let unrecorded = session_count.saturating_sub(counts.total());
        let denominator = session_count.saturating_sub(counts.excused);

        let percentage = if denominator > 0 {
            round2(counts.attended() as f64 / denominator as f64 * 100.0)
        } else {
            0.0
        };

        StudentCourseStats {
            total: session_count,
            present: counts.present,
            absent: counts.absent + unrecorded,
            late: counts.late,
            excused: counts.excused,
            percentage,
        }
    }

    pub fn is_below(&self, threshold: f64) -> bool {
        self.percentage < threshold
    }
}

/// Course-wide figures for dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CourseStats {
    /// Raw ratio over recorded rows, see [`StatusCounts::raw_rate`].
    pub attendance_rate: f64,
    pub sessions_count: usize,
    pub student_count: usize,
    /// Students under [`REFERENCE_THRESHOLD_PERCENT`].
    pub below_threshold: usize,
}

/// A consistent snapshot of everything the engine needs to know about one course.
#[derive(Debug, Clone)]
pub struct CourseLedger {
    pub course: Course,
    pub sessions: Vec<Session>,
    /// Enrolled students, in enrollment order.
    pub roster: Vec<Student>,
    /// Attendance rows recorded against any of `sessions`.
    pub records: Vec<AttendanceRecord>,
}

impl CourseLedger {
    fn session_ids(&self) -> HashSet<i32> {
        self.sessions.iter().map(|session| session.id).collect()
    }

    /// Computes a single student's stats for this course.
    pub fn student_stats(&self, student_id: i32) -> StudentCourseStats {
        let session_ids = self.session_ids();
        let statuses = self
            .records
            .iter()
            .filter(|record| record.student_id == student_id)
            .filter(|record| session_ids.contains(&record.session_id))
            .map(|record| record.status);

        StudentCourseStats::from_statuses(session_ids.len(), statuses)
    }

    /// Per-status counts over every recorded row in the course.
    pub fn recorded_counts(&self) -> StatusCounts {
        let session_ids = self.session_ids();
        self.records
            .iter()
            .filter(|record| session_ids.contains(&record.session_id))
            .map(|record| record.status)
            .collect()
    }

    /// Per-status counts for one session.
    pub fn session_counts(&self, session_id: i32) -> StatusCounts {
        self.records
            .iter()
            .filter(|record| record.session_id == session_id)
            .map(|record| record.status)
            .collect()
    }

    /// Computes the dashboard figures for the course.
    pub fn course_stats(&self) -> CourseStats {
        if self.sessions.is_empty() {
            return CourseStats::default();
        }

        let below_threshold = self
            .roster
            .iter()
            .map(|student| self.student_stats(student.id))
            .filter(|stats| stats.total > 0 && stats.is_below(REFERENCE_THRESHOLD_PERCENT))
            .count();

        CourseStats {
            attendance_rate: round2(self.recorded_counts().raw_rate()),
            sessions_count: self.sessions.len(),
            student_count: self.roster.len(),
            below_threshold,
        }
    }
}
