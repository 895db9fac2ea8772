//! The per-course attendance report served to faculty.

use crate::stats::{CourseLedger, StatusCounts, round2};
use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseReport {
    pub course: CourseInfo,
    pub summary: ReportSummary,
    /// Sorted by ascending percentage.
    pub students: Vec<StudentRow>,
    pub sessions: Vec<SessionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseInfo {
    pub id: i32,
    pub code: String,
    pub title: String,
    pub min_attendance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_students: usize,
    pub total_sessions: usize,
    pub overall_attendance_rate: f64,
    pub students_below_threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct StudentRow {
    pub student_id: String,
    pub name: String,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub percentage: f64,
    /// Compared against the course's own minimum.
    pub below_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct SessionRow {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub title: String,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub attendance_rate: f64,
}

impl SessionRow {
    fn new(date: NaiveDate, title: String, counts: StatusCounts) -> Self {
        SessionRow {
            date,
            title,
            present: counts.present,
            absent: counts.absent,
            late: counts.late,
            excused: counts.excused,
            attendance_rate: counts.raw_rate(),
        }
    }
}

impl CourseLedger {
    /// Builds the full report for this course.
    pub fn report(&self) -> CourseReport {
        let minimum = self.course.min_attendance_percent;

        let mut students: Vec<StudentRow> = self
            .roster
            .iter()
            .map(|student| {
                let stats = self.student_stats(student.id);
                StudentRow {
                    student_id: student.student_number.clone(),
                    name: student.full_name.clone(),
                    present: stats.present,
                    absent: stats.absent,
                    late: stats.late,
                    excused: stats.excused,
                    percentage: stats.percentage,
                    below_threshold: stats.is_below(minimum),
                }
            })
            .collect();
        // `sort_by` is stable, so equal percentages keep roster order.
        students.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));

        let sessions: Vec<SessionRow> = self
            .sessions
            .iter()
            .map(|session| {
                SessionRow::new(
                    session.session_date,
                    session.display_title(),
                    self.session_counts(session.id),
                )
            })
            .collect();

        let summary = ReportSummary {
            total_students: self.roster.len(),
            total_sessions: self.sessions.len(),
            overall_attendance_rate: round2(self.recorded_counts().raw_rate()),
            students_below_threshold: students.iter().filter(|row| row.below_threshold).count(),
        };

        CourseReport {
            course: CourseInfo {
                id: self.course.id,
                code: self.course.code.clone(),
                title: self.course.title.clone(),
                min_attendance: minimum,
            },
            summary,
            students,
            sessions,
        }
    }
}
