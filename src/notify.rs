//! Low-attendance notifications raised after attendance is recorded.
//!
//! There is no state here: every pass that leaves a student under the course minimum emits again.

use crate::stats::CourseLedger;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowAttendanceNotice {
    pub student_id: i32,
    pub student_number: String,
    pub student_name: String,
    pub course_id: i32,
    pub course_title: String,
    pub percentage: f64,
    pub minimum: f64,
}

/// Receives notices. Delivery beyond this trait is up to the implementor.
pub trait NotificationSink {
    fn notify(&mut self, notice: &LowAttendanceNotice);
}

/// Writes each notice to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&mut self, notice: &LowAttendanceNotice) {
        warn!(
            student = %notice.student_number,
            course = notice.course_id,
            percentage = notice.percentage,
            minimum = notice.minimum,
            "{} ({}) has attendance of {:.2}% in {}, below the required minimum of {}%",
            notice.student_name,
            notice.student_number,
            notice.percentage,
            notice.course_title,
            notice.minimum,
        );
    }
}

impl NotificationSink for Vec<LowAttendanceNotice> {
    fn notify(&mut self, notice: &LowAttendanceNotice) {
        self.push(notice.clone());
    }
}

/// Recomputes each affected student's stats and collects a notice for everyone under the
/// course's configured minimum. Students not on the roster are skipped.
pub fn low_attendance_notices(ledger: &CourseLedger, affected: &[i32]) -> Vec<LowAttendanceNotice> {
    let minimum = ledger.course.min_attendance_percent;

    affected
        .iter()
        .filter_map(|&id| ledger.roster.iter().find(|student| student.id == id))
        .filter_map(|student| {
            let stats = ledger.student_stats(student.id);
            stats.is_below(minimum).then(|| LowAttendanceNotice {
                student_id: student.id,
                student_number: student.student_number.clone(),
                student_name: student.full_name.clone(),
                course_id: ledger.course.id,
                course_title: ledger.course.title.clone(),
                percentage: stats.percentage,
                minimum,
            })
        })
        .collect()
}

/// Sends a notice to `sink` for each affected student under the minimum.
///
/// Returns how many were sent.
pub fn trigger(ledger: &CourseLedger, affected: &[i32], sink: &mut dyn NotificationSink) -> usize {
    let notices = low_attendance_notices(ledger, affected);
    for notice in &notices {
        sink.notify(notice);
    }
    notices.len()
}
