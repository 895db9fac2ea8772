//! Student and faculty dashboard views.

use crate::error::{AttendanceError, Result};
use crate::manager::{
    Actor, AttendanceManager, find_course, find_student, is_enrolled, load_ledger, load_sessions,
    load_taught_courses,
};
use crate::models::{
    AbsenceRequest, AttendanceRecord, Course, RequestStatus, Session, Status, Student,
};
use crate::schema::{absence_requests, attendance, courses, enrollments, sessions};
use crate::stats::{CourseStats, StudentCourseStats};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tabled::Tabled;

/// How many recent absences a student overview lists.
const RECENT_ABSENCES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseStanding {
    pub course: Course,
    pub stats: StudentCourseStats,
    pub below_minimum: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RecentAbsence {
    pub course_code: String,
    pub date: NaiveDate,
    pub title: String,
}

pub struct StudentOverview {
    pub student: Student,
    pub courses: Vec<CourseStanding>,
    pub recent_absences: Vec<RecentAbsence>,
    pub pending_requests: Vec<AbsenceRequest>,
}

/// A session of a course alongside the student's recorded status, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAttendance {
    pub session: Session,
    pub status: Option<Status>,
    pub notes: Option<String>,
}

pub struct FacultyDashboard {
    pub courses: Vec<(Course, CourseStats)>,
    pub pending_requests: usize,
    pub today_sessions: Vec<Session>,
}

impl FacultyDashboard {
    /// True when nothing is pending and no course has students below the reference threshold.
    pub fn all_clear(&self) -> bool {
        self.pending_requests == 0
            && self
                .courses
                .iter()
                .all(|(_, stats)| stats.below_threshold == 0)
    }
}

impl AttendanceManager {
    /// Stats for every course the acting student is enrolled in, plus recent absences and open
    /// requests.
    pub fn student_overview(&mut self, actor: Actor) -> Result<StudentOverview> {
        let student_id = actor.student_id()?;

        self.db.transaction::<_, AttendanceError, _>(|conn| {
            let student = find_student(conn, student_id)?;

            let enrolled: Vec<Course> = enrollments::table
                .inner_join(courses::table)
                .filter(enrollments::student_id.eq(student_id))
                .order(courses::code.asc())
                .select(Course::as_select())
                .load(conn)?;

            let mut standings = Vec::with_capacity(enrolled.len());
            for course in enrolled {
                let stats = load_ledger(conn, course.id)?.student_stats(student_id);
                standings.push(CourseStanding {
                    below_minimum: stats.total > 0 && stats.is_below(course.min_attendance_percent),
                    course,
                    stats,
                });
            }

            let recent_absences = attendance::table
                .inner_join(sessions::table.inner_join(courses::table))
                .filter(attendance::student_id.eq(student_id))
                .filter(attendance::status.eq(Status::Absent))
                .order(sessions::session_date.desc())
                .limit(RECENT_ABSENCES)
                .select((Session::as_select(), courses::code))
                .load::<(Session, String)>(conn)?
                .into_iter()
                .map(|(session, course_code)| RecentAbsence {
                    course_code,
                    date: session.session_date,
                    title: session.display_title(),
                })
                .collect();

            let pending_requests = absence_requests::table
                .filter(absence_requests::student_id.eq(student_id))
                .filter(absence_requests::status.eq(RequestStatus::Pending))
                .order(absence_requests::from_date.desc())
                .select(AbsenceRequest::as_select())
                .load(conn)?;

            Ok(StudentOverview {
                student,
                courses: standings,
                recent_absences,
                pending_requests,
            })
        })
    }

    /// Every session of a course the acting student is enrolled in, in calendar order.
    pub fn student_session_history(
        &mut self,
        actor: Actor,
        course_id: i32,
    ) -> Result<Vec<SessionAttendance>> {
        let student_id = actor.student_id()?;

        self.db.transaction::<_, AttendanceError, _>(|conn| {
            let course = find_course(conn, course_id)?;
            if !is_enrolled(conn, student_id, course_id)? {
                return Err(AttendanceError::PermissionDenied(format!(
                    "student {student_id} is not enrolled in {}",
                    course.code
                )));
            }

            let course_sessions = load_sessions(conn, course_id)?;
            let session_ids: Vec<i32> = course_sessions.iter().map(|session| session.id).collect();

            let mut by_session: HashMap<i32, AttendanceRecord> = attendance::table
                .filter(attendance::student_id.eq(student_id))
                .filter(attendance::session_id.eq_any(&session_ids))
                .select(AttendanceRecord::as_select())
                .load(conn)?
                .into_iter()
                .map(|record| (record.session_id, record))
                .collect();

            Ok(course_sessions
                .into_iter()
                .map(|session| {
                    let record = by_session.remove(&session.id);
                    SessionAttendance {
                        status: record.as_ref().map(|record| record.status),
                        notes: record.and_then(|record| record.notes),
                        session,
                    }
                })
                .collect())
        })
    }

    /// Course stats for everything the acting faculty member teaches, with pending request count
    /// and the sessions scheduled on `today`.
    pub fn faculty_dashboard(
        &mut self,
        actor: Actor,
        today: NaiveDate,
    ) -> Result<FacultyDashboard> {
        let faculty_id = actor.faculty_id()?;

        self.db.transaction::<_, AttendanceError, _>(|conn| {
            let taught = load_taught_courses(conn, faculty_id)?;

            let mut course_stats = Vec::with_capacity(taught.len());
            for course in taught {
                let stats = load_ledger(conn, course.id)?.course_stats();
                course_stats.push((course, stats));
            }

            let pending: i64 = absence_requests::table
                .inner_join(courses::table)
                .filter(courses::faculty_id.eq(faculty_id))
                .filter(absence_requests::status.eq(RequestStatus::Pending))
                .count()
                .get_result(conn)?;

            let today_sessions = sessions::table
                .inner_join(courses::table)
                .filter(courses::faculty_id.eq(faculty_id))
                .filter(sessions::session_date.eq(today))
                .order(sessions::start_time.asc())
                .select(Session::as_select())
                .load(conn)?;

            Ok(FacultyDashboard {
                courses: course_stats,
                pending_requests: pending as usize,
                today_sessions,
            })
        })
    }
}
