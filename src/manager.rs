use crate::error::{AttendanceError, Result};
use crate::models::{
    AttendanceEntry, AttendanceRecord, Course, CourseChanges, Enrollment, Faculty, FacultyChanges,
    NewAttendance, NewCourse, NewEnrollment, NewFaculty, NewSession, NewStudent, Session, Status,
    Student, StudentChanges,
};
use crate::notify::{self, NotificationSink};
use crate::report::CourseReport;
use crate::schema::{attendance, courses, enrollments, faculty, sessions, students};
use crate::stats::{CourseLedger, CourseStats, StudentCourseStats};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use std::collections::HashSet;
use tracing::{debug, info};

/// The table definitions applied by [`AttendanceManager::initialize_schema`].
const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

/// Who is performing an operation. Passed explicitly to everything that checks ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Student(i32),
    Faculty(i32),
}

impl Actor {
    pub(crate) fn faculty_id(&self) -> Result<i32> {
        match self {
            Actor::Faculty(id) => Ok(*id),
            Actor::Student(_) => Err(AttendanceError::PermissionDenied(
                "only faculty may do this".to_string(),
            )),
        }
    }

    pub(crate) fn student_id(&self) -> Result<i32> {
        match self {
            Actor::Student(id) => Ok(*id),
            Actor::Faculty(_) => Err(AttendanceError::PermissionDenied(
                "only students may do this".to_string(),
            )),
        }
    }
}

/// Fields of a course supplied by the faculty member creating it.
#[derive(Debug, Clone)]
pub struct CourseDraft<'a> {
    pub code: &'a str,
    pub title: &'a str,
    pub schedule: &'a str,
    pub location: &'a str,
    pub min_attendance_percent: f64,
}

/// Fields of a new session.
#[derive(Debug, Clone)]
pub struct SessionDraft<'a> {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// The outcome of taking attendance for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSummary {
    pub recorded: usize,
    pub notified: usize,
}

/// The manager for recording, modifying, and retrieving attendance data.
pub struct AttendanceManager {
    pub(crate) db: SqliteConnection,
}

impl AttendanceManager {
    /// Opens the SQLite database at `database_url` with foreign keys enforced.
    pub fn open(database_url: &str) -> Result<Self> {
        let mut db = SqliteConnection::establish(database_url).map_err(|source| {
            AttendanceError::Connection {
                url: database_url.to_string(),
                source,
            }
        })?;
        db.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;

        debug!(database_url, "opened attendance database");
        Ok(Self { db })
    }

    /// Creates any missing tables. Safe to run against an existing database.
    pub fn initialize_schema(&mut self) -> Result<()> {
        self.db.batch_execute(SCHEMA_SQL)?;
        info!("attendance schema is ready");
        Ok(())
    }

    /// Adds a student profile. Student numbers and emails must be unique.
    pub fn add_student(&mut self, new_student: &NewStudent) -> Result<Student> {
        let taken: i64 = students::table
            .filter(students::student_number.eq(&new_student.student_number))
            .or_filter(students::email.eq(&new_student.email))
            .count()
            .get_result(&mut self.db)?;
        if taken > 0 {
            return Err(AttendanceError::Validation(format!(
                "student {} or email {} already exists",
                new_student.student_number, new_student.email
            )));
        }

        let student = diesel::insert_into(students::table)
            .values(new_student)
            .returning(Student::as_returning())
            .get_result(&mut self.db)?;

        info!(id = student.id, number = %student.student_number, "added student");
        Ok(student)
    }

    /// Inserts students in bulk, skipping any whose student number is already on file.
    ///
    /// Returns the number of students inserted.
    pub fn import_students(&mut self, new_students: &[NewStudent]) -> Result<usize> {
        self.db.immediate_transaction::<_, AttendanceError, _>(|conn| {
            let existing: HashSet<String> = students::table
                .select(students::student_number)
                .load::<String>(conn)?
                .into_iter()
                .collect();

            let fresh: Vec<&NewStudent> = new_students
                .iter()
                .filter(|student| !existing.contains(&student.student_number))
                .collect();

            let mut inserted = 0;
            for student in fresh {
                inserted += diesel::insert_into(students::table)
                    .values(student)
                    .execute(conn)?;
            }

            info!(inserted, skipped = new_students.len() - inserted, "imported students");
            Ok(inserted)
        })
    }

    pub fn add_faculty(&mut self, new_faculty: &NewFaculty) -> Result<Faculty> {
        let taken: i64 = faculty::table
            .filter(faculty::faculty_number.eq(new_faculty.faculty_number))
            .or_filter(faculty::email.eq(new_faculty.email))
            .count()
            .get_result(&mut self.db)?;
        if taken > 0 {
            return Err(AttendanceError::Validation(format!(
                "faculty {} or email {} already exists",
                new_faculty.faculty_number, new_faculty.email
            )));
        }

        let member = diesel::insert_into(faculty::table)
            .values(new_faculty)
            .returning(Faculty::as_returning())
            .get_result(&mut self.db)?;

        info!(id = member.id, number = %member.faculty_number, "added faculty");
        Ok(member)
    }

    /// Updates the acting student's own profile.
    pub fn update_student(&mut self, actor: Actor, changes: &StudentChanges) -> Result<Student> {
        let student_id = actor.student_id()?;
        let current = find_student(&mut self.db, student_id)?;
        if changes.is_empty() {
            return Ok(current);
        }

        if let Some(number) = changes.student_number {
            let taken: i64 = students::table
                .filter(students::student_number.eq(number))
                .filter(students::id.ne(student_id))
                .count()
                .get_result(&mut self.db)?;
            if taken > 0 {
                return Err(AttendanceError::Validation(format!(
                    "student number {number} already exists"
                )));
            }
        }

        let student = diesel::update(students::table.find(student_id))
            .set(changes)
            .returning(Student::as_returning())
            .get_result(&mut self.db)?;

        info!(id = student.id, number = %student.student_number, "updated student profile");
        Ok(student)
    }

    /// Updates the acting faculty member's own profile.
    pub fn update_faculty(&mut self, actor: Actor, changes: &FacultyChanges) -> Result<Faculty> {
        let faculty_id = actor.faculty_id()?;
        let current = find_faculty(&mut self.db, faculty_id)?;
        if changes.is_empty() {
            return Ok(current);
        }

        if let Some(number) = changes.faculty_number {
            let taken: i64 = faculty::table
                .filter(faculty::faculty_number.eq(number))
                .filter(faculty::id.ne(faculty_id))
                .count()
                .get_result(&mut self.db)?;
            if taken > 0 {
                return Err(AttendanceError::Validation(format!(
                    "faculty number {number} already exists"
                )));
            }
        }

        let member = diesel::update(faculty::table.find(faculty_id))
            .set(changes)
            .returning(Faculty::as_returning())
            .get_result(&mut self.db)?;

        info!(id = member.id, number = %member.faculty_number, "updated faculty profile");
        Ok(member)
    }

    pub fn get_course(&mut self, course_id: i32) -> Result<Course> {
        find_course(&mut self.db, course_id)
    }

    /// Creates a course owned by the acting faculty member.
    pub fn add_course(&mut self, actor: Actor, draft: &CourseDraft) -> Result<Course> {
        let faculty_id = actor.faculty_id()?;
        find_faculty(&mut self.db, faculty_id)?;

        check_min_attendance(draft.min_attendance_percent)?;
        check_code_free(&mut self.db, draft.code, None)?;

        let course = diesel::insert_into(courses::table)
            .values(NewCourse {
                code: draft.code,
                title: draft.title,
                faculty_id,
                schedule: draft.schedule,
                location: draft.location,
                min_attendance_percent: draft.min_attendance_percent,
            })
            .returning(Course::as_returning())
            .get_result(&mut self.db)?;

        info!(id = course.id, code = %course.code, faculty_id, "added course");
        Ok(course)
    }

    /// Edits a course the actor teaches.
    pub fn update_course(
        &mut self,
        actor: Actor,
        course_id: i32,
        changes: &CourseChanges,
    ) -> Result<Course> {
        let faculty_id = actor.faculty_id()?;
        let course = find_course(&mut self.db, course_id)?;
        ensure_owner(&course, faculty_id)?;
        if changes.is_empty() {
            return Ok(course);
        }

        if let Some(percent) = changes.min_attendance_percent {
            check_min_attendance(percent)?;
        }
        if let Some(code) = changes.code {
            check_code_free(&mut self.db, code, Some(course_id))?;
        }

        let course = diesel::update(courses::table.find(course_id))
            .set(changes)
            .returning(Course::as_returning())
            .get_result(&mut self.db)?;

        info!(id = course.id, code = %course.code, "updated course");
        Ok(course)
    }

    /// Deletes a course the actor teaches. Its sessions, enrollments, attendance rows and absence
    /// requests go with it.
    pub fn delete_course(&mut self, actor: Actor, course_id: i32) -> Result<()> {
        let faculty_id = actor.faculty_id()?;
        let course = find_course(&mut self.db, course_id)?;
        ensure_owner(&course, faculty_id)?;

        diesel::delete(courses::table.find(course_id)).execute(&mut self.db)?;

        info!(id = course_id, code = %course.code, "deleted course");
        Ok(())
    }

    /// Courses the acting faculty member teaches, by course code.
    pub fn courses_taught_by(&mut self, actor: Actor) -> Result<Vec<Course>> {
        let faculty_id = actor.faculty_id()?;
        load_taught_courses(&mut self.db, faculty_id)
    }

    /// Schedules a session for a course the actor teaches.
    pub fn add_session(
        &mut self,
        actor: Actor,
        course_id: i32,
        draft: &SessionDraft,
    ) -> Result<Session> {
        let faculty_id = actor.faculty_id()?;
        let course = find_course(&mut self.db, course_id)?;
        ensure_owner(&course, faculty_id)?;

        if draft.end_time < draft.start_time {
            return Err(AttendanceError::Validation(format!(
                "session ends at {} before it starts at {}",
                draft.end_time, draft.start_time
            )));
        }

        let session = diesel::insert_into(sessions::table)
            .values(NewSession {
                course_id,
                session_date: draft.date,
                start_time: draft.start_time,
                end_time: draft.end_time,
                title: draft.title,
                notes: draft.notes,
            })
            .returning(Session::as_returning())
            .get_result(&mut self.db)?;

        info!(id = session.id, course_id, date = %session.session_date, "added session");
        Ok(session)
    }

    /// Enrolls a student in a course the actor teaches.
    pub fn enroll(&mut self, actor: Actor, student_id: i32, course_id: i32) -> Result<Enrollment> {
        let faculty_id = actor.faculty_id()?;
        let course = find_course(&mut self.db, course_id)?;
        ensure_owner(&course, faculty_id)?;
        let student = find_student(&mut self.db, student_id)?;

        if is_enrolled(&mut self.db, student_id, course_id)? {
            return Err(AttendanceError::Validation(format!(
                "student {} is already enrolled in {}",
                student.full_name, course.code
            )));
        }

        let enrollment = diesel::insert_into(enrollments::table)
            .values(NewEnrollment {
                student_id,
                course_id,
                enrolled_at: now(),
            })
            .returning(Enrollment::as_returning())
            .get_result(&mut self.db)?;

        info!(student = %student.student_number, course = %course.code, "enrolled student");
        Ok(enrollment)
    }

    /// Removes a student from a course the actor teaches.
    pub fn remove_enrollment(
        &mut self,
        actor: Actor,
        student_id: i32,
        course_id: i32,
    ) -> Result<()> {
        let faculty_id = actor.faculty_id()?;
        let course = find_course(&mut self.db, course_id)?;
        ensure_owner(&course, faculty_id)?;

        let removed = diesel::delete(
            enrollments::table
                .filter(enrollments::student_id.eq(student_id))
                .filter(enrollments::course_id.eq(course_id)),
        )
        .execute(&mut self.db)?;

        if removed == 0 {
            return Err(AttendanceError::not_found(
                "enrollment",
                format!("{student_id}/{course_id}"),
            ));
        }

        info!(student_id, course = %course.code, "removed enrollment");
        Ok(())
    }

    /// All sessions of a course, in calendar order.
    pub fn sessions_of(&mut self, course_id: i32) -> Result<Vec<Session>> {
        load_sessions(&mut self.db, course_id)
    }

    pub fn enrollments_of(&mut self, course_id: i32) -> Result<Vec<Enrollment>> {
        Ok(enrollments::table
            .filter(enrollments::course_id.eq(course_id))
            .order(enrollments::id.asc())
            .select(Enrollment::as_select())
            .load(&mut self.db)?)
    }

    /// A student's attendance rows restricted to the given sessions.
    pub fn attendance_of(
        &mut self,
        student_id: i32,
        session_ids: &[i32],
    ) -> Result<Vec<AttendanceRecord>> {
        Ok(attendance::table
            .filter(attendance::student_id.eq(student_id))
            .filter(attendance::session_id.eq_any(session_ids))
            .select(AttendanceRecord::as_select())
            .load(&mut self.db)?)
    }

    /// Reads the course, its sessions, roster and attendance rows as one consistent snapshot.
    pub fn course_ledger(&mut self, course_id: i32) -> Result<CourseLedger> {
        self.db.transaction::<_, AttendanceError, _>(|conn| load_ledger(conn, course_id))
    }

    /// One student's stats in one course. A course without sessions yields all zeros.
    pub fn student_course_stats(
        &mut self,
        student_id: i32,
        course_id: i32,
    ) -> Result<StudentCourseStats> {
        self.db.transaction::<_, AttendanceError, _>(|conn| {
            let session_ids: Vec<i32> = load_sessions(conn, course_id)?
                .iter()
                .map(|session| session.id)
                .collect();
            if session_ids.is_empty() {
                return Ok(StudentCourseStats::default());
            }

            let statuses: Vec<Status> = attendance::table
                .filter(attendance::student_id.eq(student_id))
                .filter(attendance::session_id.eq_any(&session_ids))
                .select(attendance::status)
                .load(conn)?;

            debug!(student_id, course_id, records = statuses.len(), "computing student stats");
            Ok(StudentCourseStats::from_statuses(session_ids.len(), statuses))
        })
    }

    pub fn course_stats(&mut self, course_id: i32) -> Result<CourseStats> {
        Ok(self.course_ledger(course_id)?.course_stats())
    }

    /// Builds the course report for the faculty member who teaches it.
    pub fn course_report(&mut self, actor: Actor, course_id: i32) -> Result<CourseReport> {
        let faculty_id = actor.faculty_id()?;
        let ledger = self.course_ledger(course_id)?;
        ensure_owner(&ledger.course, faculty_id)?;
        Ok(ledger.report())
    }

    /// Records a batch of statuses for one session, then notifies `sink` about every student in
    /// the batch who is now below the course minimum.
    ///
    /// Every student in the batch must be enrolled in the session's course; otherwise nothing is
    /// written. Existing rows for the session are updated in place.
    pub fn record_attendance(
        &mut self,
        actor: Actor,
        session_id: i32,
        batch: &[AttendanceEntry],
        sink: &mut dyn NotificationSink,
    ) -> Result<RecordingSummary> {
        let faculty_id = actor.faculty_id()?;

        let course_id = self.db.immediate_transaction::<_, AttendanceError, _>(|conn| {
            let session = find_session(conn, session_id)?;
            let course = find_course(conn, session.course_id)?;
            ensure_owner(&course, faculty_id)?;

            let roster: HashSet<i32> = enrollments::table
                .filter(enrollments::course_id.eq(course.id))
                .select(enrollments::student_id)
                .load::<i32>(conn)?
                .into_iter()
                .collect();

            let mut seen = HashSet::new();
            for entry in batch {
                if !roster.contains(&entry.student_id) {
                    return Err(AttendanceError::Validation(format!(
                        "student {} is not enrolled in {}",
                        entry.student_id, course.code
                    )));
                }
                if !seen.insert(entry.student_id) {
                    return Err(AttendanceError::Validation(format!(
                        "student {} appears more than once in the batch",
                        entry.student_id
                    )));
                }
            }

            let recorded_at = now();
            for entry in batch {
                upsert_attendance(
                    conn,
                    &NewAttendance {
                        student_id: entry.student_id,
                        session_id,
                        status: entry.status,
                        notes: entry.notes.as_deref(),
                        recorded_at,
                    },
                )?;
            }

            info!(
                session_id,
                course = %course.code,
                recorded = batch.len(),
                "recorded attendance"
            );
            Ok(course.id)
        })?;

        let ledger = self.course_ledger(course_id)?;
        let affected: Vec<i32> = batch.iter().map(|entry| entry.student_id).collect();
        let notified = notify::trigger(&ledger, &affected, sink);

        Ok(RecordingSummary {
            recorded: batch.len(),
            notified,
        })
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn ensure_owner(course: &Course, faculty_id: i32) -> Result<()> {
    if course.faculty_id != faculty_id {
        return Err(AttendanceError::PermissionDenied(format!(
            "faculty {faculty_id} does not teach {}",
            course.code
        )));
    }
    Ok(())
}

fn check_min_attendance(percent: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(AttendanceError::Validation(format!(
            "minimum attendance {percent} is not a percentage"
        )));
    }
    Ok(())
}

/// Fails if `code` belongs to any course other than `except`.
fn check_code_free(conn: &mut SqliteConnection, code: &str, except: Option<i32>) -> Result<()> {
    let mut query = courses::table.filter(courses::code.eq(code)).into_boxed();
    if let Some(course_id) = except {
        query = query.filter(courses::id.ne(course_id));
    }

    let taken: i64 = query.count().get_result(conn)?;
    if taken > 0 {
        return Err(AttendanceError::Validation(format!(
            "course code {code} already exists"
        )));
    }
    Ok(())
}

pub(crate) fn find_student(conn: &mut SqliteConnection, student_id: i32) -> Result<Student> {
    students::table
        .find(student_id)
        .select(Student::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AttendanceError::not_found("student", student_id))
}

pub(crate) fn find_faculty(conn: &mut SqliteConnection, faculty_id: i32) -> Result<Faculty> {
    faculty::table
        .find(faculty_id)
        .select(Faculty::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AttendanceError::not_found("faculty", faculty_id))
}

pub(crate) fn find_course(conn: &mut SqliteConnection, course_id: i32) -> Result<Course> {
    courses::table
        .find(course_id)
        .select(Course::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AttendanceError::not_found("course", course_id))
}

pub(crate) fn find_session(conn: &mut SqliteConnection, session_id: i32) -> Result<Session> {
    sessions::table
        .find(session_id)
        .select(Session::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AttendanceError::not_found("session", session_id))
}

pub(crate) fn is_enrolled(
    conn: &mut SqliteConnection,
    student_id: i32,
    course_id: i32,
) -> Result<bool> {
    let count: i64 = enrollments::table
        .filter(enrollments::student_id.eq(student_id))
        .filter(enrollments::course_id.eq(course_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

pub(crate) fn load_taught_courses(
    conn: &mut SqliteConnection,
    faculty_id: i32,
) -> Result<Vec<Course>> {
    Ok(courses::table
        .filter(courses::faculty_id.eq(faculty_id))
        .order(courses::code.asc())
        .select(Course::as_select())
        .load(conn)?)
}

pub(crate) fn load_sessions(conn: &mut SqliteConnection, course_id: i32) -> Result<Vec<Session>> {
    Ok(sessions::table
        .filter(sessions::course_id.eq(course_id))
        .order((sessions::session_date.asc(), sessions::start_time.asc()))
        .select(Session::as_select())
        .load(conn)?)
}

pub(crate) fn load_ledger(conn: &mut SqliteConnection, course_id: i32) -> Result<CourseLedger> {
    let course = find_course(conn, course_id)?;
    let sessions = load_sessions(conn, course_id)?;

    let roster = enrollments::table
        .inner_join(students::table)
        .filter(enrollments::course_id.eq(course_id))
        .order(enrollments::id.asc())
        .select(Student::as_select())
        .load(conn)?;

    let records = attendance::table
        .inner_join(sessions::table)
        .filter(sessions::course_id.eq(course_id))
        .select(AttendanceRecord::as_select())
        .load(conn)?;

    debug!(
        course_id,
        sessions = sessions.len(),
        students = roster.len(),
        records = records.len(),
        "loaded course ledger"
    );

    Ok(CourseLedger {
        course,
        sessions,
        roster,
        records,
    })
}

/// Inserts or updates the row for (student, session). `recorded_at` is kept on update.
pub(crate) fn upsert_attendance(conn: &mut SqliteConnection, row: &NewAttendance) -> Result<()> {
    diesel::insert_into(attendance::table)
        .values(row)
        .on_conflict((attendance::student_id, attendance::session_id))
        .do_update()
        .set((
            attendance::status.eq(excluded(attendance::status)),
            attendance::notes.eq(excluded(attendance::notes)),
        ))
        .execute(conn)?;
    Ok(())
}
