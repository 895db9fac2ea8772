//! Submitting, answering and reconciling absence requests.

use crate::error::{AttendanceError, Result};
use crate::manager::{
    Actor, AttendanceManager, ensure_owner, find_course, is_enrolled, now, upsert_attendance,
};
use crate::models::{
    AbsenceRequest, NewAbsenceRequest, NewAttendance, RequestStatus, Session, Status,
};
use crate::reconcile::{Decision, plan_excusals, validate_range};
use crate::schema::{absence_requests, courses, sessions};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use std::cmp::Reverse;
use tracing::info;

impl AttendanceManager {
    /// Files a pending request from the acting student for a course they are enrolled in.
    pub fn submit_absence_request(
        &mut self,
        actor: Actor,
        course_id: i32,
        from_date: NaiveDate,
        to_date: NaiveDate,
        reason: &str,
    ) -> Result<AbsenceRequest> {
        let student_id = actor.student_id()?;
        let course = find_course(&mut self.db, course_id)?;

        if !is_enrolled(&mut self.db, student_id, course_id)? {
            return Err(AttendanceError::Validation(format!(
                "student {student_id} is not enrolled in {}",
                course.code
            )));
        }
        validate_range(from_date, to_date)?;
        if reason.trim().is_empty() {
            return Err(AttendanceError::Validation(
                "an absence request needs a reason".to_string(),
            ));
        }

        let request = diesel::insert_into(absence_requests::table)
            .values(NewAbsenceRequest {
                student_id,
                course_id,
                request_date: Utc::now().date_naive(),
                from_date,
                to_date,
                reason: reason.trim(),
                status: RequestStatus::Pending,
            })
            .returning(AbsenceRequest::as_returning())
            .get_result(&mut self.db)?;

        info!(id = request.id, student_id, course = %course.code, "submitted absence request");
        Ok(request)
    }

    /// Answers a pending request for a course the actor teaches.
    ///
    /// Approval marks every session of the course within the requested dates as excused for the
    /// student, creating rows where none exist. Rejection only records the response.
    pub fn respond_to_request(
        &mut self,
        actor: Actor,
        request_id: i32,
        decision: Decision,
        response_notes: Option<&str>,
    ) -> Result<AbsenceRequest> {
        let faculty_id = actor.faculty_id()?;

        self.db.immediate_transaction::<_, AttendanceError, _>(|conn| {
            let request = find_request(conn, request_id)?;
            let course = find_course(conn, request.course_id)?;
            ensure_owner(&course, faculty_id)?;

            let status = request.status.respond(request.id, decision)?;
            let request = diesel::update(absence_requests::table.find(request.id))
                .set((
                    absence_requests::status.eq(status),
                    absence_requests::response_notes.eq(response_notes),
                    absence_requests::responded_at.eq(now()),
                ))
                .returning(AbsenceRequest::as_returning())
                .get_result(conn)?;

            let excused = apply_excusals(conn, &request)?;
            info!(id = request.id, %status, excused, "responded to absence request");
            Ok(request)
        })
    }

    /// Re-applies the excusals of an approved request. Running it any number of times leaves the
    /// ledger as a single run would. Returns the number of sessions covered.
    pub fn reconcile_request(&mut self, request_id: i32) -> Result<usize> {
        self.db.immediate_transaction::<_, AttendanceError, _>(|conn| {
            let request = find_request(conn, request_id)?;
            if request.status != RequestStatus::Approved {
                return Err(AttendanceError::Validation(format!(
                    "absence request {request_id} is {}, only approved requests can be reconciled",
                    request.status
                )));
            }
            apply_excusals(conn, &request)
        })
    }

    pub fn get_request(&mut self, request_id: i32) -> Result<AbsenceRequest> {
        find_request(&mut self.db, request_id)
    }

    /// The acting student's requests, newest first.
    pub fn requests_for_student(&mut self, actor: Actor) -> Result<Vec<AbsenceRequest>> {
        let student_id = actor.student_id()?;

        Ok(absence_requests::table
            .filter(absence_requests::student_id.eq(student_id))
            .order((absence_requests::request_date.desc(), absence_requests::id.desc()))
            .select(AbsenceRequest::as_select())
            .load(&mut self.db)?)
    }

    /// Requests for every course the acting faculty member teaches, pending ones first and newest
    /// first within each group.
    pub fn requests_for_faculty(&mut self, actor: Actor) -> Result<Vec<AbsenceRequest>> {
        let faculty_id = actor.faculty_id()?;

        let mut requests: Vec<AbsenceRequest> = absence_requests::table
            .inner_join(courses::table)
            .filter(courses::faculty_id.eq(faculty_id))
            .select(AbsenceRequest::as_select())
            .load(&mut self.db)?;

        requests.sort_by_key(|request| {
            (
                request.status != RequestStatus::Pending,
                Reverse(request.request_date),
                Reverse(request.id),
            )
        });
        Ok(requests)
    }
}

fn find_request(conn: &mut SqliteConnection, request_id: i32) -> Result<AbsenceRequest> {
    absence_requests::table
        .find(request_id)
        .select(AbsenceRequest::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AttendanceError::not_found("absence request", request_id))
}

/// Upserts an excused row for every session the request covers.
fn apply_excusals(conn: &mut SqliteConnection, request: &AbsenceRequest) -> Result<usize> {
    let covered: Vec<Session> = sessions::table
        .filter(sessions::course_id.eq(request.course_id))
        .filter(sessions::session_date.between(request.from_date, request.to_date))
        .order(sessions::session_date.asc())
        .select(Session::as_select())
        .load(conn)?;

    let plan = plan_excusals(request, &covered);
    let recorded_at = now();
    for excusal in &plan {
        upsert_attendance(
            conn,
            &NewAttendance {
                student_id: excusal.student_id,
                session_id: excusal.session_id,
                status: Status::Excused,
                notes: Some(&excusal.note),
                recorded_at,
            },
        )?;
    }

    Ok(plan.len())
}
