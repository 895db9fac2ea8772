//! Absence request lifecycle and the retroactive excusals an approval produces.
//!
//! A request starts `pending` and moves exactly once, to `approved` or `rejected`. Approval turns
//! into a set of upserts keyed by (student, session); applying the same set twice leaves the
//! ledger unchanged.

use crate::error::{AttendanceError, Result};
use crate::models::{AbsenceRequest, RequestStatus, Session};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A faculty member's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl RequestStatus {
    /// Applies `decision`, failing unless the request is still pending.
    pub fn respond(self, request_id: i32, decision: Decision) -> Result<RequestStatus> {
        match self {
            RequestStatus::Pending => Ok(match decision {
                Decision::Approve => RequestStatus::Approved,
                Decision::Reject => RequestStatus::Rejected,
            }),
            status => Err(AttendanceError::AlreadyResponded {
                id: request_id,
                status,
            }),
        }
    }
}

/// Checks the date range of a new request.
pub fn validate_range(from_date: NaiveDate, to_date: NaiveDate) -> Result<()> {
    if from_date > to_date {
        return Err(AttendanceError::Validation(format!(
            "end date {to_date} is before start date {from_date}"
        )));
    }
    Ok(())
}

/// The note stored on every attendance row an approval touches.
pub fn excusal_note(reason: &str) -> String {
    format!("Excused absence: {reason}")
}

/// A single upsert produced by an approved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excusal {
    pub student_id: i32,
    pub session_id: i32,
    pub note: String,
}

/// Lists the excusals for `request` among the given sessions.
///
/// Sessions from other courses and sessions outside the request's inclusive date range are
/// skipped. Returns nothing unless the request is approved.
pub fn plan_excusals(request: &AbsenceRequest, sessions: &[Session]) -> Vec<Excusal> {
    if request.status != RequestStatus::Approved {
        return Vec::new();
    }

    let note = excusal_note(&request.reason);
    sessions
        .iter()
        .filter(|session| session.course_id == request.course_id)
        .filter(|session| request.covers(session.session_date))
        .map(|session| Excusal {
            student_id: request.student_id,
            session_id: session.id,
            note: note.clone(),
        })
        .collect()
}
