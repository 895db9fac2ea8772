use chrono::{NaiveDate, NaiveTime};
use course_attendance::manager::{CourseDraft, SessionDraft};
use course_attendance::models::{
    AttendanceEntry, AttendanceRecord, Course, CourseChanges, FacultyChanges, NewFaculty,
    NewStudent, RequestStatus, Session, Status, Student, StudentChanges,
};
use course_attendance::notify::LowAttendanceNotice;
use course_attendance::reconcile::Decision;
use course_attendance::stats::{CourseStats, StudentCourseStats};
use course_attendance::{Actor, AttendanceError, AttendanceManager};

struct Fixture {
    manager: AttendanceManager,
    instructor: Actor,
    stranger: Actor,
    course: Course,
    sessions: Vec<Session>,
    students: Vec<Student>,
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn add_faculty(manager: &mut AttendanceManager, number: &str, email: &str) -> Actor {
    let member = manager
        .add_faculty(&NewFaculty {
            faculty_number: number,
            full_name: "Prof. Hopper",
            email,
            department: "Computer Science",
        })
        .unwrap();
    Actor::Faculty(member.id)
}

/// A course with a minimum of 80%, four sessions on March 3-6 and three enrolled students.
fn fixture() -> Fixture {
    let mut manager = AttendanceManager::open(":memory:").unwrap();
    manager.initialize_schema().unwrap();

    let instructor = add_faculty(&mut manager, "F001", "hopper@uni.example");
    let stranger = add_faculty(&mut manager, "F002", "turing@uni.example");

    let course = manager
        .add_course(
            instructor,
            &CourseDraft {
                code: "CS101",
                title: "Intro to Programming",
                schedule: "MTWT 09:00",
                location: "Room 101",
                min_attendance_percent: 80.0,
            },
        )
        .unwrap();

    let sessions: Vec<Session> = (3..=6)
        .map(|d| {
            manager
                .add_session(
                    instructor,
                    course.id,
                    &SessionDraft {
                        date: day(d),
                        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                        title: None,
                        notes: None,
                    },
                )
                .unwrap()
        })
        .collect();

    let students: Vec<Student> = ["Ada", "Grace", "Linus"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            manager
                .add_student(&NewStudent {
                    student_number: format!("S{:03}", i + 1),
                    full_name: name.to_string(),
                    email: format!("{}@uni.example", name.to_lowercase()),
                    department: "Computer Science".to_string(),
                    year_of_study: 1,
                })
                .unwrap()
        })
        .collect();

    for student in &students {
        manager.enroll(instructor, student.id, course.id).unwrap();
    }

    Fixture {
        manager,
        instructor,
        stranger,
        course,
        sessions,
        students,
    }
}

fn entry(student: &Student, status: Status) -> AttendanceEntry {
    AttendanceEntry {
        student_id: student.id,
        status,
        notes: None,
    }
}

impl Fixture {
    fn record(&mut self, session: usize, batch: &[AttendanceEntry]) -> Vec<LowAttendanceNotice> {
        let mut sink: Vec<LowAttendanceNotice> = Vec::new();
        self.manager
            .record_attendance(self.instructor, self.sessions[session].id, batch, &mut sink)
            .unwrap();
        sink
    }

    fn records_of(&mut self, student: usize) -> Vec<AttendanceRecord> {
        let session_ids: Vec<i32> = self.sessions.iter().map(|s| s.id).collect();
        let mut records = self
            .manager
            .attendance_of(self.students[student].id, &session_ids)
            .unwrap();
        records.sort_by_key(|record| record.session_id);
        records
    }

    fn stats(&mut self, student: usize) -> StudentCourseStats {
        self.manager
            .student_course_stats(self.students[student].id, self.course.id)
            .unwrap()
    }

    fn request(&mut self, student: usize, from: u32, to: u32) -> i32 {
        self.manager
            .submit_absence_request(
                Actor::Student(self.students[student].id),
                self.course.id,
                day(from),
                day(to),
                "Family emergency",
            )
            .unwrap()
            .id
    }
}

#[test]
fn unrecorded_sessions_count_against_the_student() {
    let mut f = fixture();
    let ada = f.students[0].clone();
    f.record(0, &[entry(&ada, Status::Present)]);
    f.record(1, &[entry(&ada, Status::Late)]);
    f.record(2, &[entry(&ada, Status::Absent)]);

    let stats = f.stats(0);
    assert_eq!(stats.total, 4);
    assert_eq!((stats.present, stats.late, stats.absent, stats.excused), (1, 1, 2, 0));
    assert_eq!(stats.percentage, 50.0);

    let from_ledger = f.manager.course_ledger(f.course.id).unwrap().student_stats(ada.id);
    assert_eq!(from_ledger, stats);
}

#[test]
fn courses_without_sessions_are_all_zero() {
    let mut f = fixture();
    let empty = f
        .manager
        .add_course(
            f.instructor,
            &CourseDraft {
                code: "CS999",
                title: "Unscheduled",
                schedule: "TBA",
                location: "TBA",
                min_attendance_percent: 75.0,
            },
        )
        .unwrap();
    f.manager.enroll(f.instructor, f.students[0].id, empty.id).unwrap();

    assert_eq!(
        f.manager.student_course_stats(f.students[0].id, empty.id).unwrap(),
        StudentCourseStats::default()
    );
    assert_eq!(f.manager.course_stats(empty.id).unwrap(), CourseStats::default());
}

#[test]
fn recording_notifies_students_below_the_course_minimum() {
    let mut f = fixture();
    let (ada, grace) = (f.students[0].clone(), f.students[1].clone());

    for session in 0..3 {
        f.record(session, &[entry(&ada, Status::Present), entry(&grace, Status::Present)]);
    }
    // Ada stays at 4/4. Grace drops to 3/4 = 75%, under the 80% minimum.
    let notices = f.record(3, &[entry(&ada, Status::Present), entry(&grace, Status::Absent)]);

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].student_id, grace.id);
    assert_eq!(notices[0].percentage, 75.0);
    assert_eq!(notices[0].minimum, 80.0);

    // Re-recording the same session emits again.
    let again = f.record(3, &[entry(&grace, Status::Absent)]);
    assert_eq!(again.len(), 1);
}

#[test]
fn recording_twice_updates_the_existing_row() {
    let mut f = fixture();
    let ada = f.students[0].clone();

    f.record(0, &[entry(&ada, Status::Absent)]);
    f.record(
        0,
        &[AttendanceEntry {
            student_id: ada.id,
            status: Status::Late,
            notes: Some("bus delay".to_string()),
        }],
    );

    let records = f.records_of(0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, Status::Late);
    assert_eq!(records[0].notes.as_deref(), Some("bus delay"));
}

#[test]
fn batches_with_unenrolled_students_write_nothing() {
    let mut f = fixture();
    let outsider = f
        .manager
        .add_student(&NewStudent {
            student_number: "S999".to_string(),
            full_name: "Outsider".to_string(),
            email: "outsider@uni.example".to_string(),
            department: "Physics".to_string(),
            year_of_study: 3,
        })
        .unwrap();
    let ada = f.students[0].clone();

    let err = f
        .manager
        .record_attendance(
            f.instructor,
            f.sessions[0].id,
            &[entry(&ada, Status::Present), entry(&outsider, Status::Present)],
            &mut Vec::<LowAttendanceNotice>::new(),
        )
        .unwrap_err();

    assert!(matches!(err, AttendanceError::Validation(_)));
    assert!(f.records_of(0).is_empty());
}

#[test]
fn only_the_course_owner_may_take_attendance() {
    let mut f = fixture();
    let ada = f.students[0].clone();

    let err = f
        .manager
        .record_attendance(
            f.stranger,
            f.sessions[0].id,
            &[entry(&ada, Status::Present)],
            &mut Vec::<LowAttendanceNotice>::new(),
        )
        .unwrap_err();
    assert!(matches!(err, AttendanceError::PermissionDenied(_)));

    let err = f
        .manager
        .record_attendance(f.instructor, 9999, &[], &mut Vec::<LowAttendanceNotice>::new())
        .unwrap_err();
    assert!(matches!(err, AttendanceError::NotFound { entity: "session", .. }));

    assert!(f.records_of(0).is_empty());
}

#[test]
fn approval_excuses_every_session_in_range() {
    let mut f = fixture();
    let ada = f.students[0].clone();
    f.record(1, &[entry(&ada, Status::Present)]);

    // March 4 already has a record, March 5 has none.
    let request_id = f.request(0, 4, 5);
    let request = f
        .manager
        .respond_to_request(f.instructor, request_id, Decision::Approve, Some("Get well soon"))
        .unwrap();

    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(request.response_notes.as_deref(), Some("Get well soon"));
    assert!(request.responded_at.is_some());

    let records = f.records_of(0);
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.status, Status::Excused);
        assert_eq!(record.notes.as_deref(), Some("Excused absence: Family emergency"));
    }
    assert_eq!(records[0].session_id, f.sessions[1].id);
    assert_eq!(records[1].session_id, f.sessions[2].id);

    let stats = f.stats(0);
    assert_eq!(stats.excused, 2);
    assert_eq!(stats.absent, 2);
    assert_eq!(stats.percentage, 0.0);
}

#[test]
fn reconciliation_is_idempotent() {
    let mut f = fixture();
    let request_id = f.request(1, 3, 6);
    f.manager
        .respond_to_request(f.instructor, request_id, Decision::Approve, None)
        .unwrap();
    let once = f.records_of(1);

    assert_eq!(f.manager.reconcile_request(request_id).unwrap(), 4);
    let twice = f.records_of(1);

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 4);
}

#[test]
fn rejection_leaves_the_ledger_alone() {
    let mut f = fixture();
    let ada = f.students[0].clone();
    f.record(0, &[entry(&ada, Status::Absent)]);
    let before = f.records_of(0);

    let request_id = f.request(0, 3, 6);
    let request = f
        .manager
        .respond_to_request(f.instructor, request_id, Decision::Reject, Some("No documentation"))
        .unwrap();

    assert_eq!(request.status, RequestStatus::Rejected);
    assert_eq!(f.records_of(0), before);
    assert!(matches!(
        f.manager.reconcile_request(request_id),
        Err(AttendanceError::Validation(_))
    ));
}

#[test]
fn responded_requests_cannot_be_answered_again() {
    let mut f = fixture();
    let request_id = f.request(0, 3, 3);
    f.manager
        .respond_to_request(f.instructor, request_id, Decision::Reject, None)
        .unwrap();

    let err = f
        .manager
        .respond_to_request(f.instructor, request_id, Decision::Approve, None)
        .unwrap_err();
    assert!(matches!(
        err,
        AttendanceError::AlreadyResponded {
            status: RequestStatus::Rejected,
            ..
        }
    ));
    assert!(f.records_of(0).is_empty());
}

#[test]
fn strangers_cannot_answer_requests() {
    let mut f = fixture();
    let request_id = f.request(0, 3, 4);

    let err = f
        .manager
        .respond_to_request(f.stranger, request_id, Decision::Approve, None)
        .unwrap_err();
    assert!(matches!(err, AttendanceError::PermissionDenied(_)));
    assert_eq!(
        f.manager.get_request(request_id).unwrap().status,
        RequestStatus::Pending
    );
    assert!(f.records_of(0).is_empty());
}

#[test]
fn invalid_requests_are_rejected_before_saving() {
    let mut f = fixture();
    let ada = Actor::Student(f.students[0].id);

    let reversed = f
        .manager
        .submit_absence_request(ada, f.course.id, day(6), day(3), "Trip");
    assert!(matches!(reversed, Err(AttendanceError::Validation(_))));

    let blank = f
        .manager
        .submit_absence_request(ada, f.course.id, day(3), day(3), "  ");
    assert!(matches!(blank, Err(AttendanceError::Validation(_))));

    let by_faculty = f
        .manager
        .submit_absence_request(f.instructor, f.course.id, day(3), day(3), "Trip");
    assert!(matches!(by_faculty, Err(AttendanceError::PermissionDenied(_))));

    assert!(f.manager.requests_for_student(ada).unwrap().is_empty());
}

#[test]
fn report_and_dashboard_use_different_thresholds() {
    let mut f = fixture();
    let students = f.students.clone();

    for session in 0..4 {
        let mut batch = vec![
            entry(&students[1], Status::Present),
            entry(&students[2], Status::Late),
        ];
        if session < 3 {
            batch.push(entry(&students[0], Status::Present));
        }
        f.record(session, &batch);
    }

    // Ada sits at 75%: below the course's 80% but not below the 75% reference.
    let report = f.manager.course_report(f.instructor, f.course.id).unwrap();
    assert_eq!(report.students[0].name, "Ada");
    assert_eq!(report.students[0].percentage, 75.0);
    assert!(report.students[0].below_threshold);
    assert_eq!(report.summary.students_below_threshold, 1);
    assert_eq!(report.summary.total_students, 3);
    assert_eq!(report.summary.total_sessions, 4);
    assert_eq!(report.summary.overall_attendance_rate, 100.0);
    assert_eq!(report.sessions[0].title, "Session on Mar 03");

    let stats = f.manager.course_stats(f.course.id).unwrap();
    assert_eq!(stats.below_threshold, 0);
    assert_eq!(stats.student_count, 3);
    assert_eq!(stats.sessions_count, 4);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sessions"][3]["date"], "2025-03-06");

    assert!(matches!(
        f.manager.course_report(f.stranger, f.course.id),
        Err(AttendanceError::PermissionDenied(_))
    ));
}

#[test]
fn duplicate_enrollment_is_a_validation_error() {
    let mut f = fixture();
    let err = f
        .manager
        .enroll(f.instructor, f.students[0].id, f.course.id)
        .unwrap_err();
    assert!(matches!(err, AttendanceError::Validation(_)));

    f.manager
        .remove_enrollment(f.instructor, f.students[0].id, f.course.id)
        .unwrap();
    assert_eq!(f.manager.enrollments_of(f.course.id).unwrap().len(), 2);
    assert!(matches!(
        f.manager.remove_enrollment(f.instructor, f.students[0].id, f.course.id),
        Err(AttendanceError::NotFound { .. })
    ));
}

#[test]
fn student_history_lists_every_session() {
    let mut f = fixture();
    let ada = f.students[0].clone();
    f.record(0, &[entry(&ada, Status::Present)]);
    f.record(2, &[entry(&ada, Status::Absent)]);

    let history = f
        .manager
        .student_session_history(Actor::Student(ada.id), f.course.id)
        .unwrap();
    let statuses: Vec<Option<Status>> = history.iter().map(|entry| entry.status).collect();
    assert_eq!(statuses, [Some(Status::Present), None, Some(Status::Absent), None]);

    let overview = f.manager.student_overview(Actor::Student(ada.id)).unwrap();
    assert_eq!(overview.courses.len(), 1);
    assert!(overview.courses[0].below_minimum);
    assert_eq!(overview.recent_absences.len(), 1);
    assert_eq!(overview.recent_absences[0].date, day(5));
}

#[test]
fn faculty_see_pending_requests_first() {
    let mut f = fixture();
    let first = f.request(0, 3, 3);
    let second = f.request(1, 4, 4);
    f.manager
        .respond_to_request(f.instructor, second, Decision::Approve, None)
        .unwrap();
    let third = f.request(2, 5, 5);

    let ids: Vec<i32> = f
        .manager
        .requests_for_faculty(f.instructor)
        .unwrap()
        .iter()
        .map(|request| request.id)
        .collect();
    assert_eq!(ids, [third, first, second]);

    let dashboard = f.manager.faculty_dashboard(f.instructor, day(4)).unwrap();
    assert_eq!(dashboard.pending_requests, 2);
    assert_eq!(dashboard.today_sessions.len(), 1);
    assert_eq!(dashboard.today_sessions[0].id, f.sessions[1].id);
    assert!(!dashboard.all_clear());

    assert!(f.manager.requests_for_faculty(f.stranger).unwrap().is_empty());
}

#[test]
fn only_the_owner_edits_a_course() {
    let mut f = fixture();
    let changes = CourseChanges {
        title: Some("Programming Fundamentals"),
        min_attendance_percent: Some(70.0),
        ..CourseChanges::default()
    };

    let err = f
        .manager
        .update_course(f.stranger, f.course.id, &changes)
        .unwrap_err();
    assert!(matches!(err, AttendanceError::PermissionDenied(_)));

    let course = f
        .manager
        .update_course(f.instructor, f.course.id, &changes)
        .unwrap();
    assert_eq!(course.title, "Programming Fundamentals");
    assert_eq!(course.min_attendance_percent, 70.0);
    assert_eq!(course.code, "CS101");
    assert_eq!(f.manager.get_course(f.course.id).unwrap(), course);

    let unchanged = f
        .manager
        .update_course(f.instructor, f.course.id, &CourseChanges::default())
        .unwrap();
    assert_eq!(unchanged, course);
}

#[test]
fn course_edits_are_validated() {
    let mut f = fixture();
    f.manager
        .add_course(
            f.instructor,
            &CourseDraft {
                code: "CS102",
                title: "Data Structures",
                schedule: "TTh 11:00",
                location: "Room 202",
                min_attendance_percent: 75.0,
            },
        )
        .unwrap();

    let taken_code = CourseChanges {
        code: Some("CS102"),
        ..CourseChanges::default()
    };
    assert!(matches!(
        f.manager.update_course(f.instructor, f.course.id, &taken_code),
        Err(AttendanceError::Validation(_))
    ));

    let over_100 = CourseChanges {
        min_attendance_percent: Some(120.0),
        ..CourseChanges::default()
    };
    assert!(matches!(
        f.manager.update_course(f.instructor, f.course.id, &over_100),
        Err(AttendanceError::Validation(_))
    ));

    let same_code = CourseChanges {
        code: Some("CS101"),
        ..CourseChanges::default()
    };
    assert!(f.manager.update_course(f.instructor, f.course.id, &same_code).is_ok());

    let codes: Vec<String> = f
        .manager
        .courses_taught_by(f.instructor)
        .unwrap()
        .into_iter()
        .map(|course| course.code)
        .collect();
    assert_eq!(codes, ["CS101", "CS102"]);
    assert!(f.manager.courses_taught_by(f.stranger).unwrap().is_empty());
}

#[test]
fn deleting_a_course_removes_everything_under_it() {
    let mut f = fixture();
    let ada = f.students[0].clone();
    f.record(0, &[entry(&ada, Status::Present)]);
    f.request(0, 5, 6);

    let session_ids: Vec<i32> = f.sessions.iter().map(|s| s.id).collect();
    let listed: Vec<i32> = f
        .manager
        .sessions_of(f.course.id)
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, session_ids);

    let err = f.manager.delete_course(f.stranger, f.course.id).unwrap_err();
    assert!(matches!(err, AttendanceError::PermissionDenied(_)));

    f.manager.delete_course(f.instructor, f.course.id).unwrap();

    assert!(matches!(
        f.manager.get_course(f.course.id),
        Err(AttendanceError::NotFound { .. })
    ));
    assert!(f.manager.sessions_of(f.course.id).unwrap().is_empty());
    assert!(f.manager.enrollments_of(f.course.id).unwrap().is_empty());
    assert!(f.manager.attendance_of(ada.id, &session_ids).unwrap().is_empty());
    assert!(
        f.manager
            .requests_for_student(Actor::Student(ada.id))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn users_update_only_their_own_profile() {
    let mut f = fixture();
    let ada = Actor::Student(f.students[0].id);

    let updated = f
        .manager
        .update_student(
            ada,
            &StudentChanges {
                full_name: Some("Ada Lovelace"),
                year_of_study: Some(2),
                ..StudentChanges::default()
            },
        )
        .unwrap();
    assert_eq!(updated.full_name, "Ada Lovelace");
    assert_eq!(updated.year_of_study, 2);
    assert_eq!(updated.student_number, f.students[0].student_number);
    assert_eq!(updated.email, f.students[0].email);

    let taken = StudentChanges {
        student_number: Some(&f.students[1].student_number),
        ..StudentChanges::default()
    };
    assert!(matches!(
        f.manager.update_student(ada, &taken),
        Err(AttendanceError::Validation(_))
    ));

    assert!(matches!(
        f.manager.update_student(f.instructor, &StudentChanges::default()),
        Err(AttendanceError::PermissionDenied(_))
    ));

    let member = f
        .manager
        .update_faculty(
            f.instructor,
            &FacultyChanges {
                department: Some("Mathematics"),
                ..FacultyChanges::default()
            },
        )
        .unwrap();
    assert_eq!(member.department, "Mathematics");
    assert_eq!(member.faculty_number, "F001");

    let taken = FacultyChanges {
        faculty_number: Some("F002"),
        ..FacultyChanges::default()
    };
    assert!(matches!(
        f.manager.update_faculty(f.instructor, &taken),
        Err(AttendanceError::Validation(_))
    ));
}
