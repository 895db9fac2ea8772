use crate::dashboard::{FacultyDashboard, SessionAttendance, StudentOverview};
use crate::models::{AbsenceRequest, Course, Session};
use crate::report::CourseReport;
use crate::stats::{CourseStats, StudentCourseStats};
use tabled::{Table, Tabled, settings::Style};

fn render<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn show_courses(courses: &[Course]) {
    println!("Courses:\n{}", render(courses.iter().cloned()));
}

pub fn show_sessions(course: &Course, sessions: &[Session]) {
    #[derive(Tabled)]
    struct Row {
        id: i32,
        date: String,
        start: String,
        end: String,
        title: String,
    }

    let rows = sessions.iter().map(|session| Row {
        id: session.id,
        date: session.session_date.to_string(),
        start: session.start_time.to_string(),
        end: session.end_time.to_string(),
        title: session.display_title(),
    });
    println!("{} {}:\n{}", course.code, course.title, render(rows));
}

/// Pretty prints one student's standing in a course.
pub fn show_student_stats(stats: &StudentCourseStats) {
    #[derive(Tabled)]
    struct Row {
        total: usize,
        present: usize,
        absent: usize,
        late: usize,
        excused: usize,
        percentage: f64,
    }

    let row = Row {
        total: stats.total,
        present: stats.present,
        absent: stats.absent,
        late: stats.late,
        excused: stats.excused,
        percentage: stats.percentage,
    };
    println!("{}", render([row]));
}

/// Pretty prints course-wide figures.
pub fn show_course_stats(stats: &CourseStats) {
    #[derive(Tabled)]
    struct Row {
        sessions: usize,
        students: usize,
        attendance_rate: f64,
        below_75_percent: usize,
    }

    let row = Row {
        sessions: stats.sessions_count,
        students: stats.student_count,
        attendance_rate: stats.attendance_rate,
        below_75_percent: stats.below_threshold,
    };
    println!("{}", render([row]));
}

/// Pretty prints the full course report.
pub fn show_report(report: &CourseReport) {
    println!(
        "{} {} (minimum {}%)",
        report.course.code, report.course.title, report.course.min_attendance
    );
    println!(
        "{} students, {} sessions, overall attendance {:.2}%, {} below minimum",
        report.summary.total_students,
        report.summary.total_sessions,
        report.summary.overall_attendance_rate,
        report.summary.students_below_threshold
    );
    println!("Students:\n{}", render(report.students.iter().cloned()));
    println!("Sessions:\n{}", render(report.sessions.iter().cloned()));
}

pub fn show_requests(requests: &[AbsenceRequest]) {
    #[derive(Tabled)]
    struct Row {
        id: i32,
        student: i32,
        course: i32,
        from: String,
        to: String,
        status: String,
        reason: String,
        response: String,
    }

    let rows = requests.iter().map(|request| Row {
        id: request.id,
        student: request.student_id,
        course: request.course_id,
        from: request.from_date.to_string(),
        to: request.to_date.to_string(),
        status: request.status.to_string(),
        reason: request.reason.clone(),
        response: request.response_notes.clone().unwrap_or_default(),
    });
    println!("Absence requests:\n{}", render(rows));
}

pub fn show_history(history: &[SessionAttendance]) {
    #[derive(Tabled)]
    struct Row {
        date: String,
        title: String,
        status: String,
        notes: String,
    }

    let rows = history.iter().map(|entry| Row {
        date: entry.session.session_date.to_string(),
        title: entry.session.display_title(),
        status: entry
            .status
            .map(|status| status.to_string())
            .unwrap_or_else(|| "not recorded".to_string()),
        notes: entry.notes.clone().unwrap_or_default(),
    });
    println!("{}", render(rows));
}

pub fn show_student_overview(overview: &StudentOverview) {
    #[derive(Tabled)]
    struct Row {
        code: String,
        title: String,
        present: usize,
        absent: usize,
        late: usize,
        excused: usize,
        percentage: f64,
        minimum: f64,
        warning: &'static str,
    }

    println!(
        "{} ({})",
        overview.student.full_name, overview.student.student_number
    );

    let rows = overview.courses.iter().map(|standing| Row {
        code: standing.course.code.clone(),
        title: standing.course.title.clone(),
        present: standing.stats.present,
        absent: standing.stats.absent,
        late: standing.stats.late,
        excused: standing.stats.excused,
        percentage: standing.stats.percentage,
        minimum: standing.course.min_attendance_percent,
        warning: if standing.below_minimum { "below minimum" } else { "" },
    });
    println!("Courses:\n{}", render(rows));

    if !overview.recent_absences.is_empty() {
        println!(
            "Recent absences:\n{}",
            render(overview.recent_absences.iter().cloned())
        );
    }
    if !overview.pending_requests.is_empty() {
        show_requests(&overview.pending_requests);
    }
}

pub fn show_faculty_dashboard(dashboard: &FacultyDashboard) {
    #[derive(Tabled)]
    struct Row {
        code: String,
        title: String,
        sessions: usize,
        students: usize,
        attendance_rate: f64,
        below_75_percent: usize,
    }

    let rows = dashboard.courses.iter().map(|(course, stats)| Row {
        code: course.code.clone(),
        title: course.title.clone(),
        sessions: stats.sessions_count,
        students: stats.student_count,
        attendance_rate: stats.attendance_rate,
        below_75_percent: stats.below_threshold,
    });
    println!("Courses:\n{}", render(rows));

    println!("Pending absence requests: {}", dashboard.pending_requests);
    for session in &dashboard.today_sessions {
        println!(
            "Today {}-{}: {} (course {})",
            session.start_time,
            session.end_time,
            session.display_title(),
            session.course_id
        );
    }
    if dashboard.all_clear() {
        println!("No actions needed.");
    }
}
