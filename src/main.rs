use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use course_attendance::cli::{Cli, Command, read_attendance_batch};
use course_attendance::manager::{CourseDraft, SessionDraft};
use course_attendance::models::{
    CourseChanges, FacultyChanges, NewFaculty, NewStudent, StudentChanges,
};
use course_attendance::notify::LogSink;
use course_attendance::{Actor, AttendanceManager, Settings, create_default_manager, display};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    init_logging(&settings);
    debug!(?cli, "parsed arguments");

    let mut manager = create_default_manager(&settings)
        .with_context(|| format!("failed to open {}", settings.database.url))?;

    run(&mut manager, &settings, cli)
}

/// Logs go to stderr so JSON reports on stdout stay clean.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn require_actor(cli: &Cli) -> Result<Actor> {
    match cli.actor() {
        Some(actor) => Ok(actor),
        None => bail!("this command needs --as-faculty <ID> or --as-student <ID>"),
    }
}

fn run(manager: &mut AttendanceManager, settings: &Settings, cli: Cli) -> Result<()> {
    match &cli.command {
        Command::InitDb => {
            println!("Database ready at {}", settings.database.url);
        }
        Command::AddStudent {
            number,
            name,
            email,
            department,
            year,
        } => {
            let student = manager.add_student(&NewStudent {
                student_number: number.clone(),
                full_name: name.clone(),
                email: email.clone(),
                department: department.clone(),
                year_of_study: *year,
            })?;
            println!("Added student {} with ID {}", student.full_name, student.id);
        }
        Command::AddFaculty {
            number,
            name,
            email,
            department,
        } => {
            let member = manager.add_faculty(&NewFaculty {
                faculty_number: number,
                full_name: name,
                email,
                department,
            })?;
            println!("Added faculty {} with ID {}", member.full_name, member.id);
        }
        Command::AddCourse {
            code,
            title,
            schedule,
            location,
            min_attendance,
        } => {
            let actor = require_actor(&cli)?;
            let course = manager.add_course(
                actor,
                &CourseDraft {
                    code,
                    title,
                    schedule,
                    location,
                    min_attendance_percent: min_attendance
                        .unwrap_or(settings.attendance.default_min_percent),
                },
            )?;
            println!("Added course {} with ID {}", course.code, course.id);
        }
        Command::EditCourse {
            course_id,
            code,
            title,
            schedule,
            location,
            min_attendance,
        } => {
            let actor = require_actor(&cli)?;
            let course = manager.update_course(
                actor,
                *course_id,
                &CourseChanges {
                    code: code.as_deref(),
                    title: title.as_deref(),
                    schedule: schedule.as_deref(),
                    location: location.as_deref(),
                    min_attendance_percent: *min_attendance,
                },
            )?;
            display::show_courses(&[course]);
        }
        Command::DeleteCourse { course_id } => {
            let actor = require_actor(&cli)?;
            manager.delete_course(actor, *course_id)?;
            println!("Deleted course {course_id}");
        }
        Command::Courses => {
            let actor = require_actor(&cli)?;
            let courses = manager.courses_taught_by(actor)?;
            display::show_courses(&courses);
        }
        Command::Sessions { course_id } => {
            let course = manager.get_course(*course_id)?;
            let sessions = manager.sessions_of(*course_id)?;
            display::show_sessions(&course, &sessions);
        }
        Command::UpdateProfile {
            number,
            name,
            department,
            year,
        } => match require_actor(&cli)? {
            actor @ Actor::Student(_) => {
                let student = manager.update_student(
                    actor,
                    &StudentChanges {
                        student_number: number.as_deref(),
                        full_name: name.as_deref(),
                        department: department.as_deref(),
                        year_of_study: *year,
                    },
                )?;
                println!("Updated profile of {} ({})", student.full_name, student.student_number);
            }
            actor @ Actor::Faculty(_) => {
                if year.is_some() {
                    bail!("--year only applies to student profiles");
                }
                let member = manager.update_faculty(
                    actor,
                    &FacultyChanges {
                        faculty_number: number.as_deref(),
                        full_name: name.as_deref(),
                        department: department.as_deref(),
                    },
                )?;
                println!("Updated profile of {} ({})", member.full_name, member.faculty_number);
            }
        },
        Command::AddSession {
            course_id,
            date,
            start,
            end,
            title,
            notes,
        } => {
            let actor = require_actor(&cli)?;
            let session = manager.add_session(
                actor,
                *course_id,
                &SessionDraft {
                    date: *date,
                    start_time: *start,
                    end_time: *end,
                    title: title.as_deref(),
                    notes: notes.as_deref(),
                },
            )?;
            println!("Added \"{}\" with ID {}", session.display_title(), session.id);
        }
        Command::Enroll {
            student_id,
            course_id,
        } => {
            let actor = require_actor(&cli)?;
            manager.enroll(actor, *student_id, *course_id)?;
            println!("Enrolled student {student_id} in course {course_id}");
        }
        Command::Unenroll {
            student_id,
            course_id,
        } => {
            let actor = require_actor(&cli)?;
            manager.remove_enrollment(actor, *student_id, *course_id)?;
            println!("Removed student {student_id} from course {course_id}");
        }
        Command::TakeAttendance {
            session_id,
            file_path,
        } => {
            let actor = require_actor(&cli)?;
            let batch = read_attendance_batch(file_path)
                .with_context(|| format!("failed to read {}", file_path.display()))?;
            let summary = manager.record_attendance(actor, *session_id, &batch, &mut LogSink)?;
            println!(
                "Recorded {} statuses, {} students below the course minimum",
                summary.recorded, summary.notified
            );
        }
        Command::RequestAbsence {
            course_id,
            from,
            to,
            reason,
        } => {
            let actor = require_actor(&cli)?;
            let request = manager.submit_absence_request(actor, *course_id, *from, *to, reason)?;
            println!("Submitted absence request {}", request.id);
        }
        Command::RespondRequest {
            request_id,
            decision,
            notes,
        } => {
            let actor = require_actor(&cli)?;
            let request =
                manager.respond_to_request(actor, *request_id, *decision, notes.as_deref())?;
            println!("Absence request {} is now {}", request.id, request.status);
        }
        Command::ListRequests => {
            let requests = match require_actor(&cli)? {
                actor @ Actor::Faculty(_) => manager.requests_for_faculty(actor)?,
                actor @ Actor::Student(_) => manager.requests_for_student(actor)?,
            };
            display::show_requests(&requests);
        }
        Command::StudentStats {
            student_id,
            course_id,
        } => {
            let stats = manager.student_course_stats(*student_id, *course_id)?;
            display::show_student_stats(&stats);
        }
        Command::StudentHistory { course_id } => {
            let actor = require_actor(&cli)?;
            let history = manager.student_session_history(actor, *course_id)?;
            display::show_history(&history);
        }
        Command::CourseStats { course_id } => {
            let stats = manager.course_stats(*course_id)?;
            display::show_course_stats(&stats);
        }
        Command::Dashboard => match require_actor(&cli)? {
            actor @ Actor::Faculty(_) => {
                let today = Local::now().date_naive();
                let dashboard = manager.faculty_dashboard(actor, today)?;
                display::show_faculty_dashboard(&dashboard);
            }
            actor @ Actor::Student(_) => {
                let overview = manager.student_overview(actor)?;
                display::show_student_overview(&overview);
            }
        },
        Command::Report { course_id, json } => {
            let actor = require_actor(&cli)?;
            let report = manager.course_report(actor, *course_id)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::show_report(&report);
            }
        }
    }

    Ok(())
}
