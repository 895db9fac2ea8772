//! Creates the attendance database and imports a student roster.
//!
//! The roster is a CSV file with `student_number,full_name,email,department,year_of_study`
//! columns. Students already on file are left untouched.

use anyhow::{Context, Result};
use clap::Parser;
use course_attendance::models::NewStudent;
use course_attendance::{Settings, create_default_manager};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// The default path to the roster of students.
const ROSTER_PATH: &str = "roster.csv";

#[derive(Parser, Debug)]
#[command(about = "Create the attendance database and import a student roster")]
struct Args {
    /// The roster CSV to import.
    #[arg(default_value = ROSTER_PATH)]
    roster: PathBuf,

    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

pub fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut manager = create_default_manager(&settings)?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&args.roster)
        .with_context(|| format!("failed to open roster {}", args.roster.display()))?;
    let students = reader
        .deserialize()
        .collect::<Result<Vec<NewStudent>, csv::Error>>()
        .context("failed to parse roster")?;

    let inserted = manager.import_students(&students)?;
    println!(
        "Imported {inserted} of {} students into {}",
        students.len(),
        settings.database.url
    );

    Ok(())
}
