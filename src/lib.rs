//! Course attendance tracking: a SQLite-backed ledger of per-session attendance, the aggregation
//! rules that turn it into percentages, absence request reconciliation, and low-attendance
//! notifications.

pub mod cli;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod manager;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod requests;
pub mod schema;
pub mod settings;
pub mod stats;

pub use crate::error::{AttendanceError, Result};
pub use crate::manager::{Actor, AttendanceManager};
pub use crate::settings::Settings;

/// Opens the configured database and makes sure its tables exist.
pub fn create_default_manager(settings: &Settings) -> Result<AttendanceManager> {
    let mut manager = AttendanceManager::open(&settings.database.url)?;
    manager.initialize_schema()?;
    Ok(manager)
}
