//! Settings loaded from `config.toml`, `ATTENDANCE__*` environment variables and `DATABASE_URL`.

use config::{Config, ConfigError, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub attendance: AttendanceSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database, or `:memory:`.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttendanceSettings {
    /// Minimum attendance given to new courses that do not specify one.
    pub default_min_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Settings {
    /// Loads settings, layering the optional config file (default `config.toml` in the working
    /// directory), then `ATTENDANCE__SECTION__KEY` variables, then `DATABASE_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_sources(path, env::var("DATABASE_URL").ok())
    }

    /// [`Settings::load`] with `database_url` standing in for `DATABASE_URL`.
    fn from_sources(
        path: Option<&Path>,
        database_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("config").required(false),
        };

        Config::builder()
            .set_default("database.url", "attendance.db")?
            .set_default("attendance.default_min_percent", 75.0)?
            .set_default("logging.filter", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix("ATTENDANCE").separator("__"))
            .set_override_option("database.url", database_url)?
            .build()?
            .try_deserialize()
    }
}
