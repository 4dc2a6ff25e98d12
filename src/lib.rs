use serde::Deserialize;

pub mod cli;
pub mod descriptor;
pub mod display;
pub mod error;
pub mod export;
pub mod manager;
pub mod matcher;
pub mod models;
pub mod notify;
pub mod schema;
pub mod sync;

use crate::manager::AttendanceManager;

/// Matching parameters. The threshold trades false accepts against false
/// rejects and is deployment-specific, so it lives in config rather than
/// in code.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherSettings {
    pub dimension: usize,
    pub threshold: f32,
}

/// Defaults for sessions started without explicit parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub default_class: String,
    pub default_start_time: String,
    pub default_grace_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub matcher: MatcherSettings,
    pub session: SessionSettings,
    pub smtp: notify::SmtpSettings,
}

/// Loads configuration from `config.toml`.
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config"))
        .build()?
        .try_deserialize()?;
    Ok(settings)
}

/// Creates a manager connected to the database named by `DATABASE_URL`.
pub fn create_default_manager() -> error::Result<AttendanceManager> {
    AttendanceManager::connect_env()
}
